use crate::utils::error::DetectionError;
use crate::Result;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, RgbImage};
use ndarray::Array3;

/// ImageNet通道均值 [R, G, B]
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet通道标准差 [R, G, B]
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// 图像变换工具集
pub struct ImageTransforms;

impl ImageTransforms {
    /// 转换为三通道RGB：alpha通道丢弃，灰度复制到三个通道
    pub fn to_rgb(image: &DynamicImage) -> Result<RgbImage> {
        match image.color() {
            ColorType::L8
            | ColorType::La8
            | ColorType::Rgb8
            | ColorType::Rgba8
            | ColorType::L16
            | ColorType::La16
            | ColorType::Rgb16
            | ColorType::Rgba16
            | ColorType::Rgb32F
            | ColorType::Rgba32F => Ok(image.to_rgb8()),
            other => Err(DetectionError::UnsupportedMode(format!("{:?}", other))),
        }
    }

    /// 双线性缩放到指定尺寸，不保持宽高比
    pub fn resize_exact(image: &RgbImage, width: u32, height: u32) -> RgbImage {
        if image.dimensions() == (width, height) {
            return image.clone();
        }
        imageops::resize(image, width, height, FilterType::Triangle)
    }

    /// HWC u8 -> CHW f32，缩放到[0,1]后按通道标准化
    pub fn to_chw_normalized(image: &RgbImage, mean: &[f32; 3], std: &[f32; 3]) -> Array3<f32> {
        let (width, height) = image.dimensions();
        let mut tensor = Array3::<f32>::zeros((3, height as usize, width as usize));

        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                let value = f32::from(pixel[c]) / 255.0;
                tensor[[c, y as usize, x as usize]] = (value - mean[c]) / std[c];
            }
        }

        tensor
    }
}
