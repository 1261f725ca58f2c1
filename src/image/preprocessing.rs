use super::transforms::{ImageTransforms, IMAGENET_MEAN, IMAGENET_STD};
use crate::utils::error::DetectionError;
use crate::Result;
use image::DynamicImage;
use ndarray::{Array3, Array4, ArrayView3, Axis};

/// 模型输入边长
pub const INPUT_SIZE: u32 = 224;

/// 模型输入形状 (C, H, W)
pub const INPUT_SHAPE: [usize; 3] = [3, INPUT_SIZE as usize, INPUT_SIZE as usize];

/// 标准化后的模型输入张量，形状固定为 (3, 224, 224)
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array3<f32>);

impl NormalizedTensor {
    pub fn new(array: Array3<f32>) -> Result<Self> {
        if array.shape() != INPUT_SHAPE {
            return Err(DetectionError::ShapeMismatch {
                expected: INPUT_SHAPE.to_vec(),
                actual: array.shape().to_vec(),
            });
        }
        Ok(Self(array))
    }

    pub fn zeros() -> Self {
        Self(Array3::zeros(INPUT_SHAPE))
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.0.view()
    }

    /// 添加batch维度 -> (1, 3, 224, 224)
    pub fn to_batch(&self) -> Array4<f32> {
        self.0.clone().insert_axis(Axis(0))
    }
}

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// 分类模型预处理：RGB -> 缩放至224x224 -> [0,1] -> ImageNet标准化
    pub fn preprocess(image: &DynamicImage) -> Result<NormalizedTensor> {
        let rgb = ImageTransforms::to_rgb(image)?;
        let resized = ImageTransforms::resize_exact(&rgb, INPUT_SIZE, INPUT_SIZE);
        let tensor = ImageTransforms::to_chw_normalized(&resized, &IMAGENET_MEAN, &IMAGENET_STD);

        NormalizedTensor::new(tensor)
    }

    /// 从原始字节解码并预处理
    pub fn preprocess_bytes(bytes: &[u8], max_bytes: usize) -> Result<NormalizedTensor> {
        let image = super::ImageLoader::from_bytes(bytes, max_bytes)?;
        Self::preprocess(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn test_shape_invariance_small_grayscale() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(50, 80, Luma([120])));
        let tensor = ImagePreprocessor::preprocess(&image).unwrap();
        assert_eq!(tensor.shape(), &[3, 224, 224]);
    }

    #[test]
    fn test_shape_invariance_large_rgba() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4000, 3000, Rgba([30, 120, 40, 128])));
        let tensor = ImagePreprocessor::preprocess(&image).unwrap();
        assert_eq!(tensor.shape(), &[3, 224, 224]);
    }

    #[test]
    fn test_deterministic_bytes_to_tensor() {
        let mut img = RgbImage::new(97, 61);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8]);
        }
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut buf, ImageFormat::Png).unwrap();
        let bytes = buf.into_inner();

        let first = ImagePreprocessor::preprocess_bytes(&bytes, usize::MAX).unwrap();
        let second = ImagePreprocessor::preprocess_bytes(&bytes, usize::MAX).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_uniform_image_normalized_values() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        let tensor = ImagePreprocessor::preprocess(&image).unwrap();
        let view = tensor.view();
        for c in 0..3 {
            let expected = (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            assert!((view[[c, 100, 37]] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_tensor_rejects_wrong_shape() {
        let err = NormalizedTensor::new(Array3::zeros((3, 224, 223))).unwrap_err();
        assert!(matches!(
            err,
            DetectionError::ShapeMismatch { ref actual, .. } if actual == &vec![3, 224, 223]
        ));
    }

    #[test]
    fn test_batch_axis() {
        assert_eq!(NormalizedTensor::zeros().to_batch().dim(), (1, 3, 224, 224));
    }
}
