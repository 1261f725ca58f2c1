use crate::utils::error::DetectionError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, GenericImageView};

pub struct ImageLoader;

impl ImageLoader {
    /// base64解码，兼容数据URL前缀 (data:image/xxx;base64,)
    pub fn decode_base64(base64_data: &str) -> Result<Vec<u8>> {
        let base64_clean = match base64_data.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => base64_data,
        };

        Ok(base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?)
    }

    /// 从字节流加载图像
    pub fn from_bytes(bytes: &[u8], max_bytes: usize) -> Result<DynamicImage> {
        if bytes.len() > max_bytes {
            return Err(DetectionError::FileTooLarge(bytes.len(), max_bytes));
        }

        let image = image::load_from_memory(bytes)?;
        let (width, height) = image.dimensions();
        tracing::debug!("Decoded image: {}x{} {:?}", width, height, image.color());

        Ok(image)
    }
}
