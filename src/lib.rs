pub mod config;
pub mod detection;
pub mod image;
pub mod models;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use detection::{ChangeDetector, ChangeVerdict, ClassificationResult, ComparisonResult, ForestLabel};
pub use utils::error::DetectionError;

pub type Result<T> = std::result::Result<T, DetectionError>;
