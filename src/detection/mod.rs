pub mod pipeline;
pub mod types;

pub use pipeline::ChangeDetector;
pub use types::{ChangeVerdict, ClassProbabilities, ClassificationResult, ComparisonResult, ForestLabel};

use crate::Result;

/// 对比前后两张图像的原始字节
pub fn compare_deforestation(detector: &ChangeDetector, before: &[u8], after: &[u8]) -> Result<ComparisonResult> {
    detector.compare(before, after)
}
