use crate::{
    detection::{ClassificationResult, ComparisonResult},
    image::ImageLoader,
    models::Classifier,
    utils::error::DetectionError,
    Result,
};
use axum::body::Bytes;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;

/// 前后两张图像的森林变化检测
pub struct ChangeDetector {
    classifier: Arc<Classifier>,
    max_image_bytes: usize,
}

impl ChangeDetector {
    pub fn new(classifier: Arc<Classifier>, max_image_bytes: usize) -> Self {
        Self {
            classifier,
            max_image_bytes,
        }
    }

    /// 单张图像：解码 -> 预处理 -> 推理 -> top-1
    pub fn classify_single(&self, bytes: &[u8]) -> Result<ClassificationResult> {
        let image = ImageLoader::from_bytes(bytes, self.max_image_bytes)?;
        self.classifier.classify_single(&image)
    }

    /// 同步对比；任意一张失败则整体失败，不返回部分结果
    pub fn compare(&self, before: &[u8], after: &[u8]) -> Result<ComparisonResult> {
        let start_time = Instant::now();

        let before_image = ImageLoader::from_bytes(before, self.max_image_bytes)?;
        let after_image = ImageLoader::from_bytes(after, self.max_image_bytes)?;

        let result = self.compare_images(&before_image, &after_image)?;

        log_comparison(&result, start_time);

        Ok(result)
    }

    /// 对比已解码的两张图像
    pub fn compare_images(&self, before: &DynamicImage, after: &DynamicImage) -> Result<ComparisonResult> {
        let before_result = self.classifier.classify_single(before)?;
        let after_result = self.classifier.classify_single(after)?;

        Ok(ComparisonResult::from_results(before_result, after_result))
    }

    /// 异步对比：两张图像在阻塞线程池上并行分类
    pub async fn compare_async(self: Arc<Self>, before: Bytes, after: Bytes) -> Result<ComparisonResult> {
        let start_time = Instant::now();

        let before_task = {
            let detector = Arc::clone(&self);
            tokio::task::spawn_blocking(move || detector.classify_single(&before))
        };
        let after_task = {
            let detector = Arc::clone(&self);
            tokio::task::spawn_blocking(move || detector.classify_single(&after))
        };

        let (before_joined, after_joined) = tokio::join!(before_task, after_task);

        // 先检查before，保证两张都失败时报告的错误是确定的
        let before_result = before_joined.map_err(join_error)??;
        let after_result = after_joined.map_err(join_error)??;

        let result = ComparisonResult::from_results(before_result, after_result);

        log_comparison(&result, start_time);

        Ok(result)
    }
}

fn log_comparison(result: &ComparisonResult, start_time: Instant) {
    tracing::info!(
        "Comparison completed: before={} ({:.3}), after={} ({:.3}), verdict={}, time={:.3}s",
        result.before.prediction,
        result.before.confidence,
        result.after.prediction,
        result.after.confidence,
        result.verdict.code(),
        start_time.elapsed().as_secs_f32()
    );
}

fn join_error(e: tokio::task::JoinError) -> DetectionError {
    DetectionError::Internal(format!("Classification task failed: {}", e))
}
