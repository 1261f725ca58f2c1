use super::backend::{InferenceBackend, OnnxBackend, NUM_CLASSES};
use crate::detection::{ClassProbabilities, ClassificationResult};
use crate::image::{ImagePreprocessor, NormalizedTensor};
use crate::utils::error::DetectionError;
use crate::{Config, Result};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;

/// 森林覆盖二分类器：ResNet-18骨干 + 2类全连接头
pub struct Classifier {
    backend: Arc<dyn InferenceBackend>,
}

impl Classifier {
    /// 从配置的模型路径加载ONNX模型
    pub fn new(config: &Config) -> Result<Self> {
        let backend = OnnxBackend::load(config)?;
        Ok(Self::with_backend(Arc::new(backend)))
    }

    pub fn with_backend(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 张量 -> 类别概率
    pub fn classify(&self, tensor: &NormalizedTensor) -> Result<ClassProbabilities> {
        self.classify_logits(tensor).map_err(log_if_bug)
    }

    fn classify_logits(&self, tensor: &NormalizedTensor) -> Result<ClassProbabilities> {
        let logits = self.backend.forward(tensor.to_batch())?;

        if logits.dim() != (1, NUM_CLASSES) {
            return Err(DetectionError::ShapeMismatch {
                expected: vec![1, NUM_CLASSES],
                actual: logits.shape().to_vec(),
            });
        }

        let row: Vec<f32> = logits.row(0).to_vec();
        if row.iter().any(|v| !v.is_finite()) {
            return Err(DetectionError::Inference(format!(
                "Model produced non-finite logits: {:?}",
                row
            )));
        }

        ClassProbabilities::from_slice(&softmax(&row))
    }

    /// 单张图像：预处理 -> 推理 -> top-1及置信度
    pub fn classify_single(&self, image: &DynamicImage) -> Result<ClassificationResult> {
        let preprocess_start = Instant::now();
        let tensor = ImagePreprocessor::preprocess(image).map_err(log_if_bug)?;
        let preprocess_time = preprocess_start.elapsed();

        let inference_start = Instant::now();
        let probs = self.classify(&tensor)?;
        let inference_time = inference_start.elapsed();

        let result = ClassificationResult::from_probabilities(&probs);

        tracing::debug!(
            "Classified image: label={}, probs={:?}, preprocess={:.1}ms, inference={:.1}ms",
            result.prediction,
            probs,
            preprocess_time.as_secs_f32() * 1000.0,
            inference_time.as_secs_f32() * 1000.0
        );

        Ok(result)
    }
}

fn log_if_bug(e: DetectionError) -> DetectionError {
    if e.is_internal_bug() {
        tracing::error!("Invariant violation (bug): {}", e);
    }
    e
}

/// 数值稳定的softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|v| v / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ForestLabel;
    use ndarray::{Array2, Array4};
    use parking_lot::Mutex;
    use std::io;
    use tracing_subscriber::fmt::MakeWriter;

    /// 返回固定logits的后端
    struct FixedLogits(Vec<f32>);

    impl InferenceBackend for FixedLogits {
        fn forward(&self, batch: Array4<f32>) -> Result<Array2<f32>> {
            assert_eq!(batch.dim(), (1, 3, 224, 224));
            Ok(Array2::from_shape_vec((1, self.0.len()), self.0.clone()).unwrap())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// 收集日志输出
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn classifier(logits: &[f32]) -> Classifier {
        Classifier::with_backend(Arc::new(FixedLogits(logits.to_vec())))
    }

    #[test]
    fn test_softmax_sums_to_one() {
        for logits in [[0.0, 0.0], [3.2, -1.5], [1000.0, -1000.0], [-88.0, 88.0]] {
            let probs = softmax(&logits);
            let sum: f32 = probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6, "{:?}", logits);
            assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn test_classify_probabilities_valid() {
        let probs = classifier(&[2.0, -1.0]).classify(&NormalizedTensor::zeros()).unwrap();
        assert!(probs.is_valid(1e-6));
        assert_eq!(probs.argmax(), ForestLabel::Deforested);
    }

    #[test]
    fn test_classify_single_confidence() {
        // softmax([0, ln(0.91/0.09)]) = [0.09, 0.91]
        let logit = (0.91f32 / 0.09).ln();
        let image = DynamicImage::new_rgb8(32, 32);
        let result = classifier(&[0.0, logit]).classify_single(&image).unwrap();
        assert_eq!(result.prediction, ForestLabel::NonDeforested);
        assert!((result.confidence - 0.91).abs() < 1e-9);
    }

    #[test]
    fn test_equal_logits_tie_break() {
        let image = DynamicImage::new_rgb8(8, 8);
        let result = classifier(&[0.3, 0.3]).classify_single(&image).unwrap();
        assert_eq!(result.prediction, ForestLabel::Deforested);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_wrong_class_count_is_shape_mismatch() {
        let err = classifier(&[0.1, 0.2, 0.3])
            .classify(&NormalizedTensor::zeros())
            .unwrap_err();
        assert!(matches!(err, DetectionError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_shape_mismatch_logged_as_bug() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let err = tracing::subscriber::with_default(subscriber, || {
            classifier(&[0.1, 0.2, 0.3])
                .classify(&NormalizedTensor::zeros())
                .unwrap_err()
        });
        assert!(matches!(err, DetectionError::ShapeMismatch { .. }));

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("ERROR"), "{}", output);
        assert!(output.contains("Invariant violation"), "{}", output);
    }

    #[test]
    fn test_nan_logits_not_logged_as_bug() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let err = tracing::subscriber::with_default(subscriber, || {
            classifier(&[f32::NAN, 0.0])
                .classify(&NormalizedTensor::zeros())
                .unwrap_err()
        });
        assert!(matches!(err, DetectionError::Inference(_)));
        assert!(!String::from_utf8(logs.0.lock().clone()).unwrap().contains("Invariant violation"));
    }

    #[test]
    fn test_nan_logits_rejected() {
        let err = classifier(&[f32::NAN, 0.0])
            .classify(&NormalizedTensor::zeros())
            .unwrap_err();
        assert!(matches!(err, DetectionError::Inference(_)));
    }
}
