use crate::detection::ForestLabel;
use crate::image::{NormalizedTensor, IMAGENET_MEAN, IMAGENET_STD, INPUT_SIZE};
use crate::models::Classifier;
use crate::utils::error::DetectionError;
use crate::{Config, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// 模型管理器：启动时加载一次，之后以只读方式共享给所有请求
pub struct ModelManager {
    classifier: Arc<Classifier>,
    config: Config,
    loaded_at: DateTime<Utc>,
}

impl ModelManager {
    /// 加载模型，失败时服务不能启动
    pub fn init(config: Config) -> Result<Self> {
        tracing::info!("Initializing model manager...");

        let classifier = Arc::new(Classifier::new(&config)?);
        let manager = Self::with_classifier(classifier, config);

        // 启动时做一次推理，确保模型可用
        manager.health_check()?;

        tracing::info!("Model manager initialized successfully");
        Ok(manager)
    }

    pub fn with_classifier(classifier: Arc<Classifier>, config: Config) -> Self {
        Self {
            classifier,
            config,
            loaded_at: Utc::now(),
        }
    }

    /// 获取分类器引用
    pub fn classifier(&self) -> Arc<Classifier> {
        Arc::clone(&self.classifier)
    }

    /// 获取配置引用
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 模型健康检查：全零输入跑一次前向，检查输出是合法的概率分布
    pub fn health_check(&self) -> Result<()> {
        tracing::debug!("Performing model health check...");

        let probs = self.classifier.classify(&NormalizedTensor::zeros())?;
        if !probs.is_valid(1e-4) {
            return Err(DetectionError::Inference(format!(
                "Health check produced invalid probabilities: {:?}",
                probs
            )));
        }

        tracing::debug!("Model health check passed");
        Ok(())
    }

    /// 获取模型统计信息
    pub fn get_stats(&self) -> ModelStats {
        ModelStats {
            backend: self.classifier.backend_name().to_string(),
            model_path: self.config.model_path.display().to_string(),
            architecture: "resnet18".to_string(),
            classes: ForestLabel::ALL.iter().map(|l| l.as_str().to_string()).collect(),
            input_size: INPUT_SIZE,
            normalize_mean: IMAGENET_MEAN,
            normalize_std: IMAGENET_STD,
            intra_threads: self.config.onnx_config.intra_threads,
            optimization_level: self.config.onnx_config.optimization_level,
            loaded_at: self.loaded_at.to_rfc3339(),
        }
    }
}

/// 模型统计信息
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub backend: String,
    pub model_path: String,
    pub architecture: String,
    pub classes: Vec<String>,
    pub input_size: u32,
    pub normalize_mean: [f32; 3],
    pub normalize_std: [f32; 3],
    pub intra_threads: usize,
    pub optimization_level: i32,
    pub loaded_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InferenceBackend;
    use ndarray::{Array2, Array4};

    struct ConstBackend(f32, f32);

    impl InferenceBackend for ConstBackend {
        fn forward(&self, _batch: Array4<f32>) -> Result<Array2<f32>> {
            Ok(Array2::from_shape_vec((1, 2), vec![self.0, self.1]).unwrap())
        }

        fn name(&self) -> &str {
            "const"
        }
    }

    fn config() -> Config {
        Config::new("127.0.0.1:0".to_string(), "model.onnx".to_string(), Some(1), Some(1), false)
            .unwrap()
    }

    #[test]
    fn test_health_check_passes() {
        let classifier = Arc::new(Classifier::with_backend(Arc::new(ConstBackend(0.5, -0.5))));
        let manager = ModelManager::with_classifier(classifier, config());
        assert!(manager.health_check().is_ok());
    }

    #[test]
    fn test_health_check_fails_on_bad_output() {
        let classifier = Arc::new(Classifier::with_backend(Arc::new(ConstBackend(f32::INFINITY, 0.0))));
        let manager = ModelManager::with_classifier(classifier, config());
        assert!(manager.health_check().is_err());
    }

    #[test]
    fn test_init_without_model_fails() {
        let err = ModelManager::init(config()).err().unwrap();
        assert!(matches!(err, DetectionError::ModelLoad(_)));
    }

    #[test]
    fn test_stats_report_class_order() {
        let classifier = Arc::new(Classifier::with_backend(Arc::new(ConstBackend(0.0, 0.0))));
        let stats = ModelManager::with_classifier(classifier, config()).get_stats();
        assert_eq!(stats.classes, vec!["deforested", "non-deforested"]);
        assert_eq!(stats.backend, "const");
        assert_eq!(stats.input_size, 224);
    }
}
