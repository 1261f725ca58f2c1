use crate::utils::error::DetectionError;
use crate::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 模型文件路径（ONNX导出的ResNet-18二分类模型）
    pub model_path: PathBuf,

    /// 工作线程数量
    pub workers: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// 单张图像最大字节数
    pub max_image_bytes: usize,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别 (0-3)
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节），需要容纳前后两张图像
    pub max_request_size: usize,
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_path: String,
        workers: Option<usize>,
        intra_threads: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores);

        let onnx_config = OnnxConfig {
            intra_threads: intra_threads.unwrap_or((cpu_cores * 3 / 4).max(1)), // 默认使用75%的CPU核心
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 50 * 1024 * 1024, // 50MB
        };

        let config = Self {
            bind_addr,
            model_path: PathBuf::from(model_path),
            workers,
            dev_mode,
            max_image_bytes: 25 * 1024 * 1024, // 25MB
            onnx_config,
            server_config,
        };
        config.validate()?;

        Ok(config)
    }

    /// 校验配置项
    pub fn validate(&self) -> Result<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(DetectionError::Config("Model path must not be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(DetectionError::Config("Worker count must be at least 1".to_string()));
        }
        if self.onnx_config.intra_threads == 0 {
            return Err(DetectionError::Config("ONNX intra threads must be at least 1".to_string()));
        }
        if !(0..=3).contains(&self.onnx_config.optimization_level) {
            return Err(DetectionError::Config(format!(
                "Invalid optimization level {}, expected 0-3",
                self.onnx_config.optimization_level
            )));
        }
        if self.max_image_bytes == 0 || self.server_config.max_request_size == 0 {
            return Err(DetectionError::Config("Size limits must be non-zero".to_string()));
        }
        Ok(())
    }

    /// 获取模型路径
    pub fn model_path(&self) -> PathBuf {
        self.model_path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new(
            "127.0.0.1:8000".to_string(),
            "models/deforestation_model.onnx".to_string(),
            Some(2),
            Some(1),
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.workers, 2);
        assert_eq!(config.onnx_config.intra_threads, 1);
        assert_eq!(config.onnx_config.optimization_level, 3);
        assert_eq!(config.server_config.request_timeout, 60);
        assert!(config.server_config.max_request_size >= 2 * config.max_image_bytes);
    }

    #[test]
    fn test_dev_mode_extends_timeout() {
        let config = Config::new(
            "127.0.0.1:8000".to_string(),
            "model.onnx".to_string(),
            None,
            None,
            true,
        )
        .unwrap();
        assert_eq!(config.server_config.request_timeout, 300);
        assert!(config.workers >= 1);
        assert!(config.onnx_config.intra_threads >= 1);
    }

    #[test]
    fn test_rejects_empty_model_path() {
        let err = Config::new("127.0.0.1:8000".to_string(), String::new(), None, None, false)
            .unwrap_err();
        assert!(matches!(err, DetectionError::Config(_)));
    }

    #[test]
    fn test_rejects_invalid_optimization_level() {
        let mut config = config();
        config.onnx_config.optimization_level = 7;
        assert!(matches!(config.validate(), Err(DetectionError::Config(_))));
    }
}
