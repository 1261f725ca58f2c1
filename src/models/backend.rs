use crate::image::INPUT_SHAPE;
use crate::utils::error::DetectionError;
use crate::{Config, Result};
use ndarray::{Array2, Array4, Ix2};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::{Tensor, ValueType},
};
use parking_lot::Mutex;
use std::path::Path;

/// 模型类别数
pub const NUM_CLASSES: usize = 2;

/// 推理后端：输入 (N, 3, 224, 224) 标准化张量，输出 (N, 2) logits
pub trait InferenceBackend: Send + Sync {
    fn forward(&self, batch: Array4<f32>) -> Result<Array2<f32>>;

    fn name(&self) -> &str;
}

/// 基于ONNX Runtime的ResNet-18后端
pub struct OnnxBackend {
    // ort的Session::run需要&mut，锁只用于串行化运行时句柄，参数本身只读
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxBackend {
    pub fn load(config: &Config) -> Result<Self> {
        let model_path = config.model_path();

        if !model_path.exists() {
            return Err(DetectionError::ModelLoad(format!(
                "Deforestation model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading deforestation model from: {}", model_path.display());

        let session = Self::create_session(&model_path, config)?;
        let (input_name, output_name) = Self::validate_signature(&session)?;

        tracing::info!(
            "Deforestation model ready: input='{}', output='{}'",
            input_name,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    fn create_session(path: &Path, config: &Config) -> Result<Session> {
        let level = match config.onnx_config.optimization_level {
            0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        };

        let model_load = |e: ort::Error| {
            DetectionError::ModelLoad(format!("{}: {}", path.display(), e))
        };

        Session::builder()
            .map_err(model_load)?
            .with_optimization_level(level)
            .map_err(model_load)?
            .with_intra_threads(config.onnx_config.intra_threads)
            .map_err(model_load)?
            .commit_from_file(path)
            .map_err(model_load)
    }

    /// 校验模型签名：恰好一个张量输入，第一个输出为张量
    fn validate_signature(session: &Session) -> Result<(String, String)> {
        let input = match session.inputs.as_slice() {
            [input] => input,
            inputs => {
                return Err(DetectionError::ModelLoad(format!(
                    "Expected exactly one model input, found {}",
                    inputs.len()
                )))
            }
        };

        let output = session
            .outputs
            .first()
            .ok_or_else(|| DetectionError::ModelLoad("Model has no outputs".to_string()))?;

        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Model output[{}]: '{}'", i, output.name);
        }

        let input_dims = match &input.input_type {
            ValueType::Tensor { shape, .. } => shape.iter().copied().collect::<Vec<i64>>(),
            other => {
                return Err(DetectionError::ModelLoad(format!(
                    "Model input '{}' is not a tensor: {:?}",
                    input.name, other
                )))
            }
        };

        let output_dims = match &output.output_type {
            ValueType::Tensor { shape, .. } => shape.iter().copied().collect::<Vec<i64>>(),
            other => {
                return Err(DetectionError::ModelLoad(format!(
                    "Model output '{}' is not a tensor: {:?}",
                    output.name, other
                )))
            }
        };

        tracing::debug!(
            "Model signature: '{}' {:?} -> '{}' {:?}",
            input.name,
            input_dims,
            output.name,
            output_dims
        );
        check_io_shapes(&input_dims, &output_dims)?;

        Ok((input.name.clone(), output.name.clone()))
    }
}

/// 输入须兼容 (N,3,224,224)，输出须兼容 (N,2)
fn check_io_shapes(input_dims: &[i64], output_dims: &[i64]) -> Result<()> {
    let expected_input = [
        1,
        INPUT_SHAPE[0] as i64,
        INPUT_SHAPE[1] as i64,
        INPUT_SHAPE[2] as i64,
    ];
    if !dims_compatible(input_dims, &expected_input) {
        return Err(DetectionError::ModelLoad(format!(
            "Incompatible input shape {:?}, expected {:?}",
            input_dims, expected_input
        )));
    }

    if !dims_compatible(output_dims, &[1, NUM_CLASSES as i64]) {
        return Err(DetectionError::ModelLoad(format!(
            "Incompatible output shape {:?}, expected [N, {}]",
            output_dims, NUM_CLASSES
        )));
    }

    Ok(())
}

impl InferenceBackend for OnnxBackend {
    fn forward(&self, batch: Array4<f32>) -> Result<Array2<f32>> {
        let input_tensor = Tensor::from_array(batch)?;

        let logits = {
            let mut session = self.session.lock();
            let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

            match outputs.get(&self.output_name) {
                Some(output) => output.try_extract_array::<f32>()?.into_owned(),
                None => {
                    let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                    return Err(DetectionError::Inference(format!(
                        "Output '{}' not found. Available outputs: {:?}",
                        self.output_name, available
                    )));
                }
            }
        };

        let actual = logits.shape().to_vec();
        logits
            .into_dimensionality::<Ix2>()
            .map_err(|_| DetectionError::ShapeMismatch {
                expected: vec![1, NUM_CLASSES],
                actual,
            })
    }

    fn name(&self) -> &str {
        "onnxruntime"
    }
}

/// 动态维度（<=0）与任意值兼容
pub fn dims_compatible(actual: &[i64], expected: &[i64]) -> bool {
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(&a, &e)| a <= 0 || e <= 0 || a == e)
}
