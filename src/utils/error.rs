use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Unsupported color mode: {0}")]
    UnsupportedMode(String),

    #[error("Tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl DetectionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DetectionError::ImageDecode(_) => StatusCode::BAD_REQUEST,
            DetectionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DetectionError::Base64(_) => StatusCode::BAD_REQUEST,
            DetectionError::Json(_) => StatusCode::BAD_REQUEST,
            DetectionError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            DetectionError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            DetectionError::UnsupportedMode(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DetectionError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DetectionError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            DetectionError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            DetectionError::UnsupportedMode(_) => "UNSUPPORTED_MODE",
            DetectionError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            DetectionError::Inference(_) => "INFERENCE_ERROR",
            DetectionError::InvalidInput(_) => "INVALID_INPUT",
            DetectionError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            DetectionError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            DetectionError::Config(_) => "CONFIG_ERROR",
            DetectionError::Io(_) => "IO_ERROR",
            DetectionError::Json(_) => "JSON_ERROR",
            DetectionError::Base64(_) => "BASE64_DECODE_ERROR",
            DetectionError::Ort(_) => "ORT_ERROR",
            DetectionError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 内部不变量被破坏（预处理输出或模型输出形状不符），属于程序缺陷
    pub fn is_internal_bug(&self) -> bool {
        matches!(self, DetectionError::ShapeMismatch { .. })
    }
}

impl IntoResponse for DetectionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "status": "error",
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        });

        if status.is_server_error() {
            tracing::error!("Request failed: {} ({})", self, status);
        } else {
            tracing::warn!("Request rejected: {} ({})", self, status);
        }

        (status, axum::Json(error_response)).into_response()
    }
}
