use crate::{
    detection::ComparisonResult,
    image::ImageLoader,
    utils::error::DetectionError,
    web::{
        extractors::{RequestId, Validate, ValidatedJson},
        AppState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

pub const DETECTION_ENDPOINT: &str = "/deforestationdetection";

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct DetectionJsonRequest {
    /// Base64编码的前期图像
    pub before: String,

    /// Base64编码的后期图像
    pub after: String,
}

impl Validate for DetectionJsonRequest {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.before.trim().is_empty() {
            return Err("'before' image data cannot be empty".to_string());
        }
        if self.after.trim().is_empty() {
            return Err("'after' image data cannot be empty".to_string());
        }
        Ok(())
    }
}

/// 检测响应
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub status: String,
    pub endpoint: String,
    pub request_id: String,
    pub result: ComparisonResult,
}

impl DetectionResponse {
    fn success(request_id: String, result: ComparisonResult) -> Self {
        Self {
            status: "success".to_string(),
            endpoint: DETECTION_ENDPOINT.to_string(),
            request_id,
            result,
        }
    }
}

/// 服务状态
pub async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "🌍 EcoSense API is running successfully!"
    }))
}

/// Multipart文件上传处理器，字段: before, after
pub async fn detection_upload_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    mut multipart: Multipart,
) -> Result<Json<DetectionResponse>> {
    let start_time = Instant::now();

    tracing::info!("Processing multipart detection request: request_id={}", request_id);

    let mut before: Option<Bytes> = None;
    let mut after: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        let field_name = field.name().unwrap_or("unknown").to_string();

        let slot = match field_name.as_str() {
            "before" => &mut before,
            "after" => &mut after,
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
                continue;
            }
        };

        let data = field.bytes().await.map_err(multipart_error)?;

        if data.is_empty() {
            return Err(DetectionError::InvalidInput(format!("Empty '{}' file", field_name)));
        }

        tracing::debug!("Received '{}' file: {} bytes", field_name, data.len());
        *slot = Some(data);
    }

    let before = before.ok_or_else(|| DetectionError::InvalidInput("No 'before' image provided".to_string()))?;
    let after = after.ok_or_else(|| DetectionError::InvalidInput("No 'after' image provided".to_string()))?;

    let result = Arc::clone(&state.detector).compare_async(before, after).await?;

    tracing::info!(
        "Upload detection completed: request_id={}, verdict={}, time={:.3}s",
        request_id,
        result.verdict.code(),
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(DetectionResponse::success(request_id, result)))
}

/// 请求体超出限制时保留413，其余视为格式错误
fn multipart_error(e: MultipartError) -> DetectionError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DetectionError::PayloadTooLarge(e.body_text())
    } else {
        DetectionError::InvalidInput(format!("Failed to read multipart data: {}", e.body_text()))
    }
}

/// JSON base64上传处理器
pub async fn detection_json_handler(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    ValidatedJson(request): ValidatedJson<DetectionJsonRequest>,
) -> Result<Json<DetectionResponse>> {
    let start_time = Instant::now();

    tracing::info!("Processing JSON detection request: request_id={}", request_id);

    let before = Bytes::from(ImageLoader::decode_base64(&request.before)?);
    let after = Bytes::from(ImageLoader::decode_base64(&request.after)?);

    let result = Arc::clone(&state.detector).compare_async(before, after).await?;

    tracing::info!(
        "JSON detection completed: request_id={}, verdict={}, time={:.3}s",
        request_id,
        result.verdict.code(),
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(DetectionResponse::success(request_id, result)))
}
