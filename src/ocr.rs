use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const OCR_PATH: &str = "/api/ocr";
const USER_AGENT: &str = concat!("attendance-tracker/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR service unreachable: {0}")]
    Network(String),

    #[error("OCR service error {0}: {1}")]
    Api(u16, String),

    #[error("OCR response parse error: {0}")]
    Parse(String),
}

/// Response contract of the external card-OCR service.
#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub ocr_text: String,
}

/// HTTP client for the external OCR service.
#[derive(Clone)]
pub struct OcrClient {
    http: reqwest::Client,
    base_url: String,
}

impl OcrClient {
    pub fn new(base_url: &str) -> Result<Self, OcrError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OcrError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Send a card image for recognition. Non-2xx responses are surfaced
    /// as-is; nothing is retried here.
    pub async fn recognize(
        &self,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<OcrResponse, OcrError> {
        let part = reqwest::multipart::Part::bytes(image).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let url = format!("{}{}", self.base_url, OCR_PATH);

        tracing::debug!(url = %url, file = %file_name, "sending card image to OCR service");

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| OcrError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Api(status.as_u16(), body));
        }

        response
            .json::<OcrResponse>()
            .await
            .map_err(|e| OcrError::Parse(e.to_string()))
    }
}
