use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;

use crate::codec::{ImagePayload, payload_from_data_url};
use crate::error::{EditorError, Result};

pub const GENERATED_FILENAME: &str = "generated-image.png";

/// What the edit service handed back for one request.
#[derive(Debug, Clone, Default)]
pub struct EditOutcome {
    pub text: Option<String>,
    pub image: Option<ImagePayload>,
    /// Size in bytes of the uploaded source image, as reported by the service.
    pub source_size: Option<u64>,
}

/// The external image-editing service.
pub trait EditCapability: Send + Sync {
    fn edit(&self, image: &ImagePayload, instruction: &str) -> Result<EditOutcome>;
}

/// JSON body returned by the edit endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditEnvelope {
    pub success: bool,
    pub image_size: Option<u64>,
    pub prompt: Option<String>,
    pub result: Option<String>,
    pub message: Option<String>,
    pub generated_image: Option<String>,
    pub error: Option<String>,
}

impl EditEnvelope {
    pub fn into_outcome(self) -> Result<EditOutcome> {
        tracing::debug!(
            success = self.success,
            prompt = ?self.prompt,
            image_size = ?self.image_size,
            has_image = self.generated_image.is_some(),
            "edit envelope"
        );
        if !self.success {
            return Err(EditorError::Provider(
                self.error
                    .unwrap_or_else(|| "edit service reported an unknown error".to_string()),
            ));
        }
        let image = self
            .generated_image
            .filter(|url| !url.trim().is_empty())
            .map(|url| payload_from_data_url(&url, GENERATED_FILENAME))
            .transpose()?;
        Ok(EditOutcome {
            text: self.result.or(self.message),
            image,
            source_size: self.image_size,
        })
    }
}

/// Posts `image` + `prompt` as multipart form data to a single endpoint.
pub struct HttpEditCapability {
    client: HttpClient,
    endpoint: String,
}

impl HttpEditCapability {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EditorError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl EditCapability for HttpEditCapability {
    fn edit(&self, image: &ImagePayload, instruction: &str) -> Result<EditOutcome> {
        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.filename.clone())
            .mime_str(&image.mime)
            .map_err(|e| EditorError::Transport(e.to_string()))?;
        let form = Form::new()
            .part("image", part)
            .text("prompt", instruction.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    EditorError::Transport("request timed out".to_string())
                } else {
                    EditorError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        tracing::debug!(%status, endpoint = %self.endpoint, "edit service responded");
        let body = response
            .text()
            .map_err(|e| EditorError::Transport(e.to_string()))?;
        parse_response(status.as_u16(), status.is_success(), &body)
    }
}

fn parse_response(status: u16, ok: bool, body: &str) -> Result<EditOutcome> {
    match serde_json::from_str::<EditEnvelope>(body) {
        Ok(envelope) => envelope.into_outcome(),
        Err(_) if !ok => Err(EditorError::Provider(format!(
            "edit service responded with status {status}"
        ))),
        Err(e) => Err(EditorError::Transport(format!("invalid response: {e}"))),
    }
}
