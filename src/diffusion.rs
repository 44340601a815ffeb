use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::models::GenerateRequest;

/// Appended server-side to every generation request.
pub const NEGATIVE_PROMPT: &str =
    "blurry, bad quality, distorted, disfigured, poor details, bad anatomy";

#[derive(Debug, Error)]
pub enum DiffusionError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Other: {0}")] Other(String),
}

/// Client for the self-hosted Stable Diffusion WebUI. One synchronous round
/// trip per request, no job polling.
pub struct DiffusionClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

impl DiffusionClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub async fn txt2img(&self, request: &GenerateRequest) -> Result<Bytes, DiffusionError> {
        let payload = json!({
            "prompt": request.prompt,
            "steps": request.steps,
            "cfg_scale": request.cfg_scale,
            "width": request.width,
            "height": request.height,
            "negative_prompt": NEGATIVE_PROMPT,
        });

        info!("📤 Submitting txt2img request ({}x{})", request.width, request.height);
        let response = self
            .client
            .post(format!("{}/sdapi/v1/txt2img", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| DiffusionError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| DiffusionError::Http(e.to_string()))?;

        let parsed: Txt2ImgResponse = response
            .json()
            .await
            .map_err(|e| DiffusionError::Other(format!("parse error: {}", e)))?;

        let first = parsed
            .images
            .into_iter()
            .next()
            .ok_or_else(|| DiffusionError::Other("no images in response".to_string()))?;

        let bytes = STANDARD
            .decode(first)
            .map_err(|e| DiffusionError::Other(format!("invalid base64 image: {}", e)))?;

        info!("✅ Generated image ({} bytes)", bytes.len());
        Ok(Bytes::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fills_defaults_and_decodes_first_image() {
        let server = MockServer::start().await;
        let image_bytes = b"generated png bytes".to_vec();

        Mock::given(method("POST"))
            .and(path("/sdapi/v1/txt2img"))
            .and(body_json(json!({
                "prompt": "a cat",
                "steps": 30,
                "cfg_scale": 7.5,
                "width": 512,
                "height": 512,
                "negative_prompt": NEGATIVE_PROMPT,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "images": [STANDARD.encode(&image_bytes)]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request: GenerateRequest = serde_json::from_str(r#"{"prompt":"a cat"}"#).unwrap();
        let client = DiffusionClient::new(server.uri());
        let bytes = client.txt2img(&request).await.unwrap();

        assert_eq!(bytes.as_ref(), image_bytes.as_slice());
    }

    #[tokio::test]
    async fn non_2xx_response_is_an_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sdapi/v1/txt2img"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let request: GenerateRequest = serde_json::from_str(r#"{"prompt":"a cat"}"#).unwrap();
        let client = DiffusionClient::new(server.uri());
        let err = client.txt2img(&request).await.unwrap_err();

        assert!(matches!(err, DiffusionError::Http(_)));
    }

    #[tokio::test]
    async fn empty_images_array_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sdapi/v1/txt2img"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "images": [] })))
            .mount(&server)
            .await;

        let request: GenerateRequest = serde_json::from_str(r#"{"prompt":"a cat"}"#).unwrap();
        let client = DiffusionClient::new(server.uri());
        let err = client.txt2img(&request).await.unwrap_err();

        assert!(matches!(err, DiffusionError::Other(_)));
    }
}
