use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::config::Config;

/// Stable Diffusion inpainting model pinned on Replicate. The upstream
/// contract keys on this exact version string.
pub const MODEL_VERSION: &str =
    "c11bac58203367db93a3c552bd49a25a5418458ddcadf2c1fad4707d812149bf";

#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Image editing failed: {0}")] Upstream(String),
    #[error("Timeout waiting for image processing")] Timeout,
    #[error("Other: {0}")] Other(String),
}

/// Wall-clock wait between status checks, injectable so tests poll without
/// actually sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct ReplicateClient {
    client: Client,
    api_token: String,
    base_url: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
    sleeper: Arc<dyn Sleeper>,
}

impl ReplicateClient {
    pub fn new(config: &Config) -> Self {
        Self::with_sleeper(config, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(config: &Config, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client: Client::new(),
            api_token: config.replicate_api_token.clone(),
            base_url: config.replicate_base_url.clone(),
            poll_interval: config.poll_interval,
            max_poll_attempts: config.max_poll_attempts,
            sleeper,
        }
    }

    /// Run one inpainting job to a terminal outcome: submit the prediction,
    /// poll its status URL until `succeeded`/`failed` or the attempt ceiling,
    /// then fetch the first output image.
    pub async fn inpaint(
        &self,
        image_path: &Path,
        mask_path: &Path,
        prompt: &str,
    ) -> Result<Bytes, ReplicateError> {
        let image_b64 = encode_artifact(image_path)?;
        let mask_b64 = encode_artifact(mask_path)?;

        let payload = json!({
            "version": MODEL_VERSION,
            "input": {
                "image": image_b64,
                "mask": mask_b64,
                "prompt": prompt,
                "num_outputs": 1,
                "guidance_scale": 7.5,
                "num_inference_steps": 30
            }
        });

        info!("📤 Submitting prediction to Replicate");
        let mut prediction = self.create_prediction(&payload).await?;
        info!("Initial prediction status: {:?}", prediction.status);

        let mut attempt = 0;
        while prediction.status != PredictionStatus::Succeeded && attempt < self.max_poll_attempts {
            self.sleeper.sleep(self.poll_interval).await;
            prediction = self.get_prediction(&prediction.urls.get).await?;
            info!("Polling attempt {}: {:?}", attempt, prediction.status);

            if prediction.status == PredictionStatus::Failed {
                let message = prediction.error.unwrap_or_else(|| "Unknown error".to_string());
                error!("❌ Prediction failed: {}", message);
                return Err(ReplicateError::Upstream(message));
            }

            attempt += 1;
        }

        if prediction.status != PredictionStatus::Succeeded {
            return Err(ReplicateError::Timeout);
        }

        let output_url = prediction
            .output
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ReplicateError::Other("prediction has no output images".to_string()))?;

        info!("✅ Prediction succeeded, fetching output");
        self.fetch_output(&output_url).await
    }

    async fn create_prediction(&self, payload: &serde_json::Value) -> Result<Prediction, ReplicateError> {
        let response = self
            .client
            .post(format!("{}/v1/predictions", self.base_url))
            .header(header::AUTHORIZATION, format!("Token {}", self.api_token))
            .json(payload)
            .send()
            .await
            .map_err(|e| ReplicateError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| ReplicateError::Http(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| ReplicateError::Other(format!("parse error: {}", e)))
    }

    async fn get_prediction(&self, url: &str) -> Result<Prediction, ReplicateError> {
        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("Token {}", self.api_token))
            .send()
            .await
            .map_err(|e| ReplicateError::Http(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| ReplicateError::Other(format!("parse error: {}", e)))
    }

    async fn fetch_output(&self, url: &str) -> Result<Bytes, ReplicateError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ReplicateError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| ReplicateError::Http(e.to_string()))?;

        response
            .bytes()
            .await
            .map_err(|e| ReplicateError::Http(e.to_string()))
    }
}

fn encode_artifact(path: &Path) -> Result<String, ReplicateError> {
    let bytes = std::fs::read(path)
        .map_err(|e| ReplicateError::Other(format!("could not read {}: {}", path.display(), e)))?;
    Ok(STANDARD.encode(bytes))
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
pub struct Prediction {
    pub status: PredictionStatus,
    #[serde(default)]
    pub urls: PredictionUrls,
    #[serde(default)]
    pub output: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PredictionUrls {
    #[serde(default)]
    pub get: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
}
