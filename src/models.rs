use serde::{Serialize, Deserialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EditRequest {
    /// Data-URI-prefixed base64 source image, e.g. "data:image/png;base64,...".
    pub image: String,
    /// Data-URI-prefixed base64 mask. The canvas paints the edit region dark;
    /// the server inverts it before submission.
    pub mask: String,
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_steps() -> u32 { 30 }
fn default_cfg_scale() -> f64 { 7.5 }
fn default_width() -> u32 { 512 }
fn default_height() -> u32 { 512 }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub error: String,
}
