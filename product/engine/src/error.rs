use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("page extraction failed: {0}")]
    Extraction(String),

    #[error("download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("image decode failed: {0}")]
    Decode(String),

    #[error("browser session unavailable: {0}")]
    Browser(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl HarvestError {
    pub fn is_listing_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::Navigation { .. } | HarvestError::Extraction(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
