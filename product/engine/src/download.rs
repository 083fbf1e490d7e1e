use crate::config::HarvestConfig;
use crate::{HarvestError, Result};
use std::io::Read;
use std::time::Duration;

const ACCEPT_IMAGES: &str = "image/webp,image/apng,image/*,*/*;q=0.8";
const MAX_IMAGE_BYTES: u64 = 64 * 1024 * 1024;

pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFetcher {
    agent: ureq::Agent,
    referer: String,
    accept_language: String,
}

impl HttpFetcher {
    pub fn new(config: &HarvestConfig) -> Self {
        Self::with_timeout(config, config.download_timeout())
    }

    pub fn with_timeout(config: &HarvestConfig, timeout: Duration) -> Self {
        let mut builder = ureq::Agent::config_builder();
        builder = builder
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .user_agent(config.user_agent.as_str());
        let agent: ureq::Agent = builder.build().into();
        Self {
            agent,
            referer: config.referer.clone(),
            accept_language: config.accept_language.clone(),
        }
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let failed = |reason: String| HarvestError::Download {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .agent
            .get(url)
            .header("Referer", self.referer.as_str())
            .header("Accept", ACCEPT_IMAGES)
            .header("Accept-Language", self.accept_language.as_str())
            .call()
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(failed(format!("http status {status}")));
        }

        read_body(response.body_mut().as_reader(), MAX_IMAGE_BYTES).map_err(failed)
    }
}

// Reads the whole body; an empty body is fine, one past `limit` is not.
fn read_body<R: Read>(reader: R, limit: u64) -> std::result::Result<Vec<u8>, String> {
    let mut data = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| format!("body read failed: {e}"))?;
    if data.len() as u64 > limit {
        return Err(format!("body exceeds {limit} bytes"));
    }
    Ok(data)
}
