use crate::models::Listing;
use crate::paths::AppPaths;
use crate::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const NONE: DelayRange = DelayRange {
        min_ms: 0,
        max_ms: 0,
    };

    pub const fn millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn normalized(self) -> Self {
        if self.min_ms <= self.max_ms {
            self
        } else {
            Self {
                min_ms: self.max_ms,
                max_ms: self.min_ms,
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        self.min_ms == 0 && self.max_ms == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub before_navigation: DelayRange,
    pub after_navigation: DelayRange,
    pub settle: DelayRange,
    pub scroll: DelayRange,
    pub gallery_open: DelayRange,
    pub gallery_close: DelayRange,
    pub download: DelayRange,
    pub between_listings: DelayRange,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            before_navigation: DelayRange::millis(1_000, 2_000),
            after_navigation: DelayRange::millis(2_000, 4_000),
            settle: DelayRange::millis(3_000, 5_000),
            scroll: DelayRange::millis(500, 1_500),
            gallery_open: DelayRange::millis(1_000, 2_000),
            gallery_close: DelayRange::millis(500, 1_000),
            download: DelayRange::millis(500, 1_500),
            between_listings: DelayRange::millis(3_000, 6_000),
        }
    }
}

impl PacingConfig {
    pub fn immediate() -> Self {
        Self {
            before_navigation: DelayRange::NONE,
            after_navigation: DelayRange::NONE,
            settle: DelayRange::NONE,
            scroll: DelayRange::NONE,
            gallery_open: DelayRange::NONE,
            gallery_close: DelayRange::NONE,
            download: DelayRange::NONE,
            between_listings: DelayRange::NONE,
        }
    }

    fn normalized(self) -> Self {
        Self {
            before_navigation: self.before_navigation.normalized(),
            after_navigation: self.after_navigation.normalized(),
            settle: self.settle.normalized(),
            scroll: self.scroll.normalized(),
            gallery_open: self.gallery_open.normalized(),
            gallery_close: self.gallery_close.normalized(),
            download: self.download.normalized(),
            between_listings: self.between_listings.normalized(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryCaps {
    pub pool: usize,
    pub exterior: usize,
    pub overflow: usize,
}

impl Default for CategoryCaps {
    fn default() -> Self {
        Self {
            pool: 10,
            exterior: 10,
            overflow: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Listing page URL; `{id}` is replaced by the listing id.
    pub listing_url_template: String,
    pub referer: String,
    pub asset_hosts: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub gallery_selectors: Vec<String>,
    pub headless: bool,
    pub user_agent: String,
    pub accept_language: String,
    pub locale: String,
    pub platform: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub navigation_timeout_secs: u64,
    pub ready_state_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub scroll_steps: usize,
    pub caps: CategoryCaps,
    pub pacing: PacingConfig,
    pub images_root: Option<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            listing_url_template: "https://www.vrbo.com/{id}".to_string(),
            referer: "https://www.vrbo.com/".to_string(),
            asset_hosts: vec![
                "trvl-media.com".to_string(),
                "vrbo.com".to_string(),
                "expedia.com".to_string(),
            ],
            exclude_keywords: ["logo", "icon", "avatar", "sprite", "favicon"]
                .iter()
                .map(|v| v.to_string())
                .collect(),
            gallery_selectors: [
                r#"[data-testid="property-image"]"#,
                ".property-image",
                ".gallery-image",
                r#"img[class*="main"]"#,
            ]
            .iter()
            .map(|v| v.to_string())
            .collect(),
            headless: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            locale: "en-US".to_string(),
            platform: "Win32".to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            navigation_timeout_secs: 30,
            ready_state_timeout_secs: 20,
            download_timeout_secs: 30,
            scroll_steps: 3,
            caps: CategoryCaps::default(),
            pacing: PacingConfig::default(),
            images_root: None,
        }
    }
}

impl HarvestConfig {
    pub fn listing_url(&self, listing: &Listing) -> String {
        self.listing_url_template.replace("{id}", listing.id.trim())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs.max(1))
    }

    pub fn ready_state_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_state_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs.max(1))
    }

    fn normalized(mut self) -> Self {
        self.asset_hosts = normalize_keywords(self.asset_hosts);
        self.exclude_keywords = normalize_keywords(self.exclude_keywords);
        self.pacing = self.pacing.normalized();
        self
    }
}

fn normalize_keywords(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in values {
        let trimmed = raw.trim().trim_start_matches('.').to_ascii_lowercase();
        if trimmed.is_empty() {
            continue;
        }
        if !out.iter().any(|existing| existing == &trimmed) {
            out.push(trimmed);
        }
    }
    out
}

pub fn load_harvest_config(paths: &AppPaths) -> Result<HarvestConfig> {
    let path = paths.harvest_config_path();
    if !path.exists() {
        return Ok(HarvestConfig::default());
    }
    let bytes = std::fs::read(&path)?;
    let parsed: HarvestConfig = serde_json::from_slice(&bytes).map_err(|e| {
        HarvestError::InvalidConfig(format!(
            "failed to parse harvest config at {}: {e}",
            path.to_string_lossy()
        ))
    })?;
    Ok(parsed.normalized())
}

pub fn save_harvest_config(paths: &AppPaths, config: &HarvestConfig) -> Result<()> {
    let path = paths.harvest_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(())
}

pub fn default_listings() -> Vec<Listing> {
    vec![
        Listing::new("4146676", "Spacious Beach House", 1),
        Listing::new("2873463", "Large Luxurious Home", 2),
        Listing::new("3737974", "Family Retreat", 3),
        Listing::new("3142857", "Charming Classic", 4),
        Listing::new("3252017", "Beachside Comfort", 5),
        Listing::new("3284616", "Island Time", 6),
        Listing::new("4379912", "Sandpiper House", 7),
        Listing::new("2757575", "Cozy Home 2 Pools", 8),
    ]
}

pub fn load_listings(paths: &AppPaths) -> Result<Vec<Listing>> {
    let path = paths.listings_path();
    if !path.exists() {
        return Ok(default_listings());
    }
    let bytes = std::fs::read(&path)?;
    let parsed: Vec<Listing> = serde_json::from_slice(&bytes).map_err(|e| {
        HarvestError::InvalidConfig(format!(
            "failed to parse listings at {}: {e}",
            path.to_string_lossy()
        ))
    })?;
    validate_listings(&parsed)?;
    Ok(parsed)
}

pub fn validate_listings(listings: &[Listing]) -> Result<()> {
    let mut ids = HashSet::new();
    let mut options = HashSet::new();
    for listing in listings {
        if listing.id.trim().is_empty() {
            return Err(HarvestError::InvalidConfig(format!(
                "listing \"{}\" has an empty id",
                listing.name
            )));
        }
        if listing.option == 0 {
            return Err(HarvestError::InvalidConfig(format!(
                "listing {} has option 0; options start at 1",
                listing.id
            )));
        }
        if !ids.insert(listing.id.trim()) {
            return Err(HarvestError::InvalidConfig(format!(
                "duplicate listing id {}",
                listing.id
            )));
        }
        if !options.insert(listing.option) {
            return Err(HarvestError::InvalidConfig(format!(
                "duplicate option {} (listing {})",
                listing.option, listing.id
            )));
        }
    }
    Ok(())
}
