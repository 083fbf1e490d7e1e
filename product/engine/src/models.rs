use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub name: String,
    pub option: u32,
}

impl Listing {
    pub fn new(id: impl Into<String>, name: impl Into<String>, option: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            option,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateImage {
    pub url: String,
    pub alt: Option<String>,
    pub index: usize,
}

impl CandidateImage {
    pub fn alt_text(&self) -> &str {
        self.alt.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pool,
    Exterior,
    Unclassified,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Pool => "pool",
            Category::Exterior => "exterior",
            Category::Unclassified => "unclassified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Downloaded,
    DownloadedRaw,
    SkippedExisting,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::DownloadedRaw => "downloaded_raw",
            DownloadStatus::SkippedExisting => "skipped_existing",
            DownloadStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub candidate: CandidateImage,
    pub category: Category,
    pub file_name: String,
    pub status: DownloadStatus,
    pub path: Option<PathBuf>,
    pub bytes: Option<u64>,
    pub sha256: Option<String>,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub pool: usize,
    pub exterior: usize,
    pub other: usize,
}

impl CategoryCounts {
    pub fn record(&mut self, category: Category) {
        match category {
            Category::Pool => self.pool += 1,
            Category::Exterior => self.exterior += 1,
            Category::Unclassified => self.other += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingResult {
    pub listing: Listing,
    pub total_candidates: usize,
    pub downloaded: CategoryCounts,
    pub outcomes: Vec<DownloadOutcome>,
    pub error: Option<String>,
}

impl ListingResult {
    pub fn failed(listing: Listing, error: String) -> Self {
        Self {
            listing,
            total_candidates: 0,
            downloaded: CategoryCounts::default(),
            outcomes: Vec::new(),
            error: Some(error),
        }
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == DownloadStatus::SkippedExisting)
            .count()
    }
}
