use crate::models::{CategoryCounts, ListingResult};
use crate::Result;
use serde::{Serialize, Serializer};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Completed {
        option: u32,
        name: String,
        total_images: usize,
        downloaded: CategoryCounts,
    },
    Failed {
        option: u32,
        name: String,
        error: String,
    },
}

impl ReportEntry {
    pub fn from_result(result: &ListingResult) -> Self {
        match &result.error {
            Some(error) => ReportEntry::Failed {
                option: result.listing.option,
                name: result.listing.name.clone(),
                error: error.clone(),
            },
            None => ReportEntry::Completed {
                option: result.listing.option,
                name: result.listing.name.clone(),
                total_images: result.total_candidates,
                downloaded: result.downloaded,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub listings: usize,
    pub failed_listings: usize,
    pub pool: usize,
    pub exterior: usize,
    pub skipped_existing: usize,
}

/// Listing id to outcome, serialized as a JSON object in input order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    entries: Vec<(String, ReportEntry)>,
    summary: RunSummary,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: &ListingResult) {
        let entry = ReportEntry::from_result(result);
        self.summary.listings += 1;
        if result.error.is_some() {
            self.summary.failed_listings += 1;
        }
        self.summary.pool += result.downloaded.pool;
        self.summary.exterior += result.downloaded.exterior;
        self.summary.skipped_existing += result.skipped();

        match self.entries.iter_mut().find(|(id, _)| id == &result.listing.id) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((result.listing.id.clone(), entry)),
        }
    }

    pub fn get(&self, listing_id: &str) -> Option<&ReportEntry> {
        self.entries
            .iter()
            .find(|(id, _)| id == listing_id)
            .map(|(_, entry)| entry)
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }
}

impl Serialize for RunReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(id, entry)| (id, entry)))
    }
}

pub fn write_run_report(path: &Path, report: &RunReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ManifestRow<'a> {
    listing_id: &'a str,
    option: u32,
    category: &'a str,
    file_name: &'a str,
    source_url: &'a str,
    status: &'a str,
    bytes: Option<u64>,
    sha256: Option<&'a str>,
    failure: Option<&'a str>,
}

pub struct ManifestWriter {
    writer: csv::Writer<std::fs::File>,
}

impl ManifestWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }

    pub fn append(&mut self, result: &ListingResult) -> Result<()> {
        for outcome in &result.outcomes {
            self.writer.serialize(ManifestRow {
                listing_id: &result.listing.id,
                option: result.listing.option,
                category: outcome.category.as_str(),
                file_name: &outcome.file_name,
                source_url: &outcome.candidate.url,
                status: outcome.status.as_str(),
                bytes: outcome.bytes,
                sha256: outcome.sha256.as_deref(),
                failure: outcome.failure.as_deref(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
