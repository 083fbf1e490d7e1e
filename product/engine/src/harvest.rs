use crate::classify::ClassifiedCandidates;
use crate::config::HarvestConfig;
use crate::download::ImageFetcher;
use crate::extract::{extract_candidates, harvest_candidates, AssetFilter, CandidateSet};
use crate::models::{CandidateImage, Listing, ListingResult};
use crate::organize::organize_listing;
use crate::paths::AppPaths;
use crate::report::RunReport;
use crate::runlog::redact_url_for_log;
use crate::session::{PageDriver, Session};
use crate::{pacing, HarvestError, Result};
use std::path::Path;

/// Processes every listing in order through one browsing session.
pub fn run_harvest<D, F, FResult, FLog>(
    listings: &[Listing],
    config: &HarvestConfig,
    images_root: &Path,
    session: &mut Session<D>,
    fetcher: &F,
    mut on_result: FResult,
    mut log_line: FLog,
) -> Result<RunReport>
where
    D: PageDriver,
    F: ImageFetcher + ?Sized,
    FResult: FnMut(&ListingResult) -> Result<()>,
    FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
{
    std::fs::create_dir_all(images_root)?;
    let filter = AssetFilter::from_config(config);
    let mut report = RunReport::new();

    log_line(
        "info",
        "run_started",
        serde_json::json!({
            "listings": listings.len(),
            "images_root": images_root.to_string_lossy(),
        }),
    )?;

    for (i, listing) in listings.iter().enumerate() {
        log_line(
            "info",
            "listing_started",
            serde_json::json!({
                "index": i + 1,
                "of": listings.len(),
                "listing_id": listing.id,
                "name": listing.name,
                "option": listing.option,
            }),
        )?;

        let outcome = process_listing(
            listing,
            config,
            images_root,
            session,
            fetcher,
            &filter,
            &mut log_line,
        );
        let result = match outcome {
            Ok(result) => result,
            Err(err) if err.is_listing_fatal() => {
                log_line(
                    "warn",
                    "listing_failed",
                    serde_json::json!({
                        "listing_id": listing.id,
                        "error": err.to_string(),
                    }),
                )?;
                ListingResult::failed(listing.clone(), err.to_string())
            }
            Err(err) => return Err(err),
        };

        if result.error.is_none() {
            log_line(
                "info",
                "listing_finished",
                serde_json::json!({
                    "listing_id": listing.id,
                    "total_images": result.total_candidates,
                    "downloaded": result.downloaded,
                    "skipped_existing": result.skipped(),
                }),
            )?;
        }
        on_result(&result)?;
        report.record(&result);

        if i + 1 < listings.len() {
            pacing::jitter(config.pacing.between_listings);
        }
    }

    let summary = report.summary();
    log_line(
        "info",
        "run_finished",
        serde_json::json!({
            "listings": summary.listings,
            "failed_listings": summary.failed_listings,
            "pool": summary.pool,
            "exterior": summary.exterior,
        }),
    )?;
    Ok(report)
}

fn process_listing<D, F, FLog>(
    listing: &Listing,
    config: &HarvestConfig,
    images_root: &Path,
    session: &mut Session<D>,
    fetcher: &F,
    filter: &AssetFilter,
    log_line: &mut FLog,
) -> Result<ListingResult>
where
    D: PageDriver,
    F: ImageFetcher + ?Sized,
    FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
{
    let url = config.listing_url(listing);
    let candidates = match session.render(&url) {
        Ok(page) => {
            let (found, gallery) =
                harvest_candidates(session, &page, filter, &config.gallery_selectors);
            if let Some(error) = gallery.error {
                log_line(
                    "debug",
                    "gallery_pass_failed",
                    serde_json::json!({ "listing_id": listing.id, "error": error }),
                )?;
            }
            found
        }
        Err(err @ HarvestError::Navigation { .. }) => {
            log_line(
                "warn",
                "navigation_failed",
                serde_json::json!({
                    "listing_id": listing.id,
                    "url": redact_url_for_log(&url),
                    "error": err.to_string(),
                }),
            )?;
            return Err(err);
        }
        Err(err) => {
            log_line(
                "warn",
                "extraction_failed",
                serde_json::json!({ "listing_id": listing.id, "error": err.to_string() }),
            )?;
            CandidateSet::new()
        }
    };

    let candidates = if candidates.is_empty() {
        rescan_after_scroll(listing, session, filter, log_line)?
    } else {
        candidates.into_vec()
    };
    log_line(
        "info",
        "candidates_found",
        serde_json::json!({ "listing_id": listing.id, "count": candidates.len() }),
    )?;

    let total_candidates = candidates.len();
    let mut classified = ClassifiedCandidates::partition(candidates);
    let fallback = classified.apply_positional_fallback();
    if fallback {
        log_line(
            "info",
            "positional_fallback_applied",
            serde_json::json!({
                "listing_id": listing.id,
                "exterior": classified.exterior.len(),
                "pool": classified.pool.len(),
            }),
        )?;
    }
    log_line(
        "info",
        "classified",
        serde_json::json!({
            "listing_id": listing.id,
            "pool": classified.pool.len(),
            "exterior": classified.exterior.len(),
            "unclassified": classified.unclassified.len(),
        }),
    )?;

    let out_dir = AppPaths::listing_dir(images_root, listing.option);
    let (downloaded, outcomes) = organize_listing(
        listing,
        &classified,
        &config.caps,
        &out_dir,
        fetcher,
        config.pacing.download,
        &mut *log_line,
    )?;

    Ok(ListingResult {
        listing: listing.clone(),
        total_candidates,
        downloaded,
        outcomes,
        error: None,
    })
}

fn rescan_after_scroll<D, FLog>(
    listing: &Listing,
    session: &mut Session<D>,
    filter: &AssetFilter,
    log_line: &mut FLog,
) -> Result<Vec<CandidateImage>>
where
    D: PageDriver,
    FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
{
    log_line(
        "info",
        "scroll_fallback",
        serde_json::json!({ "listing_id": listing.id }),
    )?;
    match session.scroll_and_snapshot() {
        Ok(page) => Ok(extract_candidates(&page, filter).into_vec()),
        Err(err) => {
            log_line(
                "warn",
                "extraction_failed",
                serde_json::json!({ "listing_id": listing.id, "error": err.to_string() }),
            )?;
            Ok(Vec::new())
        }
    }
}
