use crate::classify::ClassifiedCandidates;
use crate::config::{CategoryCaps, DelayRange};
use crate::download::ImageFetcher;
use crate::models::{
    CandidateImage, Category, CategoryCounts, DownloadOutcome, DownloadStatus, Listing,
};
use crate::normalize::{normalize_image, CANONICAL_EXTENSION};
use crate::{pacing, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

pub fn file_name_for(category: Category, position: usize, extension: &str) -> String {
    let stem = match category {
        Category::Pool => "pool",
        Category::Exterior | Category::Unclassified => "exterior",
    };
    if position <= 1 {
        format!("{stem}.{extension}")
    } else {
        format!("{stem}{position}.{extension}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub candidate: CandidateImage,
    pub category: Category,
    pub file_name: String,
}

pub fn plan_downloads(classified: &ClassifiedCandidates, caps: &CategoryCaps) -> Vec<PlannedFile> {
    let mut plan = Vec::new();

    for (i, candidate) in classified.pool.iter().take(caps.pool).enumerate() {
        plan.push(PlannedFile {
            candidate: candidate.clone(),
            category: Category::Pool,
            file_name: file_name_for(Category::Pool, i + 1, CANONICAL_EXTENSION),
        });
    }

    let exterior: Vec<&CandidateImage> = classified.exterior.iter().take(caps.exterior).collect();
    for (i, candidate) in exterior.iter().enumerate() {
        plan.push(PlannedFile {
            candidate: (*candidate).clone(),
            category: Category::Exterior,
            file_name: file_name_for(Category::Exterior, i + 1, CANONICAL_EXTENSION),
        });
    }

    let assigned = exterior.len();
    for (i, candidate) in classified.unclassified.iter().take(caps.overflow).enumerate() {
        plan.push(PlannedFile {
            candidate: candidate.clone(),
            category: Category::Exterior,
            file_name: file_name_for(Category::Exterior, assigned + i + 1, CANONICAL_EXTENSION),
        });
    }

    plan
}

/// Downloads every planned file that is not already on disk into `out_dir`.
pub fn organize_listing<F, FLog>(
    listing: &Listing,
    classified: &ClassifiedCandidates,
    caps: &CategoryCaps,
    out_dir: &Path,
    fetcher: &F,
    download_delay: DelayRange,
    mut log_line: FLog,
) -> Result<(CategoryCounts, Vec<DownloadOutcome>)>
where
    F: ImageFetcher + ?Sized,
    FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
{
    let plan = plan_downloads(classified, caps);
    let mut counts = CategoryCounts::default();
    let mut outcomes = Vec::with_capacity(plan.len());
    if plan.is_empty() {
        return Ok((counts, outcomes));
    }

    std::fs::create_dir_all(out_dir)?;

    for planned in plan {
        let target = out_dir.join(&planned.file_name);
        if target.exists() {
            log_line(
                "info",
                "image_skipped_existing",
                serde_json::json!({
                    "listing_id": listing.id,
                    "file": planned.file_name,
                }),
            )?;
            outcomes.push(DownloadOutcome {
                candidate: planned.candidate,
                category: planned.category,
                file_name: planned.file_name,
                status: DownloadStatus::SkippedExisting,
                path: Some(target),
                bytes: None,
                sha256: None,
                failure: None,
            });
            continue;
        }

        let outcome = match fetcher.fetch(&planned.candidate.url) {
            Ok(data) => {
                let normalized = normalize_image(&data);
                write_complete(&target, &normalized.bytes)?;
                counts.record(planned.category);

                let status = match &normalized.raw_fallback {
                    Some(reason) => {
                        log_line(
                            "warn",
                            "image_decode_fallback",
                            serde_json::json!({
                                "listing_id": listing.id,
                                "file": planned.file_name,
                                "error": reason,
                            }),
                        )?;
                        DownloadStatus::DownloadedRaw
                    }
                    None => DownloadStatus::Downloaded,
                };
                log_line(
                    "info",
                    "image_downloaded",
                    serde_json::json!({
                        "listing_id": listing.id,
                        "category": planned.category.as_str(),
                        "file": planned.file_name,
                        "bytes": normalized.bytes.len(),
                    }),
                )?;
                DownloadOutcome {
                    candidate: planned.candidate,
                    category: planned.category,
                    file_name: planned.file_name,
                    status,
                    path: Some(target),
                    bytes: Some(normalized.bytes.len() as u64),
                    sha256: Some(hex::encode(Sha256::digest(&normalized.bytes))),
                    failure: normalized.raw_fallback,
                }
            }
            Err(err) => {
                log_line(
                    "warn",
                    "image_download_failed",
                    serde_json::json!({
                        "listing_id": listing.id,
                        "file": planned.file_name,
                        "error": err.to_string(),
                    }),
                )?;
                DownloadOutcome {
                    candidate: planned.candidate,
                    category: planned.category,
                    file_name: planned.file_name,
                    status: DownloadStatus::Failed,
                    path: None,
                    bytes: None,
                    sha256: None,
                    failure: Some(err.to_string()),
                }
            }
        };
        outcomes.push(outcome);
        pacing::jitter(download_delay);
    }

    Ok((counts, outcomes))
}

// Stages through `<name>.part` so `target.exists()` never sees a torn file.
fn write_complete(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let part_name = format!(
        "{}.part",
        target
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("image")
    );
    let part_path = target.with_file_name(part_name);
    if let Err(err) = std::fs::write(&part_path, bytes) {
        let _ = std::fs::remove_file(&part_path);
        return Err(err);
    }
    std::fs::rename(&part_path, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HarvestError;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::cell::RefCell;
    use std::io::Cursor;

    struct FakeFetcher {
        calls: RefCell<Vec<String>>,
        body: Vec<u8>,
        fail_on: Option<String>,
    }

    impl FakeFetcher {
        fn png() -> Self {
            let mut body = Vec::new();
            DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([9, 9, 9])))
                .write_to(&mut Cursor::new(&mut body), ImageFormat::Png)
                .expect("fixture");
            Self {
                calls: RefCell::new(Vec::new()),
                body,
                fail_on: None,
            }
        }
    }

    impl ImageFetcher for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.borrow_mut().push(url.to_string());
            if self.fail_on.as_deref() == Some(url) {
                return Err(HarvestError::Download {
                    url: url.to_string(),
                    reason: "http status 404".to_string(),
                });
            }
            Ok(self.body.clone())
        }
    }

    fn candidate(index: usize, name: &str) -> CandidateImage {
        CandidateImage {
            url: format!("https://images.trvl-media.com/lodging/1/{name}.jpg"),
            alt: None,
            index,
        }
    }

    fn many(prefix: &str, n: usize) -> Vec<CandidateImage> {
        (0..n).map(|i| candidate(i, &format!("{prefix}{i}"))).collect()
    }

    fn no_log(_: &str, _: &str, _: serde_json::Value) -> Result<()> {
        Ok(())
    }

    #[test]
    fn file_names_leave_first_unsuffixed() {
        assert_eq!(file_name_for(Category::Exterior, 1, "png"), "exterior.png");
        assert_eq!(file_name_for(Category::Exterior, 2, "png"), "exterior2.png");
        assert_eq!(file_name_for(Category::Pool, 10, "png"), "pool10.png");
    }

    #[test]
    fn plan_caps_category_at_ten_and_drops_excess() {
        let classified = ClassifiedCandidates {
            pool: many("p", 14),
            ..ClassifiedCandidates::default()
        };
        let plan = plan_downloads(&classified, &CategoryCaps::default());
        let names: Vec<&str> = plan.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "pool.png");
        assert_eq!(names[9], "pool10.png");
        assert_eq!(plan[9].candidate.index, 9);
    }

    #[test]
    fn overflow_continues_exterior_numbering_up_to_five() {
        let classified = ClassifiedCandidates {
            pool: many("p", 1),
            exterior: many("e", 2),
            unclassified: many("u", 7),
        };
        let plan = plan_downloads(&classified, &CategoryCaps::default());
        let overflow: Vec<&PlannedFile> = plan
            .iter()
            .filter(|p| p.candidate.url.contains("/u"))
            .collect();
        assert_eq!(overflow.len(), 5);
        assert_eq!(overflow[0].file_name, "exterior3.png");
        assert_eq!(overflow[4].file_name, "exterior7.png");
        assert!(overflow.iter().all(|p| p.category == Category::Exterior));
    }

    #[test]
    fn organize_writes_files_and_counts_new_downloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out_dir = dir.path().join("option-1");
        let classified = ClassifiedCandidates {
            pool: many("p", 2),
            exterior: many("e", 1),
            unclassified: many("u", 1),
        };
        let fetcher = FakeFetcher::png();
        let listing = Listing::new("4146676", "Spacious Beach House", 1);

        let (counts, outcomes) = organize_listing(
            &listing,
            &classified,
            &CategoryCaps::default(),
            &out_dir,
            &fetcher,
            DelayRange::NONE,
            no_log,
        )
        .expect("organize");

        assert_eq!(counts, CategoryCounts { pool: 2, exterior: 2, other: 0 });
        for name in ["pool.png", "pool2.png", "exterior.png", "exterior2.png"] {
            assert!(out_dir.join(name).is_file(), "missing {name}");
        }
        assert!(outcomes.iter().all(|o| o.status == DownloadStatus::Downloaded));
        assert!(outcomes.iter().all(|o| o.sha256.as_ref().map(String::len) == Some(64)));
    }

    #[test]
    fn existing_files_are_skipped_without_fetching() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out_dir = dir.path().join("option-2");
        std::fs::create_dir_all(&out_dir).expect("mkdir");
        std::fs::write(out_dir.join("pool.png"), b"old").expect("seed");
        std::fs::write(out_dir.join("exterior.png"), b"old").expect("seed");

        let classified = ClassifiedCandidates {
            pool: many("p", 1),
            exterior: many("e", 1),
            ..ClassifiedCandidates::default()
        };
        let fetcher = FakeFetcher::png();
        let (counts, outcomes) = organize_listing(
            &Listing::new("2873463", "Large Luxurious Home", 2),
            &classified,
            &CategoryCaps::default(),
            &out_dir,
            &fetcher,
            DelayRange::NONE,
            no_log,
        )
        .expect("organize");

        assert!(fetcher.calls.borrow().is_empty());
        assert_eq!(counts, CategoryCounts::default());
        assert!(outcomes
            .iter()
            .all(|o| o.status == DownloadStatus::SkippedExisting));
        assert_eq!(std::fs::read(out_dir.join("pool.png")).expect("read"), b"old");
    }

    #[test]
    fn failed_fetch_is_recorded_and_listing_continues() {
        let dir = tempfile::tempdir().expect("tempdir");
        let classified = ClassifiedCandidates {
            pool: many("p", 2),
            ..ClassifiedCandidates::default()
        };
        let mut fetcher = FakeFetcher::png();
        fetcher.fail_on = Some(classified.pool[0].url.clone());

        let mut events = Vec::new();
        let (counts, outcomes) = organize_listing(
            &Listing::new("3737974", "Family Retreat", 3),
            &classified,
            &CategoryCaps::default(),
            dir.path(),
            &fetcher,
            DelayRange::NONE,
            |_, event, _| {
                events.push(event.to_string());
                Ok(())
            },
        )
        .expect("organize");

        assert_eq!(counts.pool, 1);
        assert_eq!(outcomes[0].status, DownloadStatus::Failed);
        assert!(!dir.path().join("pool.png").exists());
        assert!(dir.path().join("pool2.png").exists());
        assert!(events.contains(&"image_download_failed".to_string()));
    }

    #[test]
    fn undecodable_bytes_still_count_as_downloaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let classified = ClassifiedCandidates {
            exterior: many("e", 1),
            ..ClassifiedCandidates::default()
        };
        let fetcher = FakeFetcher {
            calls: RefCell::new(Vec::new()),
            body: b"not an image".to_vec(),
            fail_on: None,
        };
        let (counts, outcomes) = organize_listing(
            &Listing::new("3142857", "Charming Classic", 4),
            &classified,
            &CategoryCaps::default(),
            dir.path(),
            &fetcher,
            DelayRange::NONE,
            no_log,
        )
        .expect("organize");

        assert_eq!(counts.exterior, 1);
        assert_eq!(outcomes[0].status, DownloadStatus::DownloadedRaw);
        assert_eq!(
            std::fs::read(dir.path().join("exterior.png")).expect("read"),
            b"not an image"
        );
    }

    #[test]
    fn leftover_partial_file_does_not_block_download() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("pool.png.part"), b"torn").expect("seed");
        let classified = ClassifiedCandidates {
            pool: many("p", 1),
            ..ClassifiedCandidates::default()
        };
        let fetcher = FakeFetcher::png();
        let (counts, _) = organize_listing(
            &Listing::new("3252017", "Beachside Comfort", 5),
            &classified,
            &CategoryCaps::default(),
            dir.path(),
            &fetcher,
            DelayRange::NONE,
            no_log,
        )
        .expect("organize");

        assert_eq!(counts.pool, 1);
        assert_eq!(
            std::fs::read(dir.path().join("pool.png")).expect("read"),
            fetcher.body
        );
        assert!(!dir.path().join("pool.png.part").exists());
    }

    #[test]
    fn empty_body_is_written_verbatim_and_counted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let classified = ClassifiedCandidates {
            pool: many("p", 1),
            ..ClassifiedCandidates::default()
        };
        let fetcher = FakeFetcher {
            calls: RefCell::new(Vec::new()),
            body: Vec::new(),
            fail_on: None,
        };
        let (counts, outcomes) = organize_listing(
            &Listing::new("3284616", "Island Time", 6),
            &classified,
            &CategoryCaps::default(),
            dir.path(),
            &fetcher,
            DelayRange::NONE,
            no_log,
        )
        .expect("organize");

        assert_eq!(counts.pool, 1);
        assert_eq!(outcomes[0].status, DownloadStatus::DownloadedRaw);
        assert_eq!(outcomes[0].bytes, Some(0));
        assert!(dir.path().join("pool.png").is_file());
    }
}
