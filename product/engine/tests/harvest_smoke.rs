use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use stayshots_engine::config::{HarvestConfig, PacingConfig};
use stayshots_engine::download::ImageFetcher;
use stayshots_engine::harvest::run_harvest;
use stayshots_engine::models::{CategoryCounts, Listing};
use stayshots_engine::paths::AppPaths;
use stayshots_engine::report::{write_run_report, ManifestWriter, RunReport};
use stayshots_engine::session::{PageDriver, PageState, Session};
use stayshots_engine::{HarvestError, Result};

type SmokeResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const GALLERY_SELECTOR: &str = r#"[data-testid="property-image"]"#;

/// Stands in for a browser tab: one static page per URL, plus an optional
/// gallery overlay that appears after clicking the gallery selector.
#[derive(Default)]
struct StaticSite {
    pages: HashMap<String, String>,
    galleries: HashMap<String, String>,
    current: String,
    gallery_open: bool,
}

impl PageDriver for StaticSite {
    fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<()> {
        if !self.pages.contains_key(url) {
            return Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: "timed out".to_string(),
            });
        }
        self.current = url.to_string();
        self.gallery_open = false;
        Ok(())
    }

    fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::json!("complete"))
    }

    fn snapshot(&mut self) -> Result<PageState> {
        let mut html = self.pages.get(&self.current).cloned().unwrap_or_default();
        if self.gallery_open {
            if let Some(extra) = self.galleries.get(&self.current) {
                html.push_str(extra);
            }
        }
        Ok(PageState {
            url: self.current.clone(),
            html,
        })
    }

    fn click(&mut self, selector: &str) -> Result<bool> {
        let hit = selector == GALLERY_SELECTOR && self.galleries.contains_key(&self.current);
        self.gallery_open = hit;
        Ok(hit)
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        if key == "Escape" {
            self.gallery_open = false;
        }
        Ok(())
    }
}

struct PngFetcher {
    body: Vec<u8>,
    calls: RefCell<Vec<String>>,
}

impl PngFetcher {
    fn new() -> SmokeResult<Self> {
        let rgba = RgbaImage::from_pixel(4, 3, Rgba([20, 140, 220, 200]));
        let mut body = Vec::new();
        DynamicImage::ImageRgba8(rgba).write_to(&mut Cursor::new(&mut body), ImageFormat::Png)?;
        Ok(Self {
            body,
            calls: RefCell::new(Vec::new()),
        })
    }
}

impl ImageFetcher for PngFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.borrow_mut().push(url.to_string());
        Ok(self.body.clone())
    }
}

fn img(path: &str, alt: &str) -> String {
    format!(r#"<img src="https://images.trvl-media.com/lodging/{path}.jpg?impolicy=resize&rw=1200" alt="{alt}">"#)
}

fn site() -> StaticSite {
    let mut site = StaticSite::default();
    let beach_house = [
        img("4146676/a1", "Private pool with loungers"),
        img("4146676/a2", "Front of the house"),
        img("4146676/a3", "Ocean view from deck"),
        r#"<img src="https://www.vrbo.com/static/logo.png">"#.to_string(),
        r#"<div class="hero" style="background-image: url('https://images.trvl-media.com/lodging/4146676/a4.webp')"></div>"#.to_string(),
        // Same asset as a1 under a different query string.
        r#"<img data-src="https://images.trvl-media.com/lodging/4146676/a1.jpg?rw=300">"#.to_string(),
    ]
    .concat();
    site.pages
        .insert("https://www.vrbo.com/4146676".to_string(), beach_house);
    site.galleries.insert(
        "https://www.vrbo.com/4146676".to_string(),
        img("4146676/spa", "Hot tub"),
    );

    let family_retreat = [
        img("3737974/b1", "Living room"),
        img("3737974/b2", "Kitchen"),
        img("3737974/b3", "Bedroom"),
        img("3737974/b4", "Bathroom"),
    ]
    .concat();
    site.pages
        .insert("https://www.vrbo.com/3737974".to_string(), family_retreat);
    site
}

fn config() -> HarvestConfig {
    HarvestConfig {
        pacing: PacingConfig::immediate(),
        scroll_steps: 1,
        ..HarvestConfig::default()
    }
}

fn listings() -> Vec<Listing> {
    vec![
        Listing::new("4146676", "Spacious Beach House", 1),
        Listing::new("9999999", "Delisted", 2),
        Listing::new("3737974", "Family Retreat", 3),
    ]
}

fn harvest(
    paths: &AppPaths,
    config: &HarvestConfig,
    fetcher: &PngFetcher,
    manifest: &mut ManifestWriter,
) -> SmokeResult<RunReport> {
    let images_root = paths.images_dir(None);
    let mut session = Session::new(site(), config);
    let report = run_harvest(
        &listings(),
        config,
        &images_root,
        &mut session,
        fetcher,
        |result| manifest.append(result),
        |_, _, _| Ok(()),
    )?;
    write_run_report(&paths.run_report_path(), &report)?;
    Ok(report)
}

#[test]
fn harvest_writes_layout_report_and_is_idempotent() -> SmokeResult<()> {
    let dir = tempfile::tempdir()?;
    let paths = AppPaths::new(dir.path().to_path_buf());
    paths.ensure_dirs()?;
    let config = config();

    let fetcher = PngFetcher::new()?;
    let mut manifest = ManifestWriter::create(&paths.manifest_path())?;
    harvest(&paths, &config, &fetcher, &mut manifest)?;

    let images = paths.images_dir(None);
    let option1 = images.join("option-1");
    for name in ["pool.png", "pool2.png", "exterior.png", "exterior2.png"] {
        assert!(option1.join(name).is_file(), "missing {name}");
    }
    // No keyword hits at all: half exterior, half pool, by position.
    let option3 = images.join("option-3");
    for name in ["exterior.png", "exterior2.png", "pool.png", "pool2.png"] {
        assert!(option3.join(name).is_file(), "missing {name}");
    }
    assert!(!images.join("option-2").exists());

    let written = image::open(option1.join("pool.png"))?;
    assert_eq!(written.color(), image::ColorType::Rgb8);

    let text = std::fs::read_to_string(paths.run_report_path())?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let ids: Vec<&String> = value.as_object().map(|o| o.keys().collect()).unwrap_or_default();
    assert_eq!(ids.len(), 3);
    // a1, a2, a3, a4 and the gallery's spa shot; the logo and the resized
    // duplicate are dropped.
    assert_eq!(value["4146676"]["total_images"], 5);
    assert_eq!(
        value["4146676"]["downloaded"],
        serde_json::json!({"pool": 2, "exterior": 3, "other": 0})
    );
    assert!(value["9999999"]["error"].as_str().is_some());
    assert_eq!(value["9999999"]["option"], 2);
    assert_eq!(
        value["3737974"]["downloaded"],
        serde_json::json!({"pool": 2, "exterior": 2, "other": 0})
    );
    assert_eq!(fetcher.calls.borrow().len(), 9);
    assert!(fetcher
        .calls
        .borrow()
        .iter()
        .all(|url| url.starts_with("https://images.trvl-media.com/")));

    // Second run over the same tree: nothing is fetched or counted.
    let rerun_fetcher = PngFetcher::new()?;
    let report = harvest(&paths, &config, &rerun_fetcher, &mut manifest)?;
    assert!(rerun_fetcher.calls.borrow().is_empty());
    let zero = CategoryCounts::default();
    for id in ["4146676", "3737974"] {
        match report.get(id) {
            Some(stayshots_engine::report::ReportEntry::Completed { downloaded, .. }) => {
                assert_eq!(*downloaded, zero, "listing {id}");
            }
            other => return Err(format!("unexpected entry for {id}: {other:?}").into()),
        }
    }
    assert_eq!(report.summary().skipped_existing, 9);
    drop(manifest);

    let manifest_text = std::fs::read_to_string(paths.manifest_path())?;
    assert_eq!(manifest_text.lines().count(), 1 + 9 + 9);
    assert!(manifest_text.contains(",skipped_existing,"));
    Ok(())
}
