use std::path::PathBuf;

use stayshots_engine::config::{self, HarvestConfig};
use stayshots_engine::download::HttpFetcher;
use stayshots_engine::harvest::run_harvest;
use stayshots_engine::paths::AppPaths;
use stayshots_engine::report::{write_run_report, ManifestWriter};
use stayshots_engine::runlog::RunLog;
use stayshots_engine::session::{ChromeDriver, Session};

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let mut base_dir: Option<PathBuf> = None;
    let mut headless = false;
    let mut only: Vec<String> = Vec::new();
    let mut init_config = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--base-dir" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--base-dir requires a value".to_string())?;
                base_dir = Some(PathBuf::from(v));
            }
            "--headless" => headless = true,
            "--only" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--only requires a listing id".to_string())?;
                only.push(v.trim().to_string());
            }
            "--init-config" => init_config = true,
            other => return Err(format!("unknown arg: {other} (try --help)")),
        }
        i += 1;
    }

    let base_dir = match base_dir.or_else(default_base_dir) {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| e.to_string())?,
    };
    let paths = AppPaths::new(base_dir);
    paths.ensure_dirs().map_err(|e| e.to_string())?;

    if init_config {
        init_config_files(&paths)?;
        return Ok(());
    }

    let mut harvest_config = config::load_harvest_config(&paths).map_err(|e| e.to_string())?;
    if headless {
        harvest_config.headless = true;
    }
    let mut listings = config::load_listings(&paths).map_err(|e| e.to_string())?;
    if !only.is_empty() {
        listings.retain(|l| only.iter().any(|id| id == &l.id));
        if listings.is_empty() {
            return Err("no configured listing matches --only".to_string());
        }
    }
    let images_root = paths.images_dir(harvest_config.images_root.as_deref());

    let run_log = RunLog::create(&paths).map_err(|e| e.to_string())?;
    println!("Base dir: {}", paths.base_dir.to_string_lossy());
    println!("Images:   {}", images_root.to_string_lossy());
    println!("Run log:  {}", run_log.path().to_string_lossy());

    let driver = ChromeDriver::launch(&harvest_config).map_err(|e| e.to_string())?;
    let mut session = Session::new(driver, &harvest_config);
    let fetcher = HttpFetcher::new(&harvest_config);
    let mut manifest = ManifestWriter::create(&paths.manifest_path()).map_err(|e| e.to_string())?;

    let report = run_harvest(
        &listings,
        &harvest_config,
        &images_root,
        &mut session,
        &fetcher,
        |result| {
            match &result.error {
                Some(err) => println!("Option {}: failed ({err})", result.listing.option),
                None => println!(
                    "Option {}: {} candidates, {} pool / {} exterior downloaded, {} already present",
                    result.listing.option,
                    result.total_candidates,
                    result.downloaded.pool,
                    result.downloaded.exterior,
                    result.skipped()
                ),
            }
            manifest.append(result)
        },
        |level, event, data| run_log.log_line(level, event, data),
    )
    .map_err(|e| e.to_string())?;

    let report_path = paths.run_report_path();
    write_run_report(&report_path, &report).map_err(|e| e.to_string())?;

    let summary = report.summary();
    println!();
    println!(
        "Done: {} listings ({} failed), {} pool + {} exterior images",
        summary.listings, summary.failed_listings, summary.pool, summary.exterior
    );
    println!("Report:   {}", report_path.to_string_lossy());
    println!("Manifest: {}", paths.manifest_path().to_string_lossy());
    Ok(())
}

fn init_config_files(paths: &AppPaths) -> Result<(), String> {
    let config_path = paths.harvest_config_path();
    if config_path.exists() {
        println!("Config: already present ({})", config_path.to_string_lossy());
    } else {
        config::save_harvest_config(paths, &HarvestConfig::default()).map_err(|e| e.to_string())?;
        println!("Config: wrote {}", config_path.to_string_lossy());
    }

    let listings_path = paths.listings_path();
    if listings_path.exists() {
        println!("Listings: already present ({})", listings_path.to_string_lossy());
    } else {
        let json = serde_json::to_string_pretty(&config::default_listings())
            .map_err(|e| e.to_string())?;
        std::fs::write(&listings_path, format!("{json}\n")).map_err(|e| e.to_string())?;
        println!("Listings: wrote {}", listings_path.to_string_lossy());
    }
    Ok(())
}

fn default_base_dir() -> Option<PathBuf> {
    if let Ok(v) = std::env::var("STAYSHOTS_BASE_DIR") {
        let t = v.trim();
        if !t.is_empty() {
            return Some(PathBuf::from(t));
        }
    }
    None
}

fn print_help() {
    println!(
        r#"stayshots_harvest

Downloads pool and exterior photos for each configured rental listing into
<images>/option-<n>/, then writes a per-listing results report.

Usage:
  cargo run --bin stayshots_harvest
  cargo run --bin stayshots_harvest -- --headless --only 4146676
  cargo run --bin stayshots_harvest -- --init-config

Options:
  --base-dir <path>  Override base dir (default: $STAYSHOTS_BASE_DIR, else the current dir)
  --headless         Run the browser without a window
  --only <id>        Only process this listing id (repeatable)
  --init-config      Write default config/harvest.json and config/listings.json, then exit

Files:
  config/harvest.json                     harvest settings (optional)
  config/listings.json                    listings to process (defaults to the built-in eight)
  reports/image_download_results.json     per-listing results
  reports/download_manifest.csv           one row per planned file
  logs/runs/<run_id>.jsonl                structured event log
"#
    );
}
