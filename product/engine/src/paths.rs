use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_dir: PathBuf,
}

impl AppPaths {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    pub fn harvest_config_path(&self) -> PathBuf {
        self.config_dir().join("harvest.json")
    }

    pub fn listings_path(&self) -> PathBuf {
        self.config_dir().join("listings.json")
    }

    pub fn default_images_dir(&self) -> PathBuf {
        self.base_dir.join("images")
    }

    pub fn images_dir(&self, override_dir: Option<&str>) -> PathBuf {
        match override_dir.map(str::trim).filter(|v| !v.is_empty()) {
            Some(dir) => {
                let path = Path::new(dir);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.base_dir.join(path)
                }
            }
            None => self.default_images_dir(),
        }
    }

    pub fn listing_dir(images_root: &Path, ordinal: u32) -> PathBuf {
        images_root.join(format!("option-{ordinal}"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn run_logs_dir(&self) -> PathBuf {
        self.logs_dir().join("runs")
    }

    pub fn run_log_path(&self, run_id: &str) -> PathBuf {
        self.run_logs_dir().join(format!("{run_id}.jsonl"))
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.base_dir.join("reports")
    }

    pub fn run_report_path(&self) -> PathBuf {
        self.reports_dir().join("image_download_results.json")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.reports_dir().join("download_manifest.csv")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.run_logs_dir())?;
        std::fs::create_dir_all(self.reports_dir())?;
        Ok(())
    }
}
