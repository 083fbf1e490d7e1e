use crate::paths::AppPaths;
use crate::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

const RUN_LOG_ROTATE_BYTES: u64 = 10 * 1024 * 1024;
const RUN_LOG_MAX_BACKUPS: usize = 3;

#[derive(Debug, Clone)]
pub struct RunLog {
    run_id: String,
    path: PathBuf,
    rotate_bytes: u64,
    max_backups: usize,
}

impl RunLog {
    pub fn create(paths: &AppPaths) -> Result<Self> {
        let run_id = uuid::Uuid::new_v4().to_string();
        std::fs::create_dir_all(paths.run_logs_dir())?;
        Ok(Self {
            path: paths.run_log_path(&run_id),
            run_id,
            rotate_bytes: RUN_LOG_ROTATE_BYTES,
            max_backups: RUN_LOG_MAX_BACKUPS,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_line(&self, level: &str, event: &str, data: serde_json::Value) -> Result<()> {
        let line = serde_json::json!({
            "ts_ms": now_ms(),
            "run_id": self.run_id,
            "level": level,
            "event": event,
            "data": data
        })
        .to_string();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.rotate_if_needed()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(format!("{line}\n").as_bytes())?;
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let Ok(meta) = std::fs::metadata(&self.path) else {
            return Ok(());
        };
        if meta.len() < self.rotate_bytes {
            return Ok(());
        }
        if self.max_backups == 0 {
            std::fs::remove_file(&self.path)?;
            return Ok(());
        }

        // Shift `.N-1` to `.N` from the oldest down; the live file becomes `.1`.
        let oldest = self.backup_path(self.max_backups);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }
        for slot in (1..self.max_backups).rev() {
            let from = self.backup_path(slot);
            if from.exists() {
                std::fs::rename(&from, self.backup_path(slot + 1))?;
            }
        }
        std::fs::rename(&self.path, self.backup_path(1))?;
        Ok(())
    }

    fn backup_path(&self, slot: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{slot}"));
        PathBuf::from(name)
    }
}

/// Keeps only scheme and host so logs never carry signed query strings.
pub fn redact_url_for_log(value: &str) -> String {
    match Url::parse(value) {
        Ok(uri) => {
            let scheme = uri.scheme();
            let authority = uri.host_str().unwrap_or("unknown-host");
            format!("{scheme}://{authority}/...")
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
