use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::domain::AppSettings;
use crate::ports::SettingsRepo;

const QUALIFIER: &str = "org";
const ORG: &str = "opentravel";
const APP: &str = "dex";

/// Settings stored as JSON in the platform config directory, or in an explicit
/// directory when one is given.
pub struct FilePersistence {
    dir: Option<PathBuf>,
}

impl Default for FilePersistence {
    fn default() -> Self {
        Self::new()
    }
}

impl FilePersistence {
    pub fn new() -> Self {
        Self { dir: None }
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn config_dir(&self) -> Result<PathBuf> {
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => ProjectDirs::from(QUALIFIER, ORG, APP)
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
                .config_dir()
                .to_path_buf(),
        };
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    pub fn settings_path(&self) -> Result<PathBuf> {
        Ok(self.config_dir()?.join("settings.json"))
    }

    pub fn load_settings(&self) -> Result<AppSettings> {
        let path = self.settings_path()?;
        if !path.exists() {
            return Ok(AppSettings::default());
        }
        let content = fs::read_to_string(&path).context("Failed to read settings")?;
        let mut settings: AppSettings = serde_json::from_str(&content)?;
        settings.undo_limit = dex_config::clamp_undo_limit(settings.undo_limit);
        settings.task_channel_capacity = dex_config::clamp_channel_capacity(settings.task_channel_capacity);
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        let path = self.settings_path()?;
        let json = serde_json::to_string_pretty(settings)?;
        atomic_write(&path, json.as_bytes()).context("Failed to write settings")?;
        Ok(())
    }
}

impl SettingsRepo for FilePersistence {
    fn load(&self) -> Result<AppSettings> {
        self.load_settings()
    }

    fn save(&self, settings: &AppSettings) -> Result<()> {
        self.save_settings(settings)
    }
}

/// Replace `path` with `contents` via a sibling `.tmp` file. Readers never observe
/// a partially written file.
fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let written = fs::File::create(&tmp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written {
        fs::remove_file(&tmp_path).ok();
        return Err(e).with_context(|| format!("Failed to write {}", tmp_path.display()));
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        // Some platforms refuse to rename over an existing file.
        if !path.exists() || fs::remove_file(path).is_err() || fs::rename(&tmp_path, path).is_err() {
            fs::remove_file(&tmp_path).ok();
            return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
        }
    }
    Ok(())
}
