//! Log output settings and startup-time file rotation.

use crate::{env_optional, env_parse, ConfigError, FromEnv};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Where and how verbosely to log.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Log file; stdout when `None`.
    pub path: Option<PathBuf>,
    /// Level directive (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: Option<String>,
    /// Rotated files older than this are removed. 0 keeps them forever.
    pub max_age_days: u64,
    /// Number of rotated files to keep. 0 keeps all of them.
    pub max_backups: usize,
}

impl LogConfig {
    /// Normalized level directive, if one was configured.
    ///
    /// Accepts `warning` as an alias of `warn`. Unknown names yield `None`
    /// so the environment default applies.
    pub fn level_directive(&self) -> Option<&'static str> {
        let level = self.level.as_deref()?.trim().to_ascii_lowercase();
        match level.as_str() {
            "error" => Some("error"),
            "warn" | "warning" => Some("warn"),
            "info" => Some("info"),
            "debug" => Some("debug"),
            "trace" => Some("trace"),
            _ => None,
        }
    }

    /// Rotates any previous log file and opens a fresh one for appending.
    ///
    /// Returns `Ok(None)` when logging to stdout.
    pub fn open(&self) -> io::Result<Option<File>> {
        let Some(path) = self.path.as_deref() else {
            return Ok(None);
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        rotate(path)?;
        prune_backups(path, self.max_age_days, self.max_backups)?;

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map(Some)
    }
}

impl FromEnv for LogConfig {
    /// Environment variables:
    /// - `LOG_PATH` (optional)
    /// - `LOG_LEVEL` (optional)
    /// - `LOG_MAX_AGE_DAYS` (default: 7)
    /// - `LOG_MAX_BACKUPS` (default: 3)
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            path: env_optional("LOG_PATH").map(PathBuf::from),
            level: env_optional("LOG_LEVEL"),
            max_age_days: env_parse("LOG_MAX_AGE_DAYS", "7")?,
            max_backups: env_parse("LOG_MAX_BACKUPS", "3")?,
        })
    }
}

fn backup_prefix(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| format!("{}.", name.to_string_lossy()))
}

/// Moves a non-empty log file aside as `<name>.<UTC timestamp>`.
fn rotate(path: &Path) -> io::Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => {
            let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
            let mut backup = path.as_os_str().to_owned();
            backup.push(format!(".{}", stamp));
            fs::rename(path, PathBuf::from(backup))
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn prune_backups(path: &Path, max_age_days: u64, max_backups: usize) -> io::Result<()> {
    let Some(prefix) = backup_prefix(path) else {
        return Ok(());
    };
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    };

    let mut backups: Vec<(PathBuf, SystemTime)> = fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .filter_map(|entry| {
            let modified = entry.metadata().and_then(|m| m.modified()).ok()?;
            Some((entry.path(), modified))
        })
        .collect();

    // newest first
    backups.sort_by(|a, b| b.1.cmp(&a.1));

    let max_age = Duration::from_secs(max_age_days * 24 * 60 * 60);
    let now = SystemTime::now();

    for (index, (backup, modified)) in backups.iter().enumerate() {
        let too_many = max_backups > 0 && index >= max_backups;
        let too_old = max_age_days > 0
            && now
                .duration_since(*modified)
                .map(|age| age > max_age)
                .unwrap_or(false);

        if too_many || too_old {
            fs::remove_file(backup)?;
        }
    }

    Ok(())
}
