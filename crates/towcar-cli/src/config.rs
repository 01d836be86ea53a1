//! Configuration – reads/writes `~/.towcar/config.toml`.
//!
//! `towcar config --write` persists the effective configuration there.
//!
//! The file has two sections, both optional:
//!
//! ```toml
//! [camera]            # pinhole intrinsics + distortion
//! fx = 872.23558
//!
//! [pipeline]
//! smoothing_alpha = 0.3
//!
//! [pipeline.docking]
//! accepted_ids = [11]
//!
//! [pipeline.gesture]
//! approach_min_angle = 130.0
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use towcar_perception::CameraIntrinsics;
use towcar_runtime::PipelineConfig;

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "TOWCAR_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Persisted configuration stored in `~/.towcar/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Calibration of the vehicle camera.
    #[serde(default)]
    pub camera: CameraIntrinsics,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Return the config path: `$TOWCAR_CONFIG`, else `~/.towcar/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var(CONFIG_PATH_ENV)
        && !p.trim().is_empty()
    {
        return PathBuf::from(p);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".towcar").join("config.toml")
}

/// Load the effective configuration: the file if present, else defaults,
/// with `TOWCAR_*` environment overrides applied on top.
pub fn load() -> Result<Config, ConfigError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the file at `path`.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(toml::from_str(&raw)?))
}

/// Apply `TOWCAR_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TOWCAR_MARKER_IDS` | `pipeline.docking.accepted_ids` (comma-separated) |
/// | `TOWCAR_MARKER_SIZE` | `pipeline.docking.marker_size` |
/// | `TOWCAR_SMOOTHING_ALPHA` | `pipeline.smoothing_alpha` |
///
/// Values that do not parse, or are out of range, are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("TOWCAR_MARKER_IDS")
        && let Some(ids) = parse_ids(&v)
    {
        cfg.pipeline.docking.accepted_ids = ids;
    }
    if let Some(v) = var("TOWCAR_MARKER_SIZE")
        && let Ok(size) = v.trim().parse::<f64>()
        && size.is_finite()
        && size > 0.0
    {
        cfg.pipeline.docking.marker_size = size;
    }
    if let Some(v) = var("TOWCAR_SMOOTHING_ALPHA")
        && let Ok(alpha) = v.trim().parse::<f64>()
        && (0.0..=1.0).contains(&alpha)
    {
        cfg.pipeline.smoothing_alpha = alpha;
    }
}

fn parse_ids(raw: &str) -> Option<Vec<i32>> {
    let ids = raw
        .split(',')
        .map(|s| s.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    (!ids.is_empty()).then_some(ids)
}

/// Save `cfg` to [`config_path`] and return where it was written.
pub fn save(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_to(cfg, &path)?;
    Ok(path)
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(write_err)?;
        }
    }
    let raw = toml::to_string_pretty(cfg)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}
