use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::path_utils;

pub const DEFAULT_WATCH_DIR: &str = "inbox";
pub const DEFAULT_MIRROR_DIR: &str = "mirror";
pub const DEFAULT_REPORT_DIR: &str = "reports";
pub const DEFAULT_REPORT_HOUR: u32 = 15;
pub const DEFAULT_REPORT_MINUTE: u32 = 0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config source error: {0}")]
    Source(#[from] config::ConfigError),
    #[error("report_hour must be between 0 and 23, got {0}")]
    InvalidHour(u32),
    #[error("report_minute must be between 0 and 59, got {0}")]
    InvalidMinute(u32),
}

/// Settings read once at startup.
///
/// Directory values are kept as written; use the `*_path` accessors for the
/// resolved locations.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(alias = "WATCH_DIR")]
    pub watch_dir: String,

    #[serde(alias = "MIRROR_DIR")]
    pub mirror_dir: String,

    #[serde(alias = "REPORT_DIR")]
    pub report_dir: String,

    #[serde(alias = "REPORT_HOUR")]
    pub report_hour: u32,

    #[serde(alias = "REPORT_MINUTE")]
    pub report_minute: u32,

    #[serde(skip)]
    pub project_root: PathBuf,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // 1. Try standard dotenv discovery from current dir
        if dotenvy::dotenv().is_err() {
            // 2. Fallback: the .env next to the resolved MIRRORWATCH_ROOT
            let path = path_utils::get_app_root().join(".env");
            if path.exists() {
                let _ = dotenvy::from_path(&path);
            }
        }

        let builder = Config::builder()
            .add_source(File::with_name("mirrorwatch").required(false))
            .add_source(Environment::default());

        Self::build(path_utils::get_app_root(), builder)
    }

    /// Builds a config from an inline TOML document on top of the defaults.
    pub fn from_toml_str(project_root: impl Into<PathBuf>, toml: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::build(project_root.into(), builder)
    }

    fn build(
        project_root: PathBuf,
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigError> {
        let builder = builder
            .set_default("watch_dir", DEFAULT_WATCH_DIR)?
            .set_default("mirror_dir", DEFAULT_MIRROR_DIR)?
            .set_default("report_dir", DEFAULT_REPORT_DIR)?
            .set_default("report_hour", i64::from(DEFAULT_REPORT_HOUR))?
            .set_default("report_minute", i64::from(DEFAULT_REPORT_MINUTE))?;

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.project_root = project_root;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.report_hour > 23 {
            return Err(ConfigError::InvalidHour(self.report_hour));
        }
        if self.report_minute > 59 {
            return Err(ConfigError::InvalidMinute(self.report_minute));
        }
        Ok(())
    }

    pub fn watch_path(&self) -> PathBuf {
        self.resolve(&self.watch_dir)
    }

    pub fn mirror_path(&self) -> PathBuf {
        self.resolve(&self.mirror_dir)
    }

    pub fn report_path(&self) -> PathBuf {
        self.resolve(&self.report_dir)
    }

    pub fn log_file(&self) -> PathBuf {
        self.project_root.join("mirrorwatch.log")
    }

    fn resolve(&self, value: &str) -> PathBuf {
        path_utils::resolve_against(Path::new(&self.project_root), value)
    }
}
