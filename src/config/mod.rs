mod file_config;

pub use file_config::{
    BootstrapAdminConfig, DisplayConfig, FileConfig, NotifierConfig, SiteConfig,
};

use crate::queue::DisplayFormat;
use crate::send::SiteInfo;
use crate::server::RequestsLoggingLevel;
use crate::trigger::DEFAULT_NOTICE_TTL;
use anyhow::{bail, Result};
use chrono::FixedOffset;
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub site_name: Option<String>,
    pub site_url: Option<String>,
    pub admin_email: Option<String>,
    pub check_interval_secs: Option<u64>,
    pub admin_handle: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,

    // Feature configs (with defaults)
    pub site: SiteInfo,
    pub display_format: DisplayFormat,
    pub notifier: NotifierSettings,
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub check_interval: Duration,
    pub notice_ttl: Duration,
    pub nonce_secret: Option<String>,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            notice_ttl: DEFAULT_NOTICE_TTL,
            nonce_secret: None,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let site_file = file.site.unwrap_or_default();
        let site = SiteInfo {
            name: site_file
                .name
                .or_else(|| cli.site_name.clone())
                .unwrap_or_else(|| "My Site".to_string()),
            url: site_file
                .url
                .or_else(|| cli.site_url.clone())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            admin_email: site_file
                .admin_email
                .or_else(|| cli.admin_email.clone())
                .unwrap_or_default(),
        };

        let display_file = file.display.unwrap_or_default();
        let defaults = DisplayFormat::default();
        let display_format = DisplayFormat {
            pattern: display_file.datetime_format.unwrap_or(defaults.pattern),
            utc_offset_seconds: display_file
                .utc_offset_seconds
                .unwrap_or(defaults.utc_offset_seconds),
        };
        if !DisplayFormat::is_valid_pattern(&display_format.pattern) {
            bail!("Invalid datetime_format: {:?}", display_format.pattern);
        }
        if FixedOffset::east_opt(display_format.utc_offset_seconds).is_none() {
            bail!(
                "utc_offset_seconds out of range: {}",
                display_format.utc_offset_seconds
            );
        }

        let notifier_file = file.notifier.unwrap_or_default();
        let check_interval_secs = notifier_file
            .check_interval_secs
            .or(cli.check_interval_secs)
            .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS);
        if check_interval_secs == 0 {
            bail!("check_interval_secs must be greater than zero");
        }
        let notifier = NotifierSettings {
            check_interval: Duration::from_secs(check_interval_secs),
            notice_ttl: notifier_file
                .notice_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_NOTICE_TTL),
            nonce_secret: notifier_file.nonce_secret.filter(|s| !s.is_empty()),
        };

        // TOML [bootstrap_admin] section takes precedence over CLI args
        let bootstrap_admin = if let Some(admin) = file.bootstrap_admin {
            Some(admin)
        } else if let (Some(handle), Some(password)) = (&cli.admin_handle, &cli.admin_password) {
            Some(BootstrapAdminConfig {
                handle: handle.clone(),
                password: password.clone(),
            })
        } else if cli.admin_handle.is_some() || cli.admin_password.is_some() {
            bail!("Both --admin-handle and --admin-password must be provided together");
        } else {
            None
        };

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            site,
            display_format,
            notifier,
            bootstrap_admin,
        })
    }

    pub fn site_db_path(&self) -> PathBuf {
        self.db_dir.join("site.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
