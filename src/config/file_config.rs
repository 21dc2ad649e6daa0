use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,

    // Feature configs
    pub site: Option<SiteConfig>,
    pub display: Option<DisplayConfig>,
    pub notifier: Option<NotifierConfig>,
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SiteConfig {
    pub name: Option<String>,
    pub url: Option<String>,
    pub admin_email: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    /// `strftime` pattern for the next-run time.
    pub datetime_format: Option<String>,
    pub utc_offset_seconds: Option<i32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct NotifierConfig {
    pub check_interval_secs: Option<u64>,
    pub notice_ttl_secs: Option<u64>,
    pub nonce_secret: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapAdminConfig {
    pub handle: String,
    pub password: String,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_sections_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
port = 4000

[site]
name = "Kitchen Notes"
url = "https://kitchen.example"

[display]
datetime_format = "%d/%m/%Y %H:%M"
utc_offset_seconds = 7200

[notifier]
check_interval_secs = 15

[bootstrap_admin]
handle = "admin"
password = "hunter2"
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.port, Some(4000));
        assert_eq!(config.site.unwrap().name.as_deref(), Some("Kitchen Notes"));
        assert_eq!(config.display.unwrap().utc_offset_seconds, Some(7200));
        assert_eq!(config.notifier.unwrap().check_interval_secs, Some(15));
        assert_eq!(config.bootstrap_admin.unwrap().handle, "admin");
    }

    #[test]
    fn rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "port = \"not a number\"").unwrap();
        assert!(FileConfig::load(file.path()).is_err());
    }
}
