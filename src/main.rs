use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stc_notifier::config;
use stc_notifier::send::{LogTransport, NotificationSender};
use stc_notifier::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use stc_notifier::{Notifier, NotifierOptions, SqliteSiteStore, UserManager, UserRole};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the site database (site.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Site name used in digest subjects and footers.
    #[clap(long)]
    pub site_name: Option<String>,

    /// Public base URL of the site, used for post links.
    #[clap(long)]
    pub site_url: Option<String>,

    /// Sender address when the settings do not name one.
    #[clap(long)]
    pub admin_email: Option<String>,

    /// Upper bound in seconds on how long the scheduler sleeps between checks.
    #[clap(long)]
    pub check_interval_secs: Option<u64>,

    /// Handle of an administrator to create at startup if missing.
    #[clap(long, requires = "admin_password")]
    pub admin_handle: Option<String>,

    /// Password for --admin-handle.
    #[clap(long, requires = "admin_handle")]
    pub admin_password: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            site_name: args.site_name.clone(),
            site_url: args.site_url.clone(),
            admin_email: args.admin_email.clone(),
            check_interval_secs: args.check_interval_secs,
            admin_handle: args.admin_handle.clone(),
            admin_password: args.admin_password.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  port: {}", app_config.port);
    info!("  site: {} ({})", app_config.site.name, app_config.site.url);

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Opening site database at {:?}...", app_config.site_db_path());
    let site_store = Arc::new(SqliteSiteStore::new(app_config.site_db_path())?);

    let user_manager = UserManager::new(site_store.clone());
    if let Some(admin) = &app_config.bootstrap_admin {
        let user_id =
            user_manager.ensure_user(&admin.handle, &admin.password, UserRole::Administrator)?;
        info!("Bootstrap administrator {} has id {}", admin.handle, user_id);
    }

    let sender = Arc::new(NotificationSender::new(
        site_store.clone(),
        Arc::new(LogTransport::new()),
        app_config.site.clone(),
    ));
    let notifier = Arc::new(Notifier::new(
        site_store,
        sender,
        NotifierOptions {
            site: app_config.site.clone(),
            display_format: app_config.display_format.clone(),
            notice_ttl: app_config.notifier.notice_ttl,
            nonce_secret: app_config.notifier.nonce_secret.clone(),
        },
    )?);
    if notifier.install()? {
        info!("Notification job registered");
    }

    let shutdown_token = CancellationToken::new();
    let (scheduler, scheduler_handle) =
        notifier.job_scheduler(shutdown_token.clone(), app_config.notifier.check_interval);

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
    };

    tokio::select! {
        result = run_server(server_config, user_manager, notifier, Some(scheduler_handle)) => {
            info!("HTTP server stopped: {:?}", result);
            shutdown_token.cancel();
            result
        },
        _ = scheduler.run() => {
            info!("Scheduler stopped");
            Ok(())
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            // Give the scheduler a moment to shut down gracefully
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        }
    }
}
