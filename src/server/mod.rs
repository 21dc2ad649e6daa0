mod admin_routes;
pub mod config;
mod http_layers;
pub mod metrics;
pub mod server;
pub(self) mod session;
pub mod state;

pub use admin_routes::SETTINGS_VIEW_PATH;
pub use config::ServerConfig;
pub use http_layers::*;
pub use server::run_server;
