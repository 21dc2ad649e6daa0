pub mod auth;
pub mod permissions;
mod user_manager;
mod user_store;

pub use auth::{AuthToken, AuthTokenValue, PasswordCredentials, PasswordHasherKind};
pub use permissions::{Permission, UserRole};
pub use user_manager::UserManager;
pub use user_store::UserStore;
