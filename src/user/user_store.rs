use super::{AuthToken, AuthTokenValue, PasswordCredentials, Permission};
use anyhow::Result;

/// Accounts allowed into the admin surface.
pub trait UserStore: Send + Sync {
    /// Creates a user and returns its id.
    fn create_user(&self, user_handle: &str) -> Result<usize>;
    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>>;
    fn get_user_handle(&self, user_id: usize) -> Result<Option<String>>;

    // Password credentials
    fn get_password_credentials(&self, user_id: usize) -> Result<Option<PasswordCredentials>>;
    /// Inserts or replaces the user's credentials.
    fn set_password_credentials(&self, credentials: &PasswordCredentials) -> Result<()>;

    // Auth tokens
    fn add_auth_token(&self, token: &AuthToken) -> Result<()>;
    fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>>;
    fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()>;
    /// Returns false if no such token existed.
    fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<bool>;

    // Permissions
    fn grant_permission(&self, user_id: usize, permission: Permission) -> Result<()>;
    fn get_user_permissions(&self, user_id: usize) -> Result<Vec<Permission>>;
}
