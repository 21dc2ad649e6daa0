use super::{AuthToken, AuthTokenValue, PasswordCredentials, Permission, UserRole, UserStore};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// Account operations on top of a [`UserStore`]: user creation, password
/// login and session tokens.
#[derive(Clone)]
pub struct UserManager {
    user_store: Arc<dyn UserStore>,
}

impl UserManager {
    pub fn new(user_store: Arc<dyn UserStore>) -> Self {
        Self { user_store }
    }

    pub fn add_user(&self, user_handle: &str) -> Result<usize> {
        if user_handle.is_empty() {
            bail!("The user handle cannot be empty.")
        }
        if self.user_store.get_user_id(user_handle)?.is_some() {
            bail!("User handle already exists.");
        }
        self.user_store.create_user(user_handle)
    }

    pub fn set_password(&self, user_handle: &str, password: &str) -> Result<()> {
        let user_id = self
            .user_store
            .get_user_id(user_handle)?
            .with_context(|| format!("User with handle {} not found.", user_handle))?;
        let credentials = PasswordCredentials::create(user_id, password)?;
        self.user_store.set_password_credentials(&credentials)
    }

    pub fn grant_role(&self, user_id: usize, role: UserRole) -> Result<()> {
        for permission in role.permissions() {
            self.user_store.grant_permission(user_id, *permission)?;
        }
        Ok(())
    }

    /// Creates the user with the given password and role unless the handle
    /// is already taken. Returns the user id either way.
    pub fn ensure_user(&self, user_handle: &str, password: &str, role: UserRole) -> Result<usize> {
        if let Some(user_id) = self.user_store.get_user_id(user_handle)? {
            debug!("User {} already exists", user_handle);
            return Ok(user_id);
        }
        let user_id = self.add_user(user_handle)?;
        self.set_password(user_handle, password)?;
        self.grant_role(user_id, role)?;
        info!("Created user {} with role {:?}", user_handle, role);
        Ok(user_id)
    }

    /// Verifies the password and issues a fresh session token. `None` when
    /// the handle is unknown or the password does not match.
    pub fn login(&self, user_handle: &str, password: &str) -> Result<Option<AuthToken>> {
        let Some(user_id) = self.user_store.get_user_id(user_handle)? else {
            return Ok(None);
        };
        let Some(credentials) = self.user_store.get_password_credentials(user_id)? else {
            return Ok(None);
        };
        if !credentials.matches(password)? {
            return Ok(None);
        }

        let token = AuthToken {
            user_id,
            created: SystemTime::now(),
            last_used: None,
            value: AuthTokenValue::generate(),
        };
        self.user_store.add_auth_token(&token)?;
        Ok(Some(token))
    }

    pub fn logout(&self, token: &AuthTokenValue) -> Result<bool> {
        self.user_store.delete_auth_token(token)
    }

    /// Resolves a session token, marking it used.
    pub fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let token = self.user_store.get_auth_token(value)?;
        if token.is_some() {
            self.user_store.touch_auth_token(value)?;
        }
        Ok(token)
    }

    pub fn get_user_permissions(&self, user_id: usize) -> Result<Vec<Permission>> {
        self.user_store.get_user_permissions(user_id)
    }
}
