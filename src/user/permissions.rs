use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Administrative capability: notifier settings, manual runs, queue
    /// removal and subscriber export.
    ManageOptions,
    EditPosts,
}

impl Permission {
    pub fn as_int(self) -> i32 {
        match self {
            Permission::ManageOptions => 1,
            Permission::EditPosts => 2,
        }
    }

    pub fn from_int(value: i32) -> Option<Self> {
        match value {
            1 => Some(Permission::ManageOptions),
            2 => Some(Permission::EditPosts),
            _ => None,
        }
    }
}

const ADMINISTRATOR_PERMISSIONS: &[Permission] = &[Permission::ManageOptions, Permission::EditPosts];
const EDITOR_PERMISSIONS: &[Permission] = &[Permission::EditPosts];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Administrator,
    Editor,
}

impl UserRole {
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            UserRole::Administrator => ADMINISTRATOR_PERMISSIONS,
            UserRole::Editor => EDITOR_PERMISSIONS,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "administrator" | "admin" => Some(UserRole::Administrator),
            "editor" => Some(UserRole::Editor),
            _ => None,
        }
    }
}
