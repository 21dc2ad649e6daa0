//! SQLite schema of the site database.
//!
//! The site database holds everything the notifier persists: options (the
//! schedule table and settings documents among them), expiring transients,
//! the post/category directory with per-post meta, job run history and the
//! accounts allowed into the admin surface.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Options, transients, directory and job runs
// =============================================================================

/// Named option values, one serialized document per row.
const OPTIONS_TABLE_V1: Table = Table {
    name: "options",
    columns: &[
        sqlite_column!("name", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Text, non_null = true),
        sqlite_column!(
            "updated_at",
            &SqlType::Text,
            non_null = true,
            default_value = Some("(datetime('now'))")
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

/// Values that stop existing once `expires_at` (unix seconds) has passed.
const TRANSIENTS_TABLE_V1: Table = Table {
    name: "transients",
    columns: &[
        sqlite_column!("name", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Text, non_null = true),
        sqlite_column!("expires_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_transients_expires_at", "expires_at")],
    unique_constraints: &[],
};

const POSTS_TABLE_V1: Table = Table {
    name: "posts",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("post_type", &SqlType::Text, non_null = true),
        sqlite_column!("post_status", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("content", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_posts_type_status", "post_type, post_status")],
    unique_constraints: &[],
};

/// At most one value per (post, key).
const POST_META_TABLE_V1: Table = Table {
    name: "post_meta",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("post_id", &SqlType::Integer, non_null = true),
        sqlite_column!("meta_key", &SqlType::Text, non_null = true),
        sqlite_column!("meta_value", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_post_meta_key_value", "meta_key, meta_value")],
    unique_constraints: &[&["post_id", "meta_key"]],
};

const CATEGORIES_TABLE_V1: Table = Table {
    name: "categories",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("slug", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const POST_CATEGORIES_TABLE_V1: Table = Table {
    name: "post_categories",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("post_id", &SqlType::Integer, non_null = true),
        sqlite_column!("category_id", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_post_categories_category", "category_id")],
    unique_constraints: &[&["post_id", "category_id"]],
};

/// History of background job executions.
const JOB_RUNS_TABLE_V1: Table = Table {
    name: "job_runs",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("job_id", &SqlType::Text, non_null = true),
        sqlite_column!("started_at", &SqlType::Text, non_null = true),
        sqlite_column!("finished_at", &SqlType::Text),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("error_message", &SqlType::Text),
        sqlite_column!("triggered_by", &SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_job_runs_job_id_started", "job_id, started_at DESC"),
        ("idx_job_runs_status", "status"),
    ],
    unique_constraints: &[],
};

// =============================================================================
// Version 2 - Admin accounts
// =============================================================================

const USERS_TABLE_V2: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const USER_PASSWORDS_TABLE_V2: Table = Table {
    name: "user_passwords",
    columns: &[
        sqlite_column!("user_id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

const AUTH_TOKENS_TABLE_V2: Table = Table {
    name: "auth_tokens",
    columns: &[
        sqlite_column!("value", &SqlType::Text, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Integer, non_null = true),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
        sqlite_column!("last_used", &SqlType::Text),
    ],
    indices: &[("idx_auth_tokens_user", "user_id")],
    unique_constraints: &[],
};

const USER_PERMISSIONS_TABLE_V2: Table = Table {
    name: "user_permissions",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Integer, non_null = true),
        sqlite_column!("permission", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["user_id", "permission"]],
};

/// Adds the account tables to a version 1 database.
fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    for table in [
        &USERS_TABLE_V2,
        &USER_PASSWORDS_TABLE_V2,
        &AUTH_TOKENS_TABLE_V2,
        &USER_PERMISSIONS_TABLE_V2,
    ] {
        table.create(conn)?;
    }
    Ok(())
}

pub const SITE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[
            OPTIONS_TABLE_V1,
            TRANSIENTS_TABLE_V1,
            POSTS_TABLE_V1,
            POST_META_TABLE_V1,
            CATEGORIES_TABLE_V1,
            POST_CATEGORIES_TABLE_V1,
            JOB_RUNS_TABLE_V1,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            OPTIONS_TABLE_V1,
            TRANSIENTS_TABLE_V1,
            POSTS_TABLE_V1,
            POST_META_TABLE_V1,
            CATEGORIES_TABLE_V1,
            POST_CATEGORIES_TABLE_V1,
            JOB_RUNS_TABLE_V1,
            USERS_TABLE_V2,
            USER_PASSWORDS_TABLE_V2,
            AUTH_TOKENS_TABLE_V2,
            USER_PERMISSIONS_TABLE_V2,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];
