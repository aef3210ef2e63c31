//! Settings storage for API credentials.
//!
//! Provides key-value storage using the settings table. Values are plain text;
//! listings mask anything that looks like a credential.

use crate::error::Result;
use std::collections::BTreeMap;
use sqlx::SqlitePool;

/// Insert or replace a setting.
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, datetime('now'))
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = datetime('now')
        ",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a setting, treating blank values as absent.
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r"
        SELECT value
        FROM settings
        WHERE key = ?
        ",
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row
        .map(|(value,)| value)
        .filter(|value| !value.trim().is_empty()))
}

/// Delete a setting. Deleting an absent key is not an error.
pub async fn delete_setting(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query(
        r"
        DELETE FROM settings
        WHERE key = ?
        ",
    )
    .bind(key)
    .execute(pool)
    .await?;

    Ok(())
}

/// List every setting with credential values masked.
pub async fn list_settings_masked(pool: &SqlitePool) -> Result<BTreeMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(key, value)| {
            let shown = if is_sensitive_key(&key) {
                mask_value(&value)
            } else {
                value
            };
            (key, shown)
        })
        .collect())
}

fn is_sensitive_key(key: &str) -> bool {
    key.contains("api_key") || key.contains("secret") || key.contains("api_id")
}

/// Mask a credential, keeping only its last four characters.
#[must_use]
pub fn mask_value(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = value.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("****{tail}")
}
