//! Target records.
//!
//! Targets belong to the record store; the job engine only ever reads a
//! target's `id` and `domain`. Creation and listing exist so the store can be
//! populated without a separate service.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use reconflow_core::{validate_domain, TargetId};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::jobs::parse_timestamp;

/// A domain under reconnaissance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Unique identifier
    pub id: TargetId,
    /// Unique domain name
    pub domain: String,
    /// Optional display name
    pub name: Option<String>,
    /// Optional free-form scope description
    pub scope: Option<String>,
    /// When the target was recorded
    pub created_at: DateTime<Utc>,
}

type TargetRow = (String, String, Option<String>, Option<String>, String);

fn target_from_row((id, domain, name, scope, created_at): TargetRow) -> Result<Target> {
    Ok(Target {
        id: TargetId::new(id)?,
        domain,
        name,
        scope,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Create a new target.
///
/// # Errors
/// Returns `DatabaseError::Validation` if the domain is malformed or already recorded.
pub async fn create_target(
    pool: &SqlitePool,
    domain: &str,
    name: Option<String>,
    scope: Option<String>,
) -> Result<Target> {
    let domain = domain.trim().to_ascii_lowercase();
    validate_domain(&domain)?;

    let id = TargetId::generate();
    let created_at = Utc::now();

    sqlx::query(
        "INSERT INTO targets (id, domain, name, scope, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id.as_str())
    .bind(&domain)
    .bind(&name)
    .bind(&scope)
    .bind(created_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            DatabaseError::Validation(format!("target '{domain}' already exists"))
        }
        other => DatabaseError::Sqlx(other),
    })?;

    tracing::debug!(target_id = %id, domain = %domain, "Target created");

    Ok(Target {
        id,
        domain,
        name,
        scope,
        created_at,
    })
}

/// Look up a target by id, returning `None` if it does not exist.
pub async fn get_target(pool: &SqlitePool, id: &TargetId) -> Result<Option<Target>> {
    let row: Option<TargetRow> = sqlx::query_as(
        "SELECT id, domain, name, scope, created_at FROM targets WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(target_from_row).transpose()
}

/// List every target, newest first.
pub async fn list_targets(pool: &SqlitePool) -> Result<Vec<Target>> {
    let rows: Vec<TargetRow> = sqlx::query_as(
        "SELECT id, domain, name, scope, created_at FROM targets ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(target_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn setup_test_db() -> Database {
        Database::in_memory().await.expect("create test database")
    }

    #[tokio::test]
    async fn test_create_and_get_target() {
        let db = setup_test_db().await;

        let target = create_target(db.pool(), "Example.COM", Some("Example".into()), None)
            .await
            .expect("create target");
        assert_eq!(target.domain, "example.com");

        let fetched = get_target(db.pool(), &target.id)
            .await
            .expect("query target")
            .expect("target exists");
        assert_eq!(fetched.id, target.id);
        assert_eq!(fetched.name.as_deref(), Some("Example"));
    }

    #[tokio::test]
    async fn test_get_missing_target() {
        let db = setup_test_db().await;
        let missing = TargetId::new("missing").expect("valid id");
        assert!(get_target(db.pool(), &missing).await.expect("query").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_domain_rejected() {
        let db = setup_test_db().await;
        create_target(db.pool(), "example.com", None, None)
            .await
            .expect("first insert");

        let err = create_target(db.pool(), "example.com", None, None)
            .await
            .expect_err("duplicate rejected");
        assert!(matches!(err, DatabaseError::Validation(_)));
    }

    #[tokio::test]
    async fn test_invalid_domain_rejected() {
        let db = setup_test_db().await;
        let err = create_target(db.pool(), "../../etc", None, None)
            .await
            .expect_err("traversal rejected");
        assert!(matches!(err, DatabaseError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_targets() {
        let db = setup_test_db().await;
        create_target(db.pool(), "a.example", None, None).await.expect("a");
        create_target(db.pool(), "b.example", None, None).await.expect("b");

        let targets = list_targets(db.pool()).await.expect("list");
        assert_eq!(targets.len(), 2);
    }
}
