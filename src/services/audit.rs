use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::database::models::AuditLog;
use crate::import::BatchResult;
use crate::middleware::auth::AuthUser;

/// One audit-log entry to persist. Built by handlers after a successful
/// mutation; never blocks or fails the request it describes.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub metadata: Option<Value>,
    pub project_id: Option<Uuid>,
}

impl AuditEntry {
    pub fn new(action: &str, entity_type: &str) -> Self {
        Self {
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: None,
            old_values: None,
            new_values: None,
            metadata: None,
            project_id: None,
        }
    }

    pub fn entity_id(mut self, id: Uuid) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn old_values(mut self, values: Value) -> Self {
        self.old_values = Some(values);
        self
    }

    pub fn new_values(mut self, values: Value) -> Self {
        self.new_values = Some(values);
        self
    }

    pub fn metadata(mut self, values: Value) -> Self {
        self.metadata = Some(values);
        self
    }

    pub fn project_id(mut self, id: Uuid) -> Self {
        self.project_id = Some(id);
        self
    }
}

/// Persist an audit entry. Errors are logged and swallowed so that a
/// broken audit table cannot fail the mutation it records.
pub async fn record(pool: &PgPool, user: &AuthUser, entry: AuditEntry) {
    let result = sqlx::query(
        r#"
        INSERT INTO audit_logs
            (id, action, entity_type, entity_id, old_values, new_values,
             metadata, user_id, organization_id, project_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&entry.action)
    .bind(&entry.entity_type)
    .bind(entry.entity_id)
    .bind(&entry.old_values)
    .bind(&entry.new_values)
    .bind(&entry.metadata)
    .bind(user.user_id)
    .bind(user.organization_id)
    .bind(entry.project_id)
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!(action = %entry.action, entity = %entry.entity_type, error = %e,
              "audit log write failed");
    }
}

/// Latest audit entries for an organization, newest first.
pub async fn recent(
    pool: &PgPool,
    organization_id: Uuid,
    limit: i64,
) -> Result<Vec<AuditLog>, sqlx::Error> {
    sqlx::query_as::<_, AuditLog>(
        "SELECT * FROM audit_logs WHERE organization_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(organization_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// A batch leaves an audit trace only when it actually wrote something:
/// dry runs and zero-success batches are invisible.
pub fn should_record_batch(result: &BatchResult) -> bool {
    !result.dry_run && result.successes() > 0
}

/// Record the summary entry for an import batch. Dry runs and batches
/// where nothing was written leave no trace.
pub async fn record_import_batch(
    pool: &PgPool,
    user: &AuthUser,
    project_id: Uuid,
    result: &BatchResult,
) {
    if !should_record_batch(result) {
        return;
    }

    let entry = AuditEntry::new("IMPORT", "unit")
        .project_id(project_id)
        .metadata(json!({
            "total_rows": result.total_rows,
            "created": result.created,
            "updated": result.updated,
            "errors": result.errors(),
        }));
    record(pool, user, entry).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::RowFailure;

    fn batch(created: usize, updated: usize, errors: usize, dry_run: bool) -> BatchResult {
        let failures = (0..errors)
            .map(|i| RowFailure {
                row: i + 2,
                sku: None,
                error: "Valor inválido en Precio: x".to_string(),
            })
            .collect::<Vec<_>>();
        BatchResult {
            total_rows: created + updated + failures.len(),
            created,
            updated,
            failures,
            dry_run,
        }
    }

    #[test]
    fn dry_run_batch_is_never_recorded() {
        assert!(!should_record_batch(&batch(3, 1, 0, true)));
    }

    #[test]
    fn zero_success_batch_is_not_recorded() {
        assert!(!should_record_batch(&batch(0, 0, 4, false)));
        assert!(!should_record_batch(&batch(0, 0, 0, false)));
    }

    #[test]
    fn live_batch_with_successes_is_recorded() {
        assert!(should_record_batch(&batch(1, 0, 0, false)));
        assert!(should_record_batch(&batch(0, 2, 5, false)));
    }

    #[test]
    fn builder_sets_optional_fields() {
        let project = Uuid::new_v4();
        let entry = AuditEntry::new("UPDATE", "unit")
            .entity_id(project)
            .project_id(project)
            .metadata(json!({"k": 1}));
        assert_eq!(entry.action, "UPDATE");
        assert_eq!(entry.entity_type, "unit");
        assert_eq!(entry.entity_id, Some(project));
        assert_eq!(entry.project_id, Some(project));
        assert!(entry.old_values.is_none());
    }
}
