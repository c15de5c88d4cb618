// handlers/protected/imports.rs - CSV bulk import and export of units

use axum::extract::{Multipart, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::{Currency, UnitStatus, UnitType};
use crate::error::ApiError;
use crate::import::{
    parse_rows, run_import, write_units_csv, BatchResult, ExportRow, ImportOptions, PgImportStore,
};
use crate::middleware::auth::AuthUser;
use crate::middleware::permissions::require_permission;
use crate::services::audit;

#[derive(Debug, Default)]
struct ImportForm {
    file: Option<String>,
    project_id: Option<Uuid>,
    update_existing: bool,
    dry_run: bool,
}

/// POST /api/units/import - multipart form: `file` (CSV), `project_id`,
/// `update_existing` ("true"/"false"), `dry_run` ("true"/"false").
///
/// Per-row failures never abort the batch; the response always reports
/// success with per-row errors listed separately.
pub async fn import_units(
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    require_permission(&user, "units.csv_import")?;

    let form = read_form(&mut multipart).await?;
    let csv_content = form
        .file
        .ok_or_else(|| ApiError::bad_request("Archivo CSV requerido"))?;
    let project_id = form
        .project_id
        .ok_or_else(|| ApiError::bad_request("project_id requerido"))?;

    let pool = DatabaseManager::pool().await?;
    assert_project_in_org(&pool, user.organization_id, project_id).await?;

    let rows = parse_rows(&csv_content)
        .map_err(|e| ApiError::bad_request(format!("CSV inválido: {}", e)))?;
    let max_rows = config::config().import.max_rows_per_batch;
    if rows.len() > max_rows {
        return Err(ApiError::bad_request(format!(
            "El archivo excede el máximo de {} filas",
            max_rows
        )));
    }

    let default_currency = default_currency(&pool).await?;

    let store = PgImportStore::new(pool.clone());
    let opts = ImportOptions {
        project_id,
        update_existing: form.update_existing,
        dry_run: form.dry_run,
    };
    let result = run_import(&store, &rows, &default_currency, &opts).await;

    audit::record_import_batch(&pool, &user, project_id, &result).await;

    Ok(Json(batch_response(&result)))
}

/// Shape the batch outcome into the import response contract. The errors
/// array is omitted entirely when every row succeeded.
fn batch_response(result: &BatchResult) -> Value {
    let message = if result.dry_run {
        "Vista previa de importación (no se aplicaron cambios)".to_string()
    } else {
        format!(
            "Importación completada: {} exitosas, {} errores",
            result.successes(),
            result.errors()
        )
    };

    let mut body = json!({
        "success": true,
        "data": {
            "total_rows": result.total_rows,
            "created": result.created,
            "updated": result.updated,
            "errors": result.errors(),
            "dry_run": result.dry_run,
        },
        "message": message,
    });
    if !result.failures.is_empty() {
        body["errors"] = json!(result.failures);
    }
    body
}

async fn read_form(multipart: &mut Multipart) -> Result<ImportForm, ApiError> {
    let mut form = ImportForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Formulario inválido: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Formulario inválido: {}", e)))?;
        match name.as_str() {
            "file" => form.file = Some(value),
            "project_id" => {
                let id = value
                    .parse::<Uuid>()
                    .map_err(|_| ApiError::bad_request("project_id inválido"))?;
                form.project_id = Some(id);
            }
            "update_existing" => form.update_existing = value == "true",
            "dry_run" => form.dry_run = value == "true",
            _ => {}
        }
    }
    Ok(form)
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub project_id: Option<Uuid>,
    pub status: Option<String>,
    pub unit_type: Option<String>,
}

/// GET /api/units/export - filtered units as a text/csv attachment named
/// units_export_<timestamp>.csv
pub async fn export_units(
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    require_permission(&user, "units.view")?;
    let pool = DatabaseManager::pool().await?;

    let status = query
        .status
        .as_deref()
        .map(|raw| {
            UnitStatus::parse(&raw.to_uppercase())
                .ok_or_else(|| ApiError::bad_request(format!("Estado de unidad inválido: {}", raw)))
        })
        .transpose()?;
    let unit_type = query
        .unit_type
        .as_deref()
        .map(|raw| {
            UnitType::parse(&raw.to_uppercase())
                .ok_or_else(|| ApiError::bad_request(format!("Tipo de unidad inválido: {}", raw)))
        })
        .transpose()?;

    let mut qb = QueryBuilder::new(
        "SELECT u.sku, u.name, u.unit_type, u.status, u.price, \
                c.code AS currency_code, u.bedrooms, u.bathrooms, u.area_sqm, \
                u.floor, p.name AS project_name \
         FROM units u \
         JOIN projects p ON p.id = u.project_id \
         JOIN currencies c ON c.id = u.currency_id \
         WHERE p.organization_id = ",
    );
    qb.push_bind(user.organization_id);
    if let Some(project_id) = query.project_id {
        qb.push(" AND u.project_id = ");
        qb.push_bind(project_id);
    }
    if let Some(status) = status {
        qb.push(" AND u.status = ");
        qb.push_bind(status);
    }
    if let Some(unit_type) = unit_type {
        qb.push(" AND u.unit_type = ");
        qb.push_bind(unit_type);
    }
    qb.push(" ORDER BY p.name, u.sku");

    let rows: Vec<ExportRecord> = qb.build_query_as().fetch_all(&pool).await?;
    let export_rows: Vec<ExportRow> = rows.into_iter().map(ExportRecord::into_row).collect();

    let csv = write_units_csv(&export_rows)
        .map_err(|e| ApiError::internal_server_error(format!("Error al generar CSV: {}", e)))?;

    let filename = format!("units_export_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
    let response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    )
        .into_response();
    Ok(response)
}

#[derive(Debug, sqlx::FromRow)]
struct ExportRecord {
    sku: String,
    name: Option<String>,
    unit_type: UnitType,
    status: UnitStatus,
    price: rust_decimal::Decimal,
    currency_code: String,
    bedrooms: Option<i32>,
    bathrooms: Option<rust_decimal::Decimal>,
    area_sqm: Option<rust_decimal::Decimal>,
    floor: Option<i32>,
    project_name: String,
}

impl ExportRecord {
    fn into_row(self) -> ExportRow {
        ExportRow {
            sku: self.sku,
            name: self.name,
            unit_type: self.unit_type,
            status: self.status,
            price: self.price,
            currency_code: self.currency_code,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            area_sqm: self.area_sqm,
            floor: self.floor,
            project_name: self.project_name,
        }
    }
}

async fn assert_project_in_org(
    pool: &PgPool,
    organization_id: Uuid,
    project_id: Uuid,
) -> Result<(), ApiError> {
    let found: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM projects WHERE id = $1 AND organization_id = $2")
            .bind(project_id)
            .bind(organization_id)
            .fetch_optional(pool)
            .await?;
    found.map(|_| ()).ok_or_else(|| ApiError::not_found("Proyecto no encontrado"))
}

async fn default_currency(pool: &PgPool) -> Result<Currency, ApiError> {
    let code = &config::config().import.default_currency;
    sqlx::query_as::<_, Currency>("SELECT * FROM currencies WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| {
            ApiError::internal_server_error(format!("Moneda por defecto no configurada: {}", code))
        })
}
