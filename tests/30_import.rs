mod common;

use anyhow::Result;
use reqwest::multipart;
use reqwest::StatusCode;
use serde_json::{json, Value};

struct Session {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    project_id: String,
}

impl Session {
    /// Fresh organization, admin user and one project
    async fn bootstrap(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::new();
        let tag = {
            use std::time::{SystemTime, UNIX_EPOCH};
            let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.subsec_nanos();
            format!("{}{}", std::process::id(), nanos)
        };

        let resp = client
            .post(format!("{}/auth/register", base_url))
            .json(&json!({
                "email": format!("importer+{}@test.cl", tag),
                "password": "Password1",
                "organization_name": format!("Importadora {}", tag)
            }))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await?;
        let access_token = body["data"]["tokens"]["accessToken"].as_str().unwrap().to_string();

        let resp = client
            .post(format!("{}/api/projects", base_url))
            .bearer_auth(&access_token)
            .json(&json!({"name": format!("Proyecto {}", tag)}))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await?;
        let project_id = body["data"]["id"].as_str().unwrap().to_string();

        Ok(Self { client, base_url: base_url.to_string(), access_token, project_id })
    }

    async fn import(&self, csv: &str, update_existing: bool, dry_run: bool) -> Result<Value> {
        let form = multipart::Form::new()
            .text("file", csv.to_string())
            .text("project_id", self.project_id.clone())
            .text("update_existing", update_existing.to_string())
            .text("dry_run", dry_run.to_string());

        let resp = self
            .client
            .post(format!("{}/api/units/import", self.base_url))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);
        Ok(resp.json().await?)
    }

    /// Audit actions visible on the org dashboard, newest first
    async fn audit_actions(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(format!("{}/api/analytics/dashboard", self.base_url))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await?;
        Ok(body["data"]["recent_activity"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["action"].as_str().unwrap().to_string())
            .collect())
    }
}

#[tokio::test]
async fn import_reports_per_row_outcomes() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_available(server).await {
        eprintln!("skipping: no database behind test server");
        return Ok(());
    }
    let session = Session::bootstrap(&server.base_url).await?;

    let csv = "SKU,Nombre,Tipo,Estado,Precio\n\
               A-101,Depto 101,DEPARTAMENTO,DISPONIBLE,120000\n\
               ,Sin SKU,,,50000\n\
               A-101,Depto 101 rev,DEPARTAMENTO,RESERVADO,125000\n";

    let body = session.import(csv, true, false).await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["total_rows"], json!(3));
    assert_eq!(body["data"]["created"], json!(1));
    assert_eq!(body["data"]["updated"], json!(1));
    assert_eq!(body["data"]["errors"], json!(1));
    assert_eq!(body["errors"][0]["row"], json!(3));
    assert_eq!(body["errors"][0]["error"], json!("SKU y Precio son campos requeridos"));
    Ok(())
}

#[tokio::test]
async fn dry_run_matches_live_and_writes_nothing() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_available(server).await {
        eprintln!("skipping: no database behind test server");
        return Ok(());
    }
    let session = Session::bootstrap(&server.base_url).await?;

    let csv = "SKU,Precio\nB-1,100\nB-2,200\nB-1,300\n";

    let preview = session.import(csv, false, true).await?;
    assert_eq!(preview["data"]["dry_run"], json!(true));
    assert_eq!(preview["message"], json!("Vista previa de importación (no se aplicaron cambios)"));

    // Nothing persisted by the preview
    let resp = session
        .client
        .get(format!("{}/api/units?project_id={}", session.base_url, session.project_id))
        .bearer_auth(&session.access_token)
        .send()
        .await?;
    let listing: Value = resp.json().await?;
    assert_eq!(listing["data"]["total"], json!(0));

    // No audit trail from a preview either
    assert!(!session.audit_actions().await?.contains(&"IMPORT".to_string()));

    let live = session.import(csv, false, false).await?;
    assert_eq!(live["data"]["created"], preview["data"]["created"]);
    assert_eq!(live["data"]["updated"], preview["data"]["updated"]);
    assert_eq!(live["data"]["errors"], preview["data"]["errors"]);

    // The live batch wrote units, so it leaves exactly one audit entry
    let actions = session.audit_actions().await?;
    assert_eq!(actions.iter().filter(|a| *a == "IMPORT").count(), 1);
    Ok(())
}

#[tokio::test]
async fn export_round_trips_through_import() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::database_available(server).await {
        eprintln!("skipping: no database behind test server");
        return Ok(());
    }
    let session = Session::bootstrap(&server.base_url).await?;

    let csv = "SKU,Nombre,Tipo,Estado,Precio,Habitaciones,Baños,Área M²,Piso\n\
               C-1,Casa 1,CASA,VENDIDO,250000,4,2.5,120.5,1\n";
    let body = session.import(csv, false, false).await?;
    assert_eq!(body["data"]["created"], json!(1));

    let resp = session
        .client
        .get(format!("{}/api/units/export?project_id={}", session.base_url, session.project_id))
        .bearer_auth(&session.access_token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()["content-type"].to_str()?.to_string();
    assert!(content_type.starts_with("text/csv"));
    let disposition = resp.headers()["content-disposition"].to_str()?.to_string();
    assert!(disposition.contains("units_export_"));

    let exported = resp.text().await?;
    let mut lines = exported.lines();
    assert_eq!(
        lines.next().unwrap(),
        "SKU,Nombre,Tipo,Estado,Precio,Moneda,Habitaciones,Baños,Área M²,Piso,Proyecto"
    );
    let data = lines.next().unwrap();
    assert!(data.starts_with("C-1,Casa 1,HOUSE,SOLD,"));

    // The exported file imports cleanly as an upsert
    let body = session.import(&exported, true, false).await?;
    assert_eq!(body["data"]["updated"], json!(1));
    assert_eq!(body["data"]["errors"], json!(0));
    Ok(())
}
