use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::database::models::Currency;
use crate::import::row::{map_row, InputRow};
use crate::import::store::ImportStore;

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub project_id: Uuid,
    pub update_existing: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowAction {
    Created,
    Upserted,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RowFailure {
    /// 1-indexed display row number (header line is row 1)
    pub row: usize,
    pub sku: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub total_rows: usize,
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<RowFailure>,
    pub dry_run: bool,
}

impl BatchResult {
    pub fn errors(&self) -> usize {
        self.failures.len()
    }

    pub fn successes(&self) -> usize {
        self.created + self.updated
    }
}

/// Drive the reconciliation loop over all input rows, in file order.
///
/// Every per-row failure (validation, currency lookup, constraint
/// violation) is recorded against that row and processing continues; only
/// the caller aborts batches, and only before the first row.
pub async fn run_import<S: ImportStore + ?Sized>(
    store: &S,
    rows: &[InputRow],
    default_currency: &Currency,
    opts: &ImportOptions,
) -> BatchResult {
    let mut result = BatchResult {
        total_rows: rows.len(),
        created: 0,
        updated: 0,
        failures: Vec::new(),
        dry_run: opts.dry_run,
    };

    // SKUs created earlier in this batch. The store already reflects them
    // in live mode; in dry-run mode this set is what keeps classification
    // identical to a live run (a later duplicate row must see the earlier
    // create).
    let mut created_this_batch: HashSet<String> = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        // Row 1 is the header line, data starts at display row 2
        let row_number = index + 2;

        match process_row(store, row, default_currency, opts, &mut created_this_batch).await {
            Ok(RowAction::Created) => result.created += 1,
            Ok(RowAction::Upserted) => result.updated += 1,
            Err(reason) => result.failures.push(RowFailure {
                row: row_number,
                sku: row.get("SKU").map(str::to_string),
                error: reason,
            }),
        }
    }

    result
}

async fn process_row<S: ImportStore + ?Sized>(
    store: &S,
    row: &InputRow,
    default_currency: &Currency,
    opts: &ImportOptions,
    created_this_batch: &mut HashSet<String>,
) -> Result<RowAction, String> {
    let candidate = map_row(row)?;

    // Resolve currency: explicit code if recognized, default otherwise
    let currency_id = match candidate.currency_code.as_deref() {
        Some(code) if code != default_currency.code => {
            match store.find_currency(code).await.map_err(|e| e.to_string())? {
                Some(currency) => currency.id,
                None => default_currency.id,
            }
        }
        _ => default_currency.id,
    };

    let existing = store
        .find_unit(opts.project_id, &candidate.sku)
        .await
        .map_err(|e| e.to_string())?;
    let exists = existing.is_some() || created_this_batch.contains(&candidate.sku);

    if opts.update_existing && exists {
        if !opts.dry_run {
            if let Some(unit_id) = existing {
                store
                    .update_unit(unit_id, currency_id, &candidate)
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
        return Ok(RowAction::Upserted);
    }

    // A duplicate create would hit the (sku, project_id) unique constraint;
    // surface the same failure in dry-run mode without touching storage.
    if exists && opts.dry_run {
        return Err(crate::import::store::StoreError::DuplicateSku(candidate.sku).to_string());
    }

    if !opts.dry_run {
        store
            .create_unit(opts.project_id, currency_id, &candidate)
            .await
            .map_err(|e| e.to_string())?;
    }
    created_this_batch.insert(candidate.sku);
    Ok(RowAction::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{UnitStatus, UnitType};
    use crate::import::row::{parse_rows, UnitCandidate, MSG_SKU_PRICE_REQUIRED};
    use crate::import::store::StoreError;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct StoredUnit {
        id: Uuid,
        candidate: UnitCandidate,
        currency_id: Uuid,
    }

    /// In-memory stand-in for the units and currencies tables
    #[derive(Default)]
    struct MemoryStore {
        currencies: Vec<Currency>,
        units: Mutex<HashMap<(Uuid, String), StoredUnit>>,
    }

    impl MemoryStore {
        fn with_currencies(currencies: Vec<Currency>) -> Self {
            Self { currencies, units: Mutex::new(HashMap::new()) }
        }

        async fn unit_count(&self) -> usize {
            self.units.lock().await.len()
        }

        async fn unit(&self, project_id: Uuid, sku: &str) -> Option<UnitCandidate> {
            self.units
                .lock()
                .await
                .get(&(project_id, sku.to_string()))
                .map(|u| u.candidate.clone())
        }
    }

    #[async_trait]
    impl ImportStore for MemoryStore {
        async fn find_currency(&self, code: &str) -> Result<Option<Currency>, StoreError> {
            Ok(self.currencies.iter().find(|c| c.code == code).cloned())
        }

        async fn find_unit(&self, project_id: Uuid, sku: &str) -> Result<Option<Uuid>, StoreError> {
            Ok(self.units.lock().await.get(&(project_id, sku.to_string())).map(|u| u.id))
        }

        async fn create_unit(
            &self,
            project_id: Uuid,
            currency_id: Uuid,
            candidate: &UnitCandidate,
        ) -> Result<(), StoreError> {
            let mut units = self.units.lock().await;
            let key = (project_id, candidate.sku.clone());
            if units.contains_key(&key) {
                return Err(StoreError::DuplicateSku(candidate.sku.clone()));
            }
            units.insert(
                key,
                StoredUnit { id: Uuid::new_v4(), candidate: candidate.clone(), currency_id },
            );
            Ok(())
        }

        async fn update_unit(
            &self,
            unit_id: Uuid,
            currency_id: Uuid,
            candidate: &UnitCandidate,
        ) -> Result<(), StoreError> {
            let mut units = self.units.lock().await;
            let entry = units
                .values_mut()
                .find(|u| u.id == unit_id)
                .ok_or_else(|| StoreError::Database("unit vanished".into()))?;
            entry.candidate = candidate.clone();
            entry.currency_id = currency_id;
            Ok(())
        }
    }

    fn currency(code: &str, rate: &str) -> Currency {
        Currency {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: code.to_string(),
            symbol: "$".to_string(),
            decimal_places: 2,
            exchange_rate_to_usd: rate.parse().unwrap(),
            is_active: true,
        }
    }

    fn opts(project_id: Uuid, update_existing: bool, dry_run: bool) -> ImportOptions {
        ImportOptions { project_id, update_existing, dry_run }
    }

    #[tokio::test]
    async fn missing_sku_or_price_reported_and_nothing_written() {
        let store = MemoryStore::default();
        let usd = currency("USD", "1");
        let project = Uuid::new_v4();
        let rows = parse_rows("SKU,Precio\n,100\nA-1,\n").unwrap();

        let result = run_import(&store, &rows, &usd, &opts(project, false, false)).await;

        assert_eq!(result.total_rows, 2);
        assert_eq!(result.created, 0);
        assert_eq!(result.errors(), 2);
        for failure in &result.failures {
            assert_eq!(failure.error, MSG_SKU_PRICE_REQUIRED);
        }
        assert_eq!(store.unit_count().await, 0);
    }

    #[tokio::test]
    async fn row_numbers_are_index_plus_two() {
        let store = MemoryStore::default();
        let usd = currency("USD", "1");
        let rows = parse_rows("SKU,Precio\n,50000\nB-1,100\n,60000\n").unwrap();

        let result = run_import(&store, &rows, &usd, &opts(Uuid::new_v4(), false, false)).await;

        let failed_rows: Vec<usize> = result.failures.iter().map(|f| f.row).collect();
        assert_eq!(failed_rows, vec![2, 4]);
    }

    #[tokio::test]
    async fn mixed_batch_creates_upserts_and_skips_blank_sku() {
        // SKU,Precio / A-1,100000 / ,50000 / A-1,999 with update_existing
        let store = MemoryStore::default();
        let usd = currency("USD", "1");
        let project = Uuid::new_v4();
        let rows = parse_rows("SKU,Precio\nA-1,100000\n,50000\nA-1,999\n").unwrap();

        let result = run_import(&store, &rows, &usd, &opts(project, true, false)).await;

        assert_eq!(result.created, 1);
        assert_eq!(result.updated, 1);
        assert_eq!(result.errors(), 1);
        assert_eq!(result.failures[0].row, 3);
        assert_eq!(result.failures[0].sku, None);

        // The repeat row won: price ends at 999
        let unit = store.unit(project, "A-1").await.unwrap();
        assert_eq!(unit.price, Decimal::from(999));
    }

    #[tokio::test]
    async fn dry_run_counts_match_live_run_and_storage_untouched() {
        let csv = "SKU,Precio\nA-1,100000\n,50000\nA-1,999\nB-7,250\n";
        let usd = currency("USD", "1");
        let project = Uuid::new_v4();
        let rows = parse_rows(csv).unwrap();

        let dry_store = MemoryStore::default();
        let dry = run_import(&dry_store, &rows, &usd, &opts(project, true, true)).await;
        assert_eq!(dry_store.unit_count().await, 0, "dry run must not write");
        assert!(dry.dry_run);

        let live_store = MemoryStore::default();
        let live = run_import(&live_store, &rows, &usd, &opts(project, true, false)).await;

        assert_eq!(dry.created, live.created);
        assert_eq!(dry.updated, live.updated);
        assert_eq!(dry.errors(), live.errors());
        assert_eq!(live_store.unit_count().await, 2);
    }

    #[tokio::test]
    async fn dry_run_duplicate_create_classified_as_failure_like_live() {
        let csv = "SKU,Precio\nA-1,100\nA-1,200\n";
        let usd = currency("USD", "1");
        let project = Uuid::new_v4();
        let rows = parse_rows(csv).unwrap();

        let live_store = MemoryStore::default();
        let live = run_import(&live_store, &rows, &usd, &opts(project, false, false)).await;
        assert_eq!(live.created, 1);
        assert_eq!(live.errors(), 1);

        let dry_store = MemoryStore::default();
        let dry = run_import(&dry_store, &rows, &usd, &opts(project, false, true)).await;
        assert_eq!(dry.created, live.created);
        assert_eq!(dry.errors(), live.errors());
        assert_eq!(dry.failures[0].error, live.failures[0].error);
    }

    #[tokio::test]
    async fn second_import_with_update_existing_is_all_updates() {
        let csv = "SKU,Precio\nA-1,100\nA-2,200\nA-3,300\n";
        let store = MemoryStore::default();
        let usd = currency("USD", "1");
        let project = Uuid::new_v4();
        let rows = parse_rows(csv).unwrap();

        let first = run_import(&store, &rows, &usd, &opts(project, true, false)).await;
        assert_eq!(first.created, 3);
        assert_eq!(first.updated, 0);

        let second = run_import(&store, &rows, &usd, &opts(project, true, false)).await;
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 3);
        assert_eq!(second.errors(), 0);
        assert_eq!(store.unit_count().await, 3);
    }

    #[tokio::test]
    async fn duplicate_create_without_update_existing_fails_that_row_only() {
        let store = MemoryStore::default();
        let usd = currency("USD", "1");
        let project = Uuid::new_v4();
        let rows = parse_rows("SKU,Precio\nA-1,100\nA-1,200\nB-2,300\n").unwrap();

        let result = run_import(&store, &rows, &usd, &opts(project, false, false)).await;

        assert_eq!(result.created, 2);
        assert_eq!(result.errors(), 1);
        assert_eq!(result.failures[0].row, 3);
        assert!(result.failures[0].error.contains("A-1"));
        // First row's value survives
        let unit = store.unit(project, "A-1").await.unwrap();
        assert_eq!(unit.price, Decimal::from(100));
    }

    #[tokio::test]
    async fn currency_resolution_with_fallback_to_default() {
        let usd = currency("USD", "1");
        let clp = currency("CLP", "950");
        let clp_id = clp.id;
        let usd_id = usd.id;
        let store = MemoryStore::with_currencies(vec![usd.clone(), clp]);
        let project = Uuid::new_v4();

        let csv = "SKU,Precio,Moneda\nA-1,100,clp\nA-2,200,XXX\nA-3,300,\n";
        let rows = parse_rows(csv).unwrap();
        let result = run_import(&store, &rows, &usd, &opts(project, false, false)).await;
        assert_eq!(result.created, 3);

        let units = store.units.lock().await;
        let by_sku: HashMap<&str, &StoredUnit> =
            units.values().map(|u| (u.candidate.sku.as_str(), u)).collect();
        assert_eq!(by_sku["A-1"].currency_id, clp_id, "recognized code resolves");
        assert_eq!(by_sku["A-2"].currency_id, usd_id, "unknown code falls back");
        assert_eq!(by_sku["A-3"].currency_id, usd_id, "absent code falls back");
    }

    #[tokio::test]
    async fn enum_defaults_applied_during_import() {
        let store = MemoryStore::default();
        let usd = currency("USD", "1");
        let project = Uuid::new_v4();
        let csv = "SKU,Precio,Tipo,Estado\nA-1,100,DEPARTAMENTO,VENDIDO\nA-2,200,,\n";
        let rows = parse_rows(csv).unwrap();

        run_import(&store, &rows, &usd, &opts(project, false, false)).await;

        let a1 = store.unit(project, "A-1").await.unwrap();
        assert_eq!(a1.unit_type, UnitType::Apartment);
        assert_eq!(a1.status, UnitStatus::Sold);
        let a2 = store.unit(project, "A-2").await.unwrap();
        assert_eq!(a2.unit_type, UnitType::Apartment);
        assert_eq!(a2.status, UnitStatus::Available);
    }
}
