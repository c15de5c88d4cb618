use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::database::models::{UnitStatus, UnitType};

/// Spanish unit-type labels accepted in the `Tipo` column
const UNIT_TYPE_LABELS: &[(&str, UnitType)] = &[
    ("DEPARTAMENTO", UnitType::Apartment),
    ("CASA", UnitType::House),
    ("COMERCIAL", UnitType::Commercial),
    ("TERRENO", UnitType::Land),
    ("OFICINA", UnitType::Office),
    ("ESTACIONAMIENTO", UnitType::Parking),
    ("BODEGA", UnitType::Storage),
];

/// Spanish status labels accepted in the `Estado` column
const STATUS_LABELS: &[(&str, UnitStatus)] = &[
    ("DISPONIBLE", UnitStatus::Available),
    ("RESERVADO", UnitStatus::Reserved),
    ("VENDIDO", UnitStatus::Sold),
    ("NO DISPONIBLE", UnitStatus::Unavailable),
];

pub const MSG_SKU_PRICE_REQUIRED: &str = "SKU y Precio son campos requeridos";

/// One CSV record as a header-label -> raw-value mapping
#[derive(Debug, Clone, Default)]
pub struct InputRow {
    fields: HashMap<String, String>,
}

impl InputRow {
    pub fn new(headers: &csv::StringRecord, record: &csv::StringRecord) -> Self {
        let mut fields = HashMap::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            fields.insert(header.trim().to_string(), value.trim().to_string());
        }
        Self { fields }
    }

    /// Build a row directly from label/value pairs (tests, programmatic input)
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { fields }
    }

    /// Value under a column label; blank cells read as absent
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// Parse a full CSV document (header row required) into input rows.
/// Empty lines are skipped; cells are trimmed.
pub fn parse_rows(csv_content: &str) -> Result<Vec<InputRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(csv_content.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        rows.push(InputRow::new(&headers, &record));
    }
    Ok(rows)
}

/// Three-step unit-type resolution: Spanish label (or English code) in the
/// primary column, then the explicit `TipoEN` column, then APARTMENT.
pub fn resolve_unit_type(tipo: Option<&str>, tipo_en: Option<&str>) -> UnitType {
    if let Some(label) = tipo {
        let upper = label.to_uppercase();
        if let Some((_, t)) = UNIT_TYPE_LABELS.iter().find(|(l, _)| *l == upper) {
            return *t;
        }
        // Exports write the English code in the same column; accept it back
        if let Some(t) = UnitType::parse(&upper) {
            return t;
        }
    }
    tipo_en
        .and_then(|code| UnitType::parse(&code.to_uppercase()))
        .unwrap_or(UnitType::Apartment)
}

/// Three-step status resolution mirroring `resolve_unit_type`, defaulting
/// to AVAILABLE.
pub fn resolve_status(estado: Option<&str>, estado_en: Option<&str>) -> UnitStatus {
    if let Some(label) = estado {
        let upper = label.to_uppercase();
        if let Some((_, s)) = STATUS_LABELS.iter().find(|(l, _)| *l == upper) {
            return *s;
        }
        if let Some(s) = UnitStatus::parse(&upper) {
            return s;
        }
    }
    estado_en
        .and_then(|code| UnitStatus::parse(&code.to_uppercase()))
        .unwrap_or(UnitStatus::Available)
}

/// A fully-mapped unit ready for reconciliation against storage
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCandidate {
    pub sku: String,
    pub name: Option<String>,
    pub unit_type: UnitType,
    pub status: UnitStatus,
    pub price: Decimal,
    /// Upper-cased `Moneda` value if one was given; resolved by the loop
    pub currency_code: Option<String>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<Decimal>,
    pub area_sqm: Option<Decimal>,
    pub floor: Option<i32>,
}

/// Map one input row to a unit candidate, or fail with a human-readable
/// reason. The SKU/Precio requirement is checked before anything else.
pub fn map_row(row: &InputRow) -> Result<UnitCandidate, String> {
    let sku = row.get("SKU");
    let price_raw = row.get("Precio");

    let (sku, price_raw) = match (sku, price_raw) {
        (Some(sku), Some(price)) => (sku, price),
        _ => return Err(MSG_SKU_PRICE_REQUIRED.to_string()),
    };

    let price = parse_decimal(price_raw, "Precio")?;

    let unit_type = resolve_unit_type(row.get("Tipo"), row.get("TipoEN"));
    let status = resolve_status(row.get("Estado"), row.get("EstadoEN"));

    Ok(UnitCandidate {
        sku: sku.to_string(),
        name: row.get("Nombre").map(str::to_string),
        unit_type,
        status,
        price,
        currency_code: row.get("Moneda").map(|c| c.to_uppercase()),
        bedrooms: parse_optional_int(row.get("Habitaciones"), "Habitaciones")?,
        bathrooms: parse_optional_decimal(row.get("Baños").or_else(|| row.get("Banos")), "Baños")?,
        area_sqm: parse_optional_decimal(row.get("Área M²").or_else(|| row.get("AreaM2")), "Área M²")?,
        floor: parse_optional_int(row.get("Piso"), "Piso")?,
    })
}

fn parse_decimal(value: &str, column: &str) -> Result<Decimal, String> {
    value.parse::<Decimal>().map_err(|_| format!("Valor inválido en {}: {}", column, value))
}

fn parse_optional_decimal(value: Option<&str>, column: &str) -> Result<Option<Decimal>, String> {
    value.map(|v| parse_decimal(v, column)).transpose()
}

fn parse_optional_int(value: Option<&str>, column: &str) -> Result<Option<i32>, String> {
    value
        .map(|v| v.parse::<i32>().map_err(|_| format!("Valor inválido en {}: {}", column, v)))
        .transpose()
}
