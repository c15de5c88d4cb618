use rust_decimal::Decimal;

use crate::database::models::{UnitStatus, UnitType};

/// Fixed export column set. Order and labels are the external contract:
/// an exported file must be accepted unchanged by the import endpoint.
pub const EXPORT_COLUMNS: [&str; 11] = [
    "SKU",
    "Nombre",
    "Tipo",
    "Estado",
    "Precio",
    "Moneda",
    "Habitaciones",
    "Baños",
    "Área M²",
    "Piso",
    "Proyecto",
];

/// One unit flattened with its currency and project join fields
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub sku: String,
    pub name: Option<String>,
    pub unit_type: UnitType,
    pub status: UnitStatus,
    pub price: Decimal,
    pub currency_code: String,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<Decimal>,
    pub area_sqm: Option<Decimal>,
    pub floor: Option<i32>,
    pub project_name: String,
}

/// Serialize units to CSV with the fixed column set. Absent optional
/// fields are written as empty cells so a re-import maps them to null.
pub fn write_units_csv(rows: &[ExportRow]) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(EXPORT_COLUMNS)?;

    for row in rows {
        writer.write_record([
            row.sku.as_str(),
            row.name.as_deref().unwrap_or(""),
            row.unit_type.as_str(),
            row.status.as_str(),
            &row.price.to_string(),
            row.currency_code.as_str(),
            &opt_string(row.bedrooms),
            &opt_string(row.bathrooms),
            &opt_string(row.area_sqm),
            &opt_string(row.floor),
            row.project_name.as_str(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    // The writer only ever receives UTF-8 input
    Ok(String::from_utf8(bytes).unwrap_or_default())
}

fn opt_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::row::{map_row, parse_rows};

    fn sample_row() -> ExportRow {
        ExportRow {
            sku: "T2-401".to_string(),
            name: Some("Torre 2 depto 401".to_string()),
            unit_type: UnitType::Apartment,
            status: UnitStatus::Reserved,
            price: "185000.50".parse().unwrap(),
            currency_code: "USD".to_string(),
            bedrooms: Some(2),
            bathrooms: Some("1.5".parse().unwrap()),
            area_sqm: Some("68.4".parse().unwrap()),
            floor: Some(4),
            project_name: "Mirador Norte".to_string(),
        }
    }

    #[test]
    fn header_row_matches_contract_exactly() {
        let csv = write_units_csv(&[]).unwrap();
        assert_eq!(csv.lines().next().unwrap(), "SKU,Nombre,Tipo,Estado,Precio,Moneda,Habitaciones,Baños,Área M²,Piso,Proyecto");
    }

    #[test]
    fn absent_optionals_become_empty_cells() {
        let mut row = sample_row();
        row.name = None;
        row.bedrooms = None;
        row.bathrooms = None;
        row.area_sqm = None;
        row.floor = None;

        let csv = write_units_csv(&[row]).unwrap();
        let data_line = csv.lines().nth(1).unwrap();
        assert_eq!(data_line, "T2-401,,APARTMENT,RESERVED,185000.50,USD,,,,,Mirador Norte");
    }

    #[test]
    fn export_then_import_preserves_the_unit() {
        let exported = sample_row();
        let csv = write_units_csv(&[exported.clone()]).unwrap();

        let rows = parse_rows(&csv).unwrap();
        assert_eq!(rows.len(), 1);
        let candidate = map_row(&rows[0]).unwrap();

        assert_eq!(candidate.sku, exported.sku);
        assert_eq!(candidate.name.as_deref(), exported.name.as_deref());
        assert_eq!(candidate.unit_type, exported.unit_type);
        assert_eq!(candidate.status, exported.status);
        assert_eq!(candidate.price, exported.price);
        assert_eq!(candidate.currency_code.as_deref(), Some("USD"));
        assert_eq!(candidate.bedrooms, exported.bedrooms);
        assert_eq!(candidate.bathrooms, exported.bathrooms);
        assert_eq!(candidate.area_sqm, exported.area_sqm);
        assert_eq!(candidate.floor, exported.floor);
    }
}
