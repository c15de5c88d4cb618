// cli/seed.rs - baseline currency data

use anyhow::Result;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

struct SeedCurrency {
    code: &'static str,
    name: &'static str,
    symbol: &'static str,
    decimal_places: i32,
    /// Units of the currency per one USD
    rate_to_usd: &'static str,
}

const CURRENCIES: &[SeedCurrency] = &[
    SeedCurrency { code: "USD", name: "Dólar estadounidense", symbol: "$", decimal_places: 2, rate_to_usd: "1" },
    SeedCurrency { code: "CLP", name: "Peso chileno", symbol: "$", decimal_places: 0, rate_to_usd: "950" },
    SeedCurrency { code: "UF", name: "Unidad de Fomento", symbol: "UF", decimal_places: 4, rate_to_usd: "0.025" },
];

/// Upsert the baseline currencies. Re-running refreshes names and rates
/// without touching ids, so existing unit references stay valid.
pub async fn run(pool: &PgPool) -> Result<()> {
    for c in CURRENCIES {
        let rate: Decimal = c.rate_to_usd.parse()?;
        sqlx::query(
            r#"
            INSERT INTO currencies
                (id, code, name, symbol, decimal_places, exchange_rate_to_usd, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            ON CONFLICT (code) DO UPDATE
            SET name = EXCLUDED.name,
                symbol = EXCLUDED.symbol,
                decimal_places = EXCLUDED.decimal_places,
                exchange_rate_to_usd = EXCLUDED.exchange_rate_to_usd,
                is_active = TRUE
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(c.code)
        .bind(c.name)
        .bind(c.symbol)
        .bind(c.decimal_places)
        .bind(rate)
        .execute(pool)
        .await?;
        info!(code = c.code, "currency seeded");
    }
    Ok(())
}
