//! Seed the catalog with demo data.
//!
//! Inserts a small set of products, variants, and coupons so a fresh
//! database has something to sell. Intended for local development and
//! staging, never production.
//!
//! Seeding is idempotent: products and variants are skipped when a row
//! with the same natural key already exists, and coupons insert with
//! `ON CONFLICT DO NOTHING` on their unique code.

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use tracing::info;

use marram_goods_storefront::db;

/// Seed demo catalog data.
///
/// # Arguments
///
/// * `clear` - If true, wipe catalog tables before seeding. The cascade
///   also empties cart lines that reference the catalog; orders keep
///   their line snapshots.
///
/// # Errors
///
/// Returns an error if environment variables are missing or database
/// operations fail.
pub async fn run(clear: bool) -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let database_url = std::env::var("STOREFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| "STOREFRONT_DATABASE_URL not set")?;

    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    if clear {
        sqlx::query("TRUNCATE products, product_variants, coupons RESTART IDENTITY CASCADE")
            .execute(&pool)
            .await?;
        info!("Cleared existing catalog");
    }

    let (products, products_skipped) = seed_products(&pool).await?;
    let (variants, variants_skipped) = seed_variants(&pool).await?;
    let coupons = seed_coupons(&pool).await?;

    info!("Seeding complete!");
    info!("  Products inserted: {products} (skipped: {products_skipped})");
    info!("  Variants inserted: {variants} (skipped: {variants_skipped})");
    info!("  Coupons inserted: {coupons}");

    Ok(())
}

async fn seed_products(pool: &PgPool) -> Result<(u64, u64), sqlx::Error> {
    let rows = [
        ("Harbor Mug", "Stoneware mug, 350ml", Decimal::new(2400, 2), 40),
        ("Field Notebook", "A5 dot grid, 96 pages", Decimal::new(1250, 2), 120),
        ("Wool Throw", "Lambswool, 130x180cm", Decimal::new(10000, 2), 5),
        ("Trail Candle", "Soy wax, pine and cedar", Decimal::new(1800, 2), 60),
        // Base row for the variant product; stock lives on the variants.
        ("Canvas Jacket", "Waxed cotton, brass hardware", Decimal::new(9000, 2), 0),
    ];

    let mut inserted = 0;
    let mut skipped = 0;
    for (name, description, price, stock) in rows {
        let existing: Option<i32> = sqlx::query_scalar("SELECT id FROM products WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await?;
        if existing.is_some() {
            skipped += 1;
            continue;
        }

        sqlx::query("INSERT INTO products (name, description, price, stock) VALUES ($1, $2, $3, $4)")
            .bind(name)
            .bind(description)
            .bind(price)
            .bind(stock)
            .execute(pool)
            .await?;
        inserted += 1;
    }

    Ok((inserted, skipped))
}

async fn seed_variants(pool: &PgPool) -> Result<(u64, u64), sqlx::Error> {
    let product_id: Option<i32> = sqlx::query_scalar("SELECT id FROM products WHERE name = $1")
        .bind("Canvas Jacket")
        .fetch_optional(pool)
        .await?;
    let Some(product_id) = product_id else {
        return Ok((0, 0));
    };

    let rows = [
        ("S", "Olive", Decimal::new(9000, 2), 12),
        ("M", "Olive", Decimal::new(9000, 2), 18),
        ("M", "Navy", Decimal::new(9200, 2), 2),
        ("L", "Navy", Decimal::new(9200, 2), 9),
    ];

    let mut inserted = 0;
    let mut skipped = 0;
    for (size, color, price, stock) in rows {
        let existing: Option<i32> = sqlx::query_scalar(
            "SELECT id FROM product_variants WHERE product_id = $1 AND size = $2 AND color = $3",
        )
        .bind(product_id)
        .bind(size)
        .bind(color)
        .fetch_optional(pool)
        .await?;
        if existing.is_some() {
            skipped += 1;
            continue;
        }

        sqlx::query(
            "INSERT INTO product_variants (product_id, size, color, price, stock) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(product_id)
        .bind(size)
        .bind(color)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await?;
        inserted += 1;
    }

    Ok((inserted, skipped))
}

async fn seed_coupons(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let rows = [
        ("WELCOME10", 10, Decimal::new(10000, 2), None::<i32>),
        ("SPRING15", 15, Decimal::new(5000, 2), Some(500)),
    ];

    let mut inserted = 0;
    for (code, percent, min_order, usage_limit) in rows {
        let result = sqlx::query(
            "INSERT INTO coupons \
             (code, discount_percent, min_order_amount, valid_from, valid_to, usage_limit) \
             VALUES ($1, $2, $3, now(), now() + interval '1 year', $4) \
             ON CONFLICT (code) DO NOTHING",
        )
        .bind(code)
        .bind(percent)
        .bind(min_order)
        .bind(usage_limit)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}
