// Shopstock CLI
// `init` creates and seeds a store, `stock` prints the derived stock
// report, `bom <product-code>` prints a product's requirements.

use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

use shopstock::{db, ledger};

fn db_path() -> PathBuf {
    env::var("SHOPSTOCK_DB")
        .unwrap_or_else(|_| "shopstock.db".to_string())
        .into()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("init") => run_init(),
        Some("stock") => run_stock(),
        Some("bom") => match args.get(2) {
            Some(code) => run_bom(code),
            None => bail!("usage: shopstock bom <product-code>"),
        },
        _ => {
            eprintln!("shopstock {}", shopstock::VERSION);
            eprintln!("usage: shopstock <init|stock|bom>");
            eprintln!("  init              create the database and seed the demo catalog");
            eprintln!("  stock             print the stock report");
            eprintln!("  bom <code>        print a product's bill of materials");
            eprintln!();
            eprintln!("database path comes from SHOPSTOCK_DB (default ./shopstock.db)");
            Ok(())
        }
    }
}

fn run_init() -> Result<()> {
    let path = db_path();
    let mut conn = db::open(&path)?;
    db::seed_demo(&mut conn)?;
    println!("store ready at {}", path.display());
    Ok(())
}

fn run_stock() -> Result<()> {
    let conn = db::open(&db_path())?;
    let rows = ledger::list_stock(&conn)?;

    println!(
        "{:<12} {:<28} {:>10} {:>10} {:>12}",
        "SKU", "NAME", "ON HAND", "AVG COST", "VALUE"
    );
    for row in rows {
        println!(
            "{:<12} {:<28} {:>10.3} {:>10.4} {:>12.2}",
            row.sku, row.name, row.on_hand, row.avg_cost, row.stock_value
        );
    }
    Ok(())
}

fn run_bom(code: &str) -> Result<()> {
    let conn = db::open(&db_path())?;
    let product = shopstock::get_product_by_code(&conn, code)?;
    println!("{} ({})", product.name, product.code);
    for line in shopstock::list_bom(&conn, code)? {
        println!("  {:<28} {:>8.3} {} [{}]", line.name, line.qty_per, line.unit, line.sku);
    }
    Ok(())
}
