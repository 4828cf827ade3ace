// Products and bills of material
//
// A BOM line is the fixed per-unit requirement of one component item
// for one unit of a product; the (product, item) pair is unique.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use crate::catalog;
use crate::codes;
use crate::error::{map_unique_violation, Result, StockError};

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// BOM line joined with its component item, for listings
#[derive(Debug, Clone, Serialize)]
pub struct BomLineView {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub qty_per: f64,
}

/// Raw requirement used by work order completion
#[derive(Debug, Clone)]
pub(crate) struct BomRequirement {
    pub item_id: i64,
    pub qty_per: f64,
}

pub fn create_product(conn: &Connection, name: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(StockError::validation("name required"));
    }
    let code = codes::gen_product_code();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO products(code, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![code, name, now],
    )
    .map_err(|e| map_unique_violation(e, "product", &code))?;
    info!(%code, %name, "created product");
    Ok(code)
}

pub fn get_product_by_code(conn: &Connection, code: &str) -> Result<Product> {
    conn.query_row(
        "SELECT id, code, name, created_at, updated_at FROM products WHERE code = ?1",
        params![code],
        |row| {
            Ok(Product {
                id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| StockError::not_found("product", code))
}

pub fn list_products(conn: &Connection) -> Result<Vec<Product>> {
    let mut stmt = conn.prepare(
        "SELECT id, code, name, created_at, updated_at FROM products ORDER BY name",
    )?;
    let products = stmt
        .query_map([], |row| {
            Ok(Product {
                id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(products)
}

/// Add a component requirement. Fails with Duplicate if the product
/// already has a line for this item.
pub fn add_bom_line(
    conn: &Connection,
    product_code: &str,
    sku: &str,
    qty_per: f64,
) -> Result<()> {
    if !qty_per.is_finite() || qty_per <= 0.0 {
        return Err(StockError::validation("qty_per must be > 0"));
    }
    let product = get_product_by_code(conn, product_code)?;
    let item = catalog::get_item_by_sku(conn, sku)?;

    let now = Utc::now();
    let pair = format!("{}/{}", product.code, item.sku);
    conn.execute(
        "INSERT INTO bom(product_id, item_id, qty_per, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![product.id, item.id, qty_per, now],
    )
    .map_err(|e| map_unique_violation(e, "bom line", &pair))?;
    info!(product = %product.code, %sku, qty_per, "added bom line");
    Ok(())
}

/// Component requirements of a product, ordered by item name so the
/// listing (and completion order) is deterministic.
pub fn list_bom(conn: &Connection, product_code: &str) -> Result<Vec<BomLineView>> {
    let product = get_product_by_code(conn, product_code)?;
    let mut stmt = conn.prepare(
        "SELECT b.id, i.sku, i.name, i.unit, b.qty_per
         FROM bom b JOIN items i ON i.id = b.item_id
         WHERE b.product_id = ?1
         ORDER BY i.name",
    )?;
    let lines = stmt
        .query_map(params![product.id], |row| {
            Ok(BomLineView {
                id: row.get(0)?,
                sku: row.get(1)?,
                name: row.get(2)?,
                unit: row.get(3)?,
                qty_per: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lines)
}

/// Requirements by product id, same deterministic order as list_bom.
pub(crate) fn requirements(conn: &Connection, product_id: i64) -> Result<Vec<BomRequirement>> {
    let mut stmt = conn.prepare(
        "SELECT b.item_id, b.qty_per
         FROM bom b JOIN items i ON i.id = b.item_id
         WHERE b.product_id = ?1
         ORDER BY i.name",
    )?;
    let rows = stmt
        .query_map(params![product_id], |row| {
            Ok(BomRequirement {
                item_id: row.get(0)?,
                qty_per: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
