// Item catalog: classification types and items
//
// avg_cost lives on the item row but is written by the costing engine
// only (see costing.rs); everything here treats it as read-only.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use crate::codes;
use crate::error::{map_unique_violation, Result, StockError};

#[derive(Debug, Clone, Serialize)]
pub struct ItemType {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub type_id: i64,
    pub unit: String,
    /// Moving-average cost per unit; mutated only by the costing engine
    pub avg_cost: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item joined with its type code, for listings
#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub type_code: String,
    pub unit: String,
    pub avg_cost: f64,
}

pub fn create_item_type(conn: &Connection, code: &str, name: &str) -> Result<ItemType> {
    if code.trim().is_empty() || name.trim().is_empty() {
        return Err(StockError::validation("code and name required"));
    }
    let code = code.trim().to_uppercase();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO item_types(code, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![code, name, now],
    )
    .map_err(|e| map_unique_violation(e, "item type", &code))?;

    let id = conn.last_insert_rowid();
    info!(%code, "created item type");
    Ok(ItemType {
        id,
        code,
        name: name.to_string(),
        created_at: now,
        updated_at: now,
    })
}

pub fn list_item_types(conn: &Connection) -> Result<Vec<ItemType>> {
    let mut stmt = conn.prepare(
        "SELECT id, code, name, created_at, updated_at FROM item_types ORDER BY name",
    )?;
    let types = stmt
        .query_map([], |row| {
            Ok(ItemType {
                id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(types)
}

pub fn get_item_type_by_code(conn: &Connection, code: &str) -> Result<Option<ItemType>> {
    conn.query_row(
        "SELECT id, code, name, created_at, updated_at FROM item_types WHERE code = ?1",
        params![code],
        |row| {
            Ok(ItemType {
                id: row.get(0)?,
                code: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
                updated_at: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(StockError::Db)
}

/// Create an item under an existing type; the SKU is generated from the
/// type code. `unit` defaults to `pcs`.
pub fn create_item(
    conn: &Connection,
    name: &str,
    type_code: &str,
    unit: Option<&str>,
) -> Result<Item> {
    if name.trim().is_empty() || type_code.trim().is_empty() {
        return Err(StockError::validation("name and type_code required"));
    }
    let type_code = type_code.trim().to_uppercase();
    let item_type = get_item_type_by_code(conn, &type_code)?
        .ok_or_else(|| StockError::not_found("item type", &type_code))?;

    let sku = codes::gen_sku(&item_type.code);
    let unit = unit.unwrap_or("pcs");
    let now = Utc::now();

    conn.execute(
        "INSERT INTO items(sku, name, type_id, unit, avg_cost, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
        params![sku, name, item_type.id, unit, now],
    )
    .map_err(|e| map_unique_violation(e, "item", &sku))?;

    let id = conn.last_insert_rowid();
    info!(%sku, %name, "created item");
    Ok(Item {
        id,
        sku,
        name: name.to_string(),
        type_id: item_type.id,
        unit: unit.to_string(),
        avg_cost: 0.0,
        created_at: now,
        updated_at: now,
    })
}

fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        sku: row.get(1)?,
        name: row.get(2)?,
        type_id: row.get(3)?,
        unit: row.get(4)?,
        avg_cost: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const ITEM_COLUMNS: &str = "id, sku, name, type_id, unit, avg_cost, created_at, updated_at";

pub fn get_item_by_sku(conn: &Connection, sku: &str) -> Result<Item> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM items WHERE sku = ?1"),
        params![sku],
        item_from_row,
    )
    .optional()?
    .ok_or_else(|| StockError::not_found("item", sku))
}

pub fn get_item_by_id(conn: &Connection, id: i64) -> Result<Item> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
        params![id],
        item_from_row,
    )
    .optional()?
    .ok_or_else(|| StockError::not_found("item", id.to_string()))
}

pub fn list_items(conn: &Connection) -> Result<Vec<ItemView>> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.sku, i.name, t.code, i.unit, i.avg_cost
         FROM items i JOIN item_types t ON t.id = i.type_id
         ORDER BY i.id DESC",
    )?;
    let items = stmt
        .query_map([], |row| {
            Ok(ItemView {
                id: row.get(0)?,
                sku: row.get(1)?,
                name: row.get(2)?,
                type_code: row.get(3)?,
                unit: row.get(4)?,
                avg_cost: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Lookup used by the demo seed, where items are addressed by name.
pub(crate) fn sku_by_name(conn: &Connection, name: &str) -> Result<String> {
    conn.query_row(
        "SELECT sku FROM items WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StockError::not_found("item", name))
}
