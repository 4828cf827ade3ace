// Costing engine: batch receipts and moving-average cost
//
// A receipt is one atomic transaction: batch row + RECEIVE move +
// avg_cost update. The average only moves on receipt; issues and
// adjustments consume at the current average without touching it.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::info;

use crate::catalog;
use crate::codes;
use crate::error::{map_unique_violation, Result, StockError};
use crate::ledger::{self, MoveReason};

/// Immutable receipt record. A batch is history, not a mutable pool.
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub id: i64,
    pub code: String,
    pub item_id: i64,
    pub supplier: Option<String>,
    pub received_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub qty: f64,
    pub unit_cost: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ReceiveRequest<'a> {
    pub sku: &'a str,
    pub qty: f64,
    pub unit_cost: f64,
    pub supplier: Option<&'a str>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub batch_code: String,
    pub new_avg_cost: f64,
}

/// Moving-average recurrence. `onhand_old` is the ledger sum before the
/// receipt and may be negative (over-issued stock); a non-positive
/// denominator makes the weighted average meaningless, so the engine
/// resets to the incoming cost.
fn next_avg_cost(avg_cost_old: f64, onhand_old: f64, qty: f64, unit_cost: f64) -> f64 {
    let denom = onhand_old + qty;
    if denom > 0.0 {
        (avg_cost_old * onhand_old + qty * unit_cost) / denom
    } else {
        unit_cost
    }
}

/// Receive stock: creates the batch, appends the RECEIVE move, and
/// recomputes the item's moving-average cost, all in one transaction.
pub fn receive(conn: &mut Connection, req: ReceiveRequest<'_>) -> Result<Receipt> {
    if !req.qty.is_finite() || req.qty <= 0.0 {
        return Err(StockError::validation("qty must be > 0"));
    }
    if !req.unit_cost.is_finite() || req.unit_cost < 0.0 {
        return Err(StockError::validation("unit_cost must be >= 0"));
    }

    let tx = conn.transaction()?;
    let item = catalog::get_item_by_sku(&tx, req.sku)?;

    let now = Utc::now();
    let batch_code = codes::gen_batch_code();
    tx.execute(
        "INSERT INTO batches(code, item_id, supplier, received_at, expires_at, qty, unit_cost, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?4)",
        params![
            batch_code,
            item.id,
            req.supplier,
            now,
            req.expires_at,
            req.qty,
            req.unit_cost
        ],
    )
    .map_err(|e| map_unique_violation(e, "batch", &batch_code))?;
    let batch_id = tx.last_insert_rowid();

    ledger::append_move(
        &tx,
        item.id,
        Some(batch_id),
        req.qty.abs(),
        MoveReason::Receive,
        Some(&batch_code),
        now,
    )?;

    // The move is already staged in this transaction, so subtract it
    // back out to get the on-hand that existed before this receipt.
    let onhand_old = ledger::on_hand(&tx, item.id)? - req.qty;
    let new_avg = next_avg_cost(item.avg_cost, onhand_old, req.qty, req.unit_cost);

    tx.execute(
        "UPDATE items SET avg_cost = ?1, updated_at = ?2 WHERE id = ?3",
        params![new_avg, now, item.id],
    )?;

    tx.commit()?;
    info!(sku = %req.sku, qty = req.qty, batch = %batch_code, avg = new_avg, "received stock");
    Ok(Receipt {
        batch_code,
        new_avg_cost: new_avg,
    })
}

/// Batches for one item, newest first.
pub fn batches_for_item(conn: &Connection, sku: &str) -> Result<Vec<Batch>> {
    let item = catalog::get_item_by_sku(conn, sku)?;
    let mut stmt = conn.prepare(
        "SELECT id, code, item_id, supplier, received_at, expires_at, qty, unit_cost, created_at
         FROM batches WHERE item_id = ?1 ORDER BY id DESC",
    )?;
    let batches = stmt
        .query_map(params![item.id], |row| {
            Ok(Batch {
                id: row.get(0)?,
                code: row.get(1)?,
                item_id: row.get(2)?,
                supplier: row.get(3)?,
                received_at: row.get(4)?,
                expires_at: row.get(5)?,
                qty: row.get(6)?,
                unit_cost: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(batches)
}
