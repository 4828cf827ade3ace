// Stock ledger: signed moves, on-hand derivation, stock listing
//
// The stock_moves table is the single source of truth for on-hand
// quantity. Rows are append-only; on-hand is always derived by summing,
// never kept in a mutable counter.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::catalog;
use crate::error::{Result, StockError};

/// Ledger move reasons. Stored verbatim, case-sensitive. The suffixed
/// adjust variants exist so manual callers can pick the sign explicitly;
/// plain ADJUST carries its sign in the quantity. String conversion goes
/// through as_str/FromStr only, so the wire vocabulary is the one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveReason {
    Receive,
    Issue,
    Adjust,
    AdjustIn,
    AdjustOut,
    WoIssue,
    WoReturn,
}

impl MoveReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveReason::Receive => "RECEIVE",
            MoveReason::Issue => "ISSUE",
            MoveReason::Adjust => "ADJUST",
            MoveReason::AdjustIn => "ADJUST+",
            MoveReason::AdjustOut => "ADJUST-",
            MoveReason::WoIssue => "WO-ISSUE",
            MoveReason::WoReturn => "WO-RETURN",
        }
    }

    /// True for reasons that mean stock leaves; these store -abs(qty).
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            MoveReason::Issue | MoveReason::WoIssue | MoveReason::AdjustOut
        )
    }
}

impl fmt::Display for MoveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoveReason {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RECEIVE" => Ok(MoveReason::Receive),
            "ISSUE" => Ok(MoveReason::Issue),
            "ADJUST" => Ok(MoveReason::Adjust),
            "ADJUST+" => Ok(MoveReason::AdjustIn),
            "ADJUST-" => Ok(MoveReason::AdjustOut),
            "WO-ISSUE" => Ok(MoveReason::WoIssue),
            "WO-RETURN" => Ok(MoveReason::WoReturn),
            other => Err(StockError::validation(format!("unknown reason: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StockMove {
    pub id: i64,
    pub item_id: i64,
    pub batch_id: Option<i64>,
    /// Signed: positive inbound, negative outbound
    pub qty: f64,
    pub reason: String,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-item derived stock view: quantities rounded to 3 decimals, cost
/// to 4, value to 2, matching display conventions for quantity/currency.
#[derive(Debug, Clone, Serialize)]
pub struct StockRow {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub type_code: String,
    pub unit: String,
    pub on_hand: f64,
    pub avg_cost: f64,
    pub stock_value: f64,
}

pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Sum of all committed moves for an item; 0.0 when there are none.
pub fn on_hand(conn: &Connection, item_id: i64) -> Result<f64> {
    let sum: f64 = conn.query_row(
        "SELECT COALESCE(SUM(qty), 0) FROM stock_moves WHERE item_id = ?1",
        params![item_id],
        |row| row.get(0),
    )?;
    Ok(sum)
}

/// Low-level append. Writes the row exactly as given; sign conventions
/// are applied by the callers (record_move, costing, work orders).
pub(crate) fn append_move(
    conn: &Connection,
    item_id: i64,
    batch_id: Option<i64>,
    qty: f64,
    reason: MoveReason,
    reference: Option<&str>,
    at: DateTime<Utc>,
) -> Result<StockMove> {
    conn.execute(
        "INSERT INTO stock_moves(item_id, batch_id, qty, reason, ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![item_id, batch_id, qty, reason.as_str(), reference, at],
    )?;
    Ok(StockMove {
        id: conn.last_insert_rowid(),
        item_id,
        batch_id,
        qty,
        reason: reason.as_str().to_string(),
        reference: reference.map(str::to_string),
        created_at: at,
    })
}

/// Manual issue/adjust move. Outbound reasons store -abs(qty), all
/// others +abs(qty). There is deliberately no negative-stock guard:
/// issuing more than on-hand succeeds and drives on-hand negative.
pub fn record_move(
    conn: &Connection,
    sku: &str,
    qty: f64,
    reason: MoveReason,
    reference: Option<&str>,
) -> Result<StockMove> {
    if !qty.is_finite() || qty == 0.0 {
        return Err(StockError::validation("qty must be a non-zero number"));
    }
    let item = catalog::get_item_by_sku(conn, sku)?;

    let signed = if reason.is_outbound() {
        -qty.abs()
    } else {
        qty.abs()
    };
    let mv = append_move(conn, item.id, None, signed, reason, reference, Utc::now())?;
    info!(%sku, qty = signed, reason = %reason, "recorded stock move");
    Ok(mv)
}

/// All moves for an item, newest first. Audit view only.
pub fn moves_for_item(conn: &Connection, sku: &str) -> Result<Vec<StockMove>> {
    let item = catalog::get_item_by_sku(conn, sku)?;
    let mut stmt = conn.prepare(
        "SELECT id, item_id, batch_id, qty, reason, ref, created_at
         FROM stock_moves WHERE item_id = ?1 ORDER BY id DESC",
    )?;
    let moves = stmt
        .query_map(params![item.id], |row| {
            Ok(StockMove {
                id: row.get(0)?,
                item_id: row.get(1)?,
                batch_id: row.get(2)?,
                qty: row.get(3)?,
                reason: row.get(4)?,
                reference: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(moves)
}

/// Stock listing for every item, ordered by name. On-hand and value are
/// derived from the ledger at read time.
pub fn list_stock(conn: &Connection) -> Result<Vec<StockRow>> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.sku, i.name, t.code, i.unit,
                COALESCE((SELECT SUM(m.qty) FROM stock_moves m WHERE m.item_id = i.id), 0),
                i.avg_cost
         FROM items i JOIN item_types t ON t.id = i.type_id
         ORDER BY i.name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let on_hand: f64 = row.get(5)?;
            let avg_cost: f64 = row.get(6)?;
            Ok(StockRow {
                id: row.get(0)?,
                sku: row.get(1)?,
                name: row.get(2)?,
                type_code: row.get(3)?,
                unit: row.get(4)?,
                on_hand: round_to(on_hand, 3),
                avg_cost: round_to(avg_cost, 4),
                stock_value: round_to(on_hand * avg_cost, 2),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
