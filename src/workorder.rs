// Work orders: OPEN -> DONE state machine and BOM explosion
//
// Completion is the other multi-row transaction in the system: one
// WO-ISSUE move per BOM line plus the status flip commit together or
// not at all. Double completion is rejected by the OPEN precondition,
// checked inside the same transaction that writes the moves.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::bom;
use crate::codes;
use crate::error::{Result, StockError};
use crate::ledger::{self, MoveReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkOrderStatus {
    Open,
    Done,
    /// Terminal alternative; reserved, no transition produces it here
    Canceled,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Open => "OPEN",
            WorkOrderStatus::Done => "DONE",
            WorkOrderStatus::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkOrderStatus {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "OPEN" => Ok(WorkOrderStatus::Open),
            "DONE" => Ok(WorkOrderStatus::Done),
            "CANCELED" => Ok(WorkOrderStatus::Canceled),
            other => Err(StockError::validation(format!(
                "unknown work order status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkOrder {
    pub id: i64,
    pub code: String,
    pub product_id: i64,
    pub quantity: f64,
    pub status: WorkOrderStatus,
    pub planned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn wo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkOrder> {
    let status_str: String = row.get(4)?;
    let status = status_str.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("bad work order status: {status_str}").into(),
        )
    })?;
    Ok(WorkOrder {
        id: row.get(0)?,
        code: row.get(1)?,
        product_id: row.get(2)?,
        quantity: row.get(3)?,
        status,
        planned_at: row.get(5)?,
        completed_at: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const WO_COLUMNS: &str =
    "id, code, product_id, quantity, status, planned_at, completed_at, created_at, updated_at";

/// Create a work order in OPEN state for an existing product.
pub fn create_work_order(
    conn: &Connection,
    product_code: &str,
    quantity: f64,
    planned_at: Option<DateTime<Utc>>,
) -> Result<WorkOrder> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(StockError::validation("quantity must be > 0"));
    }
    let product = bom::get_product_by_code(conn, product_code)?;

    let code = codes::gen_wo_code();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO work_orders(code, product_id, quantity, status, planned_at, completed_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?6)",
        params![
            code,
            product.id,
            quantity,
            WorkOrderStatus::Open.as_str(),
            planned_at,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(%code, product = %product.code, quantity, "created work order");
    Ok(WorkOrder {
        id,
        code,
        product_id: product.id,
        quantity,
        status: WorkOrderStatus::Open,
        planned_at,
        completed_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_work_order_by_code(conn: &Connection, code: &str) -> Result<WorkOrder> {
    conn.query_row(
        &format!("SELECT {WO_COLUMNS} FROM work_orders WHERE code = ?1"),
        params![code],
        wo_from_row,
    )
    .optional()?
    .ok_or_else(|| StockError::not_found("work order", code))
}

pub fn list_work_orders(conn: &Connection) -> Result<Vec<WorkOrder>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {WO_COLUMNS} FROM work_orders ORDER BY id DESC"
    ))?;
    let orders = stmt
        .query_map([], wo_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(orders)
}

/// Complete a work order: issue every BOM component scaled by the order
/// quantity and flip the status to DONE, atomically.
///
/// All component moves share one timestamp and carry the order code as
/// their ref. There is no stock-sufficiency check; completion may drive
/// component on-hand negative, mirroring manual issues.
pub fn complete_work_order(conn: &mut Connection, code: &str) -> Result<DateTime<Utc>> {
    let tx = conn.transaction()?;

    let wo = get_work_order_by_code(&tx, code)?;
    if wo.status != WorkOrderStatus::Open {
        return Err(StockError::InvalidState(format!(
            "work order {} is {}, not OPEN",
            wo.code, wo.status
        )));
    }

    let now = Utc::now();
    let lines = bom::requirements(&tx, wo.product_id)?;
    for line in &lines {
        let need = line.qty_per * wo.quantity;
        ledger::append_move(
            &tx,
            line.item_id,
            None,
            -need.abs(),
            MoveReason::WoIssue,
            Some(&wo.code),
            now,
        )?;
    }

    tx.execute(
        "UPDATE work_orders SET status = ?1, completed_at = ?2, updated_at = ?2 WHERE id = ?3",
        params![WorkOrderStatus::Done.as_str(), now, wo.id],
    )?;

    tx.commit()?;
    info!(%code, components = lines.len(), "completed work order");
    Ok(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::db::test_support::open_test_db;
    use crate::ledger::{moves_for_item, on_hand};

    struct Fixture {
        product: String,
        item_a: catalog::Item,
        item_b: catalog::Item,
    }

    /// Product with BOM {A: 6/unit, B: 8/unit}
    fn fixture(conn: &Connection) -> Fixture {
        catalog::create_item_type(conn, "ALU", "Aluminum").unwrap();
        let item_a = catalog::create_item(conn, "Profile A", "ALU", Some("m")).unwrap();
        let item_b = catalog::create_item(conn, "Profile B", "ALU", Some("m")).unwrap();
        let product = bom::create_product(conn, "Frame-A").unwrap();
        bom::add_bom_line(conn, &product, &item_a.sku, 6.0).unwrap();
        bom::add_bom_line(conn, &product, &item_b.sku, 8.0).unwrap();
        Fixture {
            product,
            item_a,
            item_b,
        }
    }

    #[test]
    fn test_create_starts_open() {
        let conn = open_test_db();
        let fx = fixture(&conn);

        let wo = create_work_order(&conn, &fx.product, 3.0, None).unwrap();
        assert!(wo.code.starts_with("WO-"));
        assert_eq!(wo.status, WorkOrderStatus::Open);
        assert!(wo.completed_at.is_none());

        let fetched = get_work_order_by_code(&conn, &wo.code).unwrap();
        assert_eq!(fetched.status, WorkOrderStatus::Open);
        assert_eq!(fetched.quantity, 3.0);
    }

    #[test]
    fn test_create_validations() {
        let conn = open_test_db();
        let fx = fixture(&conn);

        assert!(matches!(
            create_work_order(&conn, &fx.product, 0.0, None).unwrap_err(),
            StockError::Validation(_)
        ));
        assert!(matches!(
            create_work_order(&conn, "PRD-MISSING", 1.0, None).unwrap_err(),
            StockError::NotFound { entity: "product", .. }
        ));
    }

    #[test]
    fn test_completion_issues_components() {
        let mut conn = open_test_db();
        let fx = fixture(&conn);
        let wo = create_work_order(&conn, &fx.product, 3.0, None).unwrap();

        complete_work_order(&mut conn, &wo.code).unwrap();

        assert_eq!(on_hand(&conn, fx.item_a.id).unwrap(), -18.0);
        assert_eq!(on_hand(&conn, fx.item_b.id).unwrap(), -24.0);

        let moves_a = moves_for_item(&conn, &fx.item_a.sku).unwrap();
        let moves_b = moves_for_item(&conn, &fx.item_b.sku).unwrap();
        assert_eq!(moves_a.len(), 1);
        assert_eq!(moves_b.len(), 1);
        assert_eq!(moves_a[0].qty, -18.0);
        assert_eq!(moves_b[0].qty, -24.0);
        assert_eq!(moves_a[0].reason, "WO-ISSUE");
        assert_eq!(moves_a[0].reference.as_deref(), Some(wo.code.as_str()));
        // One timestamp for the whole batch
        assert_eq!(moves_a[0].created_at, moves_b[0].created_at);

        let done = get_work_order_by_code(&conn, &wo.code).unwrap();
        assert_eq!(done.status, WorkOrderStatus::Done);
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn test_double_completion_rejected_without_moves() {
        let mut conn = open_test_db();
        let fx = fixture(&conn);
        let wo = create_work_order(&conn, &fx.product, 3.0, None).unwrap();

        complete_work_order(&mut conn, &wo.code).unwrap();
        let err = complete_work_order(&mut conn, &wo.code).unwrap_err();
        assert!(matches!(err, StockError::InvalidState(_)));

        // Ledger untouched by the rejected attempt
        let total_moves: i64 = conn
            .query_row("SELECT COUNT(*) FROM stock_moves", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total_moves, 2);
        assert_eq!(on_hand(&conn, fx.item_a.id).unwrap(), -18.0);
    }

    #[test]
    fn test_complete_unknown_code() {
        let mut conn = open_test_db();
        fixture(&conn);
        let err = complete_work_order(&mut conn, "WO-MISSING").unwrap_err();
        assert!(matches!(err, StockError::NotFound { entity: "work order", .. }));
    }

    #[test]
    fn test_canceled_order_rejects_completion() {
        let mut conn = open_test_db();
        let fx = fixture(&conn);
        let wo = create_work_order(&conn, &fx.product, 1.0, None).unwrap();

        // Any non-OPEN state rejects completion
        conn.execute(
            "UPDATE work_orders SET status = 'CANCELED' WHERE id = ?1",
            params![wo.id],
        )
        .unwrap();

        let err = complete_work_order(&mut conn, &wo.code).unwrap_err();
        assert!(matches!(err, StockError::InvalidState(_)));

        let total_moves: i64 = conn
            .query_row("SELECT COUNT(*) FROM stock_moves", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total_moves, 0);
    }

    #[test]
    fn test_completion_with_empty_bom() {
        let mut conn = open_test_db();
        catalog::create_item_type(&conn, "FG", "Finished Goods").unwrap();
        let product = bom::create_product(&conn, "Bare Product").unwrap();
        let wo = create_work_order(&conn, &product, 2.0, None).unwrap();

        // No BOM lines: nothing issued, order still flips to DONE
        complete_work_order(&mut conn, &wo.code).unwrap();
        let done = get_work_order_by_code(&conn, &wo.code).unwrap();
        assert_eq!(done.status, WorkOrderStatus::Done);

        let total_moves: i64 = conn
            .query_row("SELECT COUNT(*) FROM stock_moves", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total_moves, 0);
    }

    #[test]
    fn test_completion_ledger_sum_invariant() {
        let mut conn = open_test_db();
        let fx = fixture(&conn);

        // Pre-stock components, then consume via the order
        crate::costing::receive(
            &mut conn,
            crate::costing::ReceiveRequest {
                sku: &fx.item_a.sku,
                qty: 100.0,
                unit_cost: 2.0,
                supplier: None,
                expires_at: None,
            },
        )
        .unwrap();

        let wo = create_work_order(&conn, &fx.product, 3.0, None).unwrap();
        complete_work_order(&mut conn, &wo.code).unwrap();

        let moves = moves_for_item(&conn, &fx.item_a.sku).unwrap();
        let sum: f64 = moves.iter().map(|m| m.qty).sum();
        assert_eq!(sum, on_hand(&conn, fx.item_a.id).unwrap());
        assert_eq!(sum, 82.0);

        // Consumption does not touch the moving average
        let item = catalog::get_item_by_sku(&conn, &fx.item_a.sku).unwrap();
        assert_eq!(item.avg_cost, 2.0);
    }

    #[test]
    fn test_status_serializes_wire_vocabulary() {
        let conn = open_test_db();
        let fx = fixture(&conn);
        let wo = create_work_order(&conn, &fx.product, 1.0, None).unwrap();

        let value = serde_json::to_value(&wo).unwrap();
        assert_eq!(value["status"], "OPEN");
        assert_eq!(value["code"], wo.code);
    }

    #[test]
    fn test_status_round_trip() {
        for s in ["OPEN", "DONE", "CANCELED"] {
            let status: WorkOrderStatus = s.parse().unwrap();
            assert_eq!(status.as_str(), s);
        }
        assert!("open".parse::<WorkOrderStatus>().is_err());
    }
}
