// Database setup: connection, schema, demo seed
//
// One SQLite connection is the single logical writer for a store. The
// stock_moves table is append-only: nothing in this crate updates or
// deletes a row once written.

use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::bom;
use crate::catalog;
use crate::error::Result;

/// Open (or create) a store at `path` with WAL mode and the full schema.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Create tables and indexes. Safe to call on an existing store.
pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery and snapshot reads alongside the writer
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS item_types(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS items(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sku TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            type_id INTEGER NOT NULL,
            unit TEXT NOT NULL DEFAULT 'pcs',
            avg_cost REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(type_id) REFERENCES item_types(id)
        );
        CREATE TABLE IF NOT EXISTS batches(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            item_id INTEGER NOT NULL,
            supplier TEXT,
            received_at TEXT NOT NULL,
            expires_at TEXT,
            qty REAL NOT NULL,
            unit_cost REAL NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(item_id) REFERENCES items(id)
        );
        CREATE TABLE IF NOT EXISTS stock_moves(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id INTEGER NOT NULL,
            batch_id INTEGER,
            qty REAL NOT NULL,
            reason TEXT NOT NULL,
            ref TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(item_id) REFERENCES items(id),
            FOREIGN KEY(batch_id) REFERENCES batches(id)
        );
        CREATE TABLE IF NOT EXISTS products(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS bom(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL,
            item_id INTEGER NOT NULL,
            qty_per REAL NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(product_id, item_id),
            FOREIGN KEY(product_id) REFERENCES products(id),
            FOREIGN KEY(item_id) REFERENCES items(id)
        );
        CREATE TABLE IF NOT EXISTS work_orders(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE NOT NULL,
            product_id INTEGER NOT NULL,
            quantity REAL NOT NULL,
            status TEXT NOT NULL,
            planned_at TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(product_id) REFERENCES products(id)
        );
        CREATE INDEX IF NOT EXISTS idx_moves_item ON stock_moves(item_id);
        CREATE INDEX IF NOT EXISTS idx_moves_ref ON stock_moves(ref);
        CREATE INDEX IF NOT EXISTS idx_batches_item ON batches(item_id);
        CREATE INDEX IF NOT EXISTS idx_bom_product ON bom(product_id);",
    )?;

    Ok(())
}

/// Seed an empty store with the demo shop catalog: aluminum frame
/// components plus one product with a four-line BOM. Does nothing if any
/// item type already exists.
pub fn seed_demo(conn: &mut Connection) -> Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM item_types", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(());
    }

    let tx = conn.transaction()?;

    for (code, name) in [
        ("ALU", "Aluminum Profiles"),
        ("HDW", "Hardware"),
        ("GLS", "Glass"),
        ("GSK", "Gaskets"),
        ("FG", "Finished Goods"),
    ] {
        catalog::create_item_type(&tx, code, name)?;
    }

    catalog::create_item(&tx, "Profile-40x40 Anodized", "ALU", Some("m"))?;
    catalog::create_item(&tx, "Corner Bracket L-50", "HDW", Some("pcs"))?;
    catalog::create_item(&tx, "IGU 1000x800 LowE", "GLS", Some("pcs"))?;
    catalog::create_item(&tx, "EPDM gasket 8x4", "GSK", Some("m"))?;
    catalog::create_item(&tx, "FG-Frame", "FG", Some("pcs"))?;

    let product_code = bom::create_product(&tx, "Frame-A")?;
    for (name, qty_per) in [
        ("Profile-40x40 Anodized", 6.0),
        ("Corner Bracket L-50", 8.0),
        ("IGU 1000x800 LowE", 1.0),
        ("EPDM gasket 8x4", 7.0),
    ] {
        let sku = catalog::sku_by_name(&tx, name)?;
        bom::add_bom_line(&tx, &product_code, &sku, qty_per)?;
    }

    tx.commit()?;
    info!(product = %product_code, "seeded demo catalog");
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use rusqlite::Connection;

    /// Fresh in-memory store with the full schema, one per test.
    pub fn open_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        super::setup_database(&conn).unwrap();
        conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();
    }

    #[test]
    fn test_seed_demo_only_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        seed_demo(&mut conn).unwrap();
        let items: i64 = conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
            .unwrap();
        assert_eq!(items, 5);

        // Second call is a no-op
        seed_demo(&mut conn).unwrap();
        let items_again: i64 = conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
            .unwrap();
        assert_eq!(items_again, 5);

        let bom_lines: i64 = conn
            .query_row("SELECT COUNT(*) FROM bom", [], |row| row.get(0))
            .unwrap();
        assert_eq!(bom_lines, 4);
    }
}
