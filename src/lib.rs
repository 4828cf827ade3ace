// Shopstock - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod bom;
pub mod catalog;
pub mod codes;
pub mod costing;
pub mod db;
pub mod error;
pub mod ledger;
pub mod workorder;

// Re-export commonly used types
pub use bom::{add_bom_line, create_product, get_product_by_code, list_bom, list_products, BomLineView, Product};
pub use catalog::{
    create_item, create_item_type, get_item_by_sku, list_item_types, list_items, Item, ItemType,
    ItemView,
};
pub use costing::{batches_for_item, receive, Batch, Receipt, ReceiveRequest};
pub use db::{open, seed_demo, setup_database};
pub use error::{Result, StockError};
pub use ledger::{
    list_stock, moves_for_item, on_hand, record_move, MoveReason, StockMove, StockRow,
};
pub use workorder::{
    complete_work_order, create_work_order, get_work_order_by_code, list_work_orders, WorkOrder,
    WorkOrderStatus,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
