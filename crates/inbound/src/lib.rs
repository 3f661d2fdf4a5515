//! The Receiving Processor.
//!
//! Drives the purchase-order lifecycle (Pending → Receiving → Completed) and
//! reconciles expected against actually received quantities, posting every
//! accepted receipt into the Inventory Ledger.

pub mod purchase_order;
pub mod receiving;

pub use purchase_order::{
    PoItem, PoItemSpec, PurchaseOrder, PurchaseOrderSpec, PurchaseOrderStatus, ReceiptDiscrepancy,
};
pub use receiving::ReceivingProcessor;
