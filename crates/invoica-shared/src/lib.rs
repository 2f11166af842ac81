//! # invoica-shared
//!
//! Domain types and pure financial logic shared between the store and the
//! server: invoice/user enums, the adjustment calculator, and the invoice
//! totals pipeline.

pub mod constants;
pub mod money;
pub mod types;

pub use money::{Adjustment, AdjustmentKind, InvoiceTotals};
pub use types::{InvoiceStatus, UserRole};
