//! Aggregates module
pub mod order;

pub use order::{days_label, LineItem, Order, Urgency, CANCELLED_CODE, CANCELLED_LABEL, COMPLETED_CODE};
