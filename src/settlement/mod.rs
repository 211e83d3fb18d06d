//! The settlement engine: balances, payment plans and settlement records.
//!
//! Everything here is recomputed from the ledger records on every call; nothing
//! derived is ever stored.

pub mod balance;
pub mod planner;
pub mod recorder;
pub mod split;
pub mod summary;

pub use balance::compute_balances;
pub use planner::plan_settlements;
pub use recorder::{expense_status, fully_settled_expenses, record_settlement};
pub use split::build_splits;
pub use summary::spending_summary;
