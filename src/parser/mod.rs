//! Parse the user input.

mod amount;

pub use amount::{parse_amount, parse_share};
