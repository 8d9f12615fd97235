//! Protocol module: message vocabulary, bounds, validation and sanitisation.

pub mod limits;
pub mod messages;
pub mod sanitize;
pub mod validate;

pub use messages::*;
pub use sanitize::sanitize;
pub use validate::{validate, Rejection};
