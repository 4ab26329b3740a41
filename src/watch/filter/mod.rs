//! Callsign filter validation.

pub mod validator;

pub use validator::{CALLSIGN_FILTER_PATTERN, FilterValidator};
