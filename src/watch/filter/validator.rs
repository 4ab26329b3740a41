//! Callsign filter syntax check.

use regex::Regex;

use crate::watch::core::errors::{WatchError, WatchResult};

/// Full-string rule for a watchable callsign filter.
pub const CALLSIGN_FILTER_PATTERN: &str = r"^[A-Z0-9/]{3,15}$";

/// Pure syntax check for subscription patterns.
///
/// The validator never normalizes input; callers upper-case user text first.
#[derive(Clone, Debug)]
pub struct FilterValidator {
    pattern: Regex,
}

impl FilterValidator {
    /// Compile the callsign filter rule.
    ///
    /// # Errors
    /// Returns an error if the regex pattern is invalid.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(CALLSIGN_FILTER_PATTERN)?,
        })
    }

    /// Whether `pattern` is a valid filter.
    #[must_use]
    pub fn is_valid(&self, pattern: &str) -> bool {
        self.pattern.is_match(pattern)
    }

    /// Upper-case user input and validate it.
    ///
    /// # Errors
    /// Returns `InvalidFilter` carrying the normalized text if validation fails.
    pub fn normalize(&self, input: &str) -> WatchResult<String> {
        let candidate = input.to_uppercase();
        if self.is_valid(&candidate) {
            Ok(candidate)
        } else {
            Err(WatchError::InvalidFilter(candidate))
        }
    }
}
