//! Identifier generation utilities.

use chrono::NaiveDate;
use rand::Rng;
use uuid::Uuid;

/// Prefix of every request reference.
pub const REFERENCE_PREFIX: &str = "REQ";

/// Generator for human-facing references and stored file names.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a request reference for the given local date.
    ///
    /// Format is `REQ` + `YYMMDD` + a random number in `1000..=9999`,
    /// e.g. `REQ2510181234`. Uniqueness is only probabilistic, callers
    /// must check the store and retry.
    #[must_use]
    pub fn generate_reference(&self, date: NaiveDate) -> String {
        let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
        format!("{REFERENCE_PREFIX}{}{suffix}", date.format("%y%m%d"))
    }

    /// Generate a random file name keeping the given extension.
    #[must_use]
    pub fn generate_file_name(&self, extension: &str) -> String {
        format!("{}.{}", Uuid::new_v4(), extension.to_ascii_lowercase())
    }
}
