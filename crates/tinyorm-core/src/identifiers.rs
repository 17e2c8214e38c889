//! SQL identifier validation.
//!
//! Table and column names are spliced into statement text unquoted, so every
//! resolved name must be a plain identifier.

use std::sync::LazyLock;

use regex::Regex;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is a valid regex")
});

/// Whether `name` is a bare SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}
