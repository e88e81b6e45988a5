//! Field rules shared by registry credential structs.
//!
//! Used from `#[validate(...)]` attributes; see the provider modules.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Maximum length accepted for any credential field
pub const MAX_FIELD_LEN: usize = 255;

lazy_static! {
    /// Registry namespace: lowercase alphanumerics, may contain `.`, `_` and `-`
    /// after the first character
    pub static ref NAMESPACE_RE: Regex = Regex::new(r"^[a-z0-9][a-z0-9._-]*$").unwrap();
}

fn length_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// An optional field: either empty or between 2 and `MAX_FIELD_LEN` characters
pub fn empty_or_bounded(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len == 0 || (2..=MAX_FIELD_LEN).contains(&len) {
        return Ok(());
    }
    Err(length_error(
        "empty_or_bounded",
        "must be empty or between 2 and 255 characters",
    ))
}

/// An optional secret: either empty or at least 2 characters
pub fn empty_or_min_two(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.chars().count() >= 2 {
        return Ok(());
    }
    Err(length_error(
        "empty_or_min_two",
        "must be empty or at least 2 characters",
    ))
}
