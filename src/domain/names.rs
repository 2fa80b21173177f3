// Copyright (c) 2025 - Cowboy AI, Inc.
//! Entity Name Rules
//!
//! Names are the caller-facing keys of every record and are copied into
//! descendants as denormalized references, so they are kept to a compact,
//! printable alphabet:
//! - Non-empty, at most the configured maximum length
//! - ASCII alphanumerics plus `-`, `_` and `.`
//! - No leading or trailing separator

use thiserror::Error;

/// Name validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("name is empty")]
    Empty,

    #[error("name exceeds maximum length of {max} characters: {len}")]
    TooLong { len: usize, max: usize },

    #[error("invalid character in name: {0:?}")]
    InvalidCharacter(char),

    #[error("name cannot start or end with a separator")]
    EdgeSeparator,
}

fn is_separator(ch: char) -> bool {
    matches!(ch, '-' | '_' | '.')
}

/// Validate a record name against the naming rules
pub fn validate_name(name: &str, max_len: usize) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }

    let len = name.chars().count();
    if len > max_len {
        return Err(NameError::TooLong { len, max: max_len });
    }

    if let Some(ch) = name
        .chars()
        .find(|ch| !ch.is_ascii_alphanumeric() && !is_separator(*ch))
    {
        return Err(NameError::InvalidCharacter(ch));
    }

    if name.starts_with(is_separator) || name.ends_with(is_separator) {
        return Err(NameError::EdgeSeparator);
    }

    Ok(())
}
