//! Centralized identifier validation and quoting for SQL injection prevention.
//!
//! All SQL in this crate is synthesized by string concatenation: table names,
//! column names, and schema names cannot be passed as parameters in prepared
//! statements. Every identifier that reaches a generated statement therefore
//! passes through this module first. An identifier must match
//! `[A-Za-z_][A-Za-z0-9_$]*` and be at most 63 bytes (the PostgreSQL limit),
//! which also means quoting never needs to escape anything.
//!
//! Identifiers from configuration are validated before a connection is
//! opened; identifiers read back from the system catalogs are validated
//! again at quoting time, so a hostile name in the live schema cannot ride
//! into generated DML.

use crate::error::{Result, UpsertError};

/// PostgreSQL identifier length limit in bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier against the accepted pattern.
///
/// Rejects empty identifiers, identifiers longer than 63 bytes, and any
/// identifier containing characters outside `[A-Za-z0-9_$]` (or starting
/// with a digit or `$`).
///
/// # Errors
///
/// Returns `UpsertError::Config` with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(UpsertError::config("Identifier cannot be empty"));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(UpsertError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(UpsertError::Config(format!(
            "Identifier must start with a letter or underscore: {:?}",
            name
        )));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '$')) {
        return Err(UpsertError::Config(format!(
            "Identifier contains invalid character {:?}: {:?}",
            bad, name
        )));
    }

    Ok(())
}

/// Quote an identifier for use in generated SQL.
///
/// Validates first; the accepted charset contains no double quotes, so the
/// result is simply the name wrapped in double quotes.
pub fn quote(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

/// Qualify a table name with its schema, quoting both parts.
///
/// Returns `"schema"."table"`.
pub fn qualify(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote(schema)?, quote(table)?))
}

/// Quote a list of identifiers and join them with `", "`.
pub fn quote_list(names: &[String]) -> Result<String> {
    let quoted: Result<Vec<String>> = names.iter().map(|n| quote(n)).collect();
    Ok(quoted?.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("my_table").is_ok());
        assert!(validate_identifier("Table123").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("col$1").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_injection() {
        assert!(validate_identifier("books; DROP TABLE genres").is_err());
        assert!(validate_identifier("a\"b").is_err());
        assert!(validate_identifier("name with spaces").is_err());
        assert!(validate_identifier("table\0name").is_err());
        assert!(validate_identifier("tab--comment").is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_bad_first_char() {
        assert!(validate_identifier("1table").is_err());
        assert!(validate_identifier("$col").is_err());
    }

    #[test]
    fn test_validate_identifier_length_boundary() {
        let max_name = "a".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(validate_identifier(&max_name).is_ok());

        let too_long = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let result = validate_identifier(&too_long);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("maximum length"));
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("users").unwrap(), "\"users\"");
        assert_eq!(quote("my_table").unwrap(), "\"my_table\"");
        assert!(quote("Robert'); DROP TABLE Students;--").is_err());
    }

    #[test]
    fn test_qualify() {
        assert_eq!(
            qualify("public", "users").unwrap(),
            "\"public\".\"users\""
        );
        assert!(qualify("", "users").is_err());
        assert!(qualify("public", "bad;name").is_err());
    }

    #[test]
    fn test_quote_list() {
        let cols = vec!["a".to_string(), "b".to_string()];
        assert_eq!(quote_list(&cols).unwrap(), "\"a\", \"b\"");
        assert_eq!(quote_list(&[]).unwrap(), "");
    }
}
