//! Helpers for text that ends up inside SQL statements.

/// SQL text helpers used by strict identifier mode.
pub struct SqlText;

impl SqlText {
    /// Whether `name` is a bare identifier: `[A-Za-z_][A-Za-z0-9_]*`.
    pub fn is_plain_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// Doubles single quotes so `value` can sit inside a `'...'` literal.
    pub fn escape_literal(value: &str) -> String {
        value.replace('\'', "''")
    }
}
