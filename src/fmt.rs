//! Debug formatting helpers for [`custom_debug_derive`].

use std::fmt;

/// Formats a secret field as a fixed placeholder so passwords and session
/// cookies never reach log output.
///
/// Use with `#[debug(with = "crate::fmt::redacted")]`.
pub fn redacted<T>(_value: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("<redacted>")
}

/// Formats an `Option<T>` secret: `None` stays visible, `Some` is redacted.
pub fn redacted_opt<T>(value: &Option<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value {
        Some(_) => f.write_str("Some(<redacted>)"),
        None => f.write_str("None"),
    }
}

#[cfg(test)]
mod tests {
    #[derive(custom_debug_derive::Debug)]
    struct Secretive {
        user: String,
        #[debug(with = "crate::fmt::redacted")]
        password: String,
        #[debug(with = "crate::fmt::redacted_opt")]
        cookie: Option<String>,
    }

    #[test]
    fn test_redacted_fields_hidden() {
        let value = Secretive {
            user: "student".to_owned(),
            password: "hunter2".to_owned(),
            cookie: Some("reese84=abc".to_owned()),
        };
        let rendered = format!("{value:?}");
        assert!(rendered.contains("student"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("reese84"));
        assert!(rendered.contains("<redacted>"));
    }
}
