//! Identity resolution and user registration
//!
//! The acting user is identified by email (from `--user`, `STASH_USER` or the
//! config file). Requests without an identity, or with an unknown one, are
//! rejected as unauthorized before any ledger operation runs.

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use crate::db::{self, User};
use crate::error::LedgerError;
use crate::validation::ValidationIssue;

/// Resolve the acting user from an optional email
pub fn resolve_user(conn: &Connection, email: Option<&str>) -> Result<User> {
    let email = match email.map(str::trim) {
        Some(e) if !e.is_empty() => e,
        _ => {
            return Err(LedgerError::Unauthorized(
                "no user given; pass --user or set STASH_USER".to_string(),
            )
            .into())
        }
    };

    db::get_user_by_email(conn, email)?
        .ok_or_else(|| LedgerError::Unauthorized(format!("unknown user {}", email)).into())
}

/// Look up a user by email, failing with `NotFound`
pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<User> {
    db::get_user_by_email(conn, email)?.ok_or_else(|| {
        LedgerError::NotFound {
            entity: "user",
            id: email.trim().to_string(),
        }
        .into()
    })
}

/// Create a user; emails are unique (case-insensitive)
pub fn register_user(
    conn: &Connection,
    email: &str,
    display_name: Option<&str>,
    is_privileged: bool,
) -> Result<User> {
    let email = email.trim();
    let mut issues = Vec::new();
    if email.is_empty() || !email.contains('@') {
        issues.push(ValidationIssue::new("email", email, "must be an email address"));
    } else if db::get_user_by_email(conn, email)?.is_some() {
        issues.push(ValidationIssue::new("email", email, "is already registered"));
    }
    if !issues.is_empty() {
        return Err(LedgerError::Validation(issues).into());
    }

    let display_name = display_name.map(str::trim).filter(|n| !n.is_empty());
    let id = db::insert_user(conn, email, display_name, is_privileged)?;
    info!("Registered user {} <{}>", id, email);

    db::get_user(conn, id)?.ok_or_else(|| LedgerError::user_not_found(id).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ledger_error;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_missing_identity_is_unauthorized() {
        let conn = memory_db();
        for email in [None, Some(""), Some("   ")] {
            let err = resolve_user(&conn, email).unwrap_err();
            assert!(matches!(ledger_error(&err), Some(LedgerError::Unauthorized(_))));
        }
        let err = resolve_user(&conn, Some("ghost@example.com")).unwrap_err();
        assert!(matches!(ledger_error(&err), Some(LedgerError::Unauthorized(_))));
    }

    #[test]
    fn test_register_then_resolve_case_insensitively() {
        let conn = memory_db();
        let user = register_user(&conn, "Ana@Example.com", Some(" Ana "), true).unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Ana"));
        assert!(user.is_privileged);

        let resolved = resolve_user(&conn, Some("ana@example.com")).unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[test]
    fn test_duplicate_email_is_a_validation_error() {
        let conn = memory_db();
        register_user(&conn, "bo@example.com", None, false).unwrap();
        let err = register_user(&conn, "BO@example.com", None, false).unwrap_err();
        assert!(matches!(ledger_error(&err), Some(LedgerError::Validation(_))));
    }

    #[test]
    fn test_find_user_by_email_not_found() {
        let conn = memory_db();
        let err = find_user_by_email(&conn, "nobody@example.com").unwrap_err();
        assert!(ledger_error(&err).is_some_and(LedgerError::is_not_found));
    }
}
