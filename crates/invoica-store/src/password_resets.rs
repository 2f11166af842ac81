use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::PasswordReset;
use crate::rows;

impl Database {
    pub fn create_password_reset(&self, reset: &PasswordReset) -> Result<()> {
        self.conn().execute(
            "INSERT INTO password_resets (token, email, expires_at, used)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                reset.token.to_string(),
                reset.email,
                reset.expires_at.to_rfc3339(),
                reset.used as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_password_reset(&self, token: Uuid) -> Result<PasswordReset> {
        self.conn()
            .query_row(
                "SELECT token, email, expires_at, used
                 FROM password_resets WHERE token = ?1",
                params![token.to_string()],
                row_to_reset,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Consume a token. Rows are flagged, never deleted.
    pub fn mark_password_reset_used(&self, token: Uuid) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE password_resets SET used = 1 WHERE token = ?1",
            params![token.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn row_to_reset(row: &rusqlite::Row<'_>) -> rusqlite::Result<PasswordReset> {
    let used: i64 = row.get(3)?;
    Ok(PasswordReset {
        token: rows::uuid_col(row, 0)?,
        email: row.get(1)?,
        expires_at: rows::ts_col(row, 2)?,
        used: used != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use invoica_shared::constants::RESET_TOKEN_TTL_MINUTES;

    #[test]
    fn token_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let reset = PasswordReset {
            token: Uuid::new_v4(),
            email: "a@example.com".into(),
            expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
            used: false,
        };
        db.create_password_reset(&reset).unwrap();

        let loaded = db.get_password_reset(reset.token).unwrap();
        assert!(!loaded.used);
        assert!(!loaded.is_expired(Utc::now()));

        db.mark_password_reset_used(reset.token).unwrap();
        assert!(db.get_password_reset(reset.token).unwrap().used);
    }

    #[test]
    fn expiry_check() {
        let reset = PasswordReset {
            token: Uuid::new_v4(),
            email: "b@example.com".into(),
            expires_at: Utc::now() - Duration::minutes(1),
            used: false,
        };
        assert!(reset.is_expired(Utc::now()));
    }

    #[test]
    fn unknown_token_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_password_reset(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }
}
