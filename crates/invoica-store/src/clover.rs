use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::CloverIntegration;
use crate::rows;

impl Database {
    /// Insert or replace the integration for a user. Re-connecting after a
    /// previous OAuth flow simply overwrites the stored token pair.
    pub fn upsert_clover_integration(&self, integration: &CloverIntegration) -> Result<()> {
        self.conn().execute(
            "INSERT INTO clover_integrations (user_id, merchant_id, access_token,
                                              refresh_token, token_expiry)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                merchant_id = excluded.merchant_id,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_expiry = excluded.token_expiry",
            params![
                integration.user_id.to_string(),
                integration.merchant_id,
                integration.access_token,
                integration.refresh_token,
                integration.token_expiry.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_clover_integration(&self, user_id: Uuid) -> Result<CloverIntegration> {
        self.conn()
            .query_row(
                "SELECT user_id, merchant_id, access_token, refresh_token, token_expiry
                 FROM clover_integrations WHERE user_id = ?1",
                params![user_id.to_string()],
                row_to_integration,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn delete_clover_integration(&self, user_id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM clover_integrations WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_integration(row: &rusqlite::Row<'_>) -> rusqlite::Result<CloverIntegration> {
    Ok(CloverIntegration {
        user_id: rows::uuid_col(row, 0)?,
        merchant_id: row.get(1)?,
        access_token: row.get(2)?,
        refresh_token: row.get(3)?,
        token_expiry: rows::ts_col(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use chrono::{Duration, Utc};
    use invoica_shared::types::UserRole;

    fn seed_user(db: &Database) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: "hash".into(),
            role: UserRole::User,
            created_at: Utc::now(),
        };
        db.create_user(&user).unwrap();
        user.id
    }

    #[test]
    fn upsert_overwrites_token_pair() {
        let db = Database::open_in_memory().unwrap();
        let user_id = seed_user(&db);

        let mut integration = CloverIntegration {
            user_id,
            merchant_id: "MER-1".into(),
            access_token: "at-1".into(),
            refresh_token: "rt-1".into(),
            token_expiry: Utc::now() + Duration::hours(1),
        };
        db.upsert_clover_integration(&integration).unwrap();

        integration.access_token = "at-2".into();
        db.upsert_clover_integration(&integration).unwrap();

        let loaded = db.get_clover_integration(user_id).unwrap();
        assert_eq!(loaded.access_token, "at-2");
        assert_eq!(loaded.refresh_token, "rt-1");
    }

    #[test]
    fn disconnect_reports_whether_row_existed() {
        let db = Database::open_in_memory().unwrap();
        let user_id = seed_user(&db);

        assert!(!db.delete_clover_integration(user_id).unwrap());

        db.upsert_clover_integration(&CloverIntegration {
            user_id,
            merchant_id: "MER-1".into(),
            access_token: "at".into(),
            refresh_token: "rt".into(),
            token_expiry: Utc::now(),
        })
        .unwrap();

        assert!(db.delete_clover_integration(user_id).unwrap());
        assert!(matches!(
            db.get_clover_integration(user_id),
            Err(StoreError::NotFound)
        ));
    }
}
