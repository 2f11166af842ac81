use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Profile;
use crate::rows;

impl Database {
    /// Insert or replace the profile for a user (unique on user_id).
    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.conn().execute(
            "INSERT INTO profiles (
                user_id, company_name, phone, address_line1, address_line2,
                city, state, postal_code, country, currency,
                bank_name, account_name, account_number,
                clover_api_key, clover_merchant_id,
                logo_blob_id, signature_blob_id, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
             ON CONFLICT(user_id) DO UPDATE SET
                company_name = excluded.company_name,
                phone = excluded.phone,
                address_line1 = excluded.address_line1,
                address_line2 = excluded.address_line2,
                city = excluded.city,
                state = excluded.state,
                postal_code = excluded.postal_code,
                country = excluded.country,
                currency = excluded.currency,
                bank_name = excluded.bank_name,
                account_name = excluded.account_name,
                account_number = excluded.account_number,
                clover_api_key = excluded.clover_api_key,
                clover_merchant_id = excluded.clover_merchant_id,
                logo_blob_id = excluded.logo_blob_id,
                signature_blob_id = excluded.signature_blob_id,
                updated_at = excluded.updated_at",
            params![
                profile.user_id.to_string(),
                profile.company_name,
                profile.phone,
                profile.address_line1,
                profile.address_line2,
                profile.city,
                profile.state,
                profile.postal_code,
                profile.country,
                profile.currency,
                profile.bank_name,
                profile.account_name,
                profile.account_number,
                profile.clover_api_key,
                profile.clover_merchant_id,
                profile.logo_blob_id.map(|id| id.to_string()),
                profile.signature_blob_id.map(|id| id.to_string()),
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, user_id: Uuid) -> Result<Profile> {
        self.conn()
            .query_row(
                "SELECT user_id, company_name, phone, address_line1, address_line2,
                        city, state, postal_code, country, currency,
                        bank_name, account_name, account_number,
                        clover_api_key, clover_merchant_id,
                        logo_blob_id, signature_blob_id, updated_at
                 FROM profiles WHERE user_id = ?1",
                params![user_id.to_string()],
                row_to_profile,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: rows::uuid_col(row, 0)?,
        company_name: row.get(1)?,
        phone: row.get(2)?,
        address_line1: row.get(3)?,
        address_line2: row.get(4)?,
        city: row.get(5)?,
        state: row.get(6)?,
        postal_code: row.get(7)?,
        country: row.get(8)?,
        currency: row.get(9)?,
        bank_name: row.get(10)?,
        account_name: row.get(11)?,
        account_number: row.get(12)?,
        clover_api_key: row.get(13)?,
        clover_merchant_id: row.get(14)?,
        logo_blob_id: rows::uuid_col_opt(row, 15)?,
        signature_blob_id: rows::uuid_col_opt(row, 16)?,
        updated_at: rows::ts_col(row, 17)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use chrono::Utc;
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
    fn upsert_creates_then_updates() {
        let db = Database::open_in_memory().unwrap();
        let user_id = seed_user(&db);

        let mut profile = Profile::empty(user_id);
        db.upsert_profile(&profile).unwrap();
        assert_eq!(db.get_profile(user_id).unwrap().company_name, None);

        profile.company_name = Some("Acme Studio".into());
        profile.currency = "EUR".into();
        db.upsert_profile(&profile).unwrap();

        let loaded = db.get_profile(user_id).unwrap();
        assert_eq!(loaded.company_name.as_deref(), Some("Acme Studio"));
        assert_eq!(loaded.currency, "EUR");
    }

    #[test]
    fn deleting_user_cascades_to_profile() {
        let db = Database::open_in_memory().unwrap();
        let user_id = seed_user(&db);
        db.upsert_profile(&Profile::empty(user_id)).unwrap();

        db.delete_user(user_id).unwrap();
        assert!(matches!(
            db.get_profile(user_id),
            Err(StoreError::NotFound)
        ));
    }
}
