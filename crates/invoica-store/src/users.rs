use rusqlite::params;
use uuid::Uuid;

use invoica_shared::types::UserRole;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;
use crate::rows;

impl Database {
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, email, password_hash, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.password_hash,
                    user.role.as_str(),
                    user.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::from_sqlite(e, "email already registered"))?;
        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, email, password_hash, role, created_at
                 FROM users WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, email, password_hash, role, created_at
                 FROM users WHERE email = ?1",
                params![email],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn update_user_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET password_hash = ?2 WHERE id = ?1",
            params![id.to_string(), password_hash],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ON DELETE CASCADE: profile, customers, invoices, integration go with it
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(3)?;
    Ok(User {
        id: rows::uuid_col(row, 0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: UserRole::from_str_or_user(&role),
        created_at: rows::ts_col(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$abc$def".to_string(),
            role: UserRole::User,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_fetch() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user("a@example.com");
        db.create_user(&user).unwrap();

        let by_id = db.get_user(user.id).unwrap();
        assert_eq!(by_id.email, "a@example.com");

        let by_email = db.get_user_by_email("a@example.com").unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[test]
    fn duplicate_email_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&test_user("dup@example.com")).unwrap();
        let err = db.create_user(&test_user("dup@example.com")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_user(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn password_update() {
        let db = Database::open_in_memory().unwrap();
        let user = test_user("p@example.com");
        db.create_user(&user).unwrap();

        db.update_user_password(user.id, "new-hash").unwrap();
        assert_eq!(db.get_user(user.id).unwrap().password_hash, "new-hash");
    }
}
