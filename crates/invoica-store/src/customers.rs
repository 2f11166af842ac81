use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Customer;
use crate::rows;

const CUSTOMER_COLS: &str = "id, user_id, name, email, phone, address_line1, address_line2,
                             city, state, postal_code, country, created_at, updated_at";

impl Database {
    pub fn create_customer(&self, customer: &Customer) -> Result<()> {
        self.conn().execute(
            "INSERT INTO customers (id, user_id, name, email, phone, address_line1,
                                    address_line2, city, state, postal_code, country,
                                    created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                customer.id.to_string(),
                customer.user_id.to_string(),
                customer.name,
                customer.email,
                customer.phone,
                customer.address_line1,
                customer.address_line2,
                customer.city,
                customer.state,
                customer.postal_code,
                customer.country,
                customer.created_at.to_rfc3339(),
                customer.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch a customer, scoped to its owning user.
    pub fn get_customer(&self, user_id: Uuid, id: Uuid) -> Result<Customer> {
        self.conn()
            .query_row(
                &format!("SELECT {CUSTOMER_COLS} FROM customers WHERE id = ?1 AND user_id = ?2"),
                params![id.to_string(), user_id.to_string()],
                row_to_customer,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn list_customers(&self, user_id: Uuid) -> Result<Vec<Customer>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CUSTOMER_COLS} FROM customers WHERE user_id = ?1 ORDER BY name ASC"
        ))?;
        let iter = stmt.query_map(params![user_id.to_string()], row_to_customer)?;
        iter.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn update_customer(&self, customer: &Customer) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE customers SET name = ?3, email = ?4, phone = ?5, address_line1 = ?6,
                                  address_line2 = ?7, city = ?8, state = ?9,
                                  postal_code = ?10, country = ?11, updated_at = ?12
             WHERE id = ?1 AND user_id = ?2",
            params![
                customer.id.to_string(),
                customer.user_id.to_string(),
                customer.name,
                customer.email,
                customer.phone,
                customer.address_line1,
                customer.address_line2,
                customer.city,
                customer.state,
                customer.postal_code,
                customer.country,
                customer.updated_at.to_rfc3339(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn delete_customer(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM customers WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), user_id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_customer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: rows::uuid_col(row, 0)?,
        user_id: rows::uuid_col(row, 1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        address_line1: row.get(5)?,
        address_line2: row.get(6)?,
        city: row.get(7)?,
        state: row.get(8)?,
        postal_code: row.get(9)?,
        country: row.get(10)?,
        created_at: rows::ts_col(row, 11)?,
        updated_at: rows::ts_col(row, 12)?,
    })
}
