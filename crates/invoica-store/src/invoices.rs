use rusqlite::{params, Transaction};
use uuid::Uuid;

use invoica_shared::money::{Adjustment, AdjustmentKind};
use invoica_shared::types::InvoiceStatus;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Invoice, InvoiceItem};
use crate::rows;

const INVOICE_COLS: &str = "id, user_id, customer_id, invoice_number, status, issue_date,
                            due_date, currency, payment_method, payment_terms,
                            bill_to_name, bill_to_email, bill_to_address,
                            from_name, from_email, from_address,
                            discount_value, discount_kind, tax_value, tax_kind,
                            shipping_value, shipping_kind, notes, created_at, updated_at";

impl Database {
    /// Insert an invoice together with its line items, atomically.
    pub fn create_invoice(&mut self, invoice: &Invoice, items: &[InvoiceItem]) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        insert_invoice_row(&tx, invoice)
            .map_err(|e| StoreError::from_sqlite(e, "invoice number already in use"))?;
        insert_items(&tx, invoice.id, items)?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch an invoice, scoped to its owning user.
    pub fn get_invoice(&self, user_id: Uuid, id: Uuid) -> Result<Invoice> {
        self.conn()
            .query_row(
                &format!("SELECT {INVOICE_COLS} FROM invoices WHERE id = ?1 AND user_id = ?2"),
                params![id.to_string(), user_id.to_string()],
                row_to_invoice,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    pub fn list_invoices(&self, user_id: Uuid) -> Result<Vec<Invoice>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {INVOICE_COLS} FROM invoices
             WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;
        let iter = stmt.query_map(params![user_id.to_string()], row_to_invoice)?;
        iter.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn get_invoice_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, invoice_id, name, description, quantity, rate, position
             FROM invoice_items WHERE invoice_id = ?1 ORDER BY position ASC",
        )?;
        let iter = stmt.query_map(params![invoice_id.to_string()], row_to_item)?;
        iter.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Update an invoice and replace its line items, atomically.
    pub fn update_invoice(&mut self, invoice: &Invoice, items: &[InvoiceItem]) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        let affected = tx
            .execute(
                "UPDATE invoices SET
                    customer_id = ?3, invoice_number = ?4, status = ?5, issue_date = ?6,
                    due_date = ?7, currency = ?8, payment_method = ?9, payment_terms = ?10,
                    bill_to_name = ?11, bill_to_email = ?12, bill_to_address = ?13,
                    from_name = ?14, from_email = ?15, from_address = ?16,
                    discount_value = ?17, discount_kind = ?18,
                    tax_value = ?19, tax_kind = ?20,
                    shipping_value = ?21, shipping_kind = ?22,
                    notes = ?23, updated_at = ?24
                 WHERE id = ?1 AND user_id = ?2",
                params![
                    invoice.id.to_string(),
                    invoice.user_id.to_string(),
                    invoice.customer_id.map(|id| id.to_string()),
                    invoice.invoice_number,
                    invoice.status.as_str(),
                    invoice.issue_date.format("%Y-%m-%d").to_string(),
                    invoice.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    invoice.currency,
                    invoice.payment_method,
                    invoice.payment_terms,
                    invoice.bill_to_name,
                    invoice.bill_to_email,
                    invoice.bill_to_address,
                    invoice.from_name,
                    invoice.from_email,
                    invoice.from_address,
                    invoice.discount.value,
                    invoice.discount.kind.as_str(),
                    invoice.tax.value,
                    invoice.tax.kind.as_str(),
                    invoice.shipping.value,
                    invoice.shipping.kind.as_str(),
                    invoice.notes,
                    invoice.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::from_sqlite(e, "invoice number already in use"))?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }

        tx.execute(
            "DELETE FROM invoice_items WHERE invoice_id = ?1",
            params![invoice.id.to_string()],
        )?;
        insert_items(&tx, invoice.id, items)?;
        tx.commit()?;
        Ok(())
    }

    pub fn update_invoice_status(
        &self,
        user_id: Uuid,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE invoices SET status = ?3, updated_at = ?4 WHERE id = ?1 AND user_id = ?2",
            params![
                id.to_string(),
                user_id.to_string(),
                status.as_str(),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ON DELETE CASCADE: line items go with it
    pub fn delete_invoice(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM invoices WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), user_id.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn insert_invoice_row(tx: &Transaction<'_>, invoice: &Invoice) -> rusqlite::Result<usize> {
    tx.execute(
        "INSERT INTO invoices (id, user_id, customer_id, invoice_number, status, issue_date,
                               due_date, currency, payment_method, payment_terms,
                               bill_to_name, bill_to_email, bill_to_address,
                               from_name, from_email, from_address,
                               discount_value, discount_kind, tax_value, tax_kind,
                               shipping_value, shipping_kind, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
        params![
            invoice.id.to_string(),
            invoice.user_id.to_string(),
            invoice.customer_id.map(|id| id.to_string()),
            invoice.invoice_number,
            invoice.status.as_str(),
            invoice.issue_date.format("%Y-%m-%d").to_string(),
            invoice.due_date.map(|d| d.format("%Y-%m-%d").to_string()),
            invoice.currency,
            invoice.payment_method,
            invoice.payment_terms,
            invoice.bill_to_name,
            invoice.bill_to_email,
            invoice.bill_to_address,
            invoice.from_name,
            invoice.from_email,
            invoice.from_address,
            invoice.discount.value,
            invoice.discount.kind.as_str(),
            invoice.tax.value,
            invoice.tax.kind.as_str(),
            invoice.shipping.value,
            invoice.shipping.kind.as_str(),
            invoice.notes,
            invoice.created_at.to_rfc3339(),
            invoice.updated_at.to_rfc3339(),
        ],
    )
}

fn insert_items(tx: &Transaction<'_>, invoice_id: Uuid, items: &[InvoiceItem]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO invoice_items (id, invoice_id, name, description, quantity, rate, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (position, item) in items.iter().enumerate() {
        stmt.execute(params![
            item.id.to_string(),
            invoice_id.to_string(),
            item.name,
            item.description,
            item.quantity,
            item.rate,
            position as i64,
        ])?;
    }
    Ok(())
}

fn row_to_invoice(row: &rusqlite::Row<'_>) -> rusqlite::Result<Invoice> {
    let status: String = row.get(4)?;
    let discount_kind: String = row.get(17)?;
    let tax_kind: String = row.get(19)?;
    let shipping_kind: String = row.get(21)?;

    Ok(Invoice {
        id: rows::uuid_col(row, 0)?,
        user_id: rows::uuid_col(row, 1)?,
        customer_id: rows::uuid_col_opt(row, 2)?,
        invoice_number: row.get(3)?,
        status: InvoiceStatus::from_str_or_draft(&status),
        issue_date: rows::date_col(row, 5)?,
        due_date: rows::date_col_opt(row, 6)?,
        currency: row.get(7)?,
        payment_method: row.get(8)?,
        payment_terms: row.get(9)?,
        bill_to_name: row.get(10)?,
        bill_to_email: row.get(11)?,
        bill_to_address: row.get(12)?,
        from_name: row.get(13)?,
        from_email: row.get(14)?,
        from_address: row.get(15)?,
        discount: Adjustment {
            value: row.get(16)?,
            kind: AdjustmentKind::from_str_or_amount(&discount_kind),
        },
        tax: Adjustment {
            value: row.get(18)?,
            kind: AdjustmentKind::from_str_or_amount(&tax_kind),
        },
        shipping: Adjustment {
            value: row.get(20)?,
            kind: AdjustmentKind::from_str_or_amount(&shipping_kind),
        },
        notes: row.get(22)?,
        created_at: rows::ts_col(row, 23)?,
        updated_at: rows::ts_col(row, 24)?,
    })
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<InvoiceItem> {
    Ok(InvoiceItem {
        id: rows::uuid_col(row, 0)?,
        invoice_id: rows::uuid_col(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        quantity: row.get(4)?,
        rate: row.get(5)?,
        position: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use chrono::{NaiveDate, Utc};
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

    fn test_invoice(user_id: Uuid, number: &str) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: Uuid::new_v4(),
            user_id,
            customer_id: None,
            invoice_number: number.to_string(),
            status: InvoiceStatus::Draft,
            issue_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 8, 31),
            currency: "USD".into(),
            payment_method: Some("card".into()),
            payment_terms: Some("NET 30".into()),
            bill_to_name: "Client Co".into(),
            bill_to_email: Some("ap@client.example".into()),
            bill_to_address: Some("42 Elm St, Portland".into()),
            from_name: Some("Acme Studio".into()),
            from_email: Some("billing@acme.example".into()),
            from_address: None,
            discount: Adjustment::percentage(10.0),
            tax: Adjustment::percentage(5.0),
            shipping: Adjustment::amount(10.0),
            notes: Some("Thanks for your business".into()),
            created_at: now,
            updated_at: now,
        }
    }

    fn test_items(invoice_id: Uuid) -> Vec<InvoiceItem> {
        vec![
            InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id,
                name: "Design".into(),
                description: Some("Homepage redesign".into()),
                quantity: 2.0,
                rate: 50.0,
                position: 0,
            },
            InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id,
                name: "Hosting".into(),
                description: None,
                quantity: 1.0,
                rate: 30.0,
                position: 1,
            },
        ]
    }

    #[test]
    fn create_fetch_and_totals() {
        let mut db = Database::open_in_memory().unwrap();
        let user_id = seed_user(&db);
        let invoice = test_invoice(user_id, "INV-0001");
        let items = test_items(invoice.id);

        db.create_invoice(&invoice, &items).unwrap();

        let loaded = db.get_invoice(user_id, invoice.id).unwrap();
        let loaded_items = db.get_invoice_items(invoice.id).unwrap();
        assert_eq!(loaded_items.len(), 2);

        let totals = loaded.totals(&loaded_items);
        assert_eq!(totals.subtotal, 130.0);
        assert!((totals.total - 132.85).abs() < 1e-9);
    }

    #[test]
    fn invoice_number_unique_per_tenant() {
        let mut db = Database::open_in_memory().unwrap();
        let user_id = seed_user(&db);

        db.create_invoice(&test_invoice(user_id, "INV-0001"), &[])
            .unwrap();
        let err = db
            .create_invoice(&test_invoice(user_id, "INV-0001"), &[])
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Same number under a different tenant is fine.
        let other = seed_user(&db);
        db.create_invoice(&test_invoice(other, "INV-0001"), &[])
            .unwrap();
    }

    #[test]
    fn update_replaces_items() {
        let mut db = Database::open_in_memory().unwrap();
        let user_id = seed_user(&db);
        let mut invoice = test_invoice(user_id, "INV-0002");
        db.create_invoice(&invoice, &test_items(invoice.id)).unwrap();

        invoice.status = InvoiceStatus::Sent;
        let replacement = vec![InvoiceItem {
            id: Uuid::new_v4(),
            invoice_id: invoice.id,
            name: "Consulting".into(),
            description: None,
            quantity: 4.0,
            rate: 120.0,
            position: 0,
        }];
        db.update_invoice(&invoice, &replacement).unwrap();

        let items = db.get_invoice_items(invoice.id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Consulting");
        assert_eq!(
            db.get_invoice(user_id, invoice.id).unwrap().status,
            InvoiceStatus::Sent
        );
    }

    #[test]
    fn delete_cascades_to_items() {
        let mut db = Database::open_in_memory().unwrap();
        let user_id = seed_user(&db);
        let invoice = test_invoice(user_id, "INV-0003");
        db.create_invoice(&invoice, &test_items(invoice.id)).unwrap();

        assert!(db.delete_invoice(user_id, invoice.id).unwrap());
        assert!(db.get_invoice_items(invoice.id).unwrap().is_empty());
    }

    #[test]
    fn status_transition() {
        let mut db = Database::open_in_memory().unwrap();
        let user_id = seed_user(&db);
        let invoice = test_invoice(user_id, "INV-0004");
        db.create_invoice(&invoice, &[]).unwrap();

        db.update_invoice_status(user_id, invoice.id, InvoiceStatus::Paid)
            .unwrap();
        assert_eq!(
            db.get_invoice(user_id, invoice.id).unwrap().status,
            InvoiceStatus::Paid
        );

        // Wrong tenant cannot transition it.
        let other = seed_user(&db);
        assert!(matches!(
            db.update_invoice_status(other, invoice.id, InvoiceStatus::Cancelled),
            Err(StoreError::NotFound)
        ));
    }
}
