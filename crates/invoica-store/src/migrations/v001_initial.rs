//! v001 -- Initial schema creation.
//!
//! Creates the seven core tables: `users`, `profiles`, `customers`,
//! `invoices`, `invoice_items`, `clover_integrations`, `password_resets`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,               -- argon2 PHC string
    role          TEXT NOT NULL DEFAULT 'user',
    created_at    TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Profiles (one per user, created empty at registration)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    user_id            TEXT PRIMARY KEY NOT NULL,
    company_name       TEXT,
    phone              TEXT,
    address_line1      TEXT,
    address_line2      TEXT,
    city               TEXT,
    state              TEXT,
    postal_code        TEXT,
    country            TEXT,
    currency           TEXT NOT NULL DEFAULT 'USD',
    bank_name          TEXT,
    account_name       TEXT,
    account_number     TEXT,
    clover_api_key     TEXT,
    clover_merchant_id TEXT,
    logo_blob_id       TEXT,                   -- UUID into the blob store
    signature_blob_id  TEXT,
    updated_at         TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Customers
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS customers (
    id            TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    user_id       TEXT NOT NULL,
    name          TEXT NOT NULL,
    email         TEXT,
    phone         TEXT,
    address_line1 TEXT,
    address_line2 TEXT,
    city          TEXT,
    state         TEXT,
    postal_code   TEXT,
    country       TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_customers_user_id ON customers(user_id);

-- ----------------------------------------------------------------
-- Invoices (billing fields are creation-time snapshots, not live joins)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS invoices (
    id              TEXT PRIMARY KEY NOT NULL, -- UUID v4
    user_id         TEXT NOT NULL,
    customer_id     TEXT,                      -- nullable FK -> customers(id)
    invoice_number  TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'DRAFT',
    issue_date      TEXT NOT NULL,
    due_date        TEXT,
    currency        TEXT NOT NULL,
    payment_method  TEXT,
    payment_terms   TEXT,
    bill_to_name    TEXT NOT NULL,
    bill_to_email   TEXT,
    bill_to_address TEXT,
    from_name       TEXT,
    from_email      TEXT,
    from_address    TEXT,
    discount_value  REAL NOT NULL DEFAULT 0,
    discount_kind   TEXT NOT NULL DEFAULT 'amount',
    tax_value       REAL NOT NULL DEFAULT 0,
    tax_kind        TEXT NOT NULL DEFAULT 'amount',
    shipping_value  REAL NOT NULL DEFAULT 0,
    shipping_kind   TEXT NOT NULL DEFAULT 'amount',
    notes           TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,

    FOREIGN KEY (user_id)     REFERENCES users(id)     ON DELETE CASCADE,
    FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE SET NULL,
    UNIQUE (user_id, invoice_number)
);

CREATE INDEX IF NOT EXISTS idx_invoices_user_id ON invoices(user_id);

-- ----------------------------------------------------------------
-- Invoice line items (amount is always quantity * rate, never stored)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS invoice_items (
    id          TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    invoice_id  TEXT NOT NULL,
    name        TEXT NOT NULL,
    description TEXT,
    quantity    REAL NOT NULL,
    rate        REAL NOT NULL,
    position    INTEGER NOT NULL DEFAULT 0,

    FOREIGN KEY (invoice_id) REFERENCES invoices(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_invoice_items_invoice
    ON invoice_items(invoice_id, position);

-- ----------------------------------------------------------------
-- Clover OAuth integrations (one per user, upserted)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS clover_integrations (
    user_id       TEXT PRIMARY KEY NOT NULL,
    merchant_id   TEXT NOT NULL,
    access_token  TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    token_expiry  TEXT NOT NULL,               -- ISO-8601

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Password reset tokens (consumed by flagging, never deleted)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS password_resets (
    token      TEXT PRIMARY KEY NOT NULL,      -- UUID v4
    email      TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    used       INTEGER NOT NULL DEFAULT 0      -- boolean 0/1
);

CREATE INDEX IF NOT EXISTS idx_password_resets_email ON password_resets(email);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
