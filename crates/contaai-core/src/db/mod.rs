//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `companies` - Company and user operations
//! - `documents` - Document and generated-transaction operations
//! - `contracts` - Contract CRUD
//! - `invoices` - Invoice and client operations (numbering, totals)
//! - `products` - Product CRUD
//! - `statements` - Bank statement and bank transaction operations
//! - `reconciliations` - Reconciliation record operations
//!
//! Every query on business data is filtered by the owning company id;
//! cross-company access is impossible by construction.

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{Error, Result};

mod companies;
mod contracts;
mod documents;
mod invoices;
mod products;
mod reconciliations;
mod statements;

pub use reconciliations::NewReconciliation;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "CONTAAI_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path. This allows moving/renaming/restoring the database freely.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Fixed application salt - changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"contaai-salt-v1.";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    // Extract the hash portion for use as SQLCipher key (hex encoded)
    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse an optional ISO date column
pub(crate) fn parse_date_col(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok())
}

/// Parse a TEXT money column; malformed values degrade to zero
pub(crate) fn parse_money(s: &str) -> Decimal {
    s.parse::<Decimal>().unwrap_or_default()
}

/// Parse an optional TEXT money column
pub(crate) fn parse_money_opt(s: Option<String>) -> Option<Decimal> {
    s.and_then(|v| v.parse::<Decimal>().ok())
}

/// Decode a JSON string-array column; malformed values degrade to empty
pub(crate) fn parse_string_list(s: Option<String>) -> Vec<String> {
    s.and_then(|v| serde_json::from_str(&v).ok())
        .unwrap_or_default()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `CONTAAI_DB_KEY` environment variable to be set.
    /// The database will be encrypted using SQLCipher with a key derived
    /// from the passphrase via Argon2.
    ///
    /// Returns an error if `CONTAAI_DB_KEY` is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: This creates an unencrypted database. Only use for development
    /// or testing. For production, use `new()` with `CONTAAI_DB_KEY` set.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Use with_init to set the key on every new connection
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!("/tmp/contaai_test_{}_{}.db", std::process::id(), id);

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Append an audit log entry
    pub fn log_audit(
        &self,
        user_email: &str,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<i64>,
        details: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO audit_log (user_email, action, entity_type, entity_id, details) VALUES (?, ?, ?, ?, ?)",
            rusqlite::params![user_email, action, entity_type, entity_id, details],
        )?;
        Ok(())
    }

    /// List recent audit entries, newest first
    pub fn list_audit_log(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, user_email, action, entity_type, entity_id, details
             FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;
        let entries = stmt
            .query_map(rusqlite::params![limit], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    user_email: row.get(2)?,
                    action: row.get(3)?,
                    entity_type: row.get(4)?,
                    entity_id: row.get(5)?,
                    details: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: better concurrency, readers don't block writers
            PRAGMA journal_mode = WAL;

            -- Cache size: ~8MB (2000 pages * 4KB default page size)
            PRAGMA cache_size = 2000;

            -- Synchronous NORMAL: good balance of safety and performance
            PRAGMA synchronous = NORMAL;

            -- Store temp tables in memory (faster for complex queries)
            PRAGMA temp_store = MEMORY;

            -- Tenant companies
            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                cui TEXT NOT NULL UNIQUE,
                reg_com TEXT NOT NULL,
                address TEXT NOT NULL,
                phone TEXT,
                email TEXT,
                vat_rate REAL NOT NULL DEFAULT 19,
                currency TEXT NOT NULL DEFAULT 'RON',
                invoice_prefix TEXT NOT NULL DEFAULT 'INV',
                invoice_counter INTEGER NOT NULL DEFAULT 1,
                owner_id INTEGER NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Users
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                role TEXT NOT NULL DEFAULT 'admin',
                company_id INTEGER REFERENCES companies(id),
                last_login DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_users_company ON users(company_id);

            -- Billed clients
            CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                name TEXT NOT NULL,
                cui TEXT,
                email TEXT,
                total_invoiced TEXT NOT NULL DEFAULT '0',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_clients_company ON clients(company_id);

            -- Uploaded documents + extracted analysis fields
            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                file_name TEXT NOT NULL,
                file_size TEXT,
                file_type TEXT,
                file_data TEXT,                            -- base64 payload
                category TEXT,
                status TEXT NOT NULL DEFAULT 'processing', -- processing, completed, error
                analysis_confidence REAL NOT NULL DEFAULT 0,
                supplier TEXT,
                amount_text TEXT,                          -- raw extracted amount
                client TEXT,
                document_date TEXT,                        -- raw extracted date
                invoice_number TEXT,
                cui TEXT,
                description TEXT,
                insights TEXT,                             -- JSON string array
                recommendations TEXT,                      -- JSON string array
                content_hash TEXT,                         -- SHA256 of uploaded bytes
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_documents_company ON documents(company_id);
            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status);
            CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);

            -- Transactions generated from analyzed documents.
            -- date is nullable: undated rows are kept but excluded from period sums.
            CREATE TABLE IF NOT EXISTS document_transactions (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                description TEXT NOT NULL,
                amount TEXT NOT NULL,                      -- exact decimal, stored as text
                kind TEXT NOT NULL,                        -- income, expense
                category TEXT,
                date DATE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_doc_tx_company ON document_transactions(company_id);
            CREATE INDEX IF NOT EXISTS idx_doc_tx_document ON document_transactions(document_id);
            CREATE INDEX IF NOT EXISTS idx_doc_tx_date ON document_transactions(date);

            -- Contracts
            CREATE TABLE IF NOT EXISTS contracts (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                number TEXT NOT NULL,
                title TEXT,
                client_name TEXT,
                type TEXT,
                status TEXT NOT NULL DEFAULT 'draft',
                start_date DATE,
                end_date DATE,
                value TEXT NOT NULL DEFAULT '0',
                currency TEXT NOT NULL DEFAULT 'RON',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(company_id, number)
            );

            CREATE INDEX IF NOT EXISTS idx_contracts_company ON contracts(company_id);
            CREATE INDEX IF NOT EXISTS idx_contracts_status ON contracts(status);

            -- Invoices
            CREATE TABLE IF NOT EXISTS invoices (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                number TEXT NOT NULL,
                client_id INTEGER NOT NULL REFERENCES clients(id),
                total TEXT NOT NULL DEFAULT '0',
                status TEXT NOT NULL DEFAULT 'draft',      -- draft, sent, paid, overdue
                issue_date DATE,
                due_date DATE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(company_id, number)
            );

            CREATE INDEX IF NOT EXISTS idx_invoices_company ON invoices(company_id);
            CREATE INDEX IF NOT EXISTS idx_invoices_status ON invoices(status);
            CREATE INDEX IF NOT EXISTS idx_invoices_client ON invoices(client_id);

            -- Products
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                name TEXT NOT NULL,
                sku TEXT NOT NULL,
                category TEXT,
                unit_price TEXT NOT NULL DEFAULT '0',
                vat_rate REAL NOT NULL DEFAULT 19,
                stock INTEGER NOT NULL DEFAULT 0,
                min_stock INTEGER NOT NULL DEFAULT 5,
                unit TEXT NOT NULL DEFAULT 'buc',
                status TEXT NOT NULL DEFAULT 'active',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(company_id, sku)
            );

            CREATE INDEX IF NOT EXISTS idx_products_company ON products(company_id);

            -- Bank statements (exclusively own their transaction rows)
            CREATE TABLE IF NOT EXISTS bank_statements (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                file_name TEXT NOT NULL,
                file_size TEXT,
                bank_name TEXT,
                account_number TEXT,
                period_start DATE,
                period_end DATE,
                status TEXT NOT NULL DEFAULT 'processing',
                opening_balance TEXT NOT NULL DEFAULT '0',
                closing_balance TEXT NOT NULL DEFAULT '0',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_statements_company ON bank_statements(company_id);

            -- Bank statement lines. No lifecycle of their own: deleted with the statement.
            CREATE TABLE IF NOT EXISTS bank_transactions (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                statement_id INTEGER NOT NULL REFERENCES bank_statements(id) ON DELETE CASCADE,
                date DATE,
                description TEXT NOT NULL,
                amount TEXT NOT NULL,
                balance TEXT,
                reference TEXT,
                kind TEXT NOT NULL,                        -- debit, credit
                counterparty TEXT,
                iban TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_bank_tx_company ON bank_transactions(company_id);
            CREATE INDEX IF NOT EXISTS idx_bank_tx_statement ON bank_transactions(statement_id);
            CREATE INDEX IF NOT EXISTS idx_bank_tx_date ON bank_transactions(date);

            -- Reconciliation links. The partial unique index enforces the
            -- at-most-one-active-match invariant per bank transaction.
            CREATE TABLE IF NOT EXISTS reconciliations (
                id INTEGER PRIMARY KEY,
                company_id INTEGER NOT NULL REFERENCES companies(id),
                bank_transaction_id INTEGER NOT NULL REFERENCES bank_transactions(id) ON DELETE CASCADE,
                matched_kind TEXT,                         -- invoice, transaction (NULL when unmatched)
                matched_id INTEGER,
                match_type TEXT NOT NULL,                  -- exact, fuzzy, manual
                confidence REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'unmatched',  -- matched, unmatched, disputed
                superseded INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_reconciliations_active
                ON reconciliations(bank_transaction_id) WHERE superseded = 0;
            CREATE INDEX IF NOT EXISTS idx_reconciliations_company ON reconciliations(company_id);

            -- Audit log (tracks all API access)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                user_email TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log(user_email);
            CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

/// Audit log entry
#[derive(Debug, Clone, serde::Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub user_email: String,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests;
