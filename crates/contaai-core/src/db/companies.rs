//! Company and user operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Company, NewCompany, User};

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let last_login: Option<String> = row.get(6)?;
    let created_at: String = row.get(7)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        role: row.get(4)?,
        company_id: row.get(5)?,
        last_login: last_login.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&created_at),
    })
}

fn row_to_company(row: &Row<'_>) -> rusqlite::Result<Company> {
    let created_at: String = row.get(12)?;
    Ok(Company {
        id: row.get(0)?,
        name: row.get(1)?,
        cui: row.get(2)?,
        reg_com: row.get(3)?,
        address: row.get(4)?,
        phone: row.get(5)?,
        email: row.get(6)?,
        vat_rate: row.get(7)?,
        currency: row.get(8)?,
        invoice_prefix: row.get(9)?,
        invoice_counter: row.get(10)?,
        owner_id: row.get(11)?,
        created_at: parse_datetime(&created_at),
    })
}

const USER_COLS: &str =
    "id, email, first_name, last_name, role, company_id, last_login, created_at";
const COMPANY_COLS: &str = "id, name, cui, reg_com, address, phone, email, vat_rate, currency, \
     invoice_prefix, invoice_counter, owner_id, created_at";

impl Database {
    /// Create a user with an Argon2id password hash.
    /// Fails with a validation error when the email is already registered.
    pub fn create_user(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        role: &str,
    ) -> Result<i64> {
        use argon2::password_hash::{rand_core::OsRng, SaltString};
        use argon2::{Argon2, PasswordHasher};

        if self.get_user_by_email(email)?.is_some() {
            return Err(Error::Validation("User already exists".to_string()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Auth(format!("Failed to hash password: {}", e)))?
            .to_string();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (email, password_hash, first_name, last_name, role) VALUES (?, ?, ?, ?, ?)",
            params![email, hash, first_name, last_name, role],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a user by ID
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLS),
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Get a user by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?", USER_COLS),
            params![email],
            row_to_user,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Verify credentials. On success updates `last_login` and returns the user;
    /// wrong email and wrong password are indistinguishable to the caller.
    pub fn verify_password(&self, email: &str, password: &str) -> Result<Option<User>> {
        use argon2::{Argon2, PasswordHash, PasswordVerifier};

        let conn = self.conn()?;
        let stored: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, password_hash FROM users WHERE email = ?",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (user_id, hash) = match stored {
            Some(pair) => pair,
            None => return Ok(None),
        };

        let parsed = PasswordHash::new(&hash)
            .map_err(|e| Error::Auth(format!("Stored password hash is invalid: {}", e)))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return Ok(None);
        }

        conn.execute(
            "UPDATE users SET last_login = CURRENT_TIMESTAMP WHERE id = ?",
            params![user_id],
        )?;
        self.get_user(user_id)
    }

    /// Attach a user to a company
    pub fn set_user_company(&self, user_id: i64, company_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET company_id = ? WHERE id = ?",
            params![company_id, user_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    /// Create a company owned by a user and attach that user to it
    pub fn create_company(&self, owner_id: i64, company: &NewCompany) -> Result<i64> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO companies (name, cui, reg_com, address, phone, email, vat_rate, currency, invoice_prefix, owner_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                company.name,
                company.cui,
                company.reg_com,
                company.address,
                company.phone,
                company.email,
                company.vat_rate,
                company.currency,
                company.invoice_prefix,
                owner_id,
            ],
        )?;
        let company_id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE users SET company_id = ? WHERE id = ?",
            params![company_id, owner_id],
        )?;

        tx.commit()?;
        Ok(company_id)
    }

    /// Get a company by ID
    pub fn get_company(&self, id: i64) -> Result<Option<Company>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM companies WHERE id = ?", COMPANY_COLS),
            params![id],
            row_to_company,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List all companies (CLI / admin use)
    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM companies ORDER BY name",
            COMPANY_COLS
        ))?;
        let companies = stmt
            .query_map([], row_to_company)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(companies)
    }

    /// Update company settings (replaces the mutable profile fields)
    pub fn update_company(&self, id: i64, company: &NewCompany) -> Result<Option<Company>> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE companies
            SET name = ?, cui = ?, reg_com = ?, address = ?, phone = ?, email = ?,
                vat_rate = ?, currency = ?, invoice_prefix = ?
            WHERE id = ?
            "#,
            params![
                company.name,
                company.cui,
                company.reg_com,
                company.address,
                company.phone,
                company.email,
                company.vat_rate,
                company.currency,
                company.invoice_prefix,
                id,
            ],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_company(id)
    }
}
