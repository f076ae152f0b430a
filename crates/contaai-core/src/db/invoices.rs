//! Invoice and client operations
//!
//! Invoice numbers are generated from the company's prefix and counter
//! (`INV-0001` style). Creating an invoice increments the counter and the
//! client's running invoiced total in the same transaction.

use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{parse_date_col, parse_datetime, parse_money, Database};
use crate::error::{Error, Result};
use crate::models::{Client, Invoice, InvoiceStatus, NewInvoice};

const INVOICE_COLS: &str =
    "id, company_id, number, client_id, total, status, issue_date, due_date, created_at";

fn row_to_invoice(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    let total: String = row.get(4)?;
    let status: String = row.get(5)?;
    let issue_date: Option<String> = row.get(6)?;
    let due_date: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(Invoice {
        id: row.get(0)?,
        company_id: row.get(1)?,
        number: row.get(2)?,
        client_id: row.get(3)?,
        total: parse_money(&total),
        status: status.parse().unwrap_or(InvoiceStatus::Draft),
        issue_date: parse_date_col(issue_date),
        due_date: parse_date_col(due_date),
        created_at: parse_datetime(&created_at),
    })
}

const CLIENT_COLS: &str = "id, company_id, name, cui, email, total_invoiced, created_at";

fn row_to_client(row: &Row<'_>) -> rusqlite::Result<Client> {
    let total_invoiced: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    Ok(Client {
        id: row.get(0)?,
        company_id: row.get(1)?,
        name: row.get(2)?,
        cui: row.get(3)?,
        email: row.get(4)?,
        total_invoiced: parse_money(&total_invoiced),
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Create an invoice with a generated number, bumping the company
    /// counter and the client's invoiced total atomically.
    pub fn create_invoice(&self, company_id: i64, invoice: &NewInvoice) -> Result<Invoice> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let (prefix, counter): (String, i64) = tx
            .query_row(
                "SELECT invoice_prefix, invoice_counter FROM companies WHERE id = ?",
                params![company_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Company {}", company_id)))?;

        let client_exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM clients WHERE id = ? AND company_id = ?",
                params![invoice.client_id, company_id],
                |row| row.get(0),
            )
            .optional()?;
        if client_exists.is_none() {
            return Err(Error::NotFound(format!("Client {}", invoice.client_id)));
        }

        let number = format!("{}-{:04}", prefix, counter);

        tx.execute(
            r#"
            INSERT INTO invoices (company_id, number, client_id, total, status, issue_date, due_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                company_id,
                number,
                invoice.client_id,
                invoice.total.to_string(),
                invoice.status.as_str(),
                invoice.issue_date.map(|d| d.to_string()),
                invoice.due_date.map(|d| d.to_string()),
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE companies SET invoice_counter = invoice_counter + 1 WHERE id = ?",
            params![company_id],
        )?;

        // Running total is stored as TEXT; recompute in Rust to keep decimal semantics
        let current: String = tx.query_row(
            "SELECT total_invoiced FROM clients WHERE id = ?",
            params![invoice.client_id],
            |row| row.get(0),
        )?;
        let new_total = parse_money(&current) + invoice.total;
        tx.execute(
            "UPDATE clients SET total_invoiced = ? WHERE id = ?",
            params![new_total.to_string(), invoice.client_id],
        )?;

        tx.commit()?;

        self.get_invoice(company_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Invoice {}", id)))
    }

    /// Get an invoice by ID within the company scope
    pub fn get_invoice(&self, company_id: i64, id: i64) -> Result<Option<Invoice>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM invoices WHERE id = ? AND company_id = ?",
                INVOICE_COLS
            ),
            params![id, company_id],
            row_to_invoice,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List the company's invoices, newest first
    pub fn list_invoices(&self, company_id: i64) -> Result<Vec<Invoice>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM invoices WHERE company_id = ? ORDER BY created_at DESC, id DESC",
            INVOICE_COLS
        ))?;
        let invoices = stmt
            .query_map(params![company_id], row_to_invoice)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(invoices)
    }

    /// List invoices still awaiting settlement (reconciliation candidates)
    pub fn list_open_invoices(&self, company_id: i64) -> Result<Vec<Invoice>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM invoices WHERE company_id = ? AND status IN ('sent', 'overdue') ORDER BY issue_date, id",
            INVOICE_COLS
        ))?;
        let invoices = stmt
            .query_map(params![company_id], row_to_invoice)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(invoices)
    }

    /// Update an invoice's total, status and dates
    pub fn update_invoice(
        &self,
        company_id: i64,
        id: i64,
        total: Option<Decimal>,
        status: Option<InvoiceStatus>,
        issue_date: Option<chrono::NaiveDate>,
        due_date: Option<chrono::NaiveDate>,
    ) -> Result<Option<Invoice>> {
        let conn = self.conn()?;
        if let Some(total) = total {
            conn.execute(
                "UPDATE invoices SET total = ? WHERE id = ? AND company_id = ?",
                params![total.to_string(), id, company_id],
            )?;
        }
        if let Some(status) = status {
            conn.execute(
                "UPDATE invoices SET status = ? WHERE id = ? AND company_id = ?",
                params![status.as_str(), id, company_id],
            )?;
        }
        if let Some(issue_date) = issue_date {
            conn.execute(
                "UPDATE invoices SET issue_date = ? WHERE id = ? AND company_id = ?",
                params![issue_date.to_string(), id, company_id],
            )?;
        }
        if let Some(due_date) = due_date {
            conn.execute(
                "UPDATE invoices SET due_date = ? WHERE id = ? AND company_id = ?",
                params![due_date.to_string(), id, company_id],
            )?;
        }
        self.get_invoice(company_id, id)
    }

    /// Create a client
    pub fn create_client(
        &self,
        company_id: i64,
        name: &str,
        cui: Option<&str>,
        email: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO clients (company_id, name, cui, email) VALUES (?, ?, ?, ?)",
            params![company_id, name, cui, email],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a client by ID within the company scope
    pub fn get_client(&self, company_id: i64, id: i64) -> Result<Option<Client>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM clients WHERE id = ? AND company_id = ?",
                CLIENT_COLS
            ),
            params![id, company_id],
            row_to_client,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List the company's clients, newest first
    pub fn list_clients(&self, company_id: i64) -> Result<Vec<Client>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM clients WHERE company_id = ? ORDER BY created_at DESC, id DESC",
            CLIENT_COLS
        ))?;
        let clients = stmt
            .query_map(params![company_id], row_to_client)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(clients)
    }
}
