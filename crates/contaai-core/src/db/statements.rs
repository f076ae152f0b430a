//! Bank statement and bank transaction operations
//!
//! A statement exclusively owns its transaction rows; lines are inserted
//! with the statement and deleted with it (cascade).

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_date_col, parse_datetime, parse_money, parse_money_opt, Database};
use crate::error::{Error, Result};
use crate::models::{
    BankStatement, BankTransaction, BankTransactionKind, NewBankStatement, NewBankTransaction,
    StatementStatus,
};

const STATEMENT_COLS: &str = "s.id, s.company_id, s.file_name, s.file_size, s.bank_name, \
     s.account_number, s.period_start, s.period_end, s.status, s.opening_balance, \
     s.closing_balance, \
     (SELECT COUNT(*) FROM bank_transactions bt WHERE bt.statement_id = s.id), s.created_at";

fn row_to_statement(row: &Row<'_>) -> rusqlite::Result<BankStatement> {
    let period_start: Option<String> = row.get(6)?;
    let period_end: Option<String> = row.get(7)?;
    let status: String = row.get(8)?;
    let opening: String = row.get(9)?;
    let closing: String = row.get(10)?;
    let created_at: String = row.get(12)?;
    Ok(BankStatement {
        id: row.get(0)?,
        company_id: row.get(1)?,
        file_name: row.get(2)?,
        file_size: row.get(3)?,
        bank_name: row.get(4)?,
        account_number: row.get(5)?,
        period_start: parse_date_col(period_start),
        period_end: parse_date_col(period_end),
        status: status.parse().unwrap_or(StatementStatus::Processing),
        opening_balance: parse_money(&opening),
        closing_balance: parse_money(&closing),
        total_transactions: row.get(11)?,
        created_at: parse_datetime(&created_at),
    })
}

const BANK_TX_COLS: &str = "id, company_id, statement_id, date, description, amount, balance, \
     reference, kind, counterparty, iban, created_at";

fn row_to_bank_transaction(row: &Row<'_>) -> rusqlite::Result<BankTransaction> {
    let date: Option<String> = row.get(3)?;
    let amount: String = row.get(5)?;
    let balance: Option<String> = row.get(6)?;
    let kind: String = row.get(8)?;
    let created_at: String = row.get(11)?;
    Ok(BankTransaction {
        id: row.get(0)?,
        company_id: row.get(1)?,
        statement_id: row.get(2)?,
        date: parse_date_col(date),
        description: row.get(4)?,
        amount: parse_money(&amount),
        balance: parse_money_opt(balance),
        reference: row.get(7)?,
        kind: kind.parse().unwrap_or(BankTransactionKind::Debit),
        counterparty: row.get(9)?,
        iban: row.get(10)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Create a bank statement shell in `processing` status
    pub fn create_statement(&self, company_id: i64, statement: &NewBankStatement) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO bank_statements (company_id, file_name, file_size, bank_name, account_number,
                                         period_start, period_end, opening_balance, closing_balance)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                company_id,
                statement.file_name,
                statement.file_size,
                statement.bank_name,
                statement.account_number,
                statement.period_start.map(|d| d.to_string()),
                statement.period_end.map(|d| d.to_string()),
                statement.opening_balance.to_string(),
                statement.closing_balance.to_string(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a statement by ID within the company scope
    pub fn get_statement(&self, company_id: i64, id: i64) -> Result<Option<BankStatement>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM bank_statements s WHERE s.id = ? AND s.company_id = ?",
                STATEMENT_COLS
            ),
            params![id, company_id],
            row_to_statement,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List the company's statements, newest first
    pub fn list_statements(&self, company_id: i64) -> Result<Vec<BankStatement>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bank_statements s WHERE s.company_id = ? ORDER BY s.created_at DESC, s.id DESC",
            STATEMENT_COLS
        ))?;
        let statements = stmt
            .query_map(params![company_id], row_to_statement)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(statements)
    }

    /// Update statement header fields
    pub fn update_statement(
        &self,
        company_id: i64,
        id: i64,
        statement: &NewBankStatement,
        status: Option<StatementStatus>,
    ) -> Result<Option<BankStatement>> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE bank_statements
            SET file_name = ?, file_size = ?, bank_name = ?, account_number = ?,
                period_start = ?, period_end = ?, opening_balance = ?, closing_balance = ?
            WHERE id = ? AND company_id = ?
            "#,
            params![
                statement.file_name,
                statement.file_size,
                statement.bank_name,
                statement.account_number,
                statement.period_start.map(|d| d.to_string()),
                statement.period_end.map(|d| d.to_string()),
                statement.opening_balance.to_string(),
                statement.closing_balance.to_string(),
                id,
                company_id,
            ],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        if let Some(status) = status {
            conn.execute(
                "UPDATE bank_statements SET status = ? WHERE id = ? AND company_id = ?",
                params![status.as_str(), id, company_id],
            )?;
        }
        self.get_statement(company_id, id)
    }

    /// Mark a statement's processing status
    pub fn set_statement_status(
        &self,
        company_id: i64,
        id: i64,
        status: StatementStatus,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE bank_statements SET status = ? WHERE id = ? AND company_id = ?",
            params![status.as_str(), id, company_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Bank statement {}", id)));
        }
        Ok(())
    }

    /// Insert statement lines atomically and mark the statement `completed`
    pub fn insert_bank_transactions(
        &self,
        company_id: i64,
        statement_id: i64,
        lines: &[NewBankTransaction],
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let owner: Option<i64> = tx
            .query_row(
                "SELECT id FROM bank_statements WHERE id = ? AND company_id = ?",
                params![statement_id, company_id],
                |row| row.get(0),
            )
            .optional()?;
        if owner.is_none() {
            return Err(Error::NotFound(format!("Bank statement {}", statement_id)));
        }

        for line in lines {
            tx.execute(
                r#"
                INSERT INTO bank_transactions (company_id, statement_id, date, description, amount,
                                               balance, reference, kind, counterparty, iban)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    company_id,
                    statement_id,
                    line.date.map(|d| d.to_string()),
                    line.description,
                    line.amount.to_string(),
                    line.balance.map(|b| b.to_string()),
                    line.reference,
                    line.kind.as_str(),
                    line.counterparty,
                    line.iban,
                ],
            )?;
        }

        tx.execute(
            "UPDATE bank_statements SET status = 'completed' WHERE id = ?",
            params![statement_id],
        )?;

        tx.commit()?;
        Ok(lines.len())
    }

    /// List one statement's lines in date order
    pub fn list_bank_transactions(
        &self,
        company_id: i64,
        statement_id: i64,
    ) -> Result<Vec<BankTransaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bank_transactions WHERE statement_id = ? AND company_id = ? ORDER BY date IS NULL, date, id",
            BANK_TX_COLS
        ))?;
        let txs = stmt
            .query_map(params![statement_id, company_id], row_to_bank_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// List every bank transaction for a company across statements
    pub fn list_all_bank_transactions(&self, company_id: i64) -> Result<Vec<BankTransaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bank_transactions WHERE company_id = ? ORDER BY date IS NULL, date, id",
            BANK_TX_COLS
        ))?;
        let txs = stmt
            .query_map(params![company_id], row_to_bank_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Get one bank transaction within the company scope
    pub fn get_bank_transaction(
        &self,
        company_id: i64,
        id: i64,
    ) -> Result<Option<BankTransaction>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM bank_transactions WHERE id = ? AND company_id = ?",
                BANK_TX_COLS
            ),
            params![id, company_id],
            row_to_bank_transaction,
        )
        .optional()
        .map_err(Into::into)
    }
}
