//! Contract operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_date_col, parse_datetime, parse_money, Database};
use crate::error::Result;
use crate::models::{Contract, ContractStatus, NewContract};

const CONTRACT_COLS: &str = "id, company_id, number, title, client_name, type, status, \
     start_date, end_date, value, currency, created_at";

fn row_to_contract(row: &Row<'_>) -> rusqlite::Result<Contract> {
    let status: String = row.get(6)?;
    let start_date: Option<String> = row.get(7)?;
    let end_date: Option<String> = row.get(8)?;
    let value: String = row.get(9)?;
    let created_at: String = row.get(11)?;
    Ok(Contract {
        id: row.get(0)?,
        company_id: row.get(1)?,
        number: row.get(2)?,
        title: row.get(3)?,
        client_name: row.get(4)?,
        contract_type: row.get(5)?,
        status: status.parse().unwrap_or(ContractStatus::Draft),
        start_date: parse_date_col(start_date),
        end_date: parse_date_col(end_date),
        value: parse_money(&value),
        currency: row.get(10)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Create a contract
    pub fn create_contract(&self, company_id: i64, contract: &NewContract) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO contracts (company_id, number, title, client_name, type, status, start_date, end_date, value, currency)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                company_id,
                contract.number,
                contract.title,
                contract.client_name,
                contract.contract_type,
                contract.status.as_str(),
                contract.start_date.map(|d| d.to_string()),
                contract.end_date.map(|d| d.to_string()),
                contract.value.to_string(),
                contract.currency,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a contract by ID within the company scope
    pub fn get_contract(&self, company_id: i64, id: i64) -> Result<Option<Contract>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM contracts WHERE id = ? AND company_id = ?",
                CONTRACT_COLS
            ),
            params![id, company_id],
            row_to_contract,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List the company's contracts, newest first
    pub fn list_contracts(&self, company_id: i64) -> Result<Vec<Contract>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM contracts WHERE company_id = ? ORDER BY created_at DESC, id DESC",
            CONTRACT_COLS
        ))?;
        let contracts = stmt
            .query_map(params![company_id], row_to_contract)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contracts)
    }

    /// Replace a contract's mutable fields
    pub fn update_contract(
        &self,
        company_id: i64,
        id: i64,
        contract: &NewContract,
    ) -> Result<Option<Contract>> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE contracts
            SET number = ?, title = ?, client_name = ?, type = ?, status = ?,
                start_date = ?, end_date = ?, value = ?, currency = ?
            WHERE id = ? AND company_id = ?
            "#,
            params![
                contract.number,
                contract.title,
                contract.client_name,
                contract.contract_type,
                contract.status.as_str(),
                contract.start_date.map(|d| d.to_string()),
                contract.end_date.map(|d| d.to_string()),
                contract.value.to_string(),
                contract.currency,
                id,
                company_id,
            ],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_contract(company_id, id)
    }

    /// Delete a contract
    pub fn delete_contract(&self, company_id: i64, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM contracts WHERE id = ? AND company_id = ?",
            params![id, company_id],
        )?;
        Ok(deleted > 0)
    }
}
