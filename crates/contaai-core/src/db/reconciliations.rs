//! Reconciliation record operations
//!
//! Writes follow a supersede-then-insert discipline: the active row for a
//! bank transaction is never updated in place, it is flagged superseded and
//! a fresh row inserted. The partial unique index in the schema guarantees
//! a bank transaction has at most one active row at any time.

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{MatchType, MatchedKind, Reconciliation, ReconciliationStatus};

/// A reconciliation row to be recorded (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewReconciliation {
    pub bank_transaction_id: i64,
    pub matched_kind: Option<MatchedKind>,
    pub matched_id: Option<i64>,
    pub match_type: MatchType,
    pub confidence: f64,
    pub status: ReconciliationStatus,
}

const RECONCILIATION_COLS: &str = "id, company_id, bank_transaction_id, matched_kind, matched_id, \
     match_type, confidence, status, superseded, created_at";

fn row_to_reconciliation(row: &Row<'_>) -> rusqlite::Result<Reconciliation> {
    let matched_kind: Option<String> = row.get(3)?;
    let match_type: String = row.get(5)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    Ok(Reconciliation {
        id: row.get(0)?,
        company_id: row.get(1)?,
        bank_transaction_id: row.get(2)?,
        matched_kind: matched_kind.and_then(|s| s.parse().ok()),
        matched_id: row.get(4)?,
        match_type: match_type.parse().unwrap_or(MatchType::Fuzzy),
        confidence: row.get(6)?,
        status: status.parse().unwrap_or(ReconciliationStatus::Unmatched),
        superseded: row.get(8)?,
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Get one reconciliation within the company scope
    pub fn get_reconciliation(&self, company_id: i64, id: i64) -> Result<Option<Reconciliation>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM reconciliations WHERE id = ? AND company_id = ?",
                RECONCILIATION_COLS
            ),
            params![id, company_id],
            row_to_reconciliation,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Active (non-superseded) reconciliation for one bank transaction
    pub fn get_active_reconciliation(
        &self,
        company_id: i64,
        bank_transaction_id: i64,
    ) -> Result<Option<Reconciliation>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM reconciliations WHERE bank_transaction_id = ? AND company_id = ? AND superseded = 0",
                RECONCILIATION_COLS
            ),
            params![bank_transaction_id, company_id],
            row_to_reconciliation,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Active reconciliations for every line of a statement
    pub fn list_statement_reconciliations(
        &self,
        company_id: i64,
        statement_id: i64,
    ) -> Result<Vec<Reconciliation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM reconciliations r
            WHERE r.company_id = ?
              AND r.superseded = 0
              AND r.bank_transaction_id IN
                  (SELECT id FROM bank_transactions WHERE statement_id = ?)
            ORDER BY r.bank_transaction_id
            "#,
            RECONCILIATION_COLS
        ))?;
        let recs = stmt
            .query_map(params![company_id, statement_id], row_to_reconciliation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(recs)
    }

    /// Record one reconciliation run atomically.
    ///
    /// Supersedes the previous *automatic* rows for the affected bank
    /// transactions and inserts the new ones. Manual rows are left alone;
    /// callers must not include bank transactions that carry one.
    ///
    /// Runs inside an immediate transaction: concurrent runs over the same
    /// company serialize at the database write lock, which is what upholds
    /// the at-most-one-active-match invariant under contention.
    pub fn record_reconciliation_run(
        &self,
        company_id: i64,
        entries: &[NewReconciliation],
    ) -> Result<Vec<Reconciliation>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            tx.execute(
                r#"
                UPDATE reconciliations SET superseded = 1
                WHERE bank_transaction_id = ? AND company_id = ? AND superseded = 0
                  AND match_type != 'manual'
                "#,
                params![entry.bank_transaction_id, company_id],
            )?;
            tx.execute(
                r#"
                INSERT INTO reconciliations (company_id, bank_transaction_id, matched_kind,
                                             matched_id, match_type, confidence, status)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    company_id,
                    entry.bank_transaction_id,
                    entry.matched_kind.map(|k| k.as_str()),
                    entry.matched_id,
                    entry.match_type.as_str(),
                    entry.confidence,
                    entry.status.as_str(),
                ],
            )?;
            ids.push(tx.last_insert_rowid());
        }

        tx.commit()?;

        let mut recorded = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(rec) = self.get_reconciliation(company_id, id)? {
                recorded.push(rec);
            }
        }
        Ok(recorded)
    }

    /// Record a manual reconciliation, overriding whatever was active
    /// (manual included: a newer manual decision always wins).
    pub fn record_manual_reconciliation(
        &self,
        company_id: i64,
        bank_transaction_id: i64,
        matched_kind: MatchedKind,
        matched_id: i64,
    ) -> Result<Reconciliation> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        tx.execute(
            "UPDATE reconciliations SET superseded = 1 WHERE bank_transaction_id = ? AND company_id = ? AND superseded = 0",
            params![bank_transaction_id, company_id],
        )?;
        tx.execute(
            r#"
            INSERT INTO reconciliations (company_id, bank_transaction_id, matched_kind, matched_id,
                                         match_type, confidence, status)
            VALUES (?, ?, ?, ?, 'manual', 1.0, 'matched')
            "#,
            params![
                company_id,
                bank_transaction_id,
                matched_kind.as_str(),
                matched_id,
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.commit()?;

        self.get_reconciliation(company_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Reconciliation {}", id)))
    }
}
