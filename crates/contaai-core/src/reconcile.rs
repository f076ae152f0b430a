//! Bank reconciliation matching
//!
//! Pairs a statement's bank transactions against the company's open
//! invoices and document-generated transactions. Matching is a pure
//! scoring pass over an in-memory snapshot; persistence happens in one
//! atomic write at the end of the run.
//!
//! Invariants upheld here:
//! - a bank transaction is matched at most once per run
//! - a candidate entity is claimed by at most one bank transaction per run
//! - `manual` reconciliations are never revised by an automatic run
//! - re-running over unchanged data produces the same active rows

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::db::{Database, NewReconciliation};
use crate::error::{Error, Result};
use crate::models::{
    BankTransaction, BankTransactionKind, Invoice, MatchType, MatchedKind, Reconciliation,
    ReconciliationStatus, Transaction, TransactionKind,
};

/// Matcher configuration
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Currency-rounding tolerance for an exact amount match
    pub amount_epsilon: Decimal,
    /// Date window (days either side) for an exact match
    pub date_window_days: i64,
    /// Relaxed amount tolerance for fuzzy matches
    pub fuzzy_amount_epsilon: Decimal,
    /// Relaxed date window for fuzzy matches
    pub fuzzy_date_window_days: i64,
    /// Confidence floor below which a fuzzy pair is not proposed
    pub min_confidence: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            amount_epsilon: Decimal::new(1, 2), // 0.01
            date_window_days: 3,
            fuzzy_amount_epsilon: Decimal::new(500, 2), // 5.00
            fuzzy_date_window_days: 14,
            min_confidence: 0.55,
        }
    }
}

/// A scoring candidate: an open invoice or a generated transaction
struct Candidate {
    kind: MatchedKind,
    id: i64,
    amount: Decimal,
    date: Option<NaiveDate>,
    /// Client name for invoices, description for transactions
    party: Option<String>,
    /// Invoice number, when applicable
    number: Option<String>,
    /// Income candidates settle credits, expense candidates settle debits
    settles: BankTransactionKind,
}

impl Candidate {
    fn from_invoice(invoice: &Invoice, client_names: &HashMap<i64, String>) -> Self {
        Self {
            kind: MatchedKind::Invoice,
            id: invoice.id,
            amount: invoice.total,
            date: invoice.issue_date,
            party: client_names.get(&invoice.client_id).cloned(),
            number: Some(invoice.number.clone()),
            settles: BankTransactionKind::Credit,
        }
    }

    fn from_transaction(tx: &Transaction) -> Self {
        Self {
            kind: MatchedKind::Transaction,
            id: tx.id,
            amount: tx.amount,
            date: tx.date,
            party: Some(tx.description.clone()),
            number: None,
            settles: match tx.kind {
                TransactionKind::Income => BankTransactionKind::Credit,
                TransactionKind::Expense => BankTransactionKind::Debit,
            },
        }
    }
}

/// A scored pairing, before persistence
struct ScoredMatch {
    candidate_index: usize,
    match_type: MatchType,
    confidence: f64,
    amount_diff: Decimal,
    date: Option<NaiveDate>,
}

/// Reconciliation engine over a company's records
pub struct Reconciler<'a> {
    db: &'a Database,
    config: MatcherConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            config: MatcherConfig::default(),
        }
    }

    pub fn with_config(db: &'a Database, config: MatcherConfig) -> Self {
        Self { db, config }
    }

    /// Run the matcher over one statement and persist the results.
    ///
    /// Returns the active reconciliation rows for the statement after the
    /// run: fresh rows for every automatically processed line plus the
    /// untouched manual rows.
    pub fn reconcile_statement(
        &self,
        company_id: i64,
        statement_id: i64,
    ) -> Result<Vec<Reconciliation>> {
        let statement = self
            .db
            .get_statement(company_id, statement_id)?
            .ok_or_else(|| Error::NotFound(format!("Bank statement {}", statement_id)))?;

        let mut bank_txs = self.db.list_bank_transactions(company_id, statement_id)?;
        // Deterministic processing order; earliest line claims a contested
        // candidate (oldest first, then id)
        bank_txs.sort_by_key(|t| (t.date, t.id));

        // Manual decisions are out of bounds for the automatic pass, and the
        // entities they settle must not be claimed a second time.
        let existing = self.db.list_statement_reconciliations(company_id, statement_id)?;
        let mut manual: HashSet<i64> = HashSet::new();
        let mut claimed: HashSet<(MatchedKind, i64)> = HashSet::new();
        for rec in &existing {
            if rec.match_type == MatchType::Manual {
                manual.insert(rec.bank_transaction_id);
                if let (Some(kind), Some(id)) = (rec.matched_kind, rec.matched_id) {
                    claimed.insert((kind, id));
                }
            }
        }

        let candidates = self.load_candidates(company_id, &statement)?;

        let mut entries = Vec::with_capacity(bank_txs.len());
        let mut skipped_manual = 0usize;

        for bank_tx in &bank_txs {
            if manual.contains(&bank_tx.id) {
                skipped_manual += 1;
                continue;
            }

            let best = self.best_match(bank_tx, &candidates, &claimed);
            match best {
                Some(scored) => {
                    let candidate = &candidates[scored.candidate_index];
                    claimed.insert((candidate.kind, candidate.id));
                    debug!(
                        bank_transaction_id = bank_tx.id,
                        matched_kind = %candidate.kind,
                        matched_id = candidate.id,
                        confidence = scored.confidence,
                        "Matched bank transaction"
                    );
                    entries.push(NewReconciliation {
                        bank_transaction_id: bank_tx.id,
                        matched_kind: Some(candidate.kind),
                        matched_id: Some(candidate.id),
                        match_type: scored.match_type,
                        confidence: scored.confidence,
                        status: ReconciliationStatus::Matched,
                    });
                }
                None => {
                    // Reported, not discarded
                    entries.push(NewReconciliation {
                        bank_transaction_id: bank_tx.id,
                        matched_kind: None,
                        matched_id: None,
                        match_type: MatchType::Fuzzy,
                        confidence: 0.0,
                        status: ReconciliationStatus::Unmatched,
                    });
                }
            }
        }

        let recorded = self.db.record_reconciliation_run(company_id, &entries)?;

        let matched = recorded
            .iter()
            .filter(|r| r.status == ReconciliationStatus::Matched)
            .count();
        info!(
            company_id,
            statement_id,
            matched,
            unmatched = recorded.len() - matched,
            skipped_manual,
            "Reconciliation run complete"
        );

        self.db
            .list_statement_reconciliations(company_id, statement_id)
    }

    /// Record an operator's explicit pairing. Always overrides whatever is
    /// active for the bank transaction, with type `manual`, confidence 1.0.
    pub fn manual_reconcile(
        &self,
        company_id: i64,
        bank_transaction_id: i64,
        matched_kind: MatchedKind,
        matched_id: i64,
    ) -> Result<Reconciliation> {
        self.db
            .get_bank_transaction(company_id, bank_transaction_id)?
            .ok_or_else(|| {
                Error::NotFound(format!("Bank transaction {}", bank_transaction_id))
            })?;

        match matched_kind {
            MatchedKind::Invoice => {
                self.db
                    .get_invoice(company_id, matched_id)?
                    .ok_or_else(|| Error::NotFound(format!("Invoice {}", matched_id)))?;
            }
            MatchedKind::Transaction => {
                self.db
                    .get_transaction(company_id, matched_id)?
                    .ok_or_else(|| Error::NotFound(format!("Transaction {}", matched_id)))?;
            }
        }

        self.db
            .record_manual_reconciliation(company_id, bank_transaction_id, matched_kind, matched_id)
    }

    /// Snapshot the candidate pool: open invoices plus generated
    /// transactions, restricted to the statement period (padded by the
    /// fuzzy window) when the statement declares one.
    fn load_candidates(
        &self,
        company_id: i64,
        statement: &crate::models::BankStatement,
    ) -> Result<Vec<Candidate>> {
        let clients = self.db.list_clients(company_id)?;
        let client_names: HashMap<i64, String> =
            clients.into_iter().map(|c| (c.id, c.name)).collect();

        let window = chrono::Duration::days(self.config.fuzzy_date_window_days);
        let lower = statement.period_start.map(|d| d - window);
        let upper = statement.period_end.map(|d| d + window);
        let in_period = |date: Option<NaiveDate>| -> bool {
            match date {
                // Undated candidates can never satisfy a date window
                None => false,
                Some(d) => {
                    lower.map_or(true, |lo| d >= lo) && upper.map_or(true, |hi| d <= hi)
                }
            }
        };

        let mut candidates = Vec::new();
        for invoice in self.db.list_open_invoices(company_id)? {
            if in_period(invoice.issue_date) {
                candidates.push(Candidate::from_invoice(&invoice, &client_names));
            }
        }
        for tx in self.db.list_transactions(company_id)? {
            if in_period(tx.date) {
                candidates.push(Candidate::from_transaction(&tx));
            }
        }
        Ok(candidates)
    }

    /// Score every unclaimed candidate against a bank transaction and pick
    /// the winner deterministically.
    fn best_match(
        &self,
        bank_tx: &BankTransaction,
        candidates: &[Candidate],
        claimed: &HashSet<(MatchedKind, i64)>,
    ) -> Option<ScoredMatch> {
        let mut scored: Vec<ScoredMatch> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| !claimed.contains(&(c.kind, c.id)))
            .filter(|(_, c)| c.settles == bank_tx.kind)
            .filter_map(|(i, c)| self.score(bank_tx, c).map(|s| (i, s)))
            .map(|(i, (match_type, confidence, amount_diff, date))| ScoredMatch {
                candidate_index: i,
                match_type,
                confidence,
                amount_diff,
                date,
            })
            .collect();

        // Highest confidence first; ties go to the oldest candidate
        // (oldest-debt-first), then the closest amount, then stable id order
        scored.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| match (a.date, b.date) {
                    (Some(da), Some(db)) => da.cmp(&db),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.amount_diff.cmp(&b.amount_diff))
                .then_with(|| {
                    let ca = &candidates[a.candidate_index];
                    let cb = &candidates[b.candidate_index];
                    ca.kind.as_str().cmp(cb.kind.as_str()).then(ca.id.cmp(&cb.id))
                })
        });

        scored.into_iter().next()
    }

    /// Score one pairing. Returns (type, confidence, amount diff, candidate
    /// date), or None when the pair is below the fuzzy thresholds.
    fn score(
        &self,
        bank_tx: &BankTransaction,
        candidate: &Candidate,
    ) -> Option<(MatchType, f64, Decimal, Option<NaiveDate>)> {
        let amount_diff = (bank_tx.amount.abs() - candidate.amount.abs()).abs();

        let days_apart = match (bank_tx.date, candidate.date) {
            (Some(b), Some(c)) => Some((b - c).num_days().abs()),
            _ => None,
        };

        let reference_hit = self.reference_overlap(bank_tx, candidate);

        // Exact: tight amount AND tight date AND a corroborating reference
        if amount_diff <= self.config.amount_epsilon
            && days_apart.is_some_and(|d| d <= self.config.date_window_days)
            && reference_hit
        {
            return Some((MatchType::Exact, 1.0, amount_diff, candidate.date));
        }

        // Fuzzy: relaxed thresholds, confidence drops proportionally
        if amount_diff > self.config.fuzzy_amount_epsilon {
            return None;
        }
        let days = days_apart?;
        if days > self.config.fuzzy_date_window_days {
            return None;
        }

        let amount_ratio = (amount_diff / self.config.fuzzy_amount_epsilon)
            .to_f64()
            .unwrap_or(1.0);
        let amount_score = 1.0 - amount_ratio;
        let date_score = 1.0 - (days as f64 / (self.config.fuzzy_date_window_days as f64 + 1.0));
        let reference_score = if reference_hit { 1.0 } else { 0.0 };

        let confidence = amount_score * 0.5 + date_score * 0.3 + reference_score * 0.2;
        if confidence < self.config.min_confidence {
            return None;
        }

        Some((MatchType::Fuzzy, confidence, amount_diff, candidate.date))
    }

    /// Counterparty/IBAN overlap, or the invoice number appearing in the
    /// bank description.
    fn reference_overlap(&self, bank_tx: &BankTransaction, candidate: &Candidate) -> bool {
        let description = bank_tx.description.to_lowercase();

        if let Some(number) = &candidate.number {
            if description.contains(&number.to_lowercase()) {
                return true;
            }
        }

        if let (Some(bank_party), Some(candidate_party)) =
            (&bank_tx.counterparty, &candidate.party)
        {
            let a = bank_party.trim().to_lowercase();
            let b = candidate_party.trim().to_lowercase();
            if a.len() >= 3 && b.len() >= 3 && (a.contains(&b) || b.contains(&a)) {
                return true;
            }
        }

        if let (Some(iban), Some(party)) = (&bank_tx.iban, &candidate.party) {
            // Some ledgers carry the IBAN inside the description field
            if !iban.is_empty() && party.to_lowercase().contains(&iban.to_lowercase()) {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        InvoiceStatus, NewBankStatement, NewBankTransaction, NewCompany, NewInvoice,
    };

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup_company(db: &Database) -> i64 {
        let user_id = db
            .create_user("owner@acme.ro", "parola123", "Ana", "Pop", "admin")
            .unwrap();
        db.create_company(
            user_id,
            &NewCompany {
                name: "ACME SRL".into(),
                cui: format!("RO{}", user_id),
                reg_com: "J40/1/2024".into(),
                address: "Str. Unirii 1".into(),
                phone: None,
                email: None,
                vat_rate: 19.0,
                currency: "RON".into(),
                invoice_prefix: "INV".into(),
            },
        )
        .unwrap()
    }

    fn seed_statement(db: &Database, company_id: i64, lines: &[NewBankTransaction]) -> i64 {
        let statement_id = db
            .create_statement(
                company_id,
                &NewBankStatement {
                    file_name: "martie.csv".into(),
                    file_size: None,
                    bank_name: Some("Banca Transilvania".into()),
                    account_number: Some("RO49AAAA1B31007593840000".into()),
                    period_start: Some(date("2024-03-01")),
                    period_end: Some(date("2024-03-31")),
                    opening_balance: dec("4000"),
                    closing_balance: dec("5200"),
                },
            )
            .unwrap();
        db.insert_bank_transactions(company_id, statement_id, lines)
            .unwrap();
        statement_id
    }

    fn seed_invoice(
        db: &Database,
        company_id: i64,
        total: &str,
        issue: &str,
        due: &str,
    ) -> crate::models::Invoice {
        let client_id = db
            .create_client(company_id, "ACME Client SRL", Some("RO999"), None)
            .unwrap();
        db.create_invoice(
            company_id,
            &NewInvoice {
                client_id,
                total: dec(total),
                status: InvoiceStatus::Sent,
                issue_date: Some(date(issue)),
                due_date: Some(date(due)),
            },
        )
        .unwrap()
    }

    fn credit_line(amount: &str, day: &str, description: &str) -> NewBankTransaction {
        NewBankTransaction {
            date: Some(date(day)),
            description: description.into(),
            amount: dec(amount),
            balance: None,
            reference: None,
            kind: BankTransactionKind::Credit,
            counterparty: None,
            iban: None,
        }
    }

    #[test]
    fn test_exact_match_on_invoice_number() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db);
        let invoice = seed_invoice(&db, company_id, "1200.00", "2024-03-04", "2024-03-10");
        assert_eq!(invoice.number, "INV-0001");

        let statement_id = seed_statement(
            &db,
            company_id,
            &[credit_line("1200.00", "2024-03-05", "INV-0001 payment")],
        );

        let recs = Reconciler::new(&db)
            .reconcile_statement(company_id, statement_id)
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].status, ReconciliationStatus::Matched);
        assert_eq!(recs[0].match_type, MatchType::Exact);
        assert_eq!(recs[0].confidence, 1.0);
        assert_eq!(recs[0].matched_kind, Some(MatchedKind::Invoice));
        assert_eq!(recs[0].matched_id, Some(invoice.id));
    }

    #[test]
    fn test_one_invoice_two_bank_transactions() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db);
        let invoice = seed_invoice(&db, company_id, "500.00", "2024-03-04", "2024-03-20");

        let statement_id = seed_statement(
            &db,
            company_id,
            &[
                credit_line("500.00", "2024-03-08", "INV-0001"),
                credit_line("500.00", "2024-03-05", "INV-0001"),
            ],
        );

        let recs = Reconciler::new(&db)
            .reconcile_statement(company_id, statement_id)
            .unwrap();
        assert_eq!(recs.len(), 2);

        let matched: Vec<_> = recs
            .iter()
            .filter(|r| r.status == ReconciliationStatus::Matched)
            .collect();
        let unmatched: Vec<_> = recs
            .iter()
            .filter(|r| r.status == ReconciliationStatus::Unmatched)
            .collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(unmatched.len(), 1);
        assert_eq!(matched[0].matched_id, Some(invoice.id));

        // The earliest-dated bank transaction wins the contested invoice
        let bank_txs = db.list_bank_transactions(company_id, statement_id).unwrap();
        let earliest = bank_txs
            .iter()
            .min_by_key(|t| (t.date, t.id))
            .unwrap();
        assert_eq!(matched[0].bank_transaction_id, earliest.id);
    }

    #[test]
    fn test_fuzzy_match_lowers_confidence() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db);
        seed_invoice(&db, company_id, "1000.00", "2024-03-04", "2024-03-10");

        // Amount off by 1.50, date off by 2, no reference in the description
        let statement_id = seed_statement(
            &db,
            company_id,
            &[credit_line("998.50", "2024-03-06", "Transfer primit")],
        );

        let recs = Reconciler::new(&db)
            .reconcile_statement(company_id, statement_id)
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].status, ReconciliationStatus::Matched);
        assert_eq!(recs[0].match_type, MatchType::Fuzzy);
        assert!(recs[0].confidence < 1.0);
        assert!(recs[0].confidence >= 0.55);
    }

    #[test]
    fn test_unmatched_is_reported_not_discarded() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db);

        let statement_id = seed_statement(
            &db,
            company_id,
            &[credit_line("77.77", "2024-03-09", "Dobanda")],
        );

        let recs = Reconciler::new(&db)
            .reconcile_statement(company_id, statement_id)
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].status, ReconciliationStatus::Unmatched);
        assert_eq!(recs[0].matched_id, None);
    }

    #[test]
    fn test_rerun_preserves_manual_reconciliation() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db);
        let paid = seed_invoice(&db, company_id, "1200.00", "2024-03-04", "2024-03-10");
        let other = seed_invoice(&db, company_id, "1200.00", "2024-03-01", "2024-03-15");

        let statement_id = seed_statement(
            &db,
            company_id,
            &[credit_line("1200.00", "2024-03-05", "INV-0001 payment")],
        );
        let bank_tx = db
            .list_bank_transactions(company_id, statement_id)
            .unwrap()
            .remove(0);

        // Operator insists the line settles the *other* invoice
        let reconciler = Reconciler::new(&db);
        let manual = reconciler
            .manual_reconcile(company_id, bank_tx.id, MatchedKind::Invoice, other.id)
            .unwrap();
        assert_eq!(manual.match_type, MatchType::Manual);
        assert_eq!(manual.status, ReconciliationStatus::Matched);

        // Automatic rerun must not touch it
        let recs = reconciler
            .reconcile_statement(company_id, statement_id)
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].match_type, MatchType::Manual);
        assert_eq!(recs[0].matched_id, Some(other.id));
        // The auto-preferred invoice stays open for a later run
        assert!(db
            .get_invoice(company_id, paid.id)
            .unwrap()
            .unwrap()
            .status
            .is_open());
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db);
        let invoice = seed_invoice(&db, company_id, "1200.00", "2024-03-04", "2024-03-10");

        let statement_id = seed_statement(
            &db,
            company_id,
            &[credit_line("1200.00", "2024-03-05", "INV-0001 payment")],
        );

        let reconciler = Reconciler::new(&db);
        let first = reconciler
            .reconcile_statement(company_id, statement_id)
            .unwrap();
        let second = reconciler
            .reconcile_statement(company_id, statement_id)
            .unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(second[0].matched_id, Some(invoice.id));
        assert_eq!(second[0].match_type, MatchType::Exact);
        // Exactly one active row survives per bank transaction
        let bank_tx_id = second[0].bank_transaction_id;
        let active = db
            .get_active_reconciliation(company_id, bank_tx_id)
            .unwrap();
        assert!(active.is_some());
    }

    #[test]
    fn test_manual_reconcile_rejects_cross_company_target() {
        let db = Database::in_memory().unwrap();
        let company_a = setup_company(&db);

        let user_b = db
            .create_user("b@firmab.ro", "parola123", "Bogdan", "Ion", "admin")
            .unwrap();
        let company_b = db
            .create_company(
                user_b,
                &NewCompany {
                    name: "Firma B".into(),
                    cui: "RO777".into(),
                    reg_com: "J40/2/2024".into(),
                    address: "Str. Libertatii 2".into(),
                    phone: None,
                    email: None,
                    vat_rate: 19.0,
                    currency: "RON".into(),
                    invoice_prefix: "FB".into(),
                },
            )
            .unwrap();
        let foreign_invoice = seed_invoice(&db, company_b, "100.00", "2024-03-01", "2024-03-10");

        let statement_id = seed_statement(
            &db,
            company_a,
            &[credit_line("100.00", "2024-03-02", "plata")],
        );
        let bank_tx = db
            .list_bank_transactions(company_a, statement_id)
            .unwrap()
            .remove(0);

        let result = Reconciler::new(&db).manual_reconcile(
            company_a,
            bank_tx.id,
            MatchedKind::Invoice,
            foreign_invoice.id,
        );
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_undated_line_stays_unmatched() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db);
        seed_invoice(&db, company_id, "1200.00", "2024-03-04", "2024-03-10");

        let statement_id = seed_statement(
            &db,
            company_id,
            &[NewBankTransaction {
                date: None,
                description: "INV-0001 payment".into(),
                amount: dec("1200.00"),
                balance: None,
                reference: None,
                kind: BankTransactionKind::Credit,
                counterparty: None,
                iban: None,
            }],
        );

        let recs = Reconciler::new(&db)
            .reconcile_statement(company_id, statement_id)
            .unwrap();
        assert_eq!(recs[0].status, ReconciliationStatus::Unmatched);
    }
}
