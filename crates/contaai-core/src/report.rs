//! Financial aggregation and report assembly
//!
//! Reports are derived values: pure functions of a company snapshot and a
//! date range, never persisted, always recomputable. Every monetary sum
//! uses `Decimal`, so recomputing over the same snapshot yields identical
//! output down to the last digit.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::db::Database;
use crate::error::Result;
use crate::models::{
    BankStatement, BankingMetrics, Contract, ContractMetrics, ContractStatus, DashboardSummary,
    Document, DocumentStatus, FinancialMetrics, FinancialReport, InventoryMetrics, Invoice,
    InvoiceMetrics, InvoiceStatus, Product, ReportPeriodOut, Transaction, TransactionKind,
};

/// Report range: inclusive start, exclusive end. A `None` bound is open.
///
/// Undated transactions are excluded from any bounded range; a fully open
/// range is the "whole history" view and includes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Whole-history range
    pub fn unbounded() -> Self {
        Self::default()
    }

    fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        match date {
            None => self.is_unbounded(),
            Some(d) => {
                self.start.map_or(true, |s| d >= s) && self.end.map_or(true, |e| d < e)
            }
        }
    }
}

/// A read-only snapshot of one company's records, fetched up front.
/// Aggregation itself never touches the database.
#[derive(Debug, Clone, Default)]
pub struct CompanySnapshot {
    pub documents: Vec<Document>,
    pub transactions: Vec<Transaction>,
    pub invoices: Vec<Invoice>,
    pub contracts: Vec<Contract>,
    pub products: Vec<Product>,
    pub statements: Vec<BankStatement>,
}

impl CompanySnapshot {
    /// Fetch everything the aggregator needs in one pass
    pub fn load(db: &Database, company_id: i64) -> Result<Self> {
        Ok(Self {
            documents: db.list_documents(company_id)?,
            transactions: db.list_transactions(company_id)?,
            invoices: db.list_invoices(company_id)?,
            contracts: db.list_contracts(company_id)?,
            products: db.list_products(company_id)?,
            statements: db.list_statements(company_id)?,
        })
    }
}

/// Income/expense sums over the range.
///
/// An income transaction contributes its magnitude positively, an expense
/// contributes its magnitude negatively, regardless of stored sign.
pub fn financial_metrics(transactions: &[Transaction], range: &DateRange) -> FinancialMetrics {
    let mut total_income = Decimal::ZERO;
    let mut total_expenses = Decimal::ZERO;

    for tx in transactions.iter().filter(|t| range.contains(t.date)) {
        match tx.kind {
            TransactionKind::Income => total_income += tx.amount.abs(),
            TransactionKind::Expense => total_expenses += tx.amount.abs(),
        }
    }

    let net_profit = total_income - total_expenses;
    let profit_margin = percentage(net_profit, total_income);

    FinancialMetrics {
        total_income,
        total_expenses,
        net_profit,
        profit_margin,
    }
}

/// Invoice counts, value and collection rate
pub fn invoice_metrics(invoices: &[Invoice]) -> InvoiceMetrics {
    let total_value: Decimal = invoices.iter().map(|i| i.total).sum();
    let paid_value: Decimal = invoices
        .iter()
        .filter(|i| i.status == InvoiceStatus::Paid)
        .map(|i| i.total)
        .sum();

    InvoiceMetrics {
        total: invoices.len(),
        total_value,
        paid: invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Paid)
            .count(),
        overdue: invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Overdue)
            .count(),
        collection_rate: percentage(paid_value, total_value),
    }
}

/// Contract counts and value.
///
/// `total_value` sums contracts of every status while `active` counts
/// separately, a long-standing reporting choice kept as-is.
pub fn contract_metrics(contracts: &[Contract]) -> ContractMetrics {
    ContractMetrics {
        total: contracts.len(),
        active: contracts
            .iter()
            .filter(|c| c.status == ContractStatus::Active)
            .count(),
        total_value: contracts.iter().map(|c| c.value).sum(),
    }
}

/// Inventory value and low-stock count
pub fn inventory_metrics(products: &[Product]) -> InventoryMetrics {
    InventoryMetrics {
        total_products: products.len(),
        total_value: products
            .iter()
            .map(|p| Decimal::from(p.stock) * p.unit_price)
            .sum(),
        low_stock: products.iter().filter(|p| p.stock <= p.min_stock).count(),
    }
}

/// Statement and line counts
pub fn banking_metrics(statements: &[BankStatement]) -> BankingMetrics {
    BankingMetrics {
        statements: statements.len(),
        total_transactions: statements
            .iter()
            .map(|s| s.total_transactions as usize)
            .sum(),
    }
}

/// Assemble the full report payload. Stateless composition: safe to call
/// repeatedly and concurrently for different companies.
pub fn compute_report(snapshot: &CompanySnapshot, range: &DateRange) -> FinancialReport {
    FinancialReport {
        period: ReportPeriodOut {
            start_date: range.start.map(|d| d.to_string()),
            end_date: range.end.map(|d| d.to_string()),
        },
        financial: financial_metrics(&snapshot.transactions, range),
        invoices: invoice_metrics(&snapshot.invoices),
        contracts: contract_metrics(&snapshot.contracts),
        inventory: inventory_metrics(&snapshot.products),
        banking: banking_metrics(&snapshot.statements),
    }
}

/// Entity counts for the dashboard
pub fn compute_dashboard(snapshot: &CompanySnapshot) -> DashboardSummary {
    DashboardSummary {
        total_documents: snapshot.documents.len(),
        completed_documents: snapshot
            .documents
            .iter()
            .filter(|d| d.status == DocumentStatus::Completed)
            .count(),
        total_contracts: snapshot.contracts.len(),
        active_contracts: snapshot
            .contracts
            .iter()
            .filter(|c| c.status == ContractStatus::Active)
            .count(),
        total_invoices: snapshot.invoices.len(),
        paid_invoices: snapshot
            .invoices
            .iter()
            .filter(|i| i.status == InvoiceStatus::Paid)
            .count(),
        total_products: snapshot.products.len(),
        low_stock_products: snapshot
            .products
            .iter()
            .filter(|p| p.stock <= p.min_stock)
            .count(),
    }
}

/// `part / whole * 100`, defined as 0 when the denominator is 0. Always
/// carries two decimals so the wire representation is stable.
fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    let mut pct = if whole.is_zero() {
        Decimal::ZERO
    } else {
        part / whole * Decimal::ONE_HUNDRED
    };
    pct.rescale(2);
    pct
}
