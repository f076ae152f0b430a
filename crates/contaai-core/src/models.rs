//! Domain models for ContaAI
//!
//! Every business entity is scoped by a `company_id`; the database layer
//! refuses to read or write across company boundaries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A tenant company
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: i64,
    pub name: String,
    /// Fiscal identification code (unique)
    pub cui: String,
    /// Trade registry number
    pub reg_com: String,
    pub address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub vat_rate: f64,
    pub currency: String,
    pub invoice_prefix: String,
    pub invoice_counter: i64,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Company fields accepted at registration / setup time
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompany {
    pub name: String,
    pub cui: String,
    pub reg_com: String,
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_vat_rate")]
    pub vat_rate: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,
}

fn default_vat_rate() -> f64 {
    19.0
}

fn default_currency() -> String {
    "RON".to_string()
}

fn default_invoice_prefix() -> String {
    "INV".to_string()
}

/// An application user. The password hash never leaves the database layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub company_id: Option<i64>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Document processing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Completed,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown document status: {}", s)),
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An uploaded business document (invoice scan, receipt, contract page)
/// plus whatever the analysis service extracted from it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub company_id: i64,
    pub file_name: String,
    pub file_size: Option<String>,
    pub file_type: Option<String>,
    pub category: Option<String>,
    pub status: DocumentStatus,
    /// Analysis confidence as reported by the external service (0-1)
    pub analysis_confidence: f64,
    pub supplier: Option<String>,
    /// Raw amount text as extracted; the normalizer parses it
    pub amount_text: Option<String>,
    pub client: Option<String>,
    /// Raw document date text as extracted
    pub document_date: Option<String>,
    pub invoice_number: Option<String>,
    pub cui: Option<String>,
    pub description: Option<String>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    /// SHA-256 of the uploaded bytes, for deduplication
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A new document to be stored (before analysis)
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub file_name: String,
    pub file_size: Option<String>,
    pub file_type: Option<String>,
    /// Base64-encoded file payload
    pub file_data: Option<String>,
    pub category: Option<String>,
    pub content_hash: Option<String>,
}

/// Canonical transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A canonical transaction generated from an analyzed document.
///
/// `date` is `None` when the document date could not be parsed; undated
/// transactions are kept (and counted) but excluded from period sums.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub company_id: i64,
    /// Owning document
    pub document_id: i64,
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub category: Option<String>,
    pub date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A new generated transaction (before DB insertion)
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub description: String,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub category: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Bank statement processing status shares the document lifecycle
pub type StatementStatus = DocumentStatus;

/// An imported bank statement. Exclusively owns its transaction rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankStatement {
    pub id: i64,
    pub company_id: i64,
    pub file_name: String,
    pub file_size: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub status: StatementStatus,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    /// Number of owned bank transactions
    pub total_transactions: i64,
    pub created_at: DateTime<Utc>,
}

/// A new bank statement shell (lines are inserted separately)
#[derive(Debug, Clone)]
pub struct NewBankStatement {
    pub file_name: String,
    pub file_size: Option<String>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
}

/// Direction of a bank transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankTransactionKind {
    Debit,
    Credit,
}

impl BankTransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::str::FromStr for BankTransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            _ => Err(format!("Unknown bank transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for BankTransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single bank statement line
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankTransaction {
    pub id: i64,
    pub company_id: i64,
    pub statement_id: i64,
    pub date: Option<NaiveDate>,
    pub description: String,
    pub amount: Decimal,
    pub balance: Option<Decimal>,
    pub reference: Option<String>,
    pub kind: BankTransactionKind,
    pub counterparty: Option<String>,
    pub iban: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A new bank transaction line (before DB insertion)
#[derive(Debug, Clone, PartialEq)]
pub struct NewBankTransaction {
    pub date: Option<NaiveDate>,
    pub description: String,
    pub amount: Decimal,
    pub balance: Option<Decimal>,
    pub reference: Option<String>,
    pub kind: BankTransactionKind,
    pub counterparty: Option<String>,
    pub iban: Option<String>,
}

/// Invoice lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }

    /// An invoice still awaiting settlement, i.e. a reconciliation candidate
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Sent | Self::Overdue)
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            "paid" => Ok(Self::Paid),
            "overdue" => Ok(Self::Overdue),
            _ => Err(format!("Unknown invoice status: {}", s)),
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An issued invoice
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: i64,
    pub company_id: i64,
    /// Unique per company, generated as `{prefix}-{counter:04}`
    pub number: String,
    pub client_id: i64,
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Invoice fields provided by the caller (number is generated)
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub client_id: i64,
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// A billed client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub cui: Option<String>,
    pub email: Option<String>,
    pub total_invoiced: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Contract lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Draft,
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl std::str::FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("Unknown contract status: {}", s)),
        }
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A commercial contract
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: i64,
    pub company_id: i64,
    pub number: String,
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub contract_type: Option<String>,
    pub status: ContractStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub value: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Contract fields provided by the caller
#[derive(Debug, Clone)]
pub struct NewContract {
    pub number: String,
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub contract_type: Option<String>,
    pub status: ContractStatus,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub value: Decimal,
    pub currency: String,
}

/// Product availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("Unknown product status: {}", s)),
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An inventory product
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    pub unit_price: Decimal,
    pub vat_rate: f64,
    pub stock: i64,
    pub min_stock: i64,
    pub unit: String,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

/// Product fields provided by the caller
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub category: Option<String>,
    pub unit_price: Decimal,
    pub vat_rate: f64,
    pub stock: i64,
    pub min_stock: i64,
    pub unit: String,
    pub status: ProductStatus,
}

/// How a reconciliation link was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Manual,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Fuzzy => "fuzzy",
            Self::Manual => "manual",
        }
    }
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "fuzzy" => Ok(Self::Fuzzy),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Unknown match type: {}", s)),
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reconciliation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationStatus {
    Matched,
    Unmatched,
    Disputed,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Unmatched => "unmatched",
            Self::Disputed => "disputed",
        }
    }
}

impl std::str::FromStr for ReconciliationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "matched" => Ok(Self::Matched),
            "unmatched" => Ok(Self::Unmatched),
            "disputed" => Ok(Self::Disputed),
            _ => Err(format!("Unknown reconciliation status: {}", s)),
        }
    }
}

impl std::fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a bank transaction was matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchedKind {
    Invoice,
    Transaction,
}

impl MatchedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Transaction => "transaction",
        }
    }
}

impl std::str::FromStr for MatchedKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "invoice" => Ok(Self::Invoice),
            "transaction" => Ok(Self::Transaction),
            _ => Err(format!("Unknown matched entity kind: {}", s)),
        }
    }
}

impl std::fmt::Display for MatchedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded link between a bank transaction and the business record
/// (invoice or generated transaction) it settles.
///
/// At most one non-superseded row exists per bank transaction; the
/// database enforces this with a partial unique index.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub id: i64,
    pub company_id: i64,
    pub bank_transaction_id: i64,
    pub matched_kind: Option<MatchedKind>,
    pub matched_id: Option<i64>,
    pub match_type: MatchType,
    pub confidence: f64,
    pub status: ReconciliationStatus,
    pub superseded: bool,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Report payloads (derived, never persisted)
// ============================================================================

/// Income/expense aggregation over generated transactions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_profit: Decimal,
    /// Percentage; 0 when total_income is 0 (never NaN)
    pub profit_margin: Decimal,
}

/// Invoice aggregation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceMetrics {
    pub total: usize,
    pub total_value: Decimal,
    pub paid: usize,
    pub overdue: usize,
    /// Paid value / total value as a percentage; 0 when total value is 0
    pub collection_rate: Decimal,
}

/// Contract aggregation. `total_value` intentionally sums contracts of
/// every status while `active` is counted separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMetrics {
    pub total: usize,
    pub active: usize,
    pub total_value: Decimal,
}

/// Inventory aggregation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryMetrics {
    pub total_products: usize,
    pub total_value: Decimal,
    /// Products where stock <= min_stock
    pub low_stock: usize,
}

/// Banking aggregation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankingMetrics {
    pub statements: usize,
    pub total_transactions: usize,
}

/// Full financial report payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub period: ReportPeriodOut,
    pub financial: FinancialMetrics,
    pub invoices: InvoiceMetrics,
    pub contracts: ContractMetrics,
    pub inventory: InventoryMetrics,
    pub banking: BankingMetrics,
}

/// Period echo in report output (string dates for API stability)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPeriodOut {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Entity counts for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_documents: usize,
    pub completed_documents: usize,
    pub total_contracts: usize,
    pub active_contracts: usize,
    pub total_invoices: usize,
    pub paid_invoices: usize,
    pub total_products: usize,
    pub low_stock_products: usize,
}
