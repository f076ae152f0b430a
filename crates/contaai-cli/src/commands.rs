//! Command implementations

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use contaai_core::db::Database;
use contaai_core::models::ReconciliationStatus;
use contaai_core::reconcile::Reconciler;
use contaai_core::report::{compute_report, CompanySnapshot, DateRange};

/// Open the database, honoring the encryption flag
pub fn open_db(path: &Path, no_encrypt: bool) -> Result<Database> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let path_str = path.to_string_lossy();
    let db = if no_encrypt {
        Database::new_unencrypted(&path_str)?
    } else {
        Database::new(&path_str)?
    };
    Ok(db)
}

/// `contaai init` - create the database and schema
pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let encrypted = db.is_encrypted().unwrap_or(false);
    println!("Database initialized at {}", db_path.display());
    println!(
        "Encryption: {}",
        if encrypted { "enabled" } else { "disabled" }
    );
    Ok(())
}

/// `contaai serve` - run the web server
pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    static_dir: Option<&Path>,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    info!("Serving database {}", db_path.display());
    let static_dir = static_dir.map(|p| p.to_string_lossy().to_string());
    contaai_server::serve(db, host, port, static_dir.as_deref()).await
}

fn parse_date_arg(raw: Option<&str>, name: &str) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid --{} date '{}' (use YYYY-MM-DD)", name, s))
    })
    .transpose()
}

/// `contaai report` - print a company's financial report
pub fn cmd_report(
    db_path: &Path,
    company_id: i64,
    from: Option<&str>,
    to: Option<&str>,
    json: bool,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    let company = db
        .get_company(company_id)?
        .with_context(|| format!("Company {} not found", company_id))?;

    let range = DateRange::new(
        parse_date_arg(from, "from")?,
        parse_date_arg(to, "to")?,
    );
    let snapshot = CompanySnapshot::load(&db, company_id)?;
    let report = compute_report(&snapshot, &range);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Financial report - {} ({})", company.name, company.currency);
    match (&report.period.start_date, &report.period.end_date) {
        (Some(s), Some(e)) => println!("Period: {} to {} (end exclusive)", s, e),
        (Some(s), None) => println!("Period: from {}", s),
        (None, Some(e)) => println!("Period: until {} (exclusive)", e),
        (None, None) => println!("Period: all time"),
    }
    println!();
    println!("  Income:          {:>14}", report.financial.total_income);
    println!("  Expenses:        {:>14}", report.financial.total_expenses);
    println!("  Net profit:      {:>14}", report.financial.net_profit);
    println!("  Profit margin:   {:>13}%", report.financial.profit_margin);
    println!();
    println!(
        "  Invoices: {} total ({} paid, {} overdue), value {}, collection rate {}%",
        report.invoices.total,
        report.invoices.paid,
        report.invoices.overdue,
        report.invoices.total_value,
        report.invoices.collection_rate
    );
    println!(
        "  Contracts: {} total ({} active), value {}",
        report.contracts.total, report.contracts.active, report.contracts.total_value
    );
    println!(
        "  Inventory: {} products, value {}, {} low on stock",
        report.inventory.total_products, report.inventory.total_value, report.inventory.low_stock
    );
    println!(
        "  Banking: {} statements, {} transactions",
        report.banking.statements, report.banking.total_transactions
    );

    Ok(())
}

/// `contaai reconcile` - run the matcher over one statement
pub fn cmd_reconcile(
    db_path: &Path,
    company_id: i64,
    statement_id: i64,
    no_encrypt: bool,
) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    db.get_statement(company_id, statement_id)?
        .with_context(|| format!("Statement {} not found for company {}", statement_id, company_id))?;

    let reconciliations =
        Reconciler::new(&db).reconcile_statement(company_id, statement_id)?;

    let matched = reconciliations
        .iter()
        .filter(|r| r.status == ReconciliationStatus::Matched)
        .count();
    println!(
        "Reconciled statement {}: {} matched, {} unmatched",
        statement_id,
        matched,
        reconciliations.len() - matched
    );

    for rec in &reconciliations {
        match (rec.matched_kind, rec.matched_id) {
            (Some(kind), Some(id)) => println!(
                "  bank tx {:>5} -> {} {} ({}, confidence {:.2})",
                rec.bank_transaction_id, kind, id, rec.match_type, rec.confidence
            ),
            _ => println!("  bank tx {:>5} -> unmatched", rec.bank_transaction_id),
        }
    }

    Ok(())
}

/// `contaai companies` - list registered companies
pub fn cmd_companies(db_path: &Path, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;
    let companies = db.list_companies()?;

    if companies.is_empty() {
        println!("No companies registered.");
        return Ok(());
    }

    println!("{:<5} {:<30} {:<15} {}", "ID", "Name", "CUI", "Currency");
    for company in companies {
        println!(
            "{:<5} {:<30} {:<15} {}",
            company.id, company.name, company.cui, company.currency
        );
    }
    Ok(())
}

/// `contaai status` - database overview
pub fn cmd_status(db_path: &Path, no_encrypt: bool) -> Result<()> {
    let db = open_db(db_path, no_encrypt)?;

    println!("Database: {}", db_path.display());
    println!(
        "Encryption: {}",
        if db.is_encrypted().unwrap_or(false) {
            "enabled"
        } else {
            "disabled"
        }
    );

    let companies = db.list_companies()?;
    println!("Companies: {}", companies.len());
    for company in companies {
        let snapshot = CompanySnapshot::load(&db, company.id)?;
        println!(
            "  [{}] {}: {} documents, {} transactions, {} invoices, {} contracts, {} products, {} statements",
            company.id,
            company.name,
            snapshot.documents.len(),
            snapshot.transactions.len(),
            snapshot.invoices.len(),
            snapshot.contracts.len(),
            snapshot.products.len(),
            snapshot.statements.len(),
        );
    }
    Ok(())
}
