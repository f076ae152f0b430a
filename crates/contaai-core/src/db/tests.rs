//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn date(s: &str) -> chrono::NaiveDate {
        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_company(cui: &str) -> NewCompany {
        NewCompany {
            name: "Test SRL".into(),
            cui: cui.into(),
            reg_com: "J40/1/2024".into(),
            address: "Str. Test 1".into(),
            phone: None,
            email: None,
            vat_rate: 19.0,
            currency: "RON".into(),
            invoice_prefix: "INV".into(),
        }
    }

    fn setup_company(db: &Database, email: &str, cui: &str) -> i64 {
        let user_id = db
            .create_user(email, "parola123", "Ana", "Pop", "admin")
            .unwrap();
        db.create_company(user_id, &new_company(cui)).unwrap()
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_companies().unwrap().is_empty());
    }

    #[test]
    fn test_schema_has_tenant_columns() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        for table in [
            "clients",
            "documents",
            "document_transactions",
            "contracts",
            "invoices",
            "products",
            "bank_statements",
            "bank_transactions",
            "reconciliations",
        ] {
            let count: i64 = conn
                .query_row(
                    &format!(
                        "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = 'company_id'",
                        table
                    ),
                    [],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "{} must carry a company_id column", table);
        }
    }

    #[test]
    fn test_user_registration_and_login() {
        let db = Database::in_memory().unwrap();

        let user_id = db
            .create_user("ana@test.ro", "parola123", "Ana", "Pop", "admin")
            .unwrap();
        assert!(user_id > 0);

        // Duplicate email rejected
        let duplicate = db.create_user("ana@test.ro", "alta", "Ana", "Pop", "admin");
        assert!(matches!(duplicate, Err(crate::error::Error::Validation(_))));

        // Wrong password
        assert!(db
            .verify_password("ana@test.ro", "gresit")
            .unwrap()
            .is_none());
        // Unknown user behaves identically
        assert!(db
            .verify_password("nimeni@test.ro", "parola123")
            .unwrap()
            .is_none());

        // Correct credentials update last_login
        let user = db
            .verify_password("ana@test.ro", "parola123")
            .unwrap()
            .unwrap();
        assert_eq!(user.id, user_id);
        assert!(user.last_login.is_some());
    }

    #[test]
    fn test_create_company_attaches_owner() {
        let db = Database::in_memory().unwrap();
        let user_id = db
            .create_user("ana@test.ro", "parola123", "Ana", "Pop", "admin")
            .unwrap();
        let company_id = db.create_company(user_id, &new_company("RO1")).unwrap();

        let user = db.get_user(user_id).unwrap().unwrap();
        assert_eq!(user.company_id, Some(company_id));

        let company = db.get_company(company_id).unwrap().unwrap();
        assert_eq!(company.owner_id, user_id);
        assert_eq!(company.invoice_counter, 1);
    }

    #[test]
    fn test_invoice_numbering_and_client_total() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db, "ana@test.ro", "RO1");
        let client_id = db
            .create_client(company_id, "ACME Client", None, None)
            .unwrap();

        let first = db
            .create_invoice(
                company_id,
                &NewInvoice {
                    client_id,
                    total: dec("150.50"),
                    status: InvoiceStatus::Sent,
                    issue_date: Some(date("2024-03-01")),
                    due_date: Some(date("2024-03-15")),
                },
            )
            .unwrap();
        let second = db
            .create_invoice(
                company_id,
                &NewInvoice {
                    client_id,
                    total: dec("49.50"),
                    status: InvoiceStatus::Draft,
                    issue_date: None,
                    due_date: None,
                },
            )
            .unwrap();

        assert_eq!(first.number, "INV-0001");
        assert_eq!(second.number, "INV-0002");

        let company = db.get_company(company_id).unwrap().unwrap();
        assert_eq!(company.invoice_counter, 3);

        let client = db.get_client(company_id, client_id).unwrap().unwrap();
        assert_eq!(client.total_invoiced, dec("200.00"));
    }

    #[test]
    fn test_open_invoices_excludes_draft_and_paid() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db, "ana@test.ro", "RO1");
        let client_id = db.create_client(company_id, "ACME", None, None).unwrap();

        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
        ] {
            db.create_invoice(
                company_id,
                &NewInvoice {
                    client_id,
                    total: dec("10"),
                    status,
                    issue_date: Some(date("2024-03-01")),
                    due_date: None,
                },
            )
            .unwrap();
        }

        let open = db.list_open_invoices(company_id).unwrap();
        assert_eq!(open.len(), 2);
        assert!(open.iter().all(|i| i.status.is_open()));
    }

    #[test]
    fn test_tenant_isolation() {
        let db = Database::in_memory().unwrap();
        let company_a = setup_company(&db, "a@test.ro", "RO1");
        let company_b = setup_company(&db, "b@test.ro", "RO2");

        let doc_id = db
            .create_document(
                company_a,
                &NewDocument {
                    file_name: "factura.pdf".into(),
                    file_size: None,
                    file_type: None,
                    file_data: None,
                    category: None,
                    content_hash: None,
                },
            )
            .unwrap();

        // Visible in its own company, invisible from the other
        assert!(db.get_document(company_a, doc_id).unwrap().is_some());
        assert!(db.get_document(company_b, doc_id).unwrap().is_none());
        assert!(!db.delete_document(company_b, doc_id).unwrap());
        assert_eq!(db.list_documents(company_b).unwrap().len(), 0);
    }

    #[test]
    fn test_statement_owns_its_lines() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db, "ana@test.ro", "RO1");

        let statement_id = db
            .create_statement(
                company_id,
                &NewBankStatement {
                    file_name: "martie.csv".into(),
                    file_size: None,
                    bank_name: None,
                    account_number: None,
                    period_start: Some(date("2024-03-01")),
                    period_end: Some(date("2024-03-31")),
                    opening_balance: dec("0"),
                    closing_balance: dec("100"),
                },
            )
            .unwrap();

        let lines = vec![
            NewBankTransaction {
                date: Some(date("2024-03-05")),
                description: "Incasare".into(),
                amount: dec("100.00"),
                balance: Some(dec("100.00")),
                reference: None,
                kind: BankTransactionKind::Credit,
                counterparty: Some("ACME".into()),
                iban: None,
            },
            NewBankTransaction {
                date: None,
                description: "Fara data".into(),
                amount: dec("-5.00"),
                balance: None,
                reference: None,
                kind: BankTransactionKind::Debit,
                counterparty: None,
                iban: None,
            },
        ];
        db.insert_bank_transactions(company_id, statement_id, &lines)
            .unwrap();

        let statement = db.get_statement(company_id, statement_id).unwrap().unwrap();
        assert_eq!(statement.total_transactions, 2);
        assert_eq!(statement.status, DocumentStatus::Completed);

        let stored = db
            .list_bank_transactions(company_id, statement_id)
            .unwrap();
        assert_eq!(stored.len(), 2);
        // Undated lines sort last
        assert_eq!(stored[1].description, "Fara data");
        assert_eq!(stored[1].date, None);
        // Decimal survives the TEXT round-trip exactly
        assert_eq!(stored[0].amount, dec("100.00"));
    }

    #[test]
    fn test_at_most_one_active_reconciliation() {
        let db = Database::in_memory().unwrap();
        let company_id = setup_company(&db, "ana@test.ro", "RO1");

        let statement_id = db
            .create_statement(
                company_id,
                &NewBankStatement {
                    file_name: "s.csv".into(),
                    file_size: None,
                    bank_name: None,
                    account_number: None,
                    period_start: None,
                    period_end: None,
                    opening_balance: dec("0"),
                    closing_balance: dec("0"),
                },
            )
            .unwrap();
        db.insert_bank_transactions(
            company_id,
            statement_id,
            &[NewBankTransaction {
                date: Some(date("2024-03-05")),
                description: "x".into(),
                amount: dec("1"),
                balance: None,
                reference: None,
                kind: BankTransactionKind::Credit,
                counterparty: None,
                iban: None,
            }],
        )
        .unwrap();
        let bank_tx_id = db
            .list_bank_transactions(company_id, statement_id)
            .unwrap()[0]
            .id;

        let conn = db.conn().unwrap();
        conn.execute(
            "INSERT INTO reconciliations (company_id, bank_transaction_id, match_type, confidence, status)
             VALUES (?, ?, 'exact', 1.0, 'matched')",
            params![company_id, bank_tx_id],
        )
        .unwrap();

        // A second active row for the same bank transaction violates the
        // partial unique index
        let second = conn.execute(
            "INSERT INTO reconciliations (company_id, bank_transaction_id, match_type, confidence, status)
             VALUES (?, ?, 'fuzzy', 0.5, 'matched')",
            params![company_id, bank_tx_id],
        );
        assert!(second.is_err());

        // Superseding the first makes room for a replacement
        conn.execute(
            "UPDATE reconciliations SET superseded = 1 WHERE bank_transaction_id = ?",
            params![bank_tx_id],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO reconciliations (company_id, bank_transaction_id, match_type, confidence, status)
             VALUES (?, ?, 'fuzzy', 0.5, 'matched')",
            params![company_id, bank_tx_id],
        )
        .unwrap();
    }

    #[test]
    fn test_audit_log_roundtrip() {
        let db = Database::in_memory().unwrap();
        db.log_audit("ana@test.ro", "report", Some("financial"), None, None)
            .unwrap();
        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "report");
    }
}
