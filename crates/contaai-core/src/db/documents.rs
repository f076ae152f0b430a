//! Document and generated-transaction operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_date_col, parse_datetime, parse_money, parse_string_list, Database};
use crate::analysis::DocumentAnalysis;
use crate::error::{Error, Result};
use crate::models::{Document, DocumentStatus, NewDocument, NewTransaction, Transaction};

// file_data is deliberately excluded: payloads are fetched on demand
const DOCUMENT_COLS: &str = "id, company_id, file_name, file_size, file_type, category, status, \
     analysis_confidence, supplier, amount_text, client, document_date, invoice_number, cui, \
     description, insights, recommendations, content_hash, created_at";

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let status: String = row.get(6)?;
    let insights: Option<String> = row.get(15)?;
    let recommendations: Option<String> = row.get(16)?;
    let created_at: String = row.get(18)?;
    Ok(Document {
        id: row.get(0)?,
        company_id: row.get(1)?,
        file_name: row.get(2)?,
        file_size: row.get(3)?,
        file_type: row.get(4)?,
        category: row.get(5)?,
        status: status.parse().unwrap_or(DocumentStatus::Processing),
        analysis_confidence: row.get(7)?,
        supplier: row.get(8)?,
        amount_text: row.get(9)?,
        client: row.get(10)?,
        document_date: row.get(11)?,
        invoice_number: row.get(12)?,
        cui: row.get(13)?,
        description: row.get(14)?,
        insights: parse_string_list(insights),
        recommendations: parse_string_list(recommendations),
        content_hash: row.get(17)?,
        created_at: parse_datetime(&created_at),
    })
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let amount: String = row.get(4)?;
    let kind: String = row.get(5)?;
    let date: Option<String> = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(Transaction {
        id: row.get(0)?,
        company_id: row.get(1)?,
        document_id: row.get(2)?,
        description: row.get(3)?,
        amount: parse_money(&amount),
        kind: kind.parse().unwrap_or(crate::models::TransactionKind::Expense),
        category: row.get(6)?,
        date: parse_date_col(date),
        created_at: parse_datetime(&created_at),
    })
}

const TRANSACTION_COLS: &str =
    "id, company_id, document_id, description, amount, kind, category, date, created_at";

impl Database {
    /// Store an uploaded document in `processing` status
    pub fn create_document(&self, company_id: i64, doc: &NewDocument) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO documents (company_id, file_name, file_size, file_type, file_data, category, content_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                company_id,
                doc.file_name,
                doc.file_size,
                doc.file_type,
                doc.file_data,
                doc.category,
                doc.content_hash,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a document by ID within the company scope
    pub fn get_document(&self, company_id: i64, id: i64) -> Result<Option<Document>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM documents WHERE id = ? AND company_id = ?",
                DOCUMENT_COLS
            ),
            params![id, company_id],
            row_to_document,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Fetch the stored base64 payload for analysis
    pub fn get_document_file_data(&self, company_id: i64, id: i64) -> Result<Option<String>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT file_data FROM documents WHERE id = ? AND company_id = ?",
            params![id, company_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .map(|v| v.flatten())
        .map_err(Into::into)
    }

    /// Find a document with the same uploaded content
    pub fn find_document_by_hash(&self, company_id: i64, hash: &str) -> Result<Option<Document>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM documents WHERE content_hash = ? AND company_id = ?",
                DOCUMENT_COLS
            ),
            params![hash, company_id],
            row_to_document,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List the company's documents, newest first
    pub fn list_documents(&self, company_id: i64) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents WHERE company_id = ? ORDER BY created_at DESC, id DESC",
            DOCUMENT_COLS
        ))?;
        let docs = stmt
            .query_map(params![company_id], row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    /// Update mutable document fields
    pub fn update_document(
        &self,
        company_id: i64,
        id: i64,
        category: Option<&str>,
        description: Option<&str>,
        status: Option<DocumentStatus>,
    ) -> Result<Option<Document>> {
        let conn = self.conn()?;
        if let Some(category) = category {
            conn.execute(
                "UPDATE documents SET category = ? WHERE id = ? AND company_id = ?",
                params![category, id, company_id],
            )?;
        }
        if let Some(description) = description {
            conn.execute(
                "UPDATE documents SET description = ? WHERE id = ? AND company_id = ?",
                params![description, id, company_id],
            )?;
        }
        if let Some(status) = status {
            conn.execute(
                "UPDATE documents SET status = ? WHERE id = ? AND company_id = ?",
                params![status.as_str(), id, company_id],
            )?;
        }
        self.get_document(company_id, id)
    }

    /// Mark a document as failed. Analysis failures must never leave a
    /// document stuck in `processing`.
    pub fn mark_document_error(&self, company_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE documents SET status = 'error' WHERE id = ? AND company_id = ?",
            params![id, company_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Document {}", id)));
        }
        Ok(())
    }

    /// Write analysis results back to the document and replace its
    /// generated transactions, atomically, marking it `completed`.
    pub fn apply_document_analysis(
        &self,
        company_id: i64,
        id: i64,
        analysis: &DocumentAnalysis,
        transactions: &[NewTransaction],
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let updated = tx.execute(
            r#"
            UPDATE documents
            SET status = 'completed', analysis_confidence = ?, category = ?, supplier = ?,
                amount_text = ?, client = ?, document_date = ?, invoice_number = ?, cui = ?,
                description = ?, insights = ?, recommendations = ?
            WHERE id = ? AND company_id = ?
            "#,
            params![
                analysis.confidence,
                analysis.category,
                analysis.supplier,
                analysis.amount,
                analysis.client,
                analysis.document_date,
                analysis.invoice_number,
                analysis.cui,
                analysis.description,
                serde_json::to_string(&analysis.insights)?,
                serde_json::to_string(&analysis.recommendations)?,
                id,
                company_id,
            ],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Document {}", id)));
        }

        tx.execute(
            "DELETE FROM document_transactions WHERE document_id = ? AND company_id = ?",
            params![id, company_id],
        )?;
        for t in transactions {
            tx.execute(
                r#"
                INSERT INTO document_transactions (company_id, document_id, description, amount, kind, category, date)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    company_id,
                    id,
                    t.description,
                    t.amount.to_string(),
                    t.kind.as_str(),
                    t.category,
                    t.date.map(|d| d.to_string()),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Delete a document (generated transactions cascade)
    pub fn delete_document(&self, company_id: i64, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM documents WHERE id = ? AND company_id = ?",
            params![id, company_id],
        )?;
        Ok(deleted > 0)
    }

    /// List every generated transaction for a company
    pub fn list_transactions(&self, company_id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM document_transactions WHERE company_id = ? ORDER BY date IS NULL, date, id",
            TRANSACTION_COLS
        ))?;
        let txs = stmt
            .query_map(params![company_id], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Get one generated transaction within the company scope
    pub fn get_transaction(&self, company_id: i64, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM document_transactions WHERE id = ? AND company_id = ?",
                TRANSACTION_COLS
            ),
            params![id, company_id],
            row_to_transaction,
        )
        .optional()
        .map_err(Into::into)
    }
}
