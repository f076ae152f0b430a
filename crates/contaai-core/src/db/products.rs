//! Product operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, parse_money, Database};
use crate::error::Result;
use crate::models::{NewProduct, Product, ProductStatus};

const PRODUCT_COLS: &str = "id, company_id, name, sku, category, unit_price, vat_rate, stock, \
     min_stock, unit, status, created_at";

fn row_to_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    let unit_price: String = row.get(5)?;
    let status: String = row.get(10)?;
    let created_at: String = row.get(11)?;
    Ok(Product {
        id: row.get(0)?,
        company_id: row.get(1)?,
        name: row.get(2)?,
        sku: row.get(3)?,
        category: row.get(4)?,
        unit_price: parse_money(&unit_price),
        vat_rate: row.get(6)?,
        stock: row.get(7)?,
        min_stock: row.get(8)?,
        unit: row.get(9)?,
        status: status.parse().unwrap_or(ProductStatus::Active),
        created_at: parse_datetime(&created_at),
    })
}

impl Database {
    /// Create a product
    pub fn create_product(&self, company_id: i64, product: &NewProduct) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO products (company_id, name, sku, category, unit_price, vat_rate, stock, min_stock, unit, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                company_id,
                product.name,
                product.sku,
                product.category,
                product.unit_price.to_string(),
                product.vat_rate,
                product.stock,
                product.min_stock,
                product.unit,
                product.status.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a product by ID within the company scope
    pub fn get_product(&self, company_id: i64, id: i64) -> Result<Option<Product>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM products WHERE id = ? AND company_id = ?",
                PRODUCT_COLS
            ),
            params![id, company_id],
            row_to_product,
        )
        .optional()
        .map_err(Into::into)
    }

    /// List the company's products by name
    pub fn list_products(&self, company_id: i64) -> Result<Vec<Product>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM products WHERE company_id = ? ORDER BY name, id",
            PRODUCT_COLS
        ))?;
        let products = stmt
            .query_map(params![company_id], row_to_product)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Replace a product's mutable fields
    pub fn update_product(
        &self,
        company_id: i64,
        id: i64,
        product: &NewProduct,
    ) -> Result<Option<Product>> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"
            UPDATE products
            SET name = ?, sku = ?, category = ?, unit_price = ?, vat_rate = ?,
                stock = ?, min_stock = ?, unit = ?, status = ?
            WHERE id = ? AND company_id = ?
            "#,
            params![
                product.name,
                product.sku,
                product.category,
                product.unit_price.to_string(),
                product.vat_rate,
                product.stock,
                product.min_stock,
                product.unit,
                product.status.as_str(),
                id,
                company_id,
            ],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_product(company_id, id)
    }

    /// Delete a product
    pub fn delete_product(&self, company_id: i64, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM products WHERE id = ? AND company_id = ?",
            params![id, company_id],
        )?;
        Ok(deleted > 0)
    }
}
