//! ContaAI Core Library
//!
//! Shared functionality for the ContaAI accounting back-office:
//! - Database access and migrations (company-scoped, SQLCipher-encrypted)
//! - Transaction normalizer (amount/date/category parsing)
//! - Bank reconciliation matcher
//! - Financial aggregation and report assembly
//! - External document-analysis service client

pub mod analysis;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod report;

/// Test utilities including the mock analysis server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analysis::{AnalysisClient, AnalysisConfig, DocumentAnalysis};
pub use db::{AuditEntry, Database, NewReconciliation};
pub use error::{Error, Result};
pub use normalize::DateFallback;
pub use reconcile::{MatcherConfig, Reconciler};
pub use report::{compute_dashboard, compute_report, CompanySnapshot, DateRange};
