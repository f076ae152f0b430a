//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod auth;
pub mod banking;
pub mod contracts;
pub mod documents;
pub mod invoices;
pub mod products;
pub mod reconciliation;
pub mod reports;
pub mod settings;

// Re-export all handlers for use in router
pub use auth::*;
pub use banking::*;
pub use contracts::*;
pub use documents::*;
pub use invoices::*;
pub use products::*;
pub use reconciliation::*;
pub use reports::*;
pub use settings::*;
