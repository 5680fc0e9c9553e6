//! # Financial Statement Auditor
//!
//! A library for cross-checking a Profit & Loss statement against the Balance Sheet
//! of the same period and reporting every inconsistency it finds.
//!
//! ## Core Concepts
//!
//! - **Documents**: Raw statement text, either markdown-style tables or delimited rows
//! - **Statements**: Normalized line items plus the reported totals of one document
//! - **Validation Rules**: Six ordered consistency checks (periods, net income, retained
//!   earnings, revenue/asset ratio, expense ratio, accounting equation)
//! - **Discrepancies**: Typed findings with a severity and an optional suggested fix
//! - **Reports**: Markdown grouped by severity, ready to be filed as an issue
//!
//! All amounts are exact decimals; no floating point is involved anywhere.
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_statement_auditor::*;
//!
//! let pl = "# Estado de Resultados
//! Periodo: 2024-Q1
//! ## Totales
//! | Ingresos Totales | $1,200.00 |
//! | Gastos Totales   | $800.00   |
//! | Utilidad Neta    | $400.00   |
//! ";
//!
//! let balance = "Category,Item,Amount,Periodo
//! Activos,Efectivo,1500,2024-Q1
//! Totales,Total Activos,1500,
//! Totales,Total Pasivos,1000,
//! Totales,Total Capital Contable,500,
//! ";
//!
//! let result = audit(pl, balance);
//! assert!(result.is_success());
//! println!("{}", format_report(&result.discrepancies));
//! ```

pub mod audit;
pub mod categories;
pub mod config;
pub mod error;
pub mod parser;
pub mod report;
pub mod schema;
pub mod utils;
pub mod validator;

#[cfg(feature = "github")]
pub mod github;

pub use audit::{
    ticket_title, AuditResult, AuditService, AuditStatus, Auditor, DocumentPair, DocumentSource,
    RawDocument, Ticket, TicketPublisher, TICKET_LABELS,
};
pub use categories::{normalize_category, Classification};
pub use config::{AuditConfig, TotalsKeys};
pub use error::{AuditError, Result};
pub use parser::{detect_format, StatementParser};
pub use report::{format_discrepancy, format_report, format_summary, ReportFormatter, ReportGenerator};
pub use schema::*;
pub use utils::*;
pub use validator::{validate_statements, ValidationEngine};

/// Parses a single document with the default (strict) parser.
pub fn parse_statement(content: &str, kind: StatementKind) -> Result<Statement> {
    StatementParser::default().parse(content, kind)
}

/// Audits a P&L / Balance Sheet pair with the default configuration.
pub fn audit(pl_content: &str, balance_content: &str) -> AuditResult {
    Auditor::default().audit_documents(&DocumentPair::new(pl_content, balance_content))
}

/// Audits a document pair with a caller-supplied configuration.
pub fn audit_with_config(
    pl_content: &str,
    balance_content: &str,
    config: AuditConfig,
) -> Result<AuditResult> {
    let auditor = Auditor::new(config)?;
    Ok(auditor.audit_documents(&DocumentPair::new(pl_content, balance_content)))
}
