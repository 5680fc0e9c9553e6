use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use crate::parser::{detect_format, StatementParser};
use crate::report::{format_report, ReportFormatter, ReportGenerator};
use crate::schema::{Discrepancy, DiscrepancyKind, DocumentFormat, Severity, Statement, StatementKind};
use crate::validator::ValidationEngine;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Labels attached to every published audit ticket.
pub const TICKET_LABELS: [&str; 3] = ["auditoría", "finanzas", "automático"];

const SUPPORT_FIX: &str = "Contact the support team";

/// Raw text of one statement as handed over by the retrieval collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub kind: StatementKind,
    pub content: String,
    pub format: DocumentFormat,
}

impl RawDocument {
    pub fn new(kind: StatementKind, content: impl Into<String>) -> Self {
        let content = content.into();
        let format = detect_format(&content);
        Self {
            kind,
            content,
            format,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPair {
    pub profit_and_loss: RawDocument,
    pub balance_sheet: RawDocument,
}

impl DocumentPair {
    pub fn new(profit_and_loss: impl Into<String>, balance_sheet: impl Into<String>) -> Self {
        Self {
            profit_and_loss: RawDocument::new(StatementKind::ProfitAndLoss, profit_and_loss),
            balance_sheet: RawDocument::new(StatementKind::Balance, balance_sheet),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct AuditResult {
    pub status: AuditStatus,

    #[schemars(description = "Discrepancies in detection order; on error, a single system_error entry")]
    pub discrepancies: Vec<Discrepancy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "P&L period the audit ran against")]
    pub period: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AuditResult {
    pub fn success(discrepancies: Vec<Discrepancy>, period: impl Into<String>) -> Self {
        Self {
            status: AuditStatus::Success,
            discrepancies,
            period: Some(period.into()),
            issue_url: None,
            error_message: None,
        }
    }

    /// Wraps a failure into a result that still renders as a report.
    pub fn failure(error: &AuditError) -> Self {
        let message = error.to_string();
        Self {
            status: AuditStatus::Error,
            discrepancies: vec![Discrepancy::new(
                DiscrepancyKind::SystemError,
                Severity::High,
                message.clone(),
            )
            .with_fix(SUPPORT_FIX)],
            period: None,
            issue_url: None,
            error_message: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AuditStatus::Success
    }

    pub fn has_discrepancies(&self) -> bool {
        !self.discrepancies.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(AuditResult);
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

impl Ticket {
    /// Builds a ticket around an already rendered report body.
    pub fn new(
        discrepancies: &[Discrepancy],
        period: &str,
        report: String,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut body = report;
        if !body.ends_with('\n') {
            body.push('\n');
        }
        body.push_str("\n---\n");
        body.push_str("This issue was generated automatically by the financial statement auditor.\n");
        body.push_str(&format!(
            "Audit date: {}",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));

        Self {
            title: ticket_title(discrepancies.len(), period),
            body,
            labels: TICKET_LABELS.iter().map(|label| label.to_string()).collect(),
        }
    }

    pub fn from_discrepancies(
        discrepancies: &[Discrepancy],
        period: &str,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self::new(discrepancies, period, format_report(discrepancies), generated_at)
    }
}

pub fn ticket_title(count: usize, period: &str) -> String {
    if period.is_empty() {
        format!("Financial audit: {} discrepancies found", count)
    } else {
        format!("Financial audit: {} discrepancies found ({})", count, period)
    }
}

/// Fetches the two statements of a repository.
pub trait DocumentSource {
    fn retrieve(
        &self,
        repo_url: &str,
        branch: &str,
    ) -> impl Future<Output = Result<DocumentPair>> + Send;
}

/// Creates or updates the tracking ticket and returns its URL.
pub trait TicketPublisher {
    fn publish(&self, repo_url: &str, ticket: &Ticket) -> impl Future<Output = Result<String>> + Send;
}

/// The synchronous core: parse both statements and validate them.
#[derive(Debug, Clone, Default)]
pub struct Auditor {
    config: AuditConfig,
}

impl Auditor {
    pub fn new(config: AuditConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn parser(&self) -> StatementParser {
        StatementParser::new(self.config.strict_period)
    }

    pub fn parse_document(&self, document: &RawDocument) -> Result<Statement> {
        self.parser()
            .parse_as(&document.content, document.kind, document.format)
    }

    pub fn parse_documents(&self, documents: &DocumentPair) -> Result<(Statement, Statement)> {
        let pl = self.parse_document(&documents.profit_and_loss)?;
        let balance = self.parse_document(&documents.balance_sheet)?;
        Ok((pl, balance))
    }

    pub fn audit_statements(&self, pl: &Statement, balance: &Statement) -> Vec<Discrepancy> {
        ValidationEngine::new(&self.config).validate(pl, balance)
    }

    /// Parses and validates a document pair. Failures are folded into an
    /// error result rather than returned.
    pub fn audit_documents(&self, documents: &DocumentPair) -> AuditResult {
        match self.parse_documents(documents) {
            Ok((pl, balance)) => {
                let discrepancies = self.audit_statements(&pl, &balance);
                info!(
                    "Audit of period '{}' finished with {} discrepancies",
                    pl.period,
                    discrepancies.len()
                );
                AuditResult::success(discrepancies, pl.period)
            }
            Err(e) => {
                warn!("Audit failed: {}", e);
                AuditResult::failure(&e)
            }
        }
    }
}

/// Full audit run against injected collaborators: retrieve, audit, publish.
pub struct AuditService<S, P, G = ReportFormatter> {
    auditor: Auditor,
    source: S,
    publisher: P,
    generator: G,
}

impl<S, P> AuditService<S, P, ReportFormatter>
where
    S: DocumentSource,
    P: TicketPublisher,
{
    pub fn new(auditor: Auditor, source: S, publisher: P) -> Self {
        Self {
            auditor,
            source,
            publisher,
            generator: ReportFormatter,
        }
    }
}

impl<S, P, G> AuditService<S, P, G>
where
    S: DocumentSource,
    P: TicketPublisher,
    G: ReportGenerator,
{
    /// Replaces the report body generator used for published tickets.
    pub fn with_generator<H: ReportGenerator>(self, generator: H) -> AuditService<S, P, H> {
        AuditService {
            auditor: self.auditor,
            source: self.source,
            publisher: self.publisher,
            generator,
        }
    }

    pub fn auditor(&self) -> &Auditor {
        &self.auditor
    }

    pub async fn run_audit(&self, repo_url: &str, branch: &str) -> AuditResult {
        info!("Starting financial audit for {} ({})", repo_url, branch);

        match self.try_run_audit(repo_url, branch).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Audit of {} failed: {}", repo_url, e);
                AuditResult::failure(&e)
            }
        }
    }

    async fn try_run_audit(&self, repo_url: &str, branch: &str) -> Result<AuditResult> {
        let documents = self.source.retrieve(repo_url, branch).await?;
        debug!(
            "Retrieved documents: P&L as {:?}, Balance Sheet as {:?}",
            documents.profit_and_loss.format, documents.balance_sheet.format
        );

        let (pl, balance) = self.auditor.parse_documents(&documents)?;
        let discrepancies = self.auditor.audit_statements(&pl, &balance);
        let mut result = AuditResult::success(discrepancies, pl.period.clone());

        if result.has_discrepancies() {
            let ticket = Ticket::new(
                &result.discrepancies,
                &pl.period,
                self.generator.generate(&result.discrepancies),
                Utc::now(),
            );
            let url = self.publisher.publish(repo_url, &ticket).await?;
            info!("Published audit ticket '{}' at {}", ticket.title, url);
            result.issue_url = Some(url);
        } else {
            info!("No discrepancies found for {}, nothing to publish", repo_url);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PL: &str = "# Estado de Resultados
Periodo: 2024-Q1
## Totales
| Ingresos Totales | $1,200 |
| Gastos Totales | $800 |
| Utilidad Neta | $400 |
";

    const BALANCE: &str = "# Balance General
Periodo: 2024-Q1
## Totales
| Total Activos | $1,500 |
| Total Pasivos | $1,000 |
| Total Capital Contable | $400 |
";

    #[test]
    fn test_raw_document_detects_format() {
        let markup = RawDocument::new(StatementKind::ProfitAndLoss, PL);
        assert_eq!(markup.format, DocumentFormat::TableMarkup);

        let delimited = RawDocument::new(StatementKind::Balance, "Category,Item,Amount\n");
        assert_eq!(delimited.format, DocumentFormat::Delimited);
    }

    #[test]
    fn test_audit_documents_success() {
        let result = Auditor::default().audit_documents(&DocumentPair::new(PL, BALANCE));

        assert!(result.is_success());
        assert_eq!(result.period.as_deref(), Some("2024-Q1"));
        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(result.discrepancies[0].kind, DiscrepancyKind::Unbalanced);
    }

    #[test]
    fn test_audit_documents_parse_failure_is_structured() {
        let result = Auditor::default().audit_documents(&DocumentPair::new(PL, "# Balance\n"));

        assert_eq!(result.status, AuditStatus::Error);
        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(result.discrepancies[0].kind, DiscrepancyKind::SystemError);
        assert_eq!(result.discrepancies[0].severity, Severity::High);
        assert!(result.error_message.unwrap().contains("Balance Sheet"));
    }

    #[test]
    fn test_auditor_rejects_invalid_config() {
        let config = AuditConfig::default().with_tolerance(rust_decimal::Decimal::NEGATIVE_ONE);
        assert!(Auditor::new(config).is_err());
    }

    #[test]
    fn test_ticket_composition() {
        let discrepancies = vec![Discrepancy::new(
            DiscrepancyKind::PeriodMismatch,
            Severity::High,
            "periods differ",
        )];
        let generated_at = Utc.with_ymd_and_hms(2024, 4, 2, 9, 30, 0).unwrap();
        let ticket = Ticket::from_discrepancies(&discrepancies, "2024-Q1", generated_at);

        assert_eq!(ticket.title, "Financial audit: 1 discrepancies found (2024-Q1)");
        assert!(ticket.body.starts_with("# Financial Audit Results"));
        assert!(ticket.body.contains("### period_mismatch"));
        assert!(ticket.body.ends_with("Audit date: 2024-04-02 09:30:00 UTC"));
        assert_eq!(ticket.labels, vec!["auditoría", "finanzas", "automático"]);
    }

    #[test]
    fn test_ticket_title_without_period() {
        assert_eq!(ticket_title(3, ""), "Financial audit: 3 discrepancies found");
    }

    #[test]
    fn test_result_json() {
        let result = AuditResult::failure(&AuditError::Retrieval("no P&L file".to_string()));
        let json = result.to_json().unwrap();
        assert!(json.contains("\"error\""));
        assert!(json.contains("system_error"));
        assert!(!json.contains("issue_url"));

        let schema = AuditResult::schema_as_json().unwrap();
        assert!(schema.contains("discrepancies"));
    }
}
