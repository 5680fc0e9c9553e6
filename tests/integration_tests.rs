use financial_statement_auditor::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const PL_MARKUP: &str = "
# Estado de Resultados
Periodo: 2024-Q1

## Ingresos
| Concepto | Monto |
|----------|-------|
| Ventas   | $1000 |
| Otros    | $200  |

## Gastos
| Concepto | Monto |
|----------|-------|
| Costos   | $500  |
| Gastos   | $300  |

## Totales
| Concepto | Monto |
|----------|-------|
| Ingresos Totales | $1200 |
| Gastos Totales   | $800  |
| Utilidad Neta    | $400  |
";

const BALANCE_MARKUP: &str = "
# Balance General
Periodo: 2024-Q1

## Activos
| Concepto | Monto |
|----------|-------|
| Efectivo | $1000 |
| Cuentas  | $500  |
| Total Activos | $1500 |

## Pasivos
| Concepto | Monto |
|----------|-------|
| Deudas   | $800  |
| Otros    | $200  |

## Capital Contable
| Concepto | Monto |
|----------|-------|
| Capital  | $300  |
| Utilidad | $200  |

## Totales
| Concepto | Monto |
|----------|-------|
| Total Pasivos | $1000 |
| Total Capital | $500  |
";

fn d(value: i64) -> Decimal {
    Decimal::from(value)
}

fn pl(period: &str, totals: &[(&str, i64)]) -> Statement {
    Statement::new(StatementKind::ProfitAndLoss, period)
        .with_totals(totals.iter().map(|(label, value)| (*label, d(*value))))
}

fn balance(period: &str, totals: &[(&str, i64)]) -> Statement {
    Statement::new(StatementKind::Balance, period)
        .with_totals(totals.iter().map(|(label, value)| (*label, d(*value))))
}

fn scenario_pl() -> Statement {
    pl(
        "2024-Q1",
        &[("Ingresos Totales", 1200), ("Gastos Totales", 800), ("Utilidad Neta", 400)],
    )
}

fn scenario_balance(period: &str, equity: i64) -> Statement {
    balance(
        period,
        &[
            ("Total Activos", 1500),
            ("Total Pasivos", 1000),
            ("Total Capital Contable", equity),
        ],
    )
}

fn validate(pl: &Statement, balance: &Statement) -> Vec<Discrepancy> {
    let config = AuditConfig::default();
    ValidationEngine::new(&config).validate(pl, balance)
}

#[test]
fn test_balanced_statements_have_no_discrepancies() {
    let discrepancies = validate(&scenario_pl(), &scenario_balance("2024-Q1", 500));
    assert!(discrepancies.is_empty());
}

#[test]
fn test_period_mismatch() {
    let discrepancies = validate(&scenario_pl(), &scenario_balance("2024-Q2", 500));

    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].kind, DiscrepancyKind::PeriodMismatch);
    assert_eq!(discrepancies[0].severity, Severity::High);
    assert!(discrepancies[0].description.contains("2024-Q1"));
    assert!(discrepancies[0].description.contains("2024-Q2"));
}

#[test]
fn test_unbalanced_sheet_reports_difference() {
    let discrepancies = validate(&scenario_pl(), &scenario_balance("2024-Q1", 400));

    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].kind, DiscrepancyKind::Unbalanced);
    assert_eq!(discrepancies[0].severity, Severity::High);
    assert!(discrepancies[0].description.contains("Difference: $100.00"));
}

#[test]
fn test_unusual_revenue_asset_ratio() {
    let discrepancies = validate(
        &pl("2024-Q1", &[("Ingresos Totales", 2000)]),
        &balance("2024-Q1", &[("Total Activos", 500)]),
    );

    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].kind, DiscrepancyKind::UnusualRevenueAssetRatio);
    assert_eq!(discrepancies[0].severity, Severity::Medium);
}

#[test]
fn test_expenses_exceed_revenue() {
    let discrepancies = validate(
        &pl("2024-Q1", &[("Gastos Totales", 900), ("Ingresos Totales", 800)]),
        &balance("2024-Q1", &[]),
    );

    assert_eq!(discrepancies.len(), 1);
    assert_eq!(discrepancies[0].kind, DiscrepancyKind::ExpenseExceedsRevenue);
    assert_eq!(discrepancies[0].severity, Severity::High);
}

#[test]
fn test_validation_is_deterministic() {
    let pl = pl(
        "2024-Q1",
        &[("Ingresos Totales", 5000), ("Gastos Totales", 6000), ("Utilidad Neta", -1000)],
    );
    let balance = scenario_balance("2023-Q4", 100)
        .with_item("Utilidad", d(10), Category::Equity)
        .with_item("Utilidades Retenidas", d(20), Category::Equity);

    let first = validate(&pl, &balance);
    let second = validate(&pl, &balance);
    assert_eq!(first, second);
    assert_eq!(first.len(), 6);
}

#[test]
fn test_amounts_are_exact() {
    assert_eq!(
        parse_amount("$1,200.00"),
        Some(Decimal::from_str("1200.00").unwrap())
    );
    assert_eq!(parse_amount("$0.10").unwrap() + parse_amount("$0.20").unwrap(), Decimal::new(30, 2));
    assert_eq!(parse_amount("999999999.99"), Some(MAX_AMOUNT));
    assert_eq!(parse_amount("1000000000.00"), None);
}

#[test]
fn test_original_fixtures_end_to_end() {
    let result = audit(PL_MARKUP, BALANCE_MARKUP);

    assert!(result.is_success());
    assert_eq!(result.period.as_deref(), Some("2024-Q1"));
    assert_eq!(result.discrepancies.len(), 1);

    let mismatch = &result.discrepancies[0];
    assert_eq!(mismatch.kind, DiscrepancyKind::IncomeMismatch);
    assert!(mismatch.description.contains("$400.00"));
    assert!(mismatch.description.contains("$200.00"));
}

#[test]
fn test_markup_and_delimited_agree() {
    let pl_csv = "Category,Item,Amount,Periodo
Ingresos,Ventas,1000,2024-Q1
Ingresos,Otros,200,2024-Q1
Gastos,Costos,500,2024-Q1
Gastos,Gastos,300,2024-Q1
Totales,Ingresos Totales,1200,2024-Q1
Totales,Gastos Totales,800,2024-Q1
Totales,Utilidad Neta,400,2024-Q1
";
    let balance_csv = "Category,Item,Amount,Periodo
Activos,Efectivo,1000,2024-Q1
Activos,Cuentas,500,2024-Q1
Pasivos,Deudas,800,2024-Q1
Pasivos,Otros,200,2024-Q1
Capital Contable,Capital,300,2024-Q1
Capital Contable,Utilidad,200,2024-Q1
Totales,Total Activos,1500,2024-Q1
Totales,Total Pasivos,1000,2024-Q1
Totales,Total Capital,500,2024-Q1
";

    let from_markup = audit(PL_MARKUP, BALANCE_MARKUP);
    let from_csv = audit(pl_csv, balance_csv);
    let mixed = audit(PL_MARKUP, balance_csv);

    assert_eq!(from_markup, from_csv);
    assert_eq!(from_markup, mixed);

    let statement = parse_statement(balance_csv, StatementKind::Balance).unwrap();
    let markup_statement = parse_statement(BALANCE_MARKUP, StatementKind::Balance).unwrap();
    assert_eq!(statement.items, markup_statement.items);
}

#[test]
fn test_missing_period_yields_error_result() {
    let pl = "# Estado de Resultados
## Totales
| Ingresos Totales | $1200 |
";
    let result = audit(pl, BALANCE_MARKUP);

    assert_eq!(result.status, AuditStatus::Error);
    assert_eq!(result.discrepancies.len(), 1);
    assert_eq!(result.discrepancies[0].kind, DiscrepancyKind::SystemError);
    assert!(result.discrepancies[0].fix.is_some());
    assert!(result.error_message.as_deref().unwrap().contains("period"));

    // Rendering an error result still works.
    let report = format_report(&result.discrepancies);
    assert!(report.contains("### system_error"));
}

#[test]
fn test_lenient_config_accepts_missing_period() {
    let pl = "# Estado de Resultados
## Totales
| Ingresos Totales | $1200 |
";
    let balance = "# Balance
## Totales
| Total Activos | $1500 |
";
    let result = audit_with_config(pl, balance, AuditConfig::lenient()).unwrap();

    assert!(result.is_success());
    assert_eq!(result.period.as_deref(), Some(""));
    assert!(result.discrepancies.is_empty());
}

#[test]
fn test_report_for_mixed_findings() {
    let pl = pl(
        "2024-Q1",
        &[("Ingresos Totales", 4000), ("Gastos Totales", 4500)],
    );
    let balance = scenario_balance("2024-Q2", 400);
    let discrepancies = validate(&pl, &balance);
    let report = format_report(&discrepancies);

    assert!(report.starts_with("# Financial Audit Results"));
    assert!(report.contains("- Total discrepancies: 4"));
    assert!(report.contains("- High severity: 3"));
    assert!(report.contains("- Medium severity: 1"));

    let period = report.find("### period_mismatch").unwrap();
    let expenses = report.find("### expense_exceeds_revenue").unwrap();
    let unbalanced = report.find("### unbalanced").unwrap();
    let ratio = report.find("### unusual_revenue_asset_ratio").unwrap();
    assert!(period < expenses && expenses < unbalanced && unbalanced < ratio);
}

struct InMemorySource {
    documents: Option<DocumentPair>,
}

impl DocumentSource for InMemorySource {
    async fn retrieve(&self, _repo_url: &str, _branch: &str) -> Result<DocumentPair> {
        self.documents
            .clone()
            .ok_or_else(|| AuditError::Retrieval("No P&L file found".to_string()))
    }
}

#[derive(Default, Clone)]
struct RecordingPublisher {
    tickets: Arc<Mutex<Vec<Ticket>>>,
}

impl TicketPublisher for RecordingPublisher {
    async fn publish(&self, repo_url: &str, ticket: &Ticket) -> Result<String> {
        let mut tickets = self.tickets.lock().unwrap();
        tickets.push(ticket.clone());
        Ok(format!("{}/issues/{}", repo_url, tickets.len()))
    }
}

struct FailingPublisher;

impl TicketPublisher for FailingPublisher {
    async fn publish(&self, _repo_url: &str, _ticket: &Ticket) -> Result<String> {
        Err(AuditError::Publish("status 403".to_string()))
    }
}

struct ShortSummary;

impl ReportGenerator for ShortSummary {
    fn generate(&self, discrepancies: &[Discrepancy]) -> String {
        format!("{} findings", discrepancies.len())
    }
}

const REPO: &str = "https://github.com/acme/books";

#[tokio::test]
async fn test_service_publishes_when_discrepancies_exist() {
    let source = InMemorySource {
        documents: Some(DocumentPair::new(PL_MARKUP, BALANCE_MARKUP)),
    };
    let service = AuditService::new(Auditor::default(), source, RecordingPublisher::default());

    let result = service.run_audit(REPO, "main").await;

    assert!(result.is_success());
    assert_eq!(result.issue_url.as_deref(), Some("https://github.com/acme/books/issues/1"));
}

#[tokio::test]
async fn test_service_ticket_contents() {
    let publisher = RecordingPublisher::default();
    let source = InMemorySource {
        documents: Some(DocumentPair::new(PL_MARKUP, BALANCE_MARKUP)),
    };
    let service = AuditService::new(Auditor::default(), source, publisher.clone());
    service.run_audit(REPO, "main").await;

    let service = service.with_generator(ShortSummary);
    let result = service.run_audit(REPO, "main").await;
    assert_eq!(result.issue_url.as_deref(), Some("https://github.com/acme/books/issues/2"));

    let tickets = publisher.tickets.lock().unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].title, "Financial audit: 1 discrepancies found (2024-Q1)");
    assert!(tickets[0].body.starts_with("# Financial Audit Results"));
    assert!(tickets[0].body.contains("### income_mismatch"));
    assert!(tickets[0].body.contains("Audit date: "));
    assert_eq!(tickets[0].labels, TICKET_LABELS.to_vec());

    assert!(tickets[1].body.starts_with("1 findings"));
    assert_eq!(tickets[0].title, tickets[1].title);
}

#[tokio::test]
async fn test_service_skips_publishing_clean_audit() {
    let pl = "Category,Item,Amount,Period
Totales,Ingresos Totales,1200,2024-Q1
";
    let balance = "Category,Item,Amount,Period
Totales,Total Activos,1500,2024-Q1
Totales,Total Pasivos,1000,2024-Q1
Totales,Total Capital Contable,500,2024-Q1
";
    let source = InMemorySource {
        documents: Some(DocumentPair::new(pl, balance)),
    };
    let service = AuditService::new(Auditor::default(), source, FailingPublisher);

    let result = service.run_audit(REPO, "main").await;

    assert!(result.is_success());
    assert!(!result.has_discrepancies());
    assert!(result.issue_url.is_none());
}

#[tokio::test]
async fn test_service_folds_failures_into_result() {
    let missing = AuditService::new(
        Auditor::default(),
        InMemorySource { documents: None },
        RecordingPublisher::default(),
    );
    let result = missing.run_audit(REPO, "main").await;
    assert_eq!(result.status, AuditStatus::Error);
    assert!(result.error_message.as_deref().unwrap().contains("No P&L file found"));

    let rejected = AuditService::new(
        Auditor::default(),
        InMemorySource {
            documents: Some(DocumentPair::new(PL_MARKUP, BALANCE_MARKUP)),
        },
        FailingPublisher,
    );
    let result = rejected.run_audit(REPO, "main").await;
    assert_eq!(result.status, AuditStatus::Error);
    assert_eq!(result.discrepancies[0].kind, DiscrepancyKind::SystemError);
    assert!(result.issue_url.is_none());
}
