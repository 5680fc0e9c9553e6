use crate::categories::{normalize_category, Classification};
use crate::error::{AuditError, Result};
use crate::schema::{Category, DocumentFormat, LineItem, Statement, StatementKind, Totals};
use crate::utils::parse_amount;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

fn period_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Periodo:\s*([^\n]+)").expect("period pattern is valid"))
}

const BYTE_ORDER_MARK: char = '\u{feff}';

fn strip_bom(content: &str) -> &str {
    content.strip_prefix(BYTE_ORDER_MARK).unwrap_or(content)
}

/// Classifies raw text: markup tables start with `|` or `#` once a byte
/// order mark and leading whitespace are trimmed, everything else is
/// treated as delimited rows.
pub fn detect_format(content: &str) -> DocumentFormat {
    let trimmed = strip_bom(content).trim_start();
    if trimmed.starts_with('|') || trimmed.starts_with('#') {
        DocumentFormat::TableMarkup
    } else {
        DocumentFormat::Delimited
    }
}

/// What a single pass over a document collected, before the
/// document-level checks run.
#[derive(Debug, Default)]
struct ParsedRows {
    period: Option<String>,
    items: Vec<(String, Decimal, Category)>,
    totals: Totals,
}

impl ParsedRows {
    fn route(&mut self, kind: StatementKind, classification: Option<Classification>, name: &str, amount: Decimal) -> bool {
        match classification {
            Some(Classification::Total) => {
                self.totals.insert(name, amount);
                true
            }
            Some(Classification::Item(category)) if kind.accepts(category) => {
                self.items.push((name.to_string(), amount, category));
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatementParser {
    strict_period: bool,
}

impl Default for StatementParser {
    fn default() -> Self {
        Self::strict()
    }
}

impl StatementParser {
    pub fn new(strict_period: bool) -> Self {
        Self { strict_period }
    }

    /// Documents without a period marker are rejected.
    pub fn strict() -> Self {
        Self::new(true)
    }

    /// Documents without a period marker get an empty period.
    pub fn lenient() -> Self {
        Self::new(false)
    }

    pub fn parse(&self, content: &str, kind: StatementKind) -> Result<Statement> {
        self.parse_as(content, kind, detect_format(content))
    }

    /// Parses with an explicit format instead of detecting it.
    pub fn parse_as(
        &self,
        content: &str,
        kind: StatementKind,
        format: DocumentFormat,
    ) -> Result<Statement> {
        let content = strip_bom(content);
        let rows = match format {
            DocumentFormat::TableMarkup => parse_table_markup(content, kind),
            DocumentFormat::Delimited => parse_delimited(content, kind)?,
        };

        self.finish(rows, kind, format)
    }

    fn finish(&self, rows: ParsedRows, kind: StatementKind, format: DocumentFormat) -> Result<Statement> {
        let period = match rows.period {
            Some(period) => period,
            None if self.strict_period => return Err(AuditError::MissingPeriod(kind)),
            None => {
                debug!("{} document has no period marker, continuing with an empty period", kind);
                String::new()
            }
        };

        if rows.items.is_empty() && rows.totals.is_empty() {
            return Err(AuditError::EmptyStatement(kind));
        }

        debug!(
            "Parsed {} document ({:?}) for period '{}': {} line items, {} totals",
            kind,
            format,
            period,
            rows.items.len(),
            rows.totals.len()
        );

        let items = rows
            .items
            .into_iter()
            .map(|(name, amount, category)| LineItem {
                name,
                amount,
                category,
                period: period.clone(),
            })
            .collect();

        Ok(Statement {
            kind,
            period,
            items,
            totals: rows.totals,
        })
    }
}

fn parse_table_markup(content: &str, kind: StatementKind) -> ParsedRows {
    let mut rows = ParsedRows {
        period: period_pattern()
            .captures(content)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|period| !period.is_empty()),
        ..ParsedRows::default()
    };

    let mut section: Option<String> = None;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();

        if line.starts_with("##") {
            section = Some(line.replace('#', "").trim().to_lowercase());
            continue;
        }

        if line.is_empty() || line.starts_with("|--") || line.starts_with("| Concepto") {
            continue;
        }

        if !line.starts_with('|') {
            continue;
        }

        let cells: Vec<&str> = line.split('|').map(str::trim).collect();
        // The leading and trailing pipes produce empty outer cells.
        let inner = if cells.len() >= 2 { &cells[1..cells.len() - 1] } else { &[][..] };
        if inner.len() < 2 {
            debug!("Line {}: fewer than two cells, skipped", line_no);
            continue;
        }

        let (name, amount_text) = (inner[0], inner[1]);
        if name.is_empty() {
            debug!("Line {}: empty row label, skipped", line_no);
            continue;
        }

        let Some(amount) = parse_amount(amount_text) else {
            debug!("Line {}: unusable amount '{}', skipped", line_no, amount_text);
            continue;
        };

        if kind == StatementKind::Balance && name.starts_with("Total") {
            rows.totals.insert(name, amount);
            continue;
        }

        let classification = section.as_deref().and_then(normalize_category);
        if !rows.route(kind, classification, name, amount) {
            debug!(
                "Line {}: section '{}' does not map to a {} category, skipped",
                line_no,
                section.as_deref().unwrap_or(""),
                kind
            );
        }
    }

    rows
}

struct Columns {
    category: usize,
    item: usize,
    amount: usize,
    period: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord, kind: StatementKind) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let missing = |name: &str| AuditError::MalformedDocument {
            kind,
            details: format!("header has no '{}' column", name),
        };

        Ok(Self {
            category: find("Category").ok_or_else(|| missing("Category"))?,
            item: find("Item").ok_or_else(|| missing("Item"))?,
            amount: find("Amount").ok_or_else(|| missing("Amount"))?,
            period: headers
                .iter()
                .position(|h| h.to_lowercase().contains("period")),
        })
    }
}

fn parse_delimited(content: &str, kind: StatementKind) -> Result<ParsedRows> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.trim_start().as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AuditError::MalformedDocument {
            kind,
            details: e.to_string(),
        })?
        .clone();
    let columns = Columns::locate(&headers, kind)?;

    let mut rows = ParsedRows::default();

    for (idx, record) in reader.records().enumerate() {
        let row_no = idx + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                debug!("Row {}: unreadable record ({}), skipped", row_no, e);
                continue;
            }
        };

        if rows.period.is_none() {
            rows.period = columns
                .period
                .and_then(|col| record.get(col))
                .filter(|value| !value.is_empty())
                .map(str::to_string);
        }

        let (Some(label), Some(name), Some(amount_text)) = (
            record.get(columns.category),
            record.get(columns.item),
            record.get(columns.amount),
        ) else {
            debug!("Row {}: missing cells, skipped", row_no);
            continue;
        };

        if name.is_empty() {
            debug!("Row {}: empty item name, skipped", row_no);
            continue;
        }

        let Some(amount) = parse_amount(amount_text) else {
            debug!("Row {}: unusable amount '{}', skipped", row_no, amount_text);
            continue;
        };

        if !rows.route(kind, normalize_category(label), name, amount) {
            debug!(
                "Row {}: category '{}' does not map to a {} category, skipped",
                row_no, label, kind
            );
        }
    }

    Ok(rows)
}
