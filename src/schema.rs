use rust_decimal::Decimal;
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum StatementKind {
    #[schemars(description = "Profit & Loss statement: revenue and expenses for a period")]
    ProfitAndLoss,

    #[schemars(description = "Balance Sheet: assets, liabilities and equity at a point in time")]
    Balance,
}

impl StatementKind {
    /// Whether line items of `category` belong on this kind of statement.
    pub fn accepts(&self, category: Category) -> bool {
        category.statement_kind() == *self
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProfitAndLoss => write!(f, "P&L"),
            Self::Balance => write!(f, "Balance Sheet"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DocumentFormat {
    #[schemars(description = "Markdown-style tables with '## Section' headings and a 'Periodo:' line")]
    TableMarkup,

    #[schemars(description = "Comma-separated rows with Category, Item and Amount columns")]
    Delimited,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    Revenue,
    Expense,
    Asset,
    Liability,
    Equity,
}

impl Category {
    pub fn statement_kind(&self) -> StatementKind {
        match self {
            Self::Revenue | Self::Expense => StatementKind::ProfitAndLoss,
            Self::Asset | Self::Liability | Self::Equity => StatementKind::Balance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct LineItem {
    #[schemars(description = "The row label exactly as it appears in the document")]
    pub name: String,

    #[schemars(description = "Exact decimal amount, always within +/- 999,999,999.99")]
    pub amount: Decimal,

    pub category: Category,

    #[schemars(description = "Period of the statement this item was read from")]
    pub period: String,
}

/// Reported totals keyed by label. Keys are unique; re-inserting a label
/// replaces its amount but keeps its original position.
///
/// Serialized as a JSON object whose keys follow insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Totals(Vec<(String, Decimal)>);

impl Serialize for Totals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, amount) in &self.0 {
            map.serialize_entry(label, amount)?;
        }
        map.end()
    }
}

struct TotalsVisitor;

impl<'de> Visitor<'de> for TotalsVisitor {
    type Value = Totals;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a map of total labels to amounts")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Totals, A::Error> {
        let mut totals = Totals::new();
        while let Some((label, amount)) = access.next_entry::<String, Decimal>()? {
            totals.insert(label, amount);
        }
        Ok(totals)
    }
}

impl<'de> Deserialize<'de> for Totals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TotalsVisitor)
    }
}

impl JsonSchema for Totals {
    fn schema_name() -> String {
        "Totals".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        <BTreeMap<String, Decimal>>::json_schema(gen)
    }
}

impl Totals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, amount: Decimal) {
        let label = label.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == label) {
            Some(entry) => entry.1 = amount,
            None => self.0.push((label, amount)),
        }
    }

    pub fn get(&self, label: &str) -> Option<Decimal> {
        self.0
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, amount)| *amount)
    }

    /// Returns the amount of the first alias present, trying aliases in order.
    pub fn get_any<S: AsRef<str>>(&self, aliases: &[S]) -> Option<Decimal> {
        aliases.iter().find_map(|alias| self.get(alias.as_ref()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.0.iter().map(|(label, amount)| (label.as_str(), *amount))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Decimal)> for Totals {
    fn from_iter<I: IntoIterator<Item = (S, Decimal)>>(iter: I) -> Self {
        let mut totals = Totals::new();
        for (label, amount) in iter {
            totals.insert(label, amount);
        }
        totals
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct Statement {
    pub kind: StatementKind,

    #[schemars(description = "Period label taken from the 'Periodo:' line or the period column; empty when absent in lenient mode")]
    pub period: String,

    #[schemars(description = "Line items in document order")]
    pub items: Vec<LineItem>,

    #[schemars(description = "Totals reported by the document, in first-appearance order")]
    pub totals: Totals,
}

impl Statement {
    pub fn new(kind: StatementKind, period: impl Into<String>) -> Self {
        Self {
            kind,
            period: period.into(),
            items: Vec::new(),
            totals: Totals::new(),
        }
    }

    pub fn with_totals<S: Into<String>>(
        mut self,
        totals: impl IntoIterator<Item = (S, Decimal)>,
    ) -> Self {
        for (label, amount) in totals {
            self.totals.insert(label, amount);
        }
        self
    }

    pub fn with_item(mut self, name: impl Into<String>, amount: Decimal, category: Category) -> Self {
        let period = self.period.clone();
        self.items.push(LineItem {
            name: name.into(),
            amount,
            category,
            period,
        });
        self
    }

    pub fn items_in(&self, category: Category) -> impl Iterator<Item = &LineItem> {
        self.items.iter().filter(move |item| item.category == category)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Report order.
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    #[schemars(description = "The two statements cover different periods")]
    PeriodMismatch,

    #[schemars(description = "P&L net income differs from the net income carried in Balance Sheet equity")]
    IncomeMismatch,

    #[schemars(description = "Retained earnings do not reflect the period's net income")]
    RetainedEarningsMismatch,

    #[schemars(description = "Total revenue is unusually high relative to total assets")]
    UnusualRevenueAssetRatio,

    #[schemars(description = "Total expenses exceed total revenue")]
    ExpenseExceedsRevenue,

    #[schemars(description = "Assets do not equal Liabilities + Equity")]
    Unbalanced,

    #[schemars(description = "The audit itself failed; the description carries the cause")]
    SystemError,
}

impl DiscrepancyKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::PeriodMismatch => "period_mismatch",
            Self::IncomeMismatch => "income_mismatch",
            Self::RetainedEarningsMismatch => "retained_earnings_mismatch",
            Self::UnusualRevenueAssetRatio => "unusual_revenue_asset_ratio",
            Self::ExpenseExceedsRevenue => "expense_exceeds_revenue",
            Self::Unbalanced => "unbalanced",
            Self::SystemError => "system_error",
        }
    }
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub description: String,
    pub severity: Severity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Suggested correction, when one can be derived")]
    pub fix: Option<String>,
}

impl Discrepancy {
    pub fn new(kind: DiscrepancyKind, severity: Severity, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            severity,
            fix: None,
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }
}
