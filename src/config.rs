use crate::error::{AuditError, Result};
use crate::utils::DEFAULT_TOLERANCE;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound accepted for `revenue_asset_ratio`.
pub const MAX_REVENUE_ASSET_RATIO: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Label aliases for the totals the validation rules read.
///
/// Source documents drift in how they spell a total (e.g. "Total Capital"
/// vs "Total Capital Contable"); each list is tried in order and the first
/// label present in a statement wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct TotalsKeys {
    #[serde(default = "default_revenue_keys")]
    #[schemars(description = "Labels of the P&L total revenue figure")]
    pub revenue: Vec<String>,

    #[serde(default = "default_expense_keys")]
    #[schemars(description = "Labels of the P&L total expenses figure")]
    pub expenses: Vec<String>,

    #[serde(default = "default_asset_keys")]
    #[schemars(description = "Labels of the Balance Sheet total assets figure")]
    pub assets: Vec<String>,

    #[serde(default = "default_liability_keys")]
    #[schemars(description = "Labels of the Balance Sheet total liabilities figure")]
    pub liabilities: Vec<String>,

    #[serde(default = "default_equity_keys")]
    #[schemars(description = "Labels of the Balance Sheet total equity figure")]
    pub equity: Vec<String>,
}

impl Default for TotalsKeys {
    fn default() -> Self {
        Self {
            revenue: default_revenue_keys(),
            expenses: default_expense_keys(),
            assets: default_asset_keys(),
            liabilities: default_liability_keys(),
            equity: default_equity_keys(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct AuditConfig {
    #[serde(default = "default_tolerance")]
    #[schemars(
        description = "Maximum absolute difference before two amounts are considered different. Defaults to 0.01."
    )]
    pub tolerance: Decimal,

    #[serde(default = "default_strict_period")]
    #[schemars(
        description = "If true, a document without a period marker fails to parse. If false, it is parsed with an empty period."
    )]
    pub strict_period: bool,

    #[serde(default = "default_revenue_asset_ratio")]
    #[schemars(
        description = "Revenue above this multiple of total assets is reported as an unusual ratio. Defaults to 2, at most 1000."
    )]
    pub revenue_asset_ratio: Decimal,

    #[serde(default)]
    pub totals_keys: TotalsKeys,

    #[serde(default = "default_net_income_markers")]
    #[schemars(description = "Lower-case fragments identifying a net income label")]
    pub net_income_markers: Vec<String>,

    #[serde(default = "default_retained_earnings_markers")]
    #[schemars(description = "Lower-case fragments identifying a retained earnings label")]
    pub retained_earnings_markers: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            strict_period: default_strict_period(),
            revenue_asset_ratio: default_revenue_asset_ratio(),
            totals_keys: TotalsKeys::default(),
            net_income_markers: default_net_income_markers(),
            retained_earnings_markers: default_retained_earnings_markers(),
        }
    }
}

impl AuditConfig {
    /// Same defaults, but documents without a period are accepted.
    pub fn lenient() -> Self {
        Self {
            strict_period: false,
            ..Self::default()
        }
    }

    pub fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tolerance.is_sign_negative() {
            return Err(AuditError::InvalidConfig(format!(
                "tolerance must not be negative, got {}",
                self.tolerance
            )));
        }

        if self.revenue_asset_ratio <= Decimal::ZERO
            || self.revenue_asset_ratio > MAX_REVENUE_ASSET_RATIO
        {
            return Err(AuditError::InvalidConfig(format!(
                "revenue_asset_ratio must be in (0, {}], got {}",
                MAX_REVENUE_ASSET_RATIO, self.revenue_asset_ratio
            )));
        }

        let keys = &self.totals_keys;
        for (name, aliases) in [
            ("revenue", &keys.revenue),
            ("expenses", &keys.expenses),
            ("assets", &keys.assets),
            ("liabilities", &keys.liabilities),
            ("equity", &keys.equity),
        ] {
            if aliases.iter().all(|alias| alias.trim().is_empty()) {
                return Err(AuditError::InvalidConfig(format!(
                    "totals_keys.{} needs at least one label",
                    name
                )));
            }
        }

        if self.net_income_markers.is_empty() || self.retained_earnings_markers.is_empty() {
            return Err(AuditError::InvalidConfig(
                "marker lists must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = schemars::schema_for!(AuditConfig);
        serde_json::to_string_pretty(&schema)
    }
}

fn default_tolerance() -> Decimal {
    DEFAULT_TOLERANCE
}

fn default_strict_period() -> bool {
    true
}

fn default_revenue_asset_ratio() -> Decimal {
    Decimal::TWO
}

fn default_revenue_keys() -> Vec<String> {
    vec!["Ingresos Totales".to_string()]
}

fn default_expense_keys() -> Vec<String> {
    vec!["Gastos Totales".to_string()]
}

fn default_asset_keys() -> Vec<String> {
    vec!["Total Activos".to_string()]
}

fn default_liability_keys() -> Vec<String> {
    vec!["Total Pasivos".to_string()]
}

fn default_equity_keys() -> Vec<String> {
    vec![
        "Total Capital Contable".to_string(),
        "Total Capital".to_string(),
    ]
}

fn default_net_income_markers() -> Vec<String> {
    vec!["utilidad".to_string(), "net".to_string()]
}

fn default_retained_earnings_markers() -> Vec<String> {
    vec!["retenidas".to_string(), "retained".to_string()]
}
