use crate::config::AuditConfig;
use crate::schema::{Category, Discrepancy, DiscrepancyKind, Severity, Statement};
use crate::utils::format_amount;
use log::{debug, warn};
use rust_decimal::Decimal;

/// Runs the cross-statement consistency rules over a P&L and a Balance Sheet.
///
/// Rules run in a fixed order and that order is also the order of the
/// returned discrepancies. A rule whose inputs are missing is skipped; the
/// engine itself never fails.
pub struct ValidationEngine<'a> {
    config: &'a AuditConfig,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(config: &'a AuditConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self, pl: &Statement, balance: &Statement) -> Vec<Discrepancy> {
        let mut discrepancies = Vec::new();

        self.check_periods(pl, balance, &mut discrepancies);

        let net_income = self.find_reported_net_income(pl);
        self.check_net_income(net_income, balance, &mut discrepancies);
        self.check_retained_earnings(net_income, balance, &mut discrepancies);

        self.check_revenue_asset_ratio(pl, balance, &mut discrepancies);
        self.check_expense_ratio(pl, &mut discrepancies);
        self.check_accounting_equation(balance, &mut discrepancies);

        debug!(
            "Validation of periods '{}' / '{}' produced {} discrepancies",
            pl.period,
            balance.period,
            discrepancies.len()
        );

        discrepancies
    }

    fn check_periods(&self, pl: &Statement, balance: &Statement, out: &mut Vec<Discrepancy>) {
        if pl.period != balance.period {
            out.push(
                Discrepancy::new(
                    DiscrepancyKind::PeriodMismatch,
                    Severity::High,
                    format!(
                        "Statement periods do not match: P&L ({}) vs Balance Sheet ({})",
                        pl.period, balance.period
                    ),
                )
                .with_fix("Make sure both documents cover the same accounting period."),
            );
        }
    }

    fn check_net_income(
        &self,
        net_income: Option<Decimal>,
        balance: &Statement,
        out: &mut Vec<Discrepancy>,
    ) {
        let (Some(reported), Some(carried)) = (net_income, self.find_equity_net_income(balance))
        else {
            return;
        };

        if self.differs(reported, carried) {
            out.push(
                Discrepancy::new(
                    DiscrepancyKind::IncomeMismatch,
                    Severity::High,
                    format!(
                        "Net income does not match: P&L ({}) vs Balance Sheet ({})",
                        format_amount(reported),
                        format_amount(carried)
                    ),
                )
                .with_fix(format!(
                    "Adjust net income in the Balance Sheet to match the P&L: {}",
                    format_amount(reported)
                )),
            );
        }
    }

    // Compares `retained + net_income` back against `retained`, so any
    // non-zero net income beyond the tolerance is reported.
    fn check_retained_earnings(
        &self,
        net_income: Option<Decimal>,
        balance: &Statement,
        out: &mut Vec<Discrepancy>,
    ) {
        let (Some(net_income), Some(retained)) = (net_income, self.find_retained_earnings(balance))
        else {
            return;
        };

        let expected = retained.checked_add(net_income);
        if expected.map_or(true, |expected| self.differs(expected, retained)) {
            out.push(
                Discrepancy::new(
                    DiscrepancyKind::RetainedEarningsMismatch,
                    Severity::High,
                    format!(
                        "Retained earnings do not reflect the period's net income. Actual: {}, expected: {}",
                        format_amount(retained),
                        describe_amount(expected)
                    ),
                )
                .with_fix(format!(
                    "Adjust retained earnings to include the period's net income: {}",
                    describe_amount(expected)
                )),
            );
        }
    }

    fn check_revenue_asset_ratio(
        &self,
        pl: &Statement,
        balance: &Statement,
        out: &mut Vec<Discrepancy>,
    ) {
        let keys = &self.config.totals_keys;
        let (Some(revenue), Some(assets)) = (
            pl.totals.get_any(&keys.revenue),
            balance.totals.get_any(&keys.assets),
        ) else {
            return;
        };

        let exceeds = match assets.checked_mul(self.config.revenue_asset_ratio) {
            Some(limit) => revenue > limit,
            // The ratio is positive, so an overflowing limit carries the sign of assets.
            None => assets.is_sign_negative(),
        };

        if exceeds {
            out.push(
                Discrepancy::new(
                    DiscrepancyKind::UnusualRevenueAssetRatio,
                    Severity::Medium,
                    format!(
                        "Revenue ({}) is unusually high compared to assets ({})",
                        format_amount(revenue),
                        format_amount(assets)
                    ),
                )
                .with_fix("Verify that all assets are recorded and valued correctly."),
            );
        }
    }

    fn check_expense_ratio(&self, pl: &Statement, out: &mut Vec<Discrepancy>) {
        let keys = &self.config.totals_keys;
        let (Some(expenses), Some(revenue)) = (
            pl.totals.get_any(&keys.expenses),
            pl.totals.get_any(&keys.revenue),
        ) else {
            return;
        };

        if expenses > revenue {
            out.push(
                Discrepancy::new(
                    DiscrepancyKind::ExpenseExceedsRevenue,
                    Severity::High,
                    format!(
                        "Expenses ({}) exceed revenue ({})",
                        format_amount(expenses),
                        format_amount(revenue)
                    ),
                )
                .with_fix(
                    "Review and validate every recorded expense. Check for duplicated or misclassified expenses.",
                ),
            );
        }
    }

    fn check_accounting_equation(&self, balance: &Statement, out: &mut Vec<Discrepancy>) {
        let keys = &self.config.totals_keys;
        let (Some(assets), Some(liabilities), Some(equity)) = (
            balance.totals.get_any(&keys.assets),
            balance.totals.get_any(&keys.liabilities),
            balance.totals.get_any(&keys.equity),
        ) else {
            return;
        };

        let difference = liabilities
            .checked_add(equity)
            .and_then(|sum| assets.checked_sub(sum))
            .map(|difference| difference.abs());
        if difference.is_none() {
            warn!("Balance sheet difference is outside the representable range");
        }

        if difference.map_or(true, |difference| difference > self.config.tolerance) {
            out.push(
                Discrepancy::new(
                    DiscrepancyKind::Unbalanced,
                    Severity::High,
                    format!(
                        "The balance sheet does not balance: Assets ({}) != Liabilities ({}) + Equity ({}). Difference: {}",
                        format_amount(assets),
                        format_amount(liabilities),
                        format_amount(equity),
                        describe_amount(difference)
                    ),
                )
                .with_fix(format!(
                    "Adjust the accounts so that Assets = Liabilities + Equity. Current difference: {}",
                    describe_amount(difference)
                )),
            );
        }
    }

    /// True when `a` and `b` are further apart than the tolerance. A gap too
    /// large to represent counts as a difference.
    fn differs(&self, a: Decimal, b: Decimal) -> bool {
        a.checked_sub(b)
            .map_or(true, |gap| gap.abs() > self.config.tolerance)
    }

    fn find_reported_net_income(&self, pl: &Statement) -> Option<Decimal> {
        pl.totals
            .iter()
            .find(|(label, _)| self.matches_any(label, &self.config.net_income_markers))
            .map(|(_, amount)| amount)
    }

    fn find_equity_net_income(&self, balance: &Statement) -> Option<Decimal> {
        self.find_equity_item(balance, &self.config.net_income_markers)
    }

    fn find_retained_earnings(&self, balance: &Statement) -> Option<Decimal> {
        self.find_equity_item(balance, &self.config.retained_earnings_markers)
    }

    fn find_equity_item(&self, balance: &Statement, markers: &[String]) -> Option<Decimal> {
        balance
            .items_in(Category::Equity)
            .find(|item| self.matches_any(&item.name, markers))
            .map(|item| item.amount)
    }

    fn matches_any(&self, label: &str, markers: &[String]) -> bool {
        let label = label.to_lowercase();
        markers
            .iter()
            .any(|marker| label.contains(&marker.to_lowercase()))
    }
}

fn describe_amount(amount: Option<Decimal>) -> String {
    match amount {
        Some(amount) => format_amount(amount),
        None => "out of range".to_string(),
    }
}

/// Validates with default settings and the given tolerance.
pub fn validate_statements(pl: &Statement, balance: &Statement, tolerance: Decimal) -> Vec<Discrepancy> {
    let config = AuditConfig::default().with_tolerance(tolerance);
    ValidationEngine::new(&config).validate(pl, balance)
}
