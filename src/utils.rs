use rust_decimal::Decimal;
use std::str::FromStr;

/// Largest magnitude accepted for any amount: 999,999,999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_215_752_191, 23, 0, false, 2);
pub const MIN_AMOUNT: Decimal = Decimal::from_parts(1_215_752_191, 23, 0, true, 2);

/// Default tolerance for numeric comparisons: 0.01
pub const DEFAULT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

pub fn is_amount_in_range(amount: Decimal) -> bool {
    (MIN_AMOUNT..=MAX_AMOUNT).contains(&amount)
}

/// Parses an amount cell such as `$1,200.00` into an exact decimal.
///
/// Returns `None` when the text is not a number or falls outside the
/// accepted range; callers drop the line in both cases.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let cleaned = text.replace(['$', ','], "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    let amount = Decimal::from_str(cleaned).ok()?;
    is_amount_in_range(amount).then_some(amount)
}

/// Formats an amount as `$1,234.56` (`-$1,234.56` for negatives).
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    rounded.set_sign_positive(true);
    rounded.rescale(2);

    let text = rounded.to_string();
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (idx, ch) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}.{}", if negative { "-" } else { "" }, grouped, fraction)
}

/// Checks the `https://github.com/<owner>/<repo>` shape.
pub fn is_valid_repo_url(url: &str) -> bool {
    let Some(path) = url.strip_prefix("https://github.com/") else {
        return false;
    };

    let mut segments = path.trim_end_matches('/').split('/');
    matches!(
        (segments.next(), segments.next()),
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty()
    )
}
