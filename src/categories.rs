use crate::schema::Category;

/// What a category label or section heading resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Item(Category),
    Total,
}

const CATEGORY_ALIASES: &[(&str, Classification)] = &[
    ("ingresos", Classification::Item(Category::Revenue)),
    ("revenue", Classification::Item(Category::Revenue)),
    ("income", Classification::Item(Category::Revenue)),
    ("gastos", Classification::Item(Category::Expense)),
    ("expenses", Classification::Item(Category::Expense)),
    ("expense", Classification::Item(Category::Expense)),
    ("costs", Classification::Item(Category::Expense)),
    ("cost", Classification::Item(Category::Expense)),
    ("activos", Classification::Item(Category::Asset)),
    ("assets", Classification::Item(Category::Asset)),
    ("asset", Classification::Item(Category::Asset)),
    ("pasivos", Classification::Item(Category::Liability)),
    ("liabilities", Classification::Item(Category::Liability)),
    ("liability", Classification::Item(Category::Liability)),
    ("capital contable", Classification::Item(Category::Equity)),
    ("capital", Classification::Item(Category::Equity)),
    ("equity", Classification::Item(Category::Equity)),
    ("total", Classification::Total),
    ("totales", Classification::Total),
];

/// Resolves a category label (CSV `Category` cell or markup section heading).
///
/// Matching is exact after trimming and lower-casing; anything outside the
/// alias table is unmapped and the caller discards the row.
pub fn normalize_category(label: &str) -> Option<Classification> {
    let key = label.trim().to_lowercase();
    CATEGORY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, classification)| *classification)
}
