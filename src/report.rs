use crate::schema::{Discrepancy, Severity};

const RECOMMENDATIONS: [&str; 4] = [
    "Review and validate every discrepancy found",
    "Apply the suggested corrections",
    "Run a new audit after the corrections are in place",
    "Consider additional controls to prevent future discrepancies",
];

/// Produces the narrative body handed to the ticket publisher.
///
/// The built-in implementation is [`ReportFormatter`]; an external explainer
/// (for instance an LLM-backed one) can stand in for it.
pub trait ReportGenerator {
    fn generate(&self, discrepancies: &[Discrepancy]) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFormatter;

impl ReportGenerator for ReportFormatter {
    fn generate(&self, discrepancies: &[Discrepancy]) -> String {
        format_report(discrepancies)
    }
}

fn severity_heading(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "🔴 High Severity Discrepancies",
        Severity::Medium => "🟡 Medium Severity Discrepancies",
        Severity::Low => "🟢 Low Severity Discrepancies",
    }
}

fn count_by_severity(discrepancies: &[Discrepancy], severity: Severity) -> usize {
    discrepancies
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

pub fn format_summary(discrepancies: &[Discrepancy]) -> String {
    let mut output = String::new();

    output.push_str("## 📊 Audit Summary\n\n");
    output.push_str(&format!("- Total discrepancies: {}\n", discrepancies.len()));
    output.push_str(&format!(
        "- High severity: {}\n",
        count_by_severity(discrepancies, Severity::High)
    ));
    output.push_str(&format!(
        "- Medium severity: {}\n",
        count_by_severity(discrepancies, Severity::Medium)
    ));
    output.push_str(&format!(
        "- Low severity: {}\n",
        count_by_severity(discrepancies, Severity::Low)
    ));

    output
}

pub fn format_discrepancy(discrepancy: &Discrepancy) -> String {
    let mut output = format!(
        "### {}\n**Description**: {}\n",
        discrepancy.kind, discrepancy.description
    );
    if let Some(fix) = &discrepancy.fix {
        output.push_str(&format!("**Suggested fix**: {}\n", fix));
    }
    output
}

/// Renders discrepancies grouped by severity (High, Medium, Low), keeping
/// detection order inside each group, followed by the fixed
/// recommendations block.
pub fn format_report(discrepancies: &[Discrepancy]) -> String {
    let mut output = String::new();

    output.push_str("# Financial Audit Results\n\n");
    output.push_str(&format_summary(discrepancies));
    output.push('\n');

    if discrepancies.is_empty() {
        output.push_str("No discrepancies were found between the statements.\n\n");
    }

    for severity in Severity::ALL {
        let group: Vec<&Discrepancy> = discrepancies
            .iter()
            .filter(|d| d.severity == severity)
            .collect();
        if group.is_empty() {
            continue;
        }

        output.push_str(&format!("## {}\n\n", severity_heading(severity)));
        for discrepancy in group {
            output.push_str(&format_discrepancy(discrepancy));
            output.push('\n');
        }
    }

    output.push_str("## 📝 General Recommendations\n\n");
    for (idx, recommendation) in RECOMMENDATIONS.iter().enumerate() {
        output.push_str(&format!("{}. {}\n", idx + 1, recommendation));
    }

    output
}
