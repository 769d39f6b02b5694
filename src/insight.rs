/*!
 * Narrative insights as ordered rule tables
 *
 * Each table is a list of `(section, predicate, template)` rules. Rules are
 * tried in order and the first match in a section wins; matched clauses are
 * emitted in table order. Rendering is pure: identical inputs always give the
 * identical sentence.
 */

use crate::comparison::{percentage_delta, Delta, EntityMetrics};
use crate::constants::{
    OUTSTANDING_RATIO_HIGH_FACTOR, OUTSTANDING_RATIO_LOW_FACTOR, PARITY_THRESHOLD_PERCENT,
};
use crate::trend::Trend;

/// One rule of an insight table
pub struct InsightRule<I> {
    /// Clause slot this rule fills; at most one rule per section applies
    pub section: &'static str,
    pub applies: fn(&I) -> bool,
    pub render: fn(&I) -> String,
}

/// Evaluate a rule table, returning the matched clauses in table order
pub fn evaluate<I>(rules: &[InsightRule<I>], input: &I) -> Vec<String> {
    let mut filled: Vec<&'static str> = Vec::new();
    let mut clauses = Vec::new();

    for rule in rules {
        if filled.contains(&rule.section) {
            continue;
        }
        if (rule.applies)(input) {
            filled.push(rule.section);
            clauses.push((rule.render)(input));
        }
    }

    clauses
}

/// Sentence used when there is nothing to compare
pub const INSUFFICIENT_DATA: &str = "Insufficient data to generate insights.";

/// Inputs to the provider performance insight
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderInsightInput {
    pub provider_name: String,
    pub subject: EntityMetrics,
    pub peer: EntityMetrics,
    pub trend: Trend,
}

impl ProviderInsightInput {
    fn billed(&self) -> Delta {
        percentage_delta(self.subject.total_billed, self.peer.total_billed)
    }

    fn procedures(&self) -> Delta {
        percentage_delta(self.subject.procedure_count, self.peer.procedure_count)
    }

    fn patients(&self) -> Delta {
        percentage_delta(self.subject.unique_patients, self.peer.unique_patients)
    }

    /// Both outstanding ratios, when both are defined
    fn ratios(&self) -> Option<(f64, f64)> {
        Some((self.subject.outstanding_ratio()?, self.peer.outstanding_ratio()?))
    }

    fn both(&self, f: fn(f64) -> bool) -> bool {
        self.billed().is_defined_and(f) && self.procedures().is_defined_and(f)
    }
}

fn pct(delta: Delta) -> f64 {
    delta.percent().unwrap_or(0.0)
}

/// Provider performance rules, in clause order
pub const PROVIDER_RULES: &[InsightRule<ProviderInsightInput>] = &[
    // Overall performance
    InsightRule {
        section: "overall",
        applies: |i| !i.billed().is_defined() || !i.procedures().is_defined(),
        render: |_| "Peer comparison is not available for the selected period.".to_string(),
    },
    InsightRule {
        section: "overall",
        applies: |i| i.both(|d| d.abs() < PARITY_THRESHOLD_PERCENT),
        render: |_| "Performance is generally on par with peers.".to_string(),
    },
    InsightRule {
        section: "overall",
        applies: |i| i.both(|d| d > PARITY_THRESHOLD_PERCENT),
        render: |i| format!(
            "Performance is significantly above average, with {:.1}% higher billing and {:.1}% more procedures than peers.",
            pct(i.billed()),
            pct(i.procedures())
        ),
    },
    InsightRule {
        section: "overall",
        applies: |i| i.both(|d| d < -PARITY_THRESHOLD_PERCENT),
        render: |i| format!(
            "Performance is below average, with {:.1}% lower billing and {:.1}% fewer procedures than peers.",
            pct(i.billed()).abs(),
            pct(i.procedures()).abs()
        ),
    },
    InsightRule {
        section: "overall",
        applies: |_| true,
        render: |_| "Mixed performance metrics compared to peers.".to_string(),
    },
    // Outstanding ratio
    InsightRule {
        section: "outstanding",
        applies: |i| i.ratios().map(|(s, p)| s > p * OUTSTANDING_RATIO_HIGH_FACTOR).unwrap_or(false),
        render: |i| {
            let (s, p) = i.ratios().unwrap_or_default();
            format!(
                "Outstanding billing ratio ({:.1}%) is higher than peers ({:.1}%), suggesting potential collection issues.",
                s, p
            )
        },
    },
    InsightRule {
        section: "outstanding",
        applies: |i| i.ratios().map(|(s, p)| s < p * OUTSTANDING_RATIO_LOW_FACTOR).unwrap_or(false),
        render: |i| {
            let (s, p) = i.ratios().unwrap_or_default();
            format!(
                "Outstanding billing ratio ({:.1}%) is lower than peers ({:.1}%), indicating effective collection practices.",
                s, p
            )
        },
    },
    // Volume trend
    InsightRule {
        section: "trend",
        applies: |_| true,
        render: |i| format!("Procedure volume has been {} over the selected period.", i.trend),
    },
    // Patient volume
    InsightRule {
        section: "patients",
        applies: |i| i.patients().is_defined_and(|d| d > PARITY_THRESHOLD_PERCENT),
        render: |i| format!(
            "The doctor sees {:.1}% more unique patients than peers, suggesting higher patient retention or referral rates.",
            pct(i.patients())
        ),
    },
    InsightRule {
        section: "patients",
        applies: |i| i.patients().is_defined_and(|d| d < -PARITY_THRESHOLD_PERCENT),
        render: |i| format!(
            "The doctor sees {:.1}% fewer unique patients than peers, which may indicate opportunities for improved patient retention.",
            pct(i.patients()).abs()
        ),
    },
    InsightRule {
        section: "patients",
        applies: |i| i.patients().is_defined(),
        render: |_| "Patient volume is comparable to peers.".to_string(),
    },
];

/// Provider performance sentence
pub fn provider_insight(input: &ProviderInsightInput) -> String {
    if input.subject.procedure_count == 0.0 || input.peer.procedure_count == 0.0 {
        return INSUFFICIENT_DATA.to_string();
    }

    format!(
        "{}'s performance analysis: {}",
        input.provider_name,
        evaluate(PROVIDER_RULES, input).join(" ")
    )
}

/// Inputs to the financial insight: changes against the previous period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinancialInsightInput {
    pub revenue: Delta,
    pub received: Delta,
    pub outstanding: Delta,
    /// Change of the medical-aid share of billed, in percentage points
    pub medical_aid_share_change: f64,
}

impl FinancialInsightInput {
    fn comparable(&self) -> bool {
        self.revenue.is_defined() && self.received.is_defined()
    }

    fn positive(&self) -> bool {
        self.revenue.is_defined_and(|d| d > 0.0) && self.received.is_defined_and(|d| d > 0.0)
    }

    fn mixed(&self) -> bool {
        self.comparable() && !self.positive()
    }
}

/// Financial trend rules, in clause order
pub const FINANCIAL_RULES: &[InsightRule<FinancialInsightInput>] = &[
    // Outlook
    InsightRule {
        section: "outlook",
        applies: |i| !i.comparable(),
        render: |_| "No previous period is available for comparison.".to_string(),
    },
    InsightRule {
        section: "outlook",
        applies: FinancialInsightInput::positive,
        render: |i| format!(
            "Positive financial trend detected. Revenue has increased by {:.1}% compared to the previous period, with billings received also showing growth at {:.1}%.",
            pct(i.revenue),
            pct(i.received)
        ),
    },
    InsightRule {
        section: "outlook",
        applies: FinancialInsightInput::mixed,
        render: |i| format!(
            "Mixed financial signals detected. Revenue trend is {} at {:.1}% compared to the previous period.",
            if pct(i.revenue) > 0.0 { "positive" } else { "negative" },
            pct(i.revenue).abs()
        ),
    },
    // Outstanding billings
    InsightRule {
        section: "outstanding",
        applies: |i| i.positive() && i.outstanding.is_defined_and(|d| d < 0.0),
        render: |_| "Outstanding billings have decreased, indicating improved collection efficiency.".to_string(),
    },
    InsightRule {
        section: "outstanding",
        applies: |i| i.positive() && i.outstanding.is_defined(),
        render: |_| "There is a slight increase in outstanding billings which may require attention to collection processes.".to_string(),
    },
    InsightRule {
        section: "outstanding",
        applies: |i| i.mixed() && i.outstanding.is_defined_and(|d| d > 0.0),
        render: |i| format!(
            "Outstanding billings have increased by {:.1}%, suggesting potential collection issues that should be addressed.",
            pct(i.outstanding)
        ),
    },
    InsightRule {
        section: "outstanding",
        applies: |i| i.mixed() && i.outstanding.is_defined(),
        render: |i| format!(
            "Collection efficiency has improved with outstanding billings reduced by {:.1}%.",
            pct(i.outstanding).abs()
        ),
    },
    // Payment sources and follow-up
    InsightRule {
        section: "follow_up",
        applies: |i| i.positive() && i.medical_aid_share_change > 0.0,
        render: |_| "The proportion of medical aid payments has increased, which typically indicates more stable and reliable payment sources.".to_string(),
    },
    InsightRule {
        section: "follow_up",
        applies: FinancialInsightInput::positive,
        render: |_| "There has been a small reduction in the proportion of medical aid payments, which may warrant a review of medical aid billing procedures.".to_string(),
    },
    InsightRule {
        section: "follow_up",
        applies: FinancialInsightInput::mixed,
        render: |_| "Consider reviewing billing processes and payment follow-up procedures to optimize cash flow.".to_string(),
    },
];

/// Financial trend sentence
pub fn financial_insight(input: &FinancialInsightInput) -> String {
    evaluate(FINANCIAL_RULES, input).join(" ")
}
