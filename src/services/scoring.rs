//! Opportunity scoring
//!
//! Four capped components sum to a 0-100 score:
//! engagement (40), pain signals (30), demand signals (18), specificity (12).

use crate::record::{FieldMap, FieldValue, Record};
use std::collections::BTreeMap;

const PAIN_SIGNALS: &[&str] = &[
    "frustrat", "annoying", "struggle", "hate", "waste", "problem", "wish", "tedious", "manually",
];

const DEMAND_SIGNALS: &[&str] = &[
    "would pay", "pay for", "subscription", "would buy", "shut up and take", "$", "price",
];

pub(crate) fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn signal_hits(text: &str, signals: &[&str]) -> usize {
    signals.iter().filter(|s| text.contains(*s)).count()
}

/// Score a record's opportunity from engagement and text signals
pub fn score_opportunity(record: &Record) -> FieldMap {
    let text = record.full_text().to_lowercase();

    let engagement = ((1.0 + record.score.max(0) as f64).ln() * 6.0
        + (1.0 + record.num_comments.max(0) as f64).ln() * 4.0)
        .min(40.0);
    let pain = (signal_hits(&text, PAIN_SIGNALS) as f64 * 5.0).min(30.0);
    let demand = (signal_hits(&text, DEMAND_SIGNALS) as f64 * 6.0).min(18.0);
    let words = text.split_whitespace().count();
    let specificity = (words as f64 / 25.0).min(12.0);

    let score = round1((engagement + pain + demand + specificity).clamp(0.0, 100.0));
    let tier = match score {
        s if s >= 70.0 => "high",
        s if s >= 40.0 => "medium",
        _ => "low",
    };

    let breakdown: BTreeMap<String, FieldValue> = [
        ("engagement", engagement),
        ("pain", pain),
        ("demand", demand),
        ("specificity", specificity),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), FieldValue::Float(round1(v))))
    .collect();

    let mut fields = FieldMap::new();
    fields.insert("opportunity_score".into(), FieldValue::Float(score));
    fields.insert("opportunity_tier".into(), FieldValue::from(tier));
    fields.insert("score_breakdown".into(), FieldValue::Object(breakdown));
    fields
}
