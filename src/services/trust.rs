//! Trust validation from author and engagement signals

use super::scoring::round1;
use crate::record::{FieldMap, FieldValue, Record};

const DELETED_AUTHORS: &[&str] = &["[deleted]", "[removed]", "automoderator"];

/// Assess how much a record's signals can be trusted
pub fn validate_trust(record: &Record) -> FieldMap {
    let author = record.author.as_deref().unwrap_or_default().trim().to_lowercase();
    let mut badges: Vec<FieldValue> = Vec::new();

    let score = if author.is_empty() || DELETED_AUTHORS.contains(&author.as_str()) {
        0.0
    } else {
        let mut score = 50.0;
        if record.score >= 10 {
            score += 10.0;
        }
        if record.score >= 100 {
            score += 10.0;
        }
        if record.num_comments >= 5 {
            score += 10.0;
        }
        if record.body.split_whitespace().count() >= 40 {
            score += 10.0;
        }
        if record.created_utc.is_some() {
            score += 5.0;
        }
        if !record.source.trim().is_empty() {
            score += 5.0;
        }
        if record.score < 0 {
            score -= 20.0;
        }

        if record.num_comments >= 10 {
            badges.push("active_discussion".into());
        }
        if record.score >= 50 {
            badges.push("community_endorsed".into());
        }
        if record.body.split_whitespace().count() >= 100 {
            badges.push("detailed_post".into());
        }
        f64::clamp(score, 0.0, 100.0)
    };

    let level = match score {
        s if s >= 75.0 => "high",
        s if s >= 50.0 => "medium",
        s if s > 0.0 => "low",
        _ => "untrusted",
    };

    let mut fields = FieldMap::new();
    fields.insert("trust_score".into(), FieldValue::Float(round1(score)));
    fields.insert("trust_level".into(), FieldValue::from(level));
    fields.insert("trust_badges".into(), FieldValue::Array(badges));
    fields
}
