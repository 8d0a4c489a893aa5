//! Quality prefilter: cheap local checks before any service runs

use crate::config::PrefilterConfig;
use crate::record::Record;

/// Why a record was filtered out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    LowScore(i64),
    FewComments(i64),
    TooShort(usize),
    MissingKeyword,
    ExcludedKeyword(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LowScore(s) => write!(f, "score {} below threshold", s),
            Self::FewComments(c) => write!(f, "{} comments below threshold", c),
            Self::TooShort(n) => write!(f, "text length {} below threshold", n),
            Self::MissingKeyword => write!(f, "no required keyword"),
            Self::ExcludedKeyword(k) => write!(f, "contains excluded keyword '{}'", k),
        }
    }
}

/// Engagement and keyword thresholds
#[derive(Debug, Clone)]
pub struct Prefilter {
    config: PrefilterConfig,
    required: Vec<String>,
    excluded: Vec<String>,
}

impl Prefilter {
    pub fn new(config: PrefilterConfig) -> Self {
        let lower = |words: &[String]| -> Vec<String> {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            required: lower(&config.required_keywords),
            excluded: lower(&config.excluded_keywords),
            config,
        }
    }

    pub fn check(&self, record: &Record) -> Result<(), Rejection> {
        if record.score < self.config.min_score {
            return Err(Rejection::LowScore(record.score));
        }
        if record.num_comments < self.config.min_comments {
            return Err(Rejection::FewComments(record.num_comments));
        }
        let text = record.full_text();
        let length = text.trim().chars().count();
        if length < self.config.min_text_length {
            return Err(Rejection::TooShort(length));
        }

        let text = text.to_lowercase();
        if let Some(word) = self.excluded.iter().find(|w| text.contains(w.as_str())) {
            return Err(Rejection::ExcludedKeyword(word.clone()));
        }
        if !self.required.is_empty() && !self.required.iter().any(|w| text.contains(w.as_str())) {
            return Err(Rejection::MissingKeyword);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefilter(config: PrefilterConfig) -> Prefilter {
        Prefilter::new(config)
    }

    #[test]
    fn default_config_passes_everything() {
        let filter = prefilter(PrefilterConfig::default());
        assert!(filter.check(&Record::new("r1", "")).is_ok());
    }

    #[test]
    fn engagement_thresholds() {
        let filter = prefilter(PrefilterConfig {
            min_score: 5,
            min_comments: 2,
            ..Default::default()
        });
        assert_eq!(
            filter.check(&Record::new("r1", "x").with_engagement(4, 10)),
            Err(Rejection::LowScore(4))
        );
        assert_eq!(
            filter.check(&Record::new("r1", "x").with_engagement(5, 1)),
            Err(Rejection::FewComments(1))
        );
        assert!(filter.check(&Record::new("r1", "x").with_engagement(5, 2)).is_ok());
    }

    #[test]
    fn keyword_rules_are_case_insensitive() {
        let filter = prefilter(PrefilterConfig {
            required_keywords: vec!["App".into(), "tool".into()],
            excluded_keywords: vec!["[META]".into()],
            ..Default::default()
        });
        assert!(filter.check(&Record::new("r1", "An APP for dogs")).is_ok());
        assert_eq!(
            filter.check(&Record::new("r2", "Cooking")),
            Err(Rejection::MissingKeyword)
        );
        assert_eq!(
            filter.check(&Record::new("r3", "[meta] app rules")),
            Err(Rejection::ExcludedKeyword("[meta]".into()))
        );
    }

    #[test]
    fn text_length_counts_title_and_body() {
        let filter = prefilter(PrefilterConfig {
            min_text_length: 10,
            ..Default::default()
        });
        assert_eq!(filter.check(&Record::new("r1", "short")), Err(Rejection::TooShort(5)));
        assert!(filter.check(&Record::new("r1", "short").with_body("and body")).is_ok());
    }
}
