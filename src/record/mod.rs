//! Record representation: the unit of work flowing through the pipeline
//!
//! A record has a fixed identity struct (id, text, engagement) plus a typed,
//! string-keyed bag of enrichment outputs. Services document which keys
//! they read and write; see `services`.

use crate::concept::{AnalysisKind, ConceptId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed enrichment values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<FieldValue>),
    /// Ordered by key, so serialized rows are stable across writes
    Object(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::Array(values.into_iter().map(Into::into).collect())
    }
}

/// Enrichment output bag. Ordered so serialized bags are byte-stable.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// One candidate submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable external identifier
    pub id: String,
    pub title: String,
    #[serde(default, alias = "selftext")]
    pub body: String,
    /// Where the record came from (e.g. a subreddit)
    #[serde(default, alias = "subreddit")]
    pub source: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Net upvotes
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub created_utc: Option<i64>,
    /// Text used for concept fingerprinting; `title` when absent
    #[serde(default)]
    pub concept_text: Option<String>,
    #[serde(default)]
    pub concept_id: Option<ConceptId>,
    /// Enrichment outputs keyed by field name
    #[serde(default)]
    pub fields: FieldMap,

    /// Kinds freshly analyzed for this record during the current run
    #[serde(skip)]
    pub completed_analyses: Vec<AnalysisKind>,
    /// Errors accumulated by services during the current run
    #[serde(skip)]
    pub errors: Vec<String>,
}

impl Record {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: String::new(),
            source: String::new(),
            author: None,
            score: 0,
            num_comments: 0,
            created_utc: None,
            concept_text: None,
            concept_id: None,
            fields: FieldMap::new(),
            completed_analyses: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_engagement(mut self, score: i64, num_comments: i64) -> Self {
        self.score = score;
        self.num_comments = num_comments;
        self
    }

    pub fn with_concept_text(mut self, text: impl Into<String>) -> Self {
        self.concept_text = Some(text.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Text fed to the concept fingerprint
    pub fn concept_source_text(&self) -> &str {
        match self.concept_text.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => &self.title,
        }
    }

    /// Title and body joined, for keyword and length checks
    pub fn full_text(&self) -> String {
        if self.body.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.body)
        }
    }

    /// A field counts as present only when it holds a non-null value.
    pub fn has_field(&self, key: &str) -> bool {
        self.fields.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// Overlay `fields` onto the record's bag
    pub fn merge_fields(&mut self, fields: &FieldMap) {
        for (key, value) in fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Look up a key across the struct columns and the field bag.
    ///
    /// Empty strings and nulls count as absent.
    pub fn value_of(&self, key: &str) -> Option<FieldValue> {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| FieldValue::String(s.to_string()));
        match key {
            "id" => non_empty(&self.id),
            "title" => non_empty(&self.title),
            "body" => non_empty(&self.body),
            "source" => non_empty(&self.source),
            "author" => self.author.as_deref().and_then(non_empty),
            "score" => Some(FieldValue::Int(self.score)),
            "num_comments" => Some(FieldValue::Int(self.num_comments)),
            "created_utc" => self.created_utc.map(FieldValue::Int),
            "concept_text" => self.concept_text.as_deref().and_then(non_empty),
            _ => match self.field(key) {
                Some(FieldValue::String(s)) => non_empty(s),
                other => other.cloned(),
            },
        }
    }

    /// Everything a provider may read: struct columns plus the field bag
    pub fn provider_input(&self) -> FieldMap {
        let mut input = self.fields.clone();
        for key in [
            "id",
            "title",
            "body",
            "source",
            "author",
            "score",
            "num_comments",
            "created_utc",
            "concept_text",
        ] {
            if let Some(value) = self.value_of(key) {
                input.insert(key.to_string(), value);
            }
        }
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_serializes_in_key_order() {
        let build = |keys: &[&str]| {
            FieldValue::Object(
                keys.iter()
                    .map(|k| (k.to_string(), FieldValue::from(*k)))
                    .collect(),
            )
        };
        let a = serde_json::to_string(&build(&["zeta", "alpha", "mid"])).unwrap();
        let b = serde_json::to_string(&build(&["mid", "zeta", "alpha"])).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, r#"{"alpha":"alpha","mid":"mid","zeta":"zeta"}"#);
    }

    #[test]
    fn concept_text_falls_back_to_title() {
        let record = Record::new("r1", "Fitness tracking app");
        assert_eq!(record.concept_source_text(), "Fitness tracking app");

        let record = record.with_concept_text("  ");
        assert_eq!(record.concept_source_text(), "Fitness tracking app");

        let record = Record::new("r2", "title").with_concept_text("App idea: budgeting");
        assert_eq!(record.concept_source_text(), "App idea: budgeting");
    }

    #[test]
    fn null_fields_are_not_present() {
        let mut record = Record::new("r1", "t");
        record.fields.insert("a".into(), FieldValue::Null);
        record.fields.insert("b".into(), FieldValue::Int(3));
        assert!(!record.has_field("a"));
        assert!(record.has_field("b"));
        assert!(record.field("a").is_none());
    }

    #[test]
    fn deserializes_reddit_style_json() {
        let json = r#"{
            "id": "t3_abc",
            "title": "App idea: meal planner",
            "selftext": "I keep wasting food",
            "subreddit": "SomebodyMakeThis",
            "author": "someone",
            "score": 42,
            "num_comments": 7,
            "fields": {"trust_score": 71.5, "trust_badges": ["verified"], "note": null}
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.body, "I keep wasting food");
        assert_eq!(record.source, "SomebodyMakeThis");
        assert_eq!(record.fields.get("trust_score"), Some(&FieldValue::Float(71.5)));
        assert_eq!(
            record.fields.get("trust_badges"),
            Some(&FieldValue::Array(vec![FieldValue::String("verified".into())]))
        );
        assert_eq!(record.fields.get("note"), Some(&FieldValue::Null));
        assert!(record.errors.is_empty());
    }

    #[test]
    fn value_of_reads_columns_and_bag() {
        let record = Record::new("r1", "Meal planner")
            .with_author("   ")
            .with_field("app_concept", "")
            .with_field("target_user", "parents");
        assert_eq!(record.value_of("title"), Some(FieldValue::String("Meal planner".into())));
        assert_eq!(record.value_of("body"), None);
        assert_eq!(record.value_of("author"), None);
        assert_eq!(record.value_of("app_concept"), None);
        assert_eq!(record.value_of("target_user"), Some(FieldValue::String("parents".into())));

        let input = record.provider_input();
        assert_eq!(input.get("id"), Some(&FieldValue::String("r1".into())));
        assert_eq!(input.get("score"), Some(&FieldValue::Int(0)));
        assert!(!input.contains_key("author"));
    }

    #[test]
    fn transient_state_is_not_serialized() {
        let mut record = Record::new("r1", "t");
        record.push_error("boom");
        record.completed_analyses.push(AnalysisKind::Profiler);
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("boom"));
        assert!(!json.contains("completed_analyses"));
    }
}
