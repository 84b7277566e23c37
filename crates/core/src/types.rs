use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::Condition;

/// The kind of screen a funnel step renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Landing,
    Transition,
    Info,
    Question,
    Carousel,
    Analysis,
    Lead,
    Sales,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Landing => "landing",
            StepType::Transition => "transition",
            StepType::Info => "info",
            StepType::Question => "question",
            StepType::Carousel => "carousel",
            StepType::Analysis => "analysis",
            StepType::Lead => "lead",
            StepType::Sales => "sales",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selectable option. Plain strings use the same text as label and value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepOption {
    Plain(String),
    Labeled { label: String, value: String },
}

impl StepOption {
    pub fn label(&self) -> &str {
        match self {
            StepOption::Plain(text) => text,
            StepOption::Labeled { label, .. } => label,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            StepOption::Plain(text) => text,
            StepOption::Labeled { value, .. } => value,
        }
    }
}

/// One catalog entry. Everything except `id`, `step_type` and `condition` is
/// presentation data the sequencer never inspects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<StepOption>,
    #[serde(default)]
    pub multi_select: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            step_type,
            condition: None,
            question: None,
            title: None,
            section: None,
            options: Vec::new(),
            multi_select: false,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    /// A step is visible when it has no condition or its condition holds.
    pub fn is_visible(&self, answers: &AnswerMap) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.evaluate(answers))
    }
}

/// A submitted answer: one value, or several for multi-select questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multi(Vec<String>),
}

impl AnswerValue {
    pub fn values(&self) -> &[String] {
        match self {
            AnswerValue::Single(value) => std::slice::from_ref(value),
            AnswerValue::Multi(values) => values,
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Single(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Single(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(values: Vec<String>) -> Self {
        AnswerValue::Multi(values)
    }
}

/// Accumulated answers for one run through the funnel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<String, AnswerValue>);

impl AnswerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&AnswerValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AnswerValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Shallow merge: keys in `patch` overwrite existing keys of the same name.
    pub fn merge(&mut self, patch: AnswerMap) {
        self.0.extend(patch.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AnswerValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<AnswerValue>> FromIterator<(K, V)> for AnswerMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Event emitted on the funnel event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub session_id: String,
    pub step_id: String,
    pub step_index: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StepEntered,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_definition_parses_presentation_fields() {
        let step: StepDefinition = serde_json::from_value(serde_json::json!({
            "id": "q2",
            "type": "question",
            "layout": "list-gender",
            "question": "Você já ouviu falar em criança interior?",
            "options": [
                { "label": "Sim, já ouvi falar!", "value": "sim" },
                "É a primeira vez"
            ]
        }))
        .unwrap();

        assert_eq!(step.step_type, StepType::Question);
        assert!(!step.multi_select);
        assert_eq!(step.options[0].value(), "sim");
        assert_eq!(step.options[1].label(), "É a primeira vez");
        assert_eq!(step.extra.get("layout"), Some(&serde_json::json!("list-gender")));
    }

    #[test]
    fn test_answer_merge_overwrites_same_key() {
        let mut answers: AnswerMap = [("q1", "18 - 29"), ("q2", "sim")].into_iter().collect();
        let patch: AnswerMap = [("q2", "nao")].into_iter().collect();
        answers.merge(patch);

        assert_eq!(answers.len(), 2);
        assert_eq!(answers.get("q2"), Some(&AnswerValue::from("nao")));
    }

    #[test]
    fn test_multi_answer_roundtrips_as_array() {
        let value = AnswerValue::from(vec!["Caótico".to_string(), "Rígido".to_string()]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!(["Caótico", "Rígido"]));
        assert_eq!(value.values().len(), 2);
    }
}
