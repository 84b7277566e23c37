//! Display labels for funnel rows.

use std::collections::HashMap;

use funnel_core::{StepDefinition, StepType};

const QUESTION_PREVIEW_CHARS: usize = 15;

/// Static step id → label table. Ids without an entry display as themselves.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    labels: HashMap<String, String>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels question steps with a short preview of their question text.
    pub fn from_catalog(steps: &[StepDefinition]) -> Self {
        let mut table = Self::new();
        for step in steps {
            if step.step_type != StepType::Question {
                continue;
            }
            if let Some(question) = step.question.as_deref() {
                let preview: String = strip_tags(question)
                    .trim()
                    .chars()
                    .take(QUESTION_PREVIEW_CHARS)
                    .collect();
                table.insert(step.id.clone(), format!("Q: {}...", preview));
            }
        }
        table
    }

    pub fn insert(&mut self, id: impl Into<String>, label: impl Into<String>) {
        self.labels.insert(id.into(), label.into());
    }

    pub fn label_for<'a>(&'a self, id: &'a str) -> &'a str {
        self.labels.get(id).map(String::as_str).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Removes markup tags, keeping the text between them.
pub fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_preview_label() {
        let steps = vec![
            StepDefinition::new("landing", StepType::Landing),
            StepDefinition::new("q1", StepType::Question)
                .with_question("<strong>Qual</strong> a sua idade atual?"),
        ];
        let table = LabelTable::from_catalog(&steps);
        assert_eq!(table.label_for("q1"), "Q: Qual a sua idad...");
        assert_eq!(table.label_for("landing"), "landing");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_short_question_and_multibyte_text() {
        let steps = vec![
            StepDefinition::new("q2", StepType::Question).with_question("Você?"),
            StepDefinition::new("q3", StepType::Question)
                .with_question("Você já sentiu ansiedade?"),
        ];
        let table = LabelTable::from_catalog(&steps);
        assert_eq!(table.label_for("q2"), "Q: Você?...");
        assert_eq!(table.label_for("q3"), "Q: Você já sentiu ...");
    }

    #[test]
    fn test_overrides_and_fallback() {
        let mut table = LabelTable::new();
        assert!(table.is_empty());
        table.insert("analysis", "Análise");
        assert_eq!(table.label_for("analysis"), "Análise");
        assert_eq!(table.label_for("unknown_step"), "unknown_step");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Olá <em>mundo</em></p>"), "Olá mundo");
        assert_eq!(strip_tags("a > b"), "a > b");
    }
}
