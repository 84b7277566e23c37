//! Display conditions — a small, serializable expression tree evaluated
//! against the accumulated answers of a run.
//!
//! ```json
//! { "op": "equals", "key": "q2", "value": "sim" }
//! { "op": "all", "conditions": [ { "op": "answered", "key": "q1" }, ... ] }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{AnswerMap, AnswerValue};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    // Leaf predicates
    Answered { key: String },
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Contains { key: String, value: String },
    AnyOf { key: String, values: Vec<String> },

    // Combinators
    Not { condition: Box<Condition> },
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
}

impl Condition {
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn contains(key: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::Contains {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn answered(key: impl Into<String>) -> Self {
        Condition::Answered { key: key.into() }
    }

    pub fn negate(condition: Condition) -> Self {
        Condition::Not {
            condition: Box::new(condition),
        }
    }

    /// Evaluates the tree. A missing answer makes every leaf false, so
    /// `not_equals` on a missing key is true.
    pub fn evaluate(&self, answers: &AnswerMap) -> bool {
        match self {
            Condition::Answered { key } => answers.get(key).is_some(),
            Condition::Equals { key, value } => {
                answers.get(key).is_some_and(|answer| is_exactly(answer, value))
            }
            Condition::NotEquals { key, value } => {
                !answers.get(key).is_some_and(|answer| is_exactly(answer, value))
            }
            Condition::Contains { key, value } => answers
                .get(key)
                .is_some_and(|answer| answer.values().iter().any(|v| v == value)),
            Condition::AnyOf { key, values } => answers.get(key).is_some_and(|answer| {
                answer.values().iter().any(|v| values.iter().any(|c| c == v))
            }),
            Condition::Not { condition } => !condition.evaluate(answers),
            Condition::All { conditions } => conditions.iter().all(|c| c.evaluate(answers)),
            Condition::Any { conditions } => conditions.iter().any(|c| c.evaluate(answers)),
        }
    }

    /// Collects the answer keys this condition reads.
    pub fn referenced_keys<'a>(&'a self, keys: &mut Vec<&'a str>) {
        match self {
            Condition::Answered { key }
            | Condition::Equals { key, .. }
            | Condition::NotEquals { key, .. }
            | Condition::Contains { key, .. }
            | Condition::AnyOf { key, .. } => {
                if !keys.contains(&key.as_str()) {
                    keys.push(key);
                }
            }
            Condition::Not { condition } => condition.referenced_keys(keys),
            Condition::All { conditions } | Condition::Any { conditions } => {
                for condition in conditions {
                    condition.referenced_keys(keys);
                }
            }
        }
    }
}

/// Only a single-choice answer can equal a value; a multi-select list never does.
fn is_exactly(answer: &AnswerValue, expected: &str) -> bool {
    match answer {
        AnswerValue::Single(value) => value == expected,
        AnswerValue::Multi(_) => false,
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Answered { key } => write!(f, "answered(${})", key),
            Condition::Equals { key, value } => write!(f, "${} == {:?}", key, value),
            Condition::NotEquals { key, value } => write!(f, "${} != {:?}", key, value),
            Condition::Contains { key, value } => write!(f, "${} contains {:?}", key, value),
            Condition::AnyOf { key, values } => write!(f, "${} in {:?}", key, values),
            Condition::Not { condition } => write!(f, "NOT ({})", condition),
            Condition::All { conditions } => fmt_joined(f, conditions, " AND ", "true"),
            Condition::Any { conditions } => fmt_joined(f, conditions, " OR ", "false"),
        }
    }
}

fn fmt_joined(
    f: &mut fmt::Formatter<'_>,
    conditions: &[Condition],
    separator: &str,
    empty: &str,
) -> fmt::Result {
    if conditions.is_empty() {
        return f.write_str(empty);
    }
    f.write_str("(")?;
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", condition)?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers() -> AnswerMap {
        let mut answers = AnswerMap::new();
        answers.insert("q2", "sim");
        answers.insert(
            "q4",
            vec!["Caótico".to_string(), "Violento".to_string()],
        );
        answers
    }

    #[test]
    fn test_equals_and_not_equals() {
        let answers = answers();
        assert!(Condition::equals("q2", "sim").evaluate(&answers));
        assert!(!Condition::equals("q2", "nao").evaluate(&answers));
        assert!(!Condition::equals("missing", "sim").evaluate(&answers));

        let not_equals = Condition::NotEquals {
            key: "missing".into(),
            value: "sim".into(),
        };
        assert!(not_equals.evaluate(&answers));
    }

    #[test]
    fn test_multi_answers() {
        let answers = answers();
        assert!(Condition::contains("q4", "Violento").evaluate(&answers));
        assert!(!Condition::equals("q4", "Violento").evaluate(&answers));

        let any_of = Condition::AnyOf {
            key: "q4".into(),
            values: vec!["Seguro".into(), "Caótico".into()],
        };
        assert!(any_of.evaluate(&answers));
    }

    #[test]
    fn test_single_item_list_is_not_equal_to_value() {
        let mut answers = AnswerMap::new();
        answers.insert("q2", vec!["sim".to_string()]);
        assert!(!Condition::equals("q2", "sim").evaluate(&answers));

        let not_equals = Condition::NotEquals {
            key: "q2".into(),
            value: "sim".into(),
        };
        assert!(not_equals.evaluate(&answers));
        assert!(Condition::contains("q2", "sim").evaluate(&answers));
    }

    #[test]
    fn test_combinators() {
        let answers = answers();
        let both = Condition::All {
            conditions: vec![
                Condition::answered("q2"),
                Condition::contains("q4", "Caótico"),
            ],
        };
        assert!(both.evaluate(&answers));
        assert!(!Condition::negate(both).evaluate(&answers));

        assert!(Condition::All { conditions: vec![] }.evaluate(&answers));
        assert!(!Condition::Any { conditions: vec![] }.evaluate(&answers));
    }

    #[test]
    fn test_condition_json_shape() {
        let condition: Condition = serde_json::from_str(
            r#"{"op": "any", "conditions": [
                {"op": "equals", "key": "q2", "value": "nao"},
                {"op": "not", "condition": {"op": "answered", "key": "q1"}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            condition.to_string(),
            r#"($q2 == "nao" OR NOT (answered($q1)))"#
        );

        let mut keys = Vec::new();
        condition.referenced_keys(&mut keys);
        assert_eq!(keys, vec!["q2", "q1"]);
    }
}
