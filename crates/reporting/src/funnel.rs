//! Funnel analysis: turns raw per-step visit counts into drop-off rows.

use std::collections::HashMap;

use funnel_core::StepDefinition;
use serde::{Deserialize, Serialize};

use crate::labels::LabelTable;

/// One row of the funnel table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStat {
    pub id: String,
    pub label: String,
    pub visitor_count: u64,
    /// Percentage of the previous row's visitors lost at this step, one
    /// decimal. Negative when a step saw more visitors than its predecessor.
    pub drop_off_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelSummary {
    pub total_visitors: u64,
    pub completion_rate: f64,
    pub biggest_drop_off: Option<FunnelStat>,
}

/// Builds one row per step, in the given order. Steps missing from
/// `step_counts` count as zero visitors.
pub fn build_funnel_stats(
    ordered_steps: &[StepDefinition],
    step_counts: &HashMap<String, u64>,
    labels: &LabelTable,
) -> Vec<FunnelStat> {
    let mut stats = Vec::with_capacity(ordered_steps.len());
    let mut previous: Option<u64> = None;

    for step in ordered_steps {
        let visitor_count = step_counts.get(&step.id).copied().unwrap_or(0);
        let drop_off_percent = match previous {
            Some(prev) => drop_off(prev, visitor_count),
            None => 0.0,
        };
        stats.push(FunnelStat {
            id: step.id.clone(),
            label: labels.label_for(&step.id).to_string(),
            visitor_count,
            drop_off_percent,
        });
        previous = Some(visitor_count);
    }
    stats
}

/// The table shown when statistics are unavailable.
pub fn zero_filled(ordered_steps: &[StepDefinition], labels: &LabelTable) -> Vec<FunnelStat> {
    build_funnel_stats(ordered_steps, &HashMap::new(), labels)
}

pub fn summarize(stats: &[FunnelStat]) -> FunnelSummary {
    let total_visitors = stats.first().map(|s| s.visitor_count).unwrap_or(0);

    let completion_rate = match stats.last() {
        Some(last) if total_visitors > 0 => {
            round_one_decimal(last.visitor_count as f64 / total_visitors as f64 * 100.0)
        }
        _ => 0.0,
    };

    // Strict comparison keeps the earliest row on ties.
    let biggest_drop_off = stats
        .iter()
        .skip(1)
        .fold(None::<&FunnelStat>, |best, stat| match best {
            Some(b) if b.drop_off_percent >= stat.drop_off_percent => Some(b),
            _ => Some(stat),
        })
        .cloned();

    FunnelSummary {
        total_visitors,
        completion_rate,
        biggest_drop_off,
    }
}

fn drop_off(previous: u64, current: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    let pct = (previous as f64 - current as f64) / previous as f64 * 100.0;
    if pct.is_finite() {
        round_one_decimal(pct)
    } else {
        0.0
    }
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_core::StepType;

    fn steps(ids: &[&str]) -> Vec<StepDefinition> {
        ids.iter()
            .map(|id| StepDefinition::new(*id, StepType::Question))
            .collect()
    }

    fn counts(pairs: &[(&str, u64)]) -> HashMap<String, u64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_drop_off_per_step() {
        let ordered = steps(&["landing", "q1", "q2", "sales"]);
        let stats = build_funnel_stats(
            &ordered,
            &counts(&[("landing", 100), ("q1", 80), ("q2", 80), ("sales", 20)]),
            &LabelTable::new(),
        );
        let drops: Vec<f64> = stats.iter().map(|s| s.drop_off_percent).collect();
        assert_eq!(drops, vec![0.0, 20.0, 0.0, 75.0]);
        assert_eq!(stats[3].label, "sales");
    }

    #[test]
    fn test_zero_previous_count_guards_division() {
        let ordered = steps(&["landing", "q1", "q2"]);
        let stats = build_funnel_stats(
            &ordered,
            &counts(&[("landing", 0), ("q2", 5)]),
            &LabelTable::new(),
        );
        assert_eq!(stats[1].visitor_count, 0);
        assert_eq!(stats[1].drop_off_percent, 0.0);
        assert_eq!(stats[2].drop_off_percent, 0.0);
    }

    #[test]
    fn test_growth_yields_negative_drop_off() {
        let ordered = steps(&["a", "b"]);
        let stats =
            build_funnel_stats(&ordered, &counts(&[("a", 40), ("b", 50)]), &LabelTable::new());
        assert_eq!(stats[1].drop_off_percent, -25.0);
    }

    #[test]
    fn test_rounding_to_one_decimal() {
        let ordered = steps(&["a", "b"]);
        let stats =
            build_funnel_stats(&ordered, &counts(&[("a", 3), ("b", 2)]), &LabelTable::new());
        assert_eq!(stats[1].drop_off_percent, 33.3);
        assert_eq!(round_one_decimal(66.66), 66.7);
    }

    #[test]
    fn test_labels_resolved_with_fallback() {
        let ordered = steps(&["landing", "q1"]);
        let mut labels = LabelTable::new();
        labels.insert("q1", "Q: Idade...");
        let stats = zero_filled(&ordered, &labels);
        assert_eq!(stats[0].label, "landing");
        assert_eq!(stats[1].label, "Q: Idade...");
        assert!(stats.iter().all(|s| s.visitor_count == 0));
    }

    #[test]
    fn test_summary() {
        let ordered = steps(&["landing", "q1", "q2", "sales"]);
        let stats = build_funnel_stats(
            &ordered,
            &counts(&[("landing", 200), ("q1", 150), ("q2", 150), ("sales", 30)]),
            &LabelTable::new(),
        );
        let summary = summarize(&stats);
        assert_eq!(summary.total_visitors, 200);
        assert_eq!(summary.completion_rate, 15.0);
        assert_eq!(summary.biggest_drop_off.unwrap().id, "sales");
    }

    #[test]
    fn test_summary_ties_pick_earliest() {
        let ordered = steps(&["a", "b", "c"]);
        let stats = build_funnel_stats(
            &ordered,
            &counts(&[("a", 100), ("b", 50), ("c", 25)]),
            &LabelTable::new(),
        );
        assert_eq!(summarize(&stats).biggest_drop_off.unwrap().id, "b");
    }

    #[test]
    fn test_summary_of_degenerate_tables() {
        let empty = summarize(&[]);
        assert_eq!(empty.total_visitors, 0);
        assert_eq!(empty.completion_rate, 0.0);
        assert!(empty.biggest_drop_off.is_none());

        let single = build_funnel_stats(&steps(&["a"]), &counts(&[("a", 7)]), &LabelTable::new());
        let summary = summarize(&single);
        assert_eq!(summary.completion_rate, 100.0);
        assert!(summary.biggest_drop_off.is_none());

        let zeros = zero_filled(&steps(&["a", "b"]), &LabelTable::new());
        assert_eq!(summarize(&zeros).completion_rate, 0.0);
    }
}
