//! Funnel dashboard: keeps the latest funnel report and refreshes it from a
//! statistics source, on demand or on an interval.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use funnel_core::{DateFilter, FunnelResult, RawFunnelStats, StepDefinition};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::funnel::{build_funnel_stats, summarize, zero_filled, FunnelStat, FunnelSummary};
use crate::labels::LabelTable;

/// Anything that can answer "how many sessions reached each step".
pub trait StatsSource: Send + Sync {
    fn fetch(
        &self,
        filter: &DateFilter,
    ) -> impl Future<Output = FunnelResult<RawFunnelStats>> + Send;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelReport {
    pub filter: DateFilter,
    pub stats: Vec<FunnelStat>,
    pub summary: FunnelSummary,
    pub daily_stats: Vec<serde_json::Value>,
    pub total_unique_visitors: u64,
    /// Set when the source failed and `stats` is the zero-filled table.
    pub degraded: bool,
    pub generated_at: DateTime<Utc>,
}

pub struct FunnelDashboard<S> {
    source: Arc<S>,
    labels: LabelTable,
    ordered_steps: RwLock<Vec<StepDefinition>>,
    latest: RwLock<Option<(u64, FunnelReport)>>,
    next_seq: AtomicU64,
}

impl<S: StatsSource> FunnelDashboard<S> {
    pub fn new(source: Arc<S>, ordered_steps: Vec<StepDefinition>, labels: LabelTable) -> Self {
        Self {
            source,
            labels,
            ordered_steps: RwLock::new(ordered_steps),
            latest: RwLock::new(None),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Replaces the row order, e.g. after the custom order was saved.
    pub fn set_order(&self, ordered_steps: Vec<StepDefinition>) {
        *self.ordered_steps.write() = ordered_steps;
    }

    pub fn latest(&self) -> Option<FunnelReport> {
        self.latest.read().as_ref().map(|(_, report)| report.clone())
    }

    /// Fetches fresh counts and publishes the resulting report unless a newer
    /// refresh already published. Returns the report built by this call.
    pub async fn refresh(&self, filter: DateFilter) -> FunnelReport {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = self.source.fetch(&filter).await;

        let steps = self.ordered_steps.read().clone();
        let report = match fetched {
            Ok(raw) => {
                let stats = build_funnel_stats(&steps, &raw.step_counts, &self.labels);
                FunnelReport {
                    filter,
                    summary: summarize(&stats),
                    stats,
                    daily_stats: raw.daily_stats,
                    total_unique_visitors: raw.total_unique_visitors,
                    degraded: false,
                    generated_at: Utc::now(),
                }
            }
            Err(e) => {
                error!(error = %e, "failed to fetch funnel statistics, showing empty funnel");
                let stats = zero_filled(&steps, &self.labels);
                FunnelReport {
                    filter,
                    summary: summarize(&stats),
                    stats,
                    daily_stats: Vec::new(),
                    total_unique_visitors: 0,
                    degraded: true,
                    generated_at: Utc::now(),
                }
            }
        };

        if self.publish(seq, report.clone()) {
            debug!(seq, rows = report.stats.len(), "funnel report published");
        } else {
            debug!(seq, "stale funnel report discarded");
        }
        report
    }

    fn publish(&self, seq: u64, report: FunnelReport) -> bool {
        let mut latest = self.latest.write();
        match latest.as_ref() {
            Some((current, _)) if *current > seq => false,
            _ => {
                *latest = Some((seq, report));
                true
            }
        }
    }
}

impl<S: StatsSource + 'static> FunnelDashboard<S> {
    /// Refreshes every `period`. Ticks do not wait for the previous refresh;
    /// late responses lose to newer ones.
    pub fn spawn_auto_refresh(
        self: Arc<Self>,
        filter: DateFilter,
        period: Duration,
    ) -> JoinHandle<()> {
        info!(?period, "starting funnel auto-refresh");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let dashboard = Arc::clone(&self);
                tokio::spawn(async move {
                    dashboard.refresh(filter).await;
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnel_core::{FunnelError, StepType};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    fn steps() -> Vec<StepDefinition> {
        ["landing", "q1", "sales"]
            .iter()
            .map(|id| StepDefinition::new(*id, StepType::Question))
            .collect()
    }

    /// Serves queued responses in call order; each call may be delayed.
    struct ScriptedSource {
        calls: AtomicUsize,
        script: Vec<(u64, FunnelResult<u64>)>,
    }

    impl StatsSource for ScriptedSource {
        async fn fetch(&self, _filter: &DateFilter) -> FunnelResult<RawFunnelStats> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay_ms, outcome) = &self.script[call];
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
            match outcome {
                Ok(landing) => Ok(RawFunnelStats {
                    step_counts: HashMap::from([
                        ("landing".to_string(), *landing),
                        ("q1".to_string(), landing / 2),
                    ]),
                    daily_stats: Vec::new(),
                    total_unique_visitors: *landing,
                }),
                Err(e) => Err(FunnelError::Transport(e.to_string())),
            }
        }
    }

    fn dashboard(script: Vec<(u64, FunnelResult<u64>)>) -> FunnelDashboard<ScriptedSource> {
        let source = Arc::new(ScriptedSource {
            calls: AtomicUsize::new(0),
            script,
        });
        FunnelDashboard::new(source, steps(), LabelTable::new())
    }

    #[tokio::test]
    async fn test_refresh_builds_report() {
        let dash = dashboard(vec![(0, Ok(100))]);
        assert!(dash.latest().is_none());

        let report = dash.refresh(DateFilter::AllTime).await;
        assert!(!report.degraded);
        assert_eq!(report.stats[1].drop_off_percent, 50.0);
        assert_eq!(report.stats[2].visitor_count, 0);
        assert_eq!(report.summary.total_visitors, 100);
        assert_eq!(dash.latest().unwrap().total_unique_visitors, 100);
    }

    #[tokio::test]
    async fn test_source_failure_degrades_to_zero_table() {
        let dash = dashboard(vec![(
            0,
            Err(FunnelError::Transport("connection refused".into())),
        )]);
        let report = dash.refresh(DateFilter::AllTime).await;
        assert!(report.degraded);
        assert_eq!(report.stats.len(), 3);
        assert!(report.stats.iter().all(|s| s.visitor_count == 0));
        assert_eq!(report.summary.completion_rate, 0.0);
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        // First refresh answers slowly, second quickly.
        let dash = dashboard(vec![(80, Ok(10)), (0, Ok(500))]);
        let (first, second) = tokio::join!(
            dash.refresh(DateFilter::AllTime),
            dash.refresh(DateFilter::AllTime)
        );
        assert_eq!(first.summary.total_visitors, 10);
        assert_eq!(second.summary.total_visitors, 500);
        assert_eq!(dash.latest().unwrap().summary.total_visitors, 500);
    }

    #[tokio::test]
    async fn test_set_order_changes_rows() {
        let dash = dashboard(vec![(0, Ok(100))]);
        let mut reordered = steps();
        reordered.reverse();
        dash.set_order(reordered);
        let report = dash.refresh(DateFilter::AllTime).await;
        assert_eq!(report.stats[0].id, "sales");
    }

    #[tokio::test]
    async fn test_auto_refresh_publishes() {
        let dash = Arc::new(dashboard(vec![(0, Ok(42)), (0, Ok(42)), (0, Ok(42))]));
        let handle =
            Arc::clone(&dash).spawn_auto_refresh(DateFilter::AllTime, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();
        assert_eq!(dash.latest().unwrap().summary.total_visitors, 42);
    }
}
