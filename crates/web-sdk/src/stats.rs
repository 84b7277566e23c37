//! Statistics client: reads per-step visit counts from the remote service.

use std::time::Duration;

use funnel_core::config::TrackingConfig;
use funnel_core::{DateFilter, FunnelError, FunnelResult, RawFunnelStats};
use funnel_reporting::StatsSource;
use tracing::debug;

pub struct StatsClient {
    client: reqwest::Client,
    url: String,
    quiz_name: String,
}

impl StatsClient {
    pub fn new(config: &TrackingConfig, quiz_name: impl Into<String>) -> FunnelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FunnelError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: config.stats_url(),
            quiz_name: quiz_name.into(),
        })
    }

    pub fn query(&self, filter: &DateFilter) -> Vec<(&'static str, String)> {
        let mut query = vec![("quiz_name", self.quiz_name.clone())];
        query.extend(filter.query_pairs());
        query
    }

    pub async fn fetch_raw(&self, filter: &DateFilter) -> FunnelResult<RawFunnelStats> {
        let resp = self
            .client
            .get(&self.url)
            .query(&self.query(filter))
            .send()
            .await
            .map_err(|e| FunnelError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FunnelError::Transport(format!(
                "statistics request failed with status {}",
                status
            )));
        }

        let stats: RawFunnelStats = resp
            .json()
            .await
            .map_err(|e| FunnelError::Transport(format!("invalid statistics response: {}", e)))?;
        debug!(
            steps = stats.step_counts.len(),
            unique_visitors = stats.total_unique_visitors,
            "fetched funnel statistics"
        );
        Ok(stats)
    }
}

impl StatsSource for StatsClient {
    async fn fetch(&self, filter: &DateFilter) -> FunnelResult<RawFunnelStats> {
        self.fetch_raw(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use funnel_core::{StepDefinition, StepType};
    use funnel_reporting::{FunnelDashboard, LabelTable};

    fn client(base_url: &str) -> StatsClient {
        let config = TrackingConfig {
            base_url: base_url.into(),
            timeout_ms: 500,
            ..TrackingConfig::default()
        };
        StatsClient::new(&config, "crianca_interior").unwrap()
    }

    #[test]
    fn test_query_includes_quiz_name_and_filter() {
        let client = client("http://localhost:54321");
        assert_eq!(
            client.query(&DateFilter::AllTime),
            vec![("quiz_name", "crianca_interior".to_string())]
        );

        let filter = DateFilter::Day {
            date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
        };
        assert_eq!(
            client.query(&filter),
            vec![
                ("quiz_name", "crianca_interior".to_string()),
                ("date", "2026-01-15".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_degrades_to_zero_table() {
        let client = client("http://127.0.0.1:9");
        let steps = vec![
            StepDefinition::new("landing", StepType::Landing),
            StepDefinition::new("q1", StepType::Question).with_question("Qual a sua idade?"),
        ];
        let labels = LabelTable::from_catalog(&steps);

        assert!(client.fetch_raw(&DateFilter::AllTime).await.is_err());

        let dashboard = FunnelDashboard::new(Arc::new(client), steps, labels);
        let report = dashboard.refresh(DateFilter::AllTime).await;
        assert!(report.degraded);
        assert_eq!(report.stats.len(), 2);
        assert!(report.stats.iter().all(|s| s.visitor_count == 0));
        assert_eq!(report.stats[1].label, "Q: Qual a sua idad...");
        assert!(report.daily_stats.is_empty());
        assert_eq!(report.total_unique_visitors, 0);
    }
}
