//! Admin reset: forget the local session and ask the remote service to
//! purge the quiz's visit counts.

use std::time::Duration;

use funnel_core::config::TrackingConfig;
use funnel_core::{FunnelError, FunnelResult, SessionContext};
use tracing::{error, info};

use crate::events::ResetRequest;

pub struct ResetClient {
    client: reqwest::Client,
    url: String,
}

impl ResetClient {
    pub fn new(config: &TrackingConfig) -> FunnelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FunnelError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: config.reset_url(),
        })
    }

    /// Clears the session id and UTM parameters, then requests the remote
    /// purge. Local state is cleared even when the remote call fails.
    pub async fn reset(&self, session: &SessionContext) -> bool {
        session.clear();
        info!(quiz = %session.quiz_name(), "local session data cleared");

        let body = ResetRequest {
            quiz_name: session.quiz_name().to_string(),
        };
        match self.client.post(&self.url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(quiz = %body.quiz_name, "remote analytics reset");
                true
            }
            Ok(resp) => {
                error!(status = resp.status().as_u16(), "failed to reset remote analytics");
                false
            }
            Err(e) => {
                error!(error = %e, "failed to reset remote analytics");
                false
            }
        }
    }
}
