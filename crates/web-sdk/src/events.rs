//! Wire types sent to the tracking and reset endpoints.

use serde::{Deserialize, Serialize};

use funnel_core::{SessionContext, UtmParams};

/// Body of a tracking beacon: one per step entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPayload {
    pub session_id: String,
    pub step_id: String,
    pub quiz_name: String,
    pub user_agent: String,
    /// Empty when the visitor arrived directly.
    pub referrer: String,
    #[serde(flatten)]
    pub utm: UtmParams,
}

impl TrackPayload {
    pub fn from_session(
        session: &SessionContext,
        session_id: impl Into<String>,
        step_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            step_id: step_id.into(),
            quiz_name: session.quiz_name().to_string(),
            user_agent: session.user_agent().to_string(),
            referrer: session.referrer().unwrap_or_default().to_string(),
            utm: session.utm(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetRequest {
    pub quiz_name: String,
}
