//! Session context — the per-visitor identity and attribution data created
//! once at startup and shared by the sequencer and the tracking clients.

use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

const SESSION_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// UTM attribution parameters captured from the landing URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmParams {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_content: Option<String>,
    pub utm_term: Option<String>,
}

impl UtmParams {
    /// Extracts the UTM parameters from a URL's query string. Unknown
    /// parameters are ignored; the first occurrence of a key wins.
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "utm_source" => &mut params.utm_source,
                "utm_medium" => &mut params.utm_medium,
                "utm_campaign" => &mut params.utm_campaign,
                "utm_content" => &mut params.utm_content,
                "utm_term" => &mut params.utm_term,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    pub fn is_empty(&self) -> bool {
        self.utm_source.is_none()
            && self.utm_medium.is_none()
            && self.utm_campaign.is_none()
            && self.utm_content.is_none()
            && self.utm_term.is_none()
    }
}

/// Generates a session id of the form `<unix millis>-<9 base36 chars>`.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SESSION_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

#[derive(Debug, Default)]
struct SessionState {
    session_id: Option<String>,
    utm: UtmParams,
}

/// Shared session context. The session id is generated lazily and cached;
/// `clear` forgets it so the next access starts a new session.
#[derive(Debug)]
pub struct SessionContext {
    quiz_name: String,
    user_agent: String,
    referrer: Option<String>,
    state: RwLock<SessionState>,
}

impl SessionContext {
    pub fn new(quiz_name: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            quiz_name: quiz_name.into(),
            user_agent: user_agent.into(),
            referrer: None,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// Captures UTM parameters from the landing URL. Only a URL carrying at
    /// least one UTM parameter replaces what was stored before.
    pub fn capture_landing_url(&self, landing_url: &str) {
        match Url::parse(landing_url) {
            Ok(url) => {
                let utm = UtmParams::from_url(&url);
                if !utm.is_empty() {
                    info!(source = ?utm.utm_source, campaign = ?utm.utm_campaign, "captured UTM parameters");
                    self.state.write().utm = utm;
                }
            }
            Err(e) => debug!(error = %e, url = %landing_url, "landing URL not parseable, UTM capture skipped"),
        }
    }

    pub fn session_id(&self) -> String {
        if let Some(id) = self.state.read().session_id.clone() {
            return id;
        }
        let mut state = self.state.write();
        state
            .session_id
            .get_or_insert_with(|| {
                let id = generate_session_id();
                debug!(session_id = %id, "started new session");
                id
            })
            .clone()
    }

    pub fn utm(&self) -> UtmParams {
        self.state.read().utm.clone()
    }

    pub fn quiz_name(&self) -> &str {
        &self.quiz_name
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    /// Forgets the session id and UTM parameters. Safe to call repeatedly.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.session_id = None;
        state.utm = UtmParams::default();
    }

    pub fn has_session(&self) -> bool {
        self.state.read().session_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let id = generate_session_id();
        let (millis, suffix) = id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_session_id_is_cached_until_cleared() {
        let session = SessionContext::new("crianca_interior", "test-agent");
        assert!(!session.has_session());

        let first = session.session_id();
        assert_eq!(session.session_id(), first);

        session.clear();
        assert!(!session.has_session());
        session.clear();
        assert!(!session.session_id().is_empty());
    }

    #[test]
    fn test_utm_capture() {
        let session = SessionContext::new("crianca_interior", "test-agent");
        session.capture_landing_url(
            "https://quiz.example.com/?utm_source=facebook&utm_campaign=launch&fbclid=abc",
        );
        let utm = session.utm();
        assert_eq!(utm.utm_source.as_deref(), Some("facebook"));
        assert_eq!(utm.utm_campaign.as_deref(), Some("launch"));
        assert!(utm.utm_medium.is_none());

        // A later URL without UTM parameters keeps the captured attribution.
        session.capture_landing_url("https://quiz.example.com/admin");
        assert_eq!(session.utm().utm_source.as_deref(), Some("facebook"));

        session.capture_landing_url("not a url");
        assert_eq!(session.utm(), utm);
    }
}
