use rand::seq::SliceRandom;
use std::sync::Arc;

const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Picks a user agent for each new browsing session
#[derive(Debug, Clone)]
pub struct UserAgentRotator {
    user_agents: Arc<Vec<String>>,
}

impl UserAgentRotator {
    pub fn new(user_agents: &[String]) -> Self {
        let agents = if user_agents.is_empty() {
            vec![FALLBACK_USER_AGENT.to_string()]
        } else {
            user_agents.to_vec()
        };

        Self {
            user_agents: Arc::new(agents),
        }
    }

    /// Get a random user agent
    pub fn random(&self) -> &str {
        let mut rng = rand::thread_rng();
        self.user_agents
            .choose(&mut rng)
            .map(String::as_str)
            .unwrap_or(FALLBACK_USER_AGENT)
    }

    pub fn count(&self) -> usize {
        self.user_agents.len()
    }
}
