//! Compliance authority trait and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ComplianceError;

/// Longest ad text VK ORD accepts, in characters.
pub const VK_MAX_AD_TEXT: usize = 900;

/// Data sent to the authority when registering an ad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdRegistration {
    /// Ad text, already truncated to the authority's limit.
    pub text: String,

    /// Placement site, e.g. `vk.com/club42`.
    pub site: String,

    /// Placement cost in minor currency units.
    pub cost_minor: i64,
}

/// An external service that issues advertising identifiers.
#[async_trait]
pub trait ComplianceAuthority: Send + Sync {
    /// Registers an ad and returns the raw identifier from the response.
    ///
    /// The caller validates the identifier; implementations only report
    /// transport and protocol failures.
    async fn register(&self, ad: &AdRegistration) -> Result<String, ComplianceError>;

    /// Maximum ad text length in characters.
    fn max_text_chars(&self) -> usize {
        VK_MAX_AD_TEXT
    }
}

#[async_trait]
impl<T: ComplianceAuthority + ?Sized> ComplianceAuthority for Arc<T> {
    async fn register(&self, ad: &AdRegistration) -> Result<String, ComplianceError> {
        (**self).register(ad).await
    }

    fn max_text_chars(&self) -> usize {
        (**self).max_text_chars()
    }
}

#[derive(Debug, Clone, Default)]
enum Behavior {
    #[default]
    Issue,
    Unreachable,
    Reject {
        code: i64,
        message: String,
    },
    Respond(String),
}

#[derive(Debug, Default)]
struct InMemoryComplianceState {
    behavior: Behavior,
    delay: Option<Duration>,
    registrations: Vec<AdRegistration>,
    issued: u32,
}

/// In-memory compliance authority for testing and local runs.
///
/// Issues `VK-ORD-000001`, `VK-ORD-000002`, ... unless told to fail.
#[derive(Debug, Clone, Default)]
pub struct InMemoryComplianceAuthority {
    state: Arc<RwLock<InMemoryComplianceState>>,
}

impl InMemoryComplianceAuthority {
    /// Creates a new in-memory authority that issues identifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every registration fail as if the network were down.
    pub fn set_unreachable(&self) {
        self.state.write().unwrap().behavior = Behavior::Unreachable;
    }

    /// Makes every registration fail with an explicit error code.
    pub fn set_rejection(&self, code: i64, message: impl Into<String>) {
        self.state.write().unwrap().behavior = Behavior::Reject {
            code,
            message: message.into(),
        };
    }

    /// Makes every registration return `raw`, valid or not.
    pub fn set_response(&self, raw: impl Into<String>) {
        self.state.write().unwrap().behavior = Behavior::Respond(raw.into());
    }

    /// Delays every registration by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state.write().unwrap().delay = Some(delay);
    }

    /// Returns the number of registration attempts.
    pub fn register_count(&self) -> usize {
        self.state.read().unwrap().registrations.len()
    }

    /// Returns every registration attempt, oldest first.
    pub fn registrations(&self) -> Vec<AdRegistration> {
        self.state.read().unwrap().registrations.clone()
    }
}

#[async_trait]
impl ComplianceAuthority for InMemoryComplianceAuthority {
    async fn register(&self, ad: &AdRegistration) -> Result<String, ComplianceError> {
        let delay = {
            let mut state = self.state.write().unwrap();
            state.registrations.push(ad.clone());
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().unwrap();
        match state.behavior.clone() {
            Behavior::Issue => {
                state.issued += 1;
                Ok(format!("VK-ORD-{:06}", state.issued))
            }
            Behavior::Unreachable => Err(ComplianceError::Unreachable(
                "connection refused".to_string(),
            )),
            Behavior::Reject { code, message } => Err(ComplianceError::Rejected { code, message }),
            Behavior::Respond(raw) => Ok(raw),
        }
    }
}
