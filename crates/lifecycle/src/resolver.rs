//! ERID resolution with a guaranteed fallback.

use std::time::Duration;

use domain::{Erid, Order};

use crate::error::ComplianceError;
use crate::services::compliance::{AdRegistration, ComplianceAuthority};

/// Where a resolved identifier came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedErid {
    /// Supplied by the advertiser with the order.
    Custom(Erid),

    /// Issued by the compliance authority.
    Registered(Erid),

    /// Synthesized locally because registration failed.
    Fallback(Erid),
}

impl ResolvedErid {
    pub fn erid(&self) -> &Erid {
        match self {
            Self::Custom(erid) | Self::Registered(erid) | Self::Fallback(erid) => erid,
        }
    }

    pub fn into_erid(self) -> Erid {
        match self {
            Self::Custom(erid) | Self::Registered(erid) | Self::Fallback(erid) => erid,
        }
    }

    /// Metric label for the source.
    pub fn source(&self) -> &'static str {
        match self {
            Self::Custom(_) => "custom",
            Self::Registered(_) => "registered",
            Self::Fallback(_) => "fallback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Resolves the advertising identifier for an order.
///
/// Resolution never fails. A valid custom identifier wins without any
/// external call; otherwise the authority is asked, and any failure of that
/// call (transport, timeout, error code, unusable identifier) degrades to a
/// locally synthesized fallback.
pub struct ErdResolver<A: ComplianceAuthority> {
    authority: A,
    timeout: Duration,
}

impl<A: ComplianceAuthority> ErdResolver<A> {
    /// Default bound on one registration call.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(authority: A, timeout: Duration) -> Self {
        Self { authority, timeout }
    }

    pub fn authority(&self) -> &A {
        &self.authority
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.id, group_id = order.group_id))]
    pub async fn resolve(&self, order: &Order) -> ResolvedErid {
        let resolved = match &order.custom_erid {
            Some(custom) => ResolvedErid::Custom(custom.clone()),
            None => match self.register(order).await {
                Ok(erid) => ResolvedErid::Registered(erid),
                Err(e) => {
                    tracing::warn!(error = %e, "ad registration degraded, using fallback identifier");
                    ResolvedErid::Fallback(Erid::fallback(order.group_id, order.user_id))
                }
            },
        };

        metrics::counter!("erid_resolved_total", "source" => resolved.source()).increment(1);
        tracing::info!(erid = %resolved.erid(), source = resolved.source(), "identifier resolved");
        resolved
    }

    async fn register(&self, order: &Order) -> Result<Erid, ComplianceError> {
        let ad = AdRegistration {
            text: order
                .text
                .chars()
                .take(self.authority.max_text_chars())
                .collect(),
            site: order.site_reference(),
            cost_minor: order.price.minor_units(),
        };

        let raw = tokio::time::timeout(self.timeout, self.authority.register(&ad))
            .await
            .map_err(|_| ComplianceError::Timeout(self.timeout))??;

        Erid::parse(&raw).map_err(|_| ComplianceError::InvalidIdentifier(raw))
    }
}
