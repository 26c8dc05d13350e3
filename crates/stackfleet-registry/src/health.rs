//! Health probing with exponential backoff

use crate::model::Placement;
use async_trait::async_trait;
use stackfleet_core::HealthCheck;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Reports whether a placed workload is healthy
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, placement: &Placement, check: &HealthCheck) -> bool;
}

/// Probe for providers that report readiness through `ensure` itself
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

#[async_trait]
impl HealthProbe for AlwaysHealthy {
    async fn probe(&self, _placement: &Placement, _check: &HealthCheck) -> bool {
        true
    }
}

/// Poll `probe` until healthy or `check.retries` attempts are used up.
///
/// Returns the number of attempts made, as `Ok` when healthy and `Err`
/// when every attempt failed.
pub async fn wait_healthy(
    probe: &dyn HealthProbe,
    placement: &Placement,
    check: &HealthCheck,
) -> Result<u32, u32> {
    let max_attempts = check.retries.max(1);

    for attempt in 0..max_attempts {
        if probe.probe(placement, check).await {
            return Ok(attempt + 1);
        }

        if attempt + 1 < max_attempts {
            let delay_ms = check.delay_for_attempt(attempt);
            debug!(
                service = %placement.service,
                attempt = attempt + 1,
                delay_ms,
                "Health check failed, retrying"
            );
            sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    Err(max_attempts)
}
