pub(crate) mod tracing;

use anyhow::Result;

/// Handle over the process-wide tracing setup.
#[derive(Debug, Clone)]
pub struct Telemetry;

impl Telemetry {
    /// Initialize tracing once and return the telemetry handle.
    ///
    /// # Errors
    /// Returns an error when the subscriber fails to initialize.
    pub fn new() -> Result<Self> {
        tracing::init()?;
        Ok(Self)
    }

    pub fn record_ready_probe(&self) {
        ::tracing::debug!("service ready probe");
    }

    pub fn record_live_probe(&self) {
        ::tracing::debug!("service live probe");
    }

    pub fn record_submit_invocation(&self) {
        ::tracing::info!("generation submit invoked");
    }

    pub fn record_cancel_invocation(&self) {
        ::tracing::info!("generation cancel invoked");
    }
}
