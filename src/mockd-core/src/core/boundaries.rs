use async_trait::async_trait;
use std::fmt;
use tracing::{error, info};

use crate::models::Environment;

/// The mock server runtime serving environments.
#[async_trait]
pub trait ServerRuntime: Send + Sync {
    /// Must only return once the environment no longer serves traffic.
    async fn stop(&self, environment: &Environment) -> anyhow::Result<()>;
}

/// Runtime for processes that never start servers (CLI, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedRuntime;

#[async_trait]
impl ServerRuntime for DetachedRuntime {
    async fn stop(&self, environment: &Environment) -> anyhow::Result<()> {
        info!("no server attached to {}, nothing to stop", environment.name);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Success,
    Error,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Success => f.write_str("success"),
            AlertLevel::Error => f.write_str("error"),
        }
    }
}

/// User-facing notifications.
pub trait Alerts: Send + Sync {
    fn show_alert(&self, level: AlertLevel, message: &str);
}

/// Routes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlerts;

impl Alerts for TracingAlerts {
    fn show_alert(&self, level: AlertLevel, message: &str) {
        match level {
            AlertLevel::Success => info!(alert = %level, "{message}"),
            AlertLevel::Error => error!(alert = %level, "{message}"),
        }
    }
}
