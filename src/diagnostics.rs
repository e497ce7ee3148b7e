// ABOUTME: Diagnostics accumulator for non-fatal warnings during teardown.
// ABOUTME: Collects failures that shouldn't abort an archive but should be shown to operators.

use serde::Serialize;

/// Collects non-fatal warnings during best-effort operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn of_kind(&self, kind: WarningKind) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

/// A non-fatal warning collected during teardown.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn monitoring(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Monitoring, message)
    }

    pub fn dns(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Dns, message)
    }

    pub fn load_balancer(message: impl Into<String>) -> Self {
        Self::new(WarningKind::LoadBalancer, message)
    }

    pub fn appserver(message: impl Into<String>) -> Self {
        Self::new(WarningKind::AppServer, message)
    }

    pub fn capability(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Capability, message)
    }
}

/// Categories of warnings that can occur during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Monitoring could not be disabled.
    Monitoring,
    /// A DNS record could not be removed.
    Dns,
    /// The load balancer kept a stale configuration.
    LoadBalancer,
    /// An appserver could not be deactivated or terminated.
    AppServer,
    /// A database, storage or secret resource could not be deprovisioned.
    Capability,
}
