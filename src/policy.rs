//! Dangerous-operation policy.
//!
//! The flag is read once from the environment at startup and injected into
//! the gateway as a plain value. There is no way to change it while the
//! process runs; escalating requires a restart with `ENABLE_DANGEROUS=true`.

use crate::error::{GatewayError, GatewayResult};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Policy {
    dangerous_enabled: bool,
}

impl Policy {
    pub const fn new(dangerous_enabled: bool) -> Self {
        Self { dangerous_enabled }
    }

    /// Policy that refuses every dangerous operation.
    pub const fn locked() -> Self {
        Self::new(false)
    }

    /// Policy that allows dangerous operations.
    pub const fn permissive() -> Self {
        Self::new(true)
    }

    pub fn dangerous_enabled(&self) -> bool {
        self.dangerous_enabled
    }

    /// Fail with `PolicyDenied` unless dangerous operations are enabled.
    pub fn require_dangerous(&self, operation: &str) -> GatewayResult<()> {
        if self.dangerous_enabled {
            Ok(())
        } else {
            warn!(operation = %operation, "Dangerous operation denied by policy");
            Err(GatewayError::policy_denied(operation))
        }
    }
}
