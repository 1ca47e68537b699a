//! # Automation Authorization
//!
//! A single principal, fixed at construction, is the only caller allowed to
//! invoke maintenance entry points (the maturity sweep, and any future
//! batched operation). Every privileged entry point routes through
//! [`AutomationGate::ensure`] — an explicit equality check, nothing cleverer.

use serde::{Deserialize, Serialize};

use crate::asset::Address;
use crate::error::VunaError;

/// Capability check gating privileged maintenance entry points.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct AutomationGate {
    principal: Address,
}

impl AutomationGate {
    /// Creates a gate admitting only `principal`.
    pub fn new(principal: Address) -> Self {
        Self { principal }
    }

    /// The admitted principal.
    pub fn principal(&self) -> Address {
        self.principal
    }

    /// Returns `Ok` iff `caller` is the automation principal.
    ///
    /// # Errors
    ///
    /// [`VunaError::Unauthorized`] for every other caller.
    pub fn ensure(&self, caller: Address) -> Result<(), VunaError> {
        if caller != self.principal {
            return Err(VunaError::Unauthorized { caller });
        }
        Ok(())
    }
}
