//! Module framework collaborator
//!
//! The harness only needs a framework it can start and stop, a context to
//! install bundles through, and the two competing install operations.
//! Everything else about the framework stays behind these traits.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BenchError, Result};

pub mod memory;

pub use memory::{Catalog, FrameworkState, MemoryFramework};

/// Handle to a bundle returned by an install call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstalledBundle {
    /// Framework-assigned bundle id
    pub id: u64,
    /// Identifier the bundle was installed from
    pub location: String,
}

/// Context through which bundles are installed and released
pub trait BundleContext: Send + Sync {
    /// Legacy install operation, serialized by a framework-wide lock
    fn install_legacy(&self, identifier: &str) -> Result<InstalledBundle>;

    /// Alternative install operation with reduced internal locking
    fn install_revised(&self, identifier: &str) -> Result<InstalledBundle>;

    /// Release a previously installed bundle
    fn uninstall(&self, bundle: &InstalledBundle) -> Result<()>;
}

/// A long-lived framework instance shared by every worker of a case
pub trait Framework: Send + Sync {
    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    /// Block until the framework has stopped. A zero timeout waits indefinitely.
    fn wait_for_stop(&self, timeout: Duration) -> Result<()>;

    fn context(&self) -> Arc<dyn BundleContext>;
}

/// Which install operation a case exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstallPath {
    /// Framework-wide lock held for the whole install
    #[default]
    Legacy,
    /// Lock held only while registering the bundle
    Revised,
}

impl InstallPath {
    /// Install one bundle through the selected operation
    pub fn install(&self, context: &dyn BundleContext, identifier: &str) -> Result<InstalledBundle> {
        match self {
            InstallPath::Legacy => context.install_legacy(identifier),
            InstallPath::Revised => context.install_revised(identifier),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            InstallPath::Legacy => "legacy",
            InstallPath::Revised => "revised",
        }
    }

    pub fn all() -> [InstallPath; 2] {
        [InstallPath::Legacy, InstallPath::Revised]
    }
}

impl fmt::Display for InstallPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InstallPath {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "old" => Ok(InstallPath::Legacy),
            "revised" | "new" => Ok(InstallPath::Revised),
            other => Err(BenchError::ConfigError(format!(
                "Unknown install path '{}' (expected legacy or revised)",
                other
            ))),
        }
    }
}
