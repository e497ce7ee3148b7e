// ABOUTME: Command module aggregator for the hangar CLI.
// ABOUTME: Commands run offline against a fleet snapshot loaded into a MemoryStore.

mod check;
mod plan_retention;
mod render_lb;
mod status;

pub use check::check;
pub use plan_retention::plan_retention;
pub use render_lb::render_lb;
pub use status::status;

use async_trait::async_trait;
use hangar::config::Config;
use hangar::error::Result;
use hangar::platform::Platform;
use hangar::services::{ComputeError, ComputeProvider, DeleteOutcome, VmState};
use hangar::store::{FleetSnapshot, MemoryStore};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Compute provider for offline commands. Every call reports the provider
/// as unavailable, so nothing is ever created or deleted.
struct OfflineCompute;

#[async_trait]
impl ComputeProvider for OfflineCompute {
    async fn create_vm(&self, _name: &str) -> std::result::Result<String, ComputeError> {
        Err(ComputeError::Unavailable)
    }

    async fn vm_state(&self, _vm_id: &str) -> std::result::Result<VmState, ComputeError> {
        Err(ComputeError::Unavailable)
    }

    async fn public_address(
        &self,
        _vm_id: &str,
    ) -> std::result::Result<Option<IpAddr>, ComputeError> {
        Err(ComputeError::Unavailable)
    }

    async fn delete_vm(&self, _vm_id: &str) -> DeleteOutcome {
        DeleteOutcome::Failed("offline: compute provider unavailable".to_string())
    }
}

/// Load the fleet snapshot at `fleet` into a store.
fn load_store(fleet: &Path) -> Result<Arc<MemoryStore>> {
    let store = FleetSnapshot::load(fleet)?.into_store()?;
    tracing::debug!("loaded fleet snapshot from {}", fleet.display());
    Ok(Arc::new(store))
}

/// Platform over the fleet snapshot with an offline compute provider.
fn offline_platform(config: Config, fleet: &Path) -> Result<Platform> {
    let store = load_store(fleet)?;
    Ok(Platform::builder(config, store, Arc::new(OfflineCompute)).build())
}
