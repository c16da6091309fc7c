//! Nimbus Azure Resource Manager Provider
//!
//! Provider for resources managed through Azure Resource Manager (ARM).
//!
//! ## Module Structure
//!
//! - `client` - Control plane client abstraction
//! - `config` - Provider settings (subscription, endpoint, polling)
//! - `resources` - Typed resource IDs and resource type configurations
//! - `provider` - ArmProvider implementation
//! - `utils` - Helper functions for value normalization

pub mod client;
pub mod config;
pub mod provider;
pub mod resources;
pub mod utils;

// Re-export main types
pub use client::{ControlPlane, Operation, OperationStatus};
pub use config::{ConfigError, ProviderConfig};
pub use provider::ArmProvider;
pub use utils::{convert_enum_value, normalize_location};

use nimbus_core::provider::{BoxFuture, Provider, ProviderResult};
use nimbus_core::resource::{Resource, ResourceAddress, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for ArmProvider {
    fn name(&self) -> &'static str {
        "arm"
    }

    fn resource_types(&self) -> Vec<Box<dyn nimbus_core::provider::ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        address: &ResourceAddress,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let address = address.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move {
            self.read_resource(&address.resource_type, &address.name, identifier.as_deref())
                .await
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(resource).await })
    }

    fn update(
        &self,
        address: &ResourceAddress,
        identifier: &str,
        _from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let address = address.clone();
        let identifier = identifier.to_string();
        let to = to.clone();
        Box::pin(async move { self.update_resource(address, &identifier, to).await })
    }

    fn delete(
        &self,
        address: &ResourceAddress,
        identifier: &str,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let address = address.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&address, &identifier).await })
    }
}
