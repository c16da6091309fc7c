//! Azure Resource Manager Provider implementation
//!
//! This module contains the main provider implementation that communicates
//! with the resource manager through a [`ControlPlane`] client. Every
//! resource type goes through the same code path, driven by its
//! [`ResourceConfig`].

use std::collections::HashMap;
use std::sync::Arc;

use nimbus_core::locks::{LockRegistry, NamedLockGuard};
use nimbus_core::provider::{ProviderError, ProviderResult};
use nimbus_core::resource::{Resource, ResourceAddress, State, Value};
use nimbus_core::resource_id::{RESOURCE_GROUP_FIELD, ResourceId, SUBSCRIPTION_FIELD};
use serde_json::json;

use crate::client::{ControlPlane, Operation, OperationStatus};
use crate::config::{ConfigError, ProviderConfig};
use crate::resources::{AttrMapping, ResourceConfig, get_resource_config};
use crate::utils::{convert_enum_value, normalize_location};

/// Get the ResourceConfig for a resource address
fn get_config(address: &ResourceAddress) -> ProviderResult<&'static ResourceConfig> {
    get_resource_config(&address.resource_type).ok_or_else(|| {
        ProviderError::new(format!("Unknown resource type: {}", address.resource_type))
            .for_resource(address.clone())
    })
}

/// Azure Resource Manager Provider
pub struct ArmProvider {
    client: Arc<dyn ControlPlane>,
    config: ProviderConfig,
    locks: LockRegistry,
}

impl ArmProvider {
    /// Create a new ArmProvider with its own lock registry
    pub fn new(config: ProviderConfig, client: Arc<dyn ControlPlane>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            locks: LockRegistry::new(),
        })
    }

    /// Share a lock registry with other providers in the same process
    pub fn with_locks(mut self, locks: LockRegistry) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    // =========================================================================
    // Resource ID Helpers
    // =========================================================================

    /// Parse an identifier recorded in state
    ///
    /// A malformed identifier means the recorded state is corrupt; it is
    /// reported, never guessed around.
    fn parse_identifier(
        &self,
        config: &'static ResourceConfig,
        address: &ResourceAddress,
        identifier: &str,
    ) -> ProviderResult<ResourceId> {
        config.id_schema.parse(identifier).map_err(|e| {
            log::warn!("{}: cannot parse identifier {:?}: {}", address, identifier, e);
            ProviderError::from(e).for_resource(address.clone())
        })
    }

    /// Build the resource ID a resource should have
    ///
    /// The innermost name comes from the `name` attribute (falling back to
    /// the address name); parents come from attributes named after the
    /// schema's fields.
    fn build_id(
        &self,
        config: &'static ResourceConfig,
        resource: &Resource,
    ) -> ProviderResult<ResourceId> {
        let address = &resource.address;
        let name = resource.get_string("name").unwrap_or(&address.name);
        let schema = config.id_schema;

        let built = if schema.segments.is_empty() {
            schema.build::<&str>(&self.config.subscription_id, name, &[])
        } else {
            let resource_group = resource
                .get_string(RESOURCE_GROUP_FIELD)
                .ok_or_else(|| missing_attributes(address, &[RESOURCE_GROUP_FIELD]))?;

            let parents = &schema.segments[..schema.segments.len() - 1];
            let mut values = Vec::with_capacity(schema.segments.len());
            let mut missing = Vec::new();
            for segment in parents {
                match resource.get_string(segment.field) {
                    Some(value) => values.push(value),
                    None => missing.push(segment.field),
                }
            }
            if !missing.is_empty() {
                return Err(missing_attributes(address, &missing));
            }
            values.push(name);

            schema.build(&self.config.subscription_id, resource_group, &values)
        };

        built.map_err(|e| ProviderError::from(e).for_resource(address.clone()))
    }

    /// Take the named lock guarding this resource's parent, if its type has one
    async fn lock_for(
        &self,
        config: &'static ResourceConfig,
        id: &ResourceId,
    ) -> Option<NamedLockGuard> {
        let target = config.lock?;
        let name = id.get(target.field)?;
        Some(self.locks.acquire(name, target.resource_type).await)
    }

    // =========================================================================
    // Control Plane Methods
    // =========================================================================

    /// Wait for a long-running operation to complete
    async fn wait_for_operation(&self, operation: Operation) -> ProviderResult<()> {
        let status_url = match operation {
            Operation::Completed => return Ok(()),
            Operation::Pending { status_url } => status_url,
        };

        for attempt in 1..=self.config.max_poll_attempts {
            match self.client.operation_status(&status_url).await? {
                OperationStatus::Succeeded => return Ok(()),
                OperationStatus::Failed(msg) => {
                    log::warn!("operation {} failed: {}", status_url, msg);
                    return Err(ProviderError::new(format!("Operation failed: {}", msg)));
                }
                OperationStatus::Canceled => {
                    return Err(ProviderError::new("Operation was cancelled"));
                }
                OperationStatus::InProgress => {
                    log::debug!(
                        "operation {} still running (poll {}/{})",
                        status_url,
                        attempt,
                        self.config.max_poll_attempts
                    );
                    if attempt < self.config.max_poll_attempts {
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                }
            }
        }

        Err(ProviderError::new(format!(
            "Operation timed out after {} polls",
            self.config.max_poll_attempts
        )))
    }

    /// Submit a PUT and wait for it to settle
    async fn put_and_wait(
        &self,
        config: &'static ResourceConfig,
        identifier: &str,
        body: serde_json::Value,
    ) -> ProviderResult<()> {
        let operation = self
            .client
            .create_or_update(identifier, config.api_version, body)
            .await?;
        self.wait_for_operation(operation).await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Read a resource using its configuration
    pub async fn read_resource(
        &self,
        resource_type: &str,
        name: &str,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let address = ResourceAddress::new(resource_type, name);
        let config = get_config(&address)?;

        let identifier = match identifier {
            Some(identifier) => identifier,
            None => return Ok(State::not_found(address)),
        };
        let id = self.parse_identifier(config, &address, identifier)?;
        let identifier = id.to_string();

        let body = match self
            .client
            .get(&identifier, config.api_version)
            .await
            .map_err(|e| e.for_resource(address.clone()))?
        {
            Some(body) => body,
            None => return Ok(State::not_found(address)),
        };

        let attributes = self.flatten(config, &id, &body);
        Ok(State::existing(address, attributes).with_identifier(identifier))
    }

    /// Create a resource using its configuration
    pub async fn create_resource(&self, resource: Resource) -> ProviderResult<State> {
        let address = resource.address.clone();
        let config = get_config(&address)?;
        let id = self.build_id(config, &resource)?;
        let body = self.expand(config, &resource)?;
        let identifier = id.to_string();

        {
            let _lock = self.lock_for(config, &id).await;

            let existing = self
                .client
                .get(&identifier, config.api_version)
                .await
                .map_err(|e| e.for_resource(address.clone()))?;
            if existing.is_some() {
                return Err(ProviderError::new(format!(
                    "A resource with the ID {:?} already exists - it must be imported to be managed",
                    identifier
                ))
                .for_resource(address));
            }

            log::info!(
                "creating {} {} ({})",
                config.arm_type,
                address,
                self.config.resource_url(&identifier, config.api_version)
            );
            self.put_and_wait(config, &identifier, body)
                .await
                .map_err(|e| e.for_resource(address.clone()))?;
        }

        let state = self
            .read_resource(&address.resource_type, &address.name, Some(&identifier))
            .await?;
        if !state.exists {
            return Err(
                ProviderError::new(format!("{} was not found after creation", identifier))
                    .for_resource(address),
            );
        }
        Ok(state)
    }

    /// Update a resource
    ///
    /// ARM PUT replaces the whole resource, so the full desired body is sent.
    pub async fn update_resource(
        &self,
        address: ResourceAddress,
        identifier: &str,
        to: Resource,
    ) -> ProviderResult<State> {
        let config = get_config(&address)?;
        let id = self.parse_identifier(config, &address, identifier)?;

        let desired = self.build_id(config, &to)?;
        if desired.resource_group() != id.resource_group()
            || desired.segment_values() != id.segment_values()
        {
            return Err(ProviderError::new(format!(
                "Changing the name or parent requires replacing the resource ({} -> {})",
                id, desired
            ))
            .for_resource(address));
        }

        let mut body = self.expand(config, &to)?;
        let identifier = id.to_string();

        {
            let _lock = self.lock_for(config, &id).await;

            if !config.preserve.is_empty() {
                let current = self
                    .client
                    .get(&identifier, config.api_version)
                    .await
                    .map_err(|e| e.for_resource(address.clone()))?;
                if let Some(current) = current {
                    preserve_paths(config.preserve, &current, &mut body);
                }
            }

            log::info!(
                "updating {} {} ({})",
                config.arm_type,
                address,
                self.config.resource_url(&identifier, config.api_version)
            );
            self.put_and_wait(config, &identifier, body)
                .await
                .map_err(|e| e.for_resource(address.clone()))?;
        }

        self.read_resource(&address.resource_type, &address.name, Some(&identifier))
            .await
    }

    /// Delete a resource
    pub async fn delete_resource(
        &self,
        address: &ResourceAddress,
        identifier: &str,
    ) -> ProviderResult<()> {
        let config = get_config(address)?;
        let id = self.parse_identifier(config, address, identifier)?;
        let identifier = id.to_string();

        let _lock = self.lock_for(config, &id).await;
        log::info!(
            "deleting {} {} ({})",
            config.arm_type,
            address,
            self.config.resource_url(&identifier, config.api_version)
        );
        let operation = self
            .client
            .delete(&identifier, config.api_version)
            .await
            .map_err(|e| e.for_resource(address.clone()))?;
        self.wait_for_operation(operation)
            .await
            .map_err(|e| e.for_resource(address.clone()))
    }

    // =========================================================================
    // Expand / Flatten
    // =========================================================================

    /// Build the ARM request body for a resource
    fn expand(
        &self,
        config: &'static ResourceConfig,
        resource: &Resource,
    ) -> ProviderResult<serde_json::Value> {
        let mut body = serde_json::Map::new();
        let mut missing = Vec::new();

        if config.has_location {
            match resource.get_string("location") {
                Some(location) => {
                    body.insert("location".to_string(), json!(normalize_location(location)));
                }
                None => missing.push("location"),
            }
        }

        for mapping in config.attributes {
            match resource.attributes.get(mapping.name) {
                Some(value) => {
                    if let Some(arm_value) = self.dsl_value_to_arm(mapping, value) {
                        insert_path(&mut body, &mapping.arm_path(), arm_value);
                    }
                }
                None if mapping.required => missing.push(mapping.name),
                None => {}
            }
        }

        if !missing.is_empty() {
            return Err(missing_attributes(&resource.address, &missing));
        }

        if config.has_tags {
            let tags = self.build_tags(resource.attributes.get("tags"));
            if !tags.is_empty() {
                body.insert("tags".to_string(), serde_json::Value::Object(tags));
            }
        }

        if config.id_schema.provider_namespace.is_some() {
            body.entry("properties")
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        }

        Ok(serde_json::Value::Object(body))
    }

    /// Reflect an ARM response body back into attributes
    fn flatten(
        &self,
        config: &'static ResourceConfig,
        id: &ResourceId,
        body: &serde_json::Value,
    ) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();

        // Identity comes from the ID, which keeps the original value casing
        let fields = id.fields();
        let leaf = fields.len() - 1;
        for (i, (field, value)) in fields.into_iter().enumerate() {
            if i == leaf {
                attributes.insert("name".to_string(), Value::String(value.to_string()));
            } else if field != SUBSCRIPTION_FIELD {
                attributes.insert(field.to_string(), Value::String(value.to_string()));
            }
        }

        if config.has_location
            && let Some(location) = body.get("location").and_then(|v| v.as_str())
        {
            attributes.insert(
                "location".to_string(),
                Value::String(normalize_location(location)),
            );
        }

        for mapping in config.attributes {
            let pointer = format!("/{}", mapping.arm_path().join("/"));
            if let Some(value) = body.pointer(&pointer).and_then(|v| self.json_to_value(v)) {
                attributes.insert(mapping.name.to_string(), value);
            }
        }

        if config.has_tags
            && let Some(tags) = body.get("tags").and_then(|v| v.as_object())
        {
            let tags_map = self.parse_tags(tags);
            if !tags_map.is_empty() {
                attributes.insert("tags".to_string(), Value::Map(tags_map));
            }
        }

        attributes
    }

    // =========================================================================
    // Value Conversion Helpers
    // =========================================================================

    /// Convert a configuration value to its ARM JSON form
    fn dsl_value_to_arm(&self, mapping: &AttrMapping, value: &Value) -> Option<serde_json::Value> {
        match value {
            Value::String(s) if mapping.is_enum => Some(json!(convert_enum_value(s))),
            _ => self.value_to_json(value),
        }
    }

    /// Convert JSON value to configuration Value
    fn json_to_value(&self, value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    // Value has no float variant; fractions are truncated
                    n.as_f64().map(|f| {
                        if f.fract() != 0.0 {
                            log::warn!("truncating non-integer number {} to {}", f, f as i64);
                        }
                        Value::Int(f as i64)
                    })
                }
            }
            serde_json::Value::Array(arr) => {
                let items: Vec<Value> = arr.iter().filter_map(|v| self.json_to_value(v)).collect();
                Some(Value::List(items))
            }
            serde_json::Value::Object(obj) => {
                let map: HashMap<String, Value> = obj
                    .iter()
                    .filter_map(|(k, v)| self.json_to_value(v).map(|v| (k.clone(), v)))
                    .collect();
                Some(Value::Map(map))
            }
            serde_json::Value::Null => None,
        }
    }

    /// Convert configuration Value to JSON value
    fn value_to_json(&self, value: &Value) -> Option<serde_json::Value> {
        match value {
            Value::String(s) => Some(json!(s)),
            Value::Bool(b) => Some(json!(b)),
            Value::Int(i) => Some(json!(i)),
            Value::List(items) => {
                let arr: Vec<serde_json::Value> =
                    items.iter().filter_map(|v| self.value_to_json(v)).collect();
                Some(serde_json::Value::Array(arr))
            }
            Value::Map(entries) => {
                let obj: serde_json::Map<String, serde_json::Value> = entries
                    .iter()
                    .filter_map(|(k, v)| self.value_to_json(v).map(|v| (k.clone(), v)))
                    .collect();
                Some(serde_json::Value::Object(obj))
            }
        }
    }

    // =========================================================================
    // Tag Helpers
    // =========================================================================

    /// Build the ARM tags object
    fn build_tags(&self, user_tags: Option<&Value>) -> serde_json::Map<String, serde_json::Value> {
        let mut tags = serde_json::Map::new();
        if let Some(Value::Map(user_tags)) = user_tags {
            for (key, value) in user_tags {
                if let Value::String(v) = value {
                    tags.insert(key.clone(), json!(v));
                }
            }
        }
        tags
    }

    /// Parse the ARM tags object into a map
    fn parse_tags(
        &self,
        tags: &serde_json::Map<String, serde_json::Value>,
    ) -> HashMap<String, Value> {
        tags.iter()
            .filter_map(|(key, value)| {
                value
                    .as_str()
                    .map(|v| (key.clone(), Value::String(v.to_string())))
            })
            .collect()
    }
}

fn missing_attributes(address: &ResourceAddress, names: &[&str]) -> ProviderError {
    ProviderError::new(format!("Missing required attributes: {}", names.join(", ")))
        .for_resource(address.clone())
}

/// Copy dot-separated `paths` present in `current` into `body`
///
/// Paths the body already sets are left alone.
fn preserve_paths(paths: &[&str], current: &serde_json::Value, body: &mut serde_json::Value) {
    let Some(target) = body.as_object_mut() else {
        return;
    };
    for path in paths {
        let pointer = format!("/{}", path.replace('.', "/"));
        let Some(value) = current.pointer(&pointer) else {
            continue;
        };
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if lookup_path(target, &segments).is_none() {
            log::debug!("carrying over {} from the current body", path);
            insert_path(target, &segments, value.clone());
        }
    }
}

fn lookup_path<'a>(
    target: &'a serde_json::Map<String, serde_json::Value>,
    path: &[String],
) -> Option<&'a serde_json::Value> {
    let (first, rest) = path.split_first()?;
    let value = target.get(first)?;
    if rest.is_empty() {
        Some(value)
    } else {
        lookup_path(value.as_object()?, rest)
    }
}

/// Insert a value at a nested path, creating intermediate objects
fn insert_path(
    target: &mut serde_json::Map<String, serde_json::Value>,
    path: &[String],
    value: serde_json::Value,
) {
    match path {
        [] => {}
        [last] => {
            target.insert(last.clone(), value);
        }
        [first, rest @ ..] => {
            let entry = target
                .entry(first.clone())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if !entry.is_object() {
                *entry = serde_json::Value::Object(serde_json::Map::new());
            }
            if let Some(child) = entry.as_object_mut() {
                insert_path(child, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::resources::{StorageAccountId, SubnetId};

    const SUB: &str = "12345678-1234-9876-4563-123456789012";

    /// In-memory resource manager. IDs are compared case-insensitively.
    #[derive(Default)]
    struct FakeControlPlane {
        resources: Mutex<HashMap<String, serde_json::Value>>,
        puts: Mutex<Vec<(String, serde_json::Value)>>,
        statuses: Mutex<VecDeque<OperationStatus>>,
        put_delay: Option<Duration>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeControlPlane {
        fn with_put_delay(delay: Duration) -> Self {
            Self {
                put_delay: Some(delay),
                ..Default::default()
            }
        }

        fn script(&self, statuses: Vec<OperationStatus>) {
            self.statuses.lock().unwrap().extend(statuses);
        }

        fn insert(&self, id: &str, body: serde_json::Value) {
            self.resources
                .lock()
                .unwrap()
                .insert(id.to_lowercase(), body);
        }

        fn contains(&self, id: &str) -> bool {
            self.resources
                .lock()
                .unwrap()
                .contains_key(&id.to_lowercase())
        }

        fn last_put(&self) -> (String, serde_json::Value) {
            self.puts.lock().unwrap().last().cloned().unwrap()
        }

        fn put_count(&self) -> usize {
            self.puts.lock().unwrap().len()
        }

        fn operation(&self, id: &str) -> Operation {
            if self.statuses.lock().unwrap().is_empty() {
                Operation::Completed
            } else {
                Operation::Pending {
                    status_url: format!("{}/operationResults/1", id),
                }
            }
        }
    }

    #[async_trait]
    impl ControlPlane for FakeControlPlane {
        async fn get(
            &self,
            id: &str,
            _api_version: &str,
        ) -> ProviderResult<Option<serde_json::Value>> {
            Ok(self
                .resources
                .lock()
                .unwrap()
                .get(&id.to_lowercase())
                .cloned())
        }

        async fn create_or_update(
            &self,
            id: &str,
            _api_version: &str,
            body: serde_json::Value,
        ) -> ProviderResult<Operation> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.put_delay {
                tokio::time::sleep(delay).await;
            }
            self.puts
                .lock()
                .unwrap()
                .push((id.to_string(), body.clone()));
            self.insert(id, body);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.operation(id))
        }

        async fn delete(&self, id: &str, _api_version: &str) -> ProviderResult<Operation> {
            self.resources.lock().unwrap().remove(&id.to_lowercase());
            Ok(self.operation(id))
        }

        async fn operation_status(&self, _status_url: &str) -> ProviderResult<OperationStatus> {
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(OperationStatus::Succeeded))
        }
    }

    fn provider(fake: Arc<FakeControlPlane>) -> ArmProvider {
        let config = ProviderConfig::new(SUB)
            .with_poll_interval(Duration::from_millis(1))
            .with_max_poll_attempts(5);
        ArmProvider::new(config, fake).unwrap()
    }

    fn storage_account(name: &str) -> Resource {
        Resource::new("storage_account", name)
            .with_attribute("resource_group", "Storage-RG")
            .with_attribute("location", "West Europe")
            .with_attribute("account_kind", "azure.Kind.StorageV2")
            .with_attribute("sku_name", "Standard_LRS")
            .with_attribute("https_traffic_only_enabled", Value::Bool(true))
            .with_attribute(
                "tags",
                Value::Map([("env".to_string(), Value::from("prod"))].into()),
            )
    }

    fn subnet(name: &str, vnet: &str) -> Resource {
        Resource::new("subnet", name)
            .with_attribute("resource_group", "network-rg")
            .with_attribute("virtual_network_name", vnet)
            .with_attribute("address_prefix", "10.0.1.0/24")
    }

    #[tokio::test]
    async fn test_create_storage_account() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());

        let state = provider
            .create_resource(storage_account("LogsAccount"))
            .await
            .unwrap();

        let expected_id = StorageAccountId::new(SUB, "Storage-RG", "LogsAccount").id();
        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some(expected_id.as_str()));

        let (put_id, body) = fake.last_put();
        assert_eq!(put_id, expected_id);
        assert_eq!(body["location"], "westeurope");
        assert_eq!(body["kind"], "StorageV2");
        assert_eq!(body["sku"]["name"], "Standard_LRS");
        assert_eq!(body["properties"]["supportsHttpsTrafficOnly"], true);
        assert_eq!(body["tags"]["env"], "prod");

        assert_eq!(
            state.attributes.get("name"),
            Some(&Value::from("LogsAccount"))
        );
        assert_eq!(
            state.attributes.get("resource_group"),
            Some(&Value::from("Storage-RG"))
        );
        assert_eq!(
            state.attributes.get("sku_name"),
            Some(&Value::from("Standard_LRS"))
        );
        assert_eq!(
            state.attributes.get("tags"),
            Some(&Value::Map([("env".to_string(), Value::from("prod"))].into()))
        );
    }

    #[tokio::test]
    async fn test_create_reports_missing_attributes() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());

        let resource = Resource::new("storage_account", "logs").with_attribute("resource_group", "rg");
        let err = provider.create_resource(resource).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "[storage_account.logs] Missing required attributes: location, account_kind, sku_name"
        );
        assert_eq!(fake.put_count(), 0);

        let err = provider
            .create_resource(Resource::new("subnet", "web").with_attribute("resource_group", "rg"))
            .await
            .unwrap_err();
        assert!(err.message.contains("virtual_network_name"));
    }

    #[tokio::test]
    async fn test_create_existing_requires_import() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());
        fake.insert(
            &SubnetId::new(SUB, "network-rg", "vnet1", "web").id(),
            json!({"properties": {"addressPrefix": "10.0.1.0/24"}}),
        );

        let err = provider
            .create_resource(subnet("web", "vnet1"))
            .await
            .unwrap_err();
        assert!(err.message.contains("already exists"));
        assert_eq!(fake.put_count(), 0);
    }

    #[tokio::test]
    async fn test_read_malformed_identifier_fails() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake);

        let err = provider
            .read_resource(
                "subnet",
                "web",
                Some("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet1/subnets/"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.id_error().and_then(|e| e.field()), Some("subnet_name"));
        assert!(err.to_string().starts_with("[subnet.web] malformed resource ID"));
    }

    #[tokio::test]
    async fn test_read_without_identifier_or_resource_is_not_found() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake);

        let state = provider.read_resource("subnet", "web", None).await.unwrap();
        assert!(!state.exists);

        let id = SubnetId::new(SUB, "network-rg", "vnet1", "web").id();
        let state = provider
            .read_resource("subnet", "web", Some(&id))
            .await
            .unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn test_read_canonicalizes_identifier_and_keeps_value_casing() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());
        let canonical = SubnetId::new(SUB, "Network-RG", "VNet1", "WebTier").id();
        fake.insert(
            &canonical,
            json!({"properties": {"addressPrefix": "10.0.1.0/24"}}),
        );

        let lowercase_keys = format!(
            "/SUBSCRIPTIONS/{}/resourcegroups/Network-RG/providers/MICROSOFT.NETWORK/virtualnetworks/VNet1/subnets/WebTier",
            SUB
        );
        let state = provider
            .read_resource("subnet", "web", Some(&lowercase_keys))
            .await
            .unwrap();

        assert_eq!(state.identifier.as_deref(), Some(canonical.as_str()));
        assert_eq!(state.attributes.get("name"), Some(&Value::from("WebTier")));
        assert_eq!(
            state.attributes.get("virtual_network_name"),
            Some(&Value::from("VNet1"))
        );
        assert_eq!(
            state.attributes.get("resource_group"),
            Some(&Value::from("Network-RG"))
        );
        assert_eq!(
            state.attributes.get("address_prefix"),
            Some(&Value::from("10.0.1.0/24"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subnets_serialize_on_virtual_network() {
        let fake = Arc::new(FakeControlPlane::with_put_delay(Duration::from_millis(5)));
        let provider = Arc::new(provider(fake.clone()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let provider = provider.clone();
            handles.push(tokio::spawn(async move {
                provider
                    .create_resource(subnet(&format!("subnet{}", i), "vnet1"))
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().exists);
        }

        assert_eq!(fake.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(fake.put_count(), 8);
        assert_eq!(provider.locks().len(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_body() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());

        let created = provider
            .create_resource(subnet("web", "vnet1"))
            .await
            .unwrap();
        let identifier = created.identifier.clone().unwrap();

        let desired = subnet("web", "vnet1")
            .with_attribute("address_prefix", "10.0.2.0/24")
            .with_attribute("private_endpoint_network_policies", "Policies.Disabled");
        let updated = provider
            .update_resource(created.address.clone(), &identifier, desired)
            .await
            .unwrap();

        assert_eq!(
            updated.attributes.get("address_prefix"),
            Some(&Value::from("10.0.2.0/24"))
        );
        let (_, body) = fake.last_put();
        assert_eq!(body["properties"]["privateEndpointNetworkPolicies"], "Disabled");
        assert_eq!(fake.put_count(), 2);
    }

    #[tokio::test]
    async fn test_update_rejects_identity_change() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());

        let created = provider
            .create_resource(subnet("web", "vnet1"))
            .await
            .unwrap();
        let identifier = created.identifier.clone().unwrap();

        let err = provider
            .update_resource(created.address.clone(), &identifier, subnet("web", "vnet2"))
            .await
            .unwrap_err();
        assert!(err.message.contains("requires replacing"));
        assert_eq!(fake.put_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_polls_pending_operation() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());

        let created = provider
            .create_resource(subnet("web", "vnet1"))
            .await
            .unwrap();
        let identifier = created.identifier.clone().unwrap();

        fake.script(vec![
            OperationStatus::InProgress,
            OperationStatus::InProgress,
            OperationStatus::Succeeded,
        ]);
        provider
            .delete_resource(&created.address, &identifier)
            .await
            .unwrap();

        assert!(!fake.contains(&identifier));
        assert!(fake.statuses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_operation_releases_lock() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());

        fake.script(vec![
            OperationStatus::InProgress,
            OperationStatus::Failed("SubnetConflict".to_string()),
        ]);
        let err = provider
            .create_resource(subnet("web", "vnet1"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "[subnet.web] Operation failed: SubnetConflict"
        );

        let lock = tokio::time::timeout(
            Duration::from_secs(5),
            provider.locks().acquire("vnet1", "virtual_network"),
        )
        .await;
        assert!(lock.is_ok());
    }

    #[tokio::test]
    async fn test_operation_timeout() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());

        fake.script(vec![OperationStatus::InProgress; 10]);
        let err = provider
            .create_resource(subnet("web", "vnet1"))
            .await
            .unwrap_err();
        assert!(err.message.contains("timed out after 5 polls"));
    }

    #[tokio::test]
    async fn test_security_rule_enums_and_numbers() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());

        let rule = Resource::new("network_security_rule", "allow-https")
            .with_attribute("resource_group", "network-rg")
            .with_attribute("network_security_group_name", "web-nsg")
            .with_attribute("priority", Value::Int(100))
            .with_attribute("direction", "azure.Direction.Inbound")
            .with_attribute("access", "Allow")
            .with_attribute("protocol", "Tcp")
            .with_attribute("destination_port_range", "443");
        let state = provider.create_resource(rule).await.unwrap();

        let (_, body) = fake.last_put();
        assert_eq!(body["properties"]["priority"], 100);
        assert_eq!(body["properties"]["direction"], "Inbound");
        assert_eq!(body["properties"]["destinationPortRange"], "443");
        assert!(body.get("location").is_none());
        assert_eq!(
            state.attributes.get("network_security_group_name"),
            Some(&Value::from("web-nsg"))
        );
        assert_eq!(state.attributes.get("priority"), Some(&Value::Int(100)));
    }

    #[tokio::test]
    async fn test_resource_group_uses_name_as_group() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());

        let group = Resource::new("resource_group", "main")
            .with_attribute("name", "Production-RG")
            .with_attribute("location", "eastus");
        let state = provider.create_resource(group).await.unwrap();

        assert_eq!(
            state.identifier.as_deref(),
            Some(format!("/subscriptions/{}/resourceGroups/Production-RG", SUB).as_str())
        );
        assert_eq!(
            state.attributes.get("name"),
            Some(&Value::from("Production-RG"))
        );
        let (_, body) = fake.last_put();
        assert!(body.get("properties").is_none());
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake);
        let err = provider
            .read_resource("virtual_machine", "vm", None)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "[virtual_machine.vm] Unknown resource type: virtual_machine"
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let fake: Arc<dyn ControlPlane> = Arc::new(FakeControlPlane::default());
        let result = ArmProvider::new(ProviderConfig::new("not-a-uuid"), fake);
        assert!(matches!(result, Err(ConfigError::InvalidSubscription(_))));
    }

    fn virtual_network(name: &str) -> Resource {
        Resource::new("virtual_network", name)
            .with_attribute("resource_group", "network-rg")
            .with_attribute("location", "eastus")
            .with_attribute(
                "address_space",
                Value::List(vec![Value::from("10.0.0.0/16")]),
            )
    }

    #[tokio::test]
    async fn test_update_parent_keeps_child_collection() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake.clone());

        let created = provider
            .create_resource(virtual_network("vnet1"))
            .await
            .unwrap();
        let identifier = created.identifier.clone().unwrap();

        // Subnets created as separate resources live on the parent body
        let subnets = json!([{"name": "web", "properties": {"addressPrefix": "10.0.1.0/24"}}]);
        let (_, mut stored) = fake.last_put();
        stored["properties"]["subnets"] = subnets.clone();
        fake.insert(&identifier, stored);

        let desired = virtual_network("vnet1").with_attribute(
            "dns_servers",
            Value::List(vec![Value::from("10.0.0.4")]),
        );
        provider
            .update_resource(created.address.clone(), &identifier, desired)
            .await
            .unwrap();

        let (_, body) = fake.last_put();
        assert_eq!(body["properties"]["subnets"], subnets);
        assert_eq!(body["properties"]["dhcpOptions"]["dnsServers"][0], "10.0.0.4");
        assert_eq!(
            body["properties"]["addressSpace"]["addressPrefixes"][0],
            "10.0.0.0/16"
        );
    }

    #[test]
    fn test_preserve_paths_does_not_override_body() {
        let current = json!({
            "properties": {"securityRules": [{"name": "old"}], "flushConnection": true}
        });
        let mut body = json!({"properties": {"securityRules": [{"name": "new"}]}});
        preserve_paths(&["properties.securityRules"], &current, &mut body);
        assert_eq!(body["properties"]["securityRules"][0]["name"], "new");
        assert!(body["properties"].get("flushConnection").is_none());

        let mut body = json!({"location": "eastus"});
        preserve_paths(&["properties.securityRules"], &current, &mut body);
        assert_eq!(body["properties"]["securityRules"][0]["name"], "old");

        let mut body = json!({"location": "eastus"});
        preserve_paths(&["properties.securityRules"], &json!({}), &mut body);
        assert!(body.get("properties").is_none());
    }

    #[tokio::test]
    async fn test_timeout_does_not_sleep_after_last_poll() {
        let fake = Arc::new(FakeControlPlane::default());
        let config = ProviderConfig::new(SUB)
            .with_poll_interval(Duration::from_secs(60))
            .with_max_poll_attempts(1);
        let provider = ArmProvider::new(config, fake.clone()).unwrap();

        fake.script(vec![OperationStatus::InProgress; 2]);
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            provider.create_resource(subnet("web", "vnet1")),
        )
        .await
        .expect("timeout error should be returned without a final sleep");
        let err = result.unwrap_err();
        assert!(err.message.contains("timed out after 1 polls"));
    }

    #[test]
    fn test_json_numbers_to_int() {
        let fake = Arc::new(FakeControlPlane::default());
        let provider = provider(fake);
        assert_eq!(provider.json_to_value(&json!(42)), Some(Value::Int(42)));
        assert_eq!(provider.json_to_value(&json!(3.0)), Some(Value::Int(3)));
        assert_eq!(provider.json_to_value(&json!(2.5)), Some(Value::Int(2)));
        assert_eq!(provider.json_to_value(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_insert_path_creates_objects() {
        let mut body = serde_json::Map::new();
        insert_path(
            &mut body,
            &["properties".to_string(), "addressSpace".to_string(), "addressPrefixes".to_string()],
            json!(["10.0.0.0/16"]),
        );
        insert_path(
            &mut body,
            &["properties".to_string(), "dhcpOptions".to_string(), "dnsServers".to_string()],
            json!(["10.0.0.4"]),
        );
        let body = serde_json::Value::Object(body);
        assert_eq!(body["properties"]["addressSpace"]["addressPrefixes"][0], "10.0.0.0/16");
        assert_eq!(body["properties"]["dhcpOptions"]["dnsServers"][0], "10.0.0.4");
    }
}
