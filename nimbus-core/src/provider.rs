//! Provider - Trait abstracting resource operations
//!
//! A Provider defines operations for a specific control plane.
//! It is responsible for converting resources into actual API calls.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceAddress, State};
use crate::resource_id::{IdError, IdSchema};

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub address: Option<ResourceAddress>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref address) = self.address {
            write!(f, "[{}] {}", address, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            address: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, address: ResourceAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// The malformed-ID error behind this failure, if any
    pub fn id_error(&self) -> Option<&IdError> {
        self.cause.as_ref().and_then(|e| e.downcast_ref::<IdError>())
    }
}

impl From<IdError> for ProviderError {
    fn from(err: IdError) -> Self {
        ProviderError::new(err.to_string()).with_cause(err)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "storage_account")
    fn name(&self) -> &'static str;

    /// Layout of this type's control-plane resource ID
    fn id_schema(&self) -> &'static IdSchema;
}

/// Main Provider trait
///
/// Each control-plane provider implements this trait.
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "arm")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Get the current state of a resource
    ///
    /// The identifier is the resource ID recorded in state. Returns
    /// `State::not_found()` if there is no identifier or the resource is gone.
    /// A malformed identifier is an error, never a missing resource.
    fn read(
        &self,
        address: &ResourceAddress,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the control-plane resource ID
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource
    fn update(
        &self,
        address: &ResourceAddress,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    fn delete(
        &self,
        address: &ResourceAddress,
        identifier: &str,
    ) -> BoxFuture<'_, ProviderResult<()>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn read(
        &self,
        address: &ResourceAddress,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(address, identifier)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        address: &ResourceAddress,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(address, identifier, from, to)
    }

    fn delete(
        &self,
        address: &ResourceAddress,
        identifier: &str,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(address, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::define_resource_id! {
        struct MockId("mock") {
            namespace: Some("Mock.Provider"),
            segments: ["things" => thing_name],
        }
    }

    struct MockType;

    impl ResourceType for MockType {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn id_schema(&self) -> &'static IdSchema {
            MockId::SCHEMA
        }
    }

    fn read_mock(address: ResourceAddress, identifier: Option<String>) -> ProviderResult<State> {
        match identifier {
            Some(identifier) => {
                MockId::parse(&identifier)?;
                Ok(State::existing(address, Default::default()).with_identifier(identifier))
            }
            None => Ok(State::not_found(address)),
        }
    }

    // Mock Provider for testing
    struct MockProvider;

    impl Provider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![Box::new(MockType)]
        }

        fn read(
            &self,
            address: &ResourceAddress,
            identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let address = address.clone();
            let identifier = identifier.map(str::to_string);
            Box::pin(async move { read_mock(address, identifier) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let address = resource.address.clone();
            let attrs = resource.attributes.clone();
            Box::pin(async move {
                let id = MockId::new("sub", "rg", address.name.clone());
                Ok(State::existing(address, attrs).with_identifier(id.id()))
            })
        }

        fn update(
            &self,
            address: &ResourceAddress,
            _identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let address = address.clone();
            let attrs = to.attributes.clone();
            Box::pin(async move { Ok(State::existing(address, attrs)) })
        }

        fn delete(
            &self,
            _address: &ResourceAddress,
            _identifier: &str,
        ) -> BoxFuture<'_, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn mock_provider_read_returns_not_found() {
        let provider: Box<dyn Provider> = Box::new(MockProvider);
        let address = ResourceAddress::new("mock", "example");
        let state = provider.read(&address, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn mock_provider_create_returns_existing() {
        let provider = MockProvider;
        let resource = Resource::new("mock", "example");
        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        assert_eq!(
            state.identifier.as_deref(),
            Some("/subscriptions/sub/resourceGroups/rg/providers/Mock.Provider/things/example")
        );
        assert_eq!(provider.resource_types()[0].id_schema().name, "mock");
    }

    #[tokio::test]
    async fn malformed_identifier_fails_read() {
        let provider = MockProvider;
        let address = ResourceAddress::new("mock", "example");
        let err = provider
            .read(&address, Some("/subscriptions/sub/resourceGroups/rg"))
            .await
            .unwrap_err();
        assert!(err.message.starts_with("malformed resource ID"));
        assert_eq!(
            err.id_error().and_then(IdError::field),
            Some(crate::resource_id::PROVIDER_FIELD)
        );
    }

    #[test]
    fn provider_error_display_names_resource() {
        let err = ProviderError::new("boom").for_resource(ResourceAddress::new("subnet", "web"));
        assert_eq!(err.to_string(), "[subnet.web] boom");
    }
}
