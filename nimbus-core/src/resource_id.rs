//! Resource ID - Parse and format hierarchical control-plane resource IDs
//!
//! Every resource managed by the control plane is addressed by a path such as
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}/...`.
//! Each resource type declares an [`IdSchema`]: the provider namespace and the
//! ordered list of literal segment keys that follow the resource group.
//! A single codec walks any schema:
//!
//! - segment keys match case-insensitively (`profiles`, `Profiles`, `PROFILES`)
//! - segment values keep their original casing
//! - formatting always uses the canonical key casing from the schema
//!
//! Typed wrappers for individual resource types are generated with
//! [`define_resource_id!`](crate::define_resource_id).

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

const SUBSCRIPTIONS_KEY: &str = "subscriptions";
const RESOURCE_GROUPS_KEY: &str = "resourceGroups";
const PROVIDERS_KEY: &str = "providers";

/// Field name of the subscription segment
pub const SUBSCRIPTION_FIELD: &str = "subscription_id";
/// Field name of the resource group segment
pub const RESOURCE_GROUP_FIELD: &str = "resource_group";
/// Field name of the provider namespace segment
pub const PROVIDER_FIELD: &str = "provider_namespace";

/// Errors produced when an ID does not match its schema.
///
/// All variants are the same condition for callers (a malformed ID); the
/// variants tell apart where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The input was empty or consisted only of slashes
    #[error("malformed resource ID: ID is empty")]
    Empty,

    /// The input did not start with '/'
    #[error("malformed resource ID: {0:?} must start with '/'")]
    MissingLeadingSlash(String),

    /// A declared segment key was absent
    #[error("malformed resource ID: missing segment '{key}' for {field}")]
    MissingSegment {
        field: &'static str,
        key: &'static str,
    },

    /// A declared segment key was present without a value
    #[error("malformed resource ID: segment '{key}' has no value for {field}")]
    MissingValue {
        field: &'static str,
        key: &'static str,
    },

    /// The provider namespace did not match the schema
    #[error("malformed resource ID: expected provider namespace '{expected}', found '{actual}'")]
    InvalidNamespace {
        expected: &'static str,
        actual: String,
    },

    /// Content remained after every declared segment was consumed
    #[error("malformed resource ID: unexpected segment '{key}'")]
    UnexpectedSegment { key: String },

    /// A value supplied for construction cannot be rendered into a path
    #[error("malformed resource ID: value {value:?} for {field} must not contain '/'")]
    InvalidValue { field: &'static str, value: String },
}

impl IdError {
    /// The field this error refers to, when it refers to one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            IdError::MissingSegment { field, .. }
            | IdError::MissingValue { field, .. }
            | IdError::InvalidValue { field, .. } => Some(*field),
            IdError::InvalidNamespace { .. } => Some(PROVIDER_FIELD),
            IdError::Empty
            | IdError::MissingLeadingSlash(_)
            | IdError::UnexpectedSegment { .. } => None,
        }
    }
}

/// One `key/value` pair following the provider namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Literal path key in canonical casing (e.g., "profiles")
    pub key: &'static str,
    /// Name of the field holding the value (e.g., "profile_name")
    pub field: &'static str,
}

impl Segment {
    pub const fn new(key: &'static str, field: &'static str) -> Self {
        Self { key, field }
    }
}

/// Declarative ID layout of one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdSchema {
    /// Resource type name (e.g., "cdn_custom_domain")
    pub name: &'static str,
    /// Provider namespace (e.g., "Microsoft.Cdn"); `None` for resource groups
    pub provider_namespace: Option<&'static str>,
    /// Segments after the namespace, outermost parent first
    pub segments: &'static [Segment],
}

impl IdSchema {
    /// Parse an ID string against this schema
    pub fn parse(&'static self, input: &str) -> Result<ResourceId, IdError> {
        if input.trim_matches('/').is_empty() {
            return Err(IdError::Empty);
        }
        let path = input
            .strip_prefix('/')
            .ok_or_else(|| IdError::MissingLeadingSlash(input.to_string()))?;
        let path = path.strip_suffix('/').unwrap_or(path);

        let mut cursor = Cursor::new(path);
        let subscription_id = cursor.take(SUBSCRIPTIONS_KEY, SUBSCRIPTION_FIELD)?;
        let resource_group = cursor.take(RESOURCE_GROUPS_KEY, RESOURCE_GROUP_FIELD)?;

        if let Some(namespace) = self.provider_namespace {
            let actual = cursor.take(PROVIDERS_KEY, PROVIDER_FIELD)?;
            if !actual.eq_ignore_ascii_case(namespace) {
                return Err(IdError::InvalidNamespace {
                    expected: namespace,
                    actual: actual.to_string(),
                });
            }
        }

        let mut values = Vec::with_capacity(self.segments.len());
        for segment in self.segments {
            values.push(cursor.take(segment.key, segment.field)?.to_string());
        }

        if let Some(key) = cursor.remaining() {
            return Err(IdError::UnexpectedSegment {
                key: key.to_string(),
            });
        }

        Ok(ResourceId {
            schema: self,
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            values,
        })
    }

    /// Build an ID from positional segment values, outermost parent first
    pub fn build<S: AsRef<str>>(
        &'static self,
        subscription_id: &str,
        resource_group: &str,
        values: &[S],
    ) -> Result<ResourceId, IdError> {
        check_value(SUBSCRIPTION_FIELD, SUBSCRIPTIONS_KEY, subscription_id)?;
        check_value(RESOURCE_GROUP_FIELD, RESOURCE_GROUPS_KEY, resource_group)?;

        if let Some(extra) = values.get(self.segments.len()) {
            return Err(IdError::UnexpectedSegment {
                key: extra.as_ref().to_string(),
            });
        }

        let mut collected = Vec::with_capacity(self.segments.len());
        for (i, segment) in self.segments.iter().enumerate() {
            let value = values.get(i).ok_or(IdError::MissingSegment {
                field: segment.field,
                key: segment.key,
            })?;
            check_value(segment.field, segment.key, value.as_ref())?;
            collected.push(value.as_ref().to_string());
        }

        Ok(ResourceId {
            schema: self,
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            values: collected,
        })
    }

    /// Render an ID in canonical form from its raw parts
    pub fn render(&self, subscription_id: &str, resource_group: &str, values: &[&str]) -> String {
        let mut out = format!(
            "/{}/{}/{}/{}",
            SUBSCRIPTIONS_KEY, subscription_id, RESOURCE_GROUPS_KEY, resource_group
        );
        if let Some(namespace) = self.provider_namespace {
            out.push_str(&format!("/{}/{}", PROVIDERS_KEY, namespace));
        }
        for (segment, value) in self.segments.iter().zip(values) {
            out.push('/');
            out.push_str(segment.key);
            out.push('/');
            out.push_str(value);
        }
        out
    }

    /// Format an ID, always using this schema's canonical key casing
    pub fn format(&self, id: &ResourceId) -> String {
        let values: Vec<&str> = id.values.iter().map(String::as_str).collect();
        self.render(&id.subscription_id, &id.resource_group, &values)
    }

    /// ID template with `{field}` placeholders
    pub fn template(&self) -> String {
        let placeholders: Vec<String> = self
            .segments
            .iter()
            .map(|s| format!("{{{}}}", s.field))
            .collect();
        let values: Vec<&str> = placeholders.iter().map(String::as_str).collect();
        self.render(
            &format!("{{{}}}", SUBSCRIPTION_FIELD),
            &format!("{{{}}}", RESOURCE_GROUP_FIELD),
            &values,
        )
    }

    /// Field names of every segment, including subscription and resource group
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = vec![SUBSCRIPTION_FIELD, RESOURCE_GROUP_FIELD];
        fields.extend(self.segments.iter().map(|s| s.field));
        fields
    }
}

fn check_value(field: &'static str, key: &'static str, value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::MissingValue { field, key });
    }
    if value.contains('/') {
        return Err(IdError::InvalidValue {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Walks the `/`-separated components of an ID pairwise
struct Cursor<'a> {
    parts: Vec<&'a str>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            parts: path.split('/').collect(),
            pos: 0,
        }
    }

    fn take(&mut self, key: &'static str, field: &'static str) -> Result<&'a str, IdError> {
        match self.parts.get(self.pos) {
            Some(found) if found.eq_ignore_ascii_case(key) => {}
            _ => return Err(IdError::MissingSegment { field, key }),
        }
        match self.parts.get(self.pos + 1) {
            Some(value) if !value.is_empty() => {
                self.pos += 2;
                Ok(value)
            }
            _ => Err(IdError::MissingValue { field, key }),
        }
    }

    fn remaining(&self) -> Option<&'a str> {
        self.parts.get(self.pos).copied()
    }
}

/// A parsed resource ID
///
/// Immutable once constructed; obtain one with [`IdSchema::parse`] or
/// [`IdSchema::build`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    schema: &'static IdSchema,
    subscription_id: String,
    resource_group: String,
    values: Vec<String>,
}

impl ResourceId {
    pub fn schema(&self) -> &'static IdSchema {
        self.schema
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// Name of the innermost resource (the resource group for resource groups)
    pub fn name(&self) -> &str {
        self.values
            .last()
            .map(String::as_str)
            .unwrap_or(&self.resource_group)
    }

    /// Segment values after the namespace, outermost parent first
    pub fn segment_values(&self) -> &[String] {
        &self.values
    }

    /// Look up a value by field name
    pub fn get(&self, field: &str) -> Option<&str> {
        match field {
            SUBSCRIPTION_FIELD => Some(&self.subscription_id),
            RESOURCE_GROUP_FIELD => Some(&self.resource_group),
            _ => self
                .schema
                .segments
                .iter()
                .position(|s| s.field == field)
                .and_then(|i| self.values.get(i))
                .map(String::as_str),
        }
    }

    /// All `(field, value)` pairs in path order
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            (SUBSCRIPTION_FIELD, self.subscription_id.as_str()),
            (RESOURCE_GROUP_FIELD, self.resource_group.as_str()),
        ];
        for (segment, value) in self.schema.segments.iter().zip(&self.values) {
            fields.push((segment.field, value.as_str()));
        }
        fields
    }

    /// Split into `(subscription_id, resource_group, segment values)`
    pub fn into_parts(self) -> (String, String, Vec<String>) {
        (self.subscription_id, self.resource_group, self.values)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.schema.format(self))
    }
}

/// Serialized as the canonical ID string
impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Define a typed resource ID backed by an [`IdSchema`]
///
/// ```ignore
/// define_resource_id! {
///     /// CDN endpoint custom domain
///     pub struct CustomDomainId("cdn_custom_domain") {
///         namespace: Some("Microsoft.Cdn"),
///         segments: ["profiles" => profile_name, "endpoints" => endpoint_name, "customdomains" => custom_domain_name],
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_resource_id {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($type_name:literal) {
            namespace: $namespace:expr,
            segments: [$($key:literal => $field:ident),* $(,)?] $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis struct $name {
            pub subscription_id: String,
            pub resource_group: String,
            $(pub $field: String,)*
        }

        impl $name {
            pub const SCHEMA: &'static $crate::resource_id::IdSchema =
                &$crate::resource_id::IdSchema {
                    name: $type_name,
                    provider_namespace: $namespace,
                    segments: &[$($crate::resource_id::Segment::new($key, stringify!($field))),*],
                };

            pub fn new(
                subscription_id: impl Into<String>,
                resource_group: impl Into<String>,
                $($field: impl Into<String>),*
            ) -> Self {
                Self {
                    subscription_id: subscription_id.into(),
                    resource_group: resource_group.into(),
                    $($field: $field.into(),)*
                }
            }

            pub fn parse(input: &str) -> Result<Self, $crate::resource_id::IdError> {
                let (subscription_id, resource_group, values) =
                    Self::SCHEMA.parse(input)?.into_parts();
                #[allow(unused_mut, unused_variables)]
                let mut values = values.into_iter();
                Ok(Self {
                    subscription_id,
                    resource_group,
                    $($field: values.next().unwrap_or_default(),)*
                })
            }

            /// Canonical ID string
            pub fn id(&self) -> String {
                Self::SCHEMA.render(
                    &self.subscription_id,
                    &self.resource_group,
                    &[$(self.$field.as_str()),*],
                )
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&self.id())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::resource_id::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}
