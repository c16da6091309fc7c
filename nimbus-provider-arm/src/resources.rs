//! Resource type configurations for Azure Resource Manager
//!
//! This module defines:
//! - Typed resource IDs for every supported resource type
//! - Resource type definitions (implementing ResourceType trait)
//! - Mapping between configuration attributes and ARM request bodies

use heck::ToLowerCamelCase;
use nimbus_core::define_resource_id;
use nimbus_core::provider::ResourceType;
use nimbus_core::resource_id::IdSchema;

// =============================================================================
// Resource IDs
// =============================================================================

define_resource_id! {
    pub struct ResourceGroupId("resource_group") {
        namespace: None,
        segments: [],
    }
}

define_resource_id! {
    pub struct StorageAccountId("storage_account") {
        namespace: Some("Microsoft.Storage"),
        segments: ["storageAccounts" => storage_account_name],
    }
}

define_resource_id! {
    pub struct VirtualNetworkId("virtual_network") {
        namespace: Some("Microsoft.Network"),
        segments: ["virtualNetworks" => virtual_network_name],
    }
}

define_resource_id! {
    pub struct SubnetId("subnet") {
        namespace: Some("Microsoft.Network"),
        segments: [
            "virtualNetworks" => virtual_network_name,
            "subnets" => subnet_name,
        ],
    }
}

define_resource_id! {
    pub struct NetworkSecurityGroupId("network_security_group") {
        namespace: Some("Microsoft.Network"),
        segments: ["networkSecurityGroups" => network_security_group_name],
    }
}

define_resource_id! {
    pub struct NetworkSecurityRuleId("network_security_rule") {
        namespace: Some("Microsoft.Network"),
        segments: [
            "networkSecurityGroups" => network_security_group_name,
            "securityRules" => security_rule_name,
        ],
    }
}

define_resource_id! {
    pub struct CognitiveAccountId("cognitive_account") {
        namespace: Some("Microsoft.CognitiveServices"),
        segments: ["accounts" => account_name],
    }
}

define_resource_id! {
    pub struct FirewallPolicyId("firewall_policy") {
        namespace: Some("Microsoft.Network"),
        segments: ["firewallPolicies" => firewall_policy_name],
    }
}

define_resource_id! {
    pub struct FirewallPolicyRuleCollectionGroupId("firewall_policy_rule_collection_group") {
        namespace: Some("Microsoft.Network"),
        segments: [
            "firewallPolicies" => firewall_policy_name,
            "ruleCollectionGroups" => rule_collection_group_name,
        ],
    }
}

define_resource_id! {
    pub struct CdnProfileId("cdn_profile") {
        namespace: Some("Microsoft.Cdn"),
        segments: ["profiles" => profile_name],
    }
}

define_resource_id! {
    pub struct CdnEndpointId("cdn_endpoint") {
        namespace: Some("Microsoft.Cdn"),
        segments: [
            "profiles" => profile_name,
            "endpoints" => endpoint_name,
        ],
    }
}

define_resource_id! {
    pub struct CdnCustomDomainId("cdn_custom_domain") {
        namespace: Some("Microsoft.Cdn"),
        segments: [
            "profiles" => profile_name,
            "endpoints" => endpoint_name,
            "customdomains" => custom_domain_name,
        ],
    }
}

// =============================================================================
// Resource Type Definitions
// =============================================================================

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $id:ty) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn id_schema(&self) -> &'static IdSchema {
                <$id>::SCHEMA
            }
        }
    };
}

define_resource_type!(ResourceGroupType, "resource_group", ResourceGroupId);
define_resource_type!(StorageAccountType, "storage_account", StorageAccountId);
define_resource_type!(VirtualNetworkType, "virtual_network", VirtualNetworkId);
define_resource_type!(SubnetType, "subnet", SubnetId);
define_resource_type!(
    NetworkSecurityGroupType,
    "network_security_group",
    NetworkSecurityGroupId
);
define_resource_type!(
    NetworkSecurityRuleType,
    "network_security_rule",
    NetworkSecurityRuleId
);
define_resource_type!(CognitiveAccountType, "cognitive_account", CognitiveAccountId);
define_resource_type!(FirewallPolicyType, "firewall_policy", FirewallPolicyId);
define_resource_type!(
    FirewallPolicyRuleCollectionGroupType,
    "firewall_policy_rule_collection_group",
    FirewallPolicyRuleCollectionGroupId
);
define_resource_type!(CdnProfileType, "cdn_profile", CdnProfileId);
define_resource_type!(CdnEndpointType, "cdn_endpoint", CdnEndpointId);
define_resource_type!(CdnCustomDomainType, "cdn_custom_domain", CdnCustomDomainId);

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![
        Box::new(ResourceGroupType),
        Box::new(StorageAccountType),
        Box::new(VirtualNetworkType),
        Box::new(SubnetType),
        Box::new(NetworkSecurityGroupType),
        Box::new(NetworkSecurityRuleType),
        Box::new(CognitiveAccountType),
        Box::new(FirewallPolicyType),
        Box::new(FirewallPolicyRuleCollectionGroupType),
        Box::new(CdnProfileType),
        Box::new(CdnEndpointType),
        Box::new(CdnCustomDomainType),
    ]
}

// =============================================================================
// Resource Configuration
// =============================================================================

/// Mapping of one configuration attribute into the ARM body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrMapping {
    /// Attribute name in configuration (e.g., "address_prefix")
    pub name: &'static str,
    /// Dot-separated path in the ARM body; `None` means `properties.<lowerCamelCase name>`
    pub path: Option<&'static str>,
    /// Whether the attribute must be set
    pub required: bool,
    /// Whether string values may be written as namespaced enums (e.g., "Direction.Inbound")
    pub is_enum: bool,
}

impl AttrMapping {
    /// Attribute stored under `properties` with the camelCase name
    pub const fn property(name: &'static str, required: bool) -> Self {
        Self {
            name,
            path: None,
            required,
            is_enum: false,
        }
    }

    /// Attribute stored at an explicit path
    pub const fn at(name: &'static str, path: &'static str, required: bool) -> Self {
        Self {
            name,
            path: Some(path),
            required,
            is_enum: false,
        }
    }

    pub const fn enumeration(mut self) -> Self {
        self.is_enum = true;
        self
    }

    /// Path segments of this attribute in the ARM body
    pub fn arm_path(&self) -> Vec<String> {
        match self.path {
            Some(path) => path.split('.').map(str::to_string).collect(),
            None => vec!["properties".to_string(), self.name.to_lower_camel_case()],
        }
    }
}

/// The named lock an operation on a resource type takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTarget {
    /// ID field holding the locked name
    pub field: &'static str,
    /// Resource type discriminator of the lock
    pub resource_type: &'static str,
}

/// Resource type configuration
pub struct ResourceConfig {
    /// ARM resource type (e.g., "Microsoft.Network/virtualNetworks")
    pub arm_type: &'static str,
    /// API version sent with every request
    pub api_version: &'static str,
    /// Layout of the resource ID
    pub id_schema: &'static IdSchema,
    /// Attribute mappings
    pub attributes: &'static [AttrMapping],
    /// Whether the body carries a top-level `location`
    pub has_location: bool,
    /// Whether this resource type uses tags
    pub has_tags: bool,
    /// Body paths owned by child resource types, carried over from the
    /// current body on update
    pub preserve: &'static [&'static str],
    /// Lock serializing mutations of the shared parent
    pub lock: Option<LockTarget>,
}

// =============================================================================
// Resource Group
// =============================================================================

pub const RESOURCE_GROUP_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Resources/resourceGroups",
    api_version: "2022-09-01",
    id_schema: ResourceGroupId::SCHEMA,
    attributes: &[],
    has_location: true,
    has_tags: true,
    preserve: &[],
    lock: None,
};

// =============================================================================
// Storage Resources
// =============================================================================

pub const STORAGE_ACCOUNT_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Storage/storageAccounts",
    api_version: "2023-01-01",
    id_schema: StorageAccountId::SCHEMA,
    attributes: &[
        AttrMapping::at("account_kind", "kind", true).enumeration(),
        AttrMapping::at("sku_name", "sku.name", true).enumeration(),
        AttrMapping::property("access_tier", false).enumeration(),
        AttrMapping::at(
            "https_traffic_only_enabled",
            "properties.supportsHttpsTrafficOnly",
            false,
        ),
        AttrMapping::at("min_tls_version", "properties.minimumTlsVersion", false).enumeration(),
    ],
    has_location: true,
    has_tags: true,
    preserve: &[],
    lock: None,
};

// =============================================================================
// Network Resources
// =============================================================================

pub const VIRTUAL_NETWORK_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Network/virtualNetworks",
    api_version: "2023-09-01",
    id_schema: VirtualNetworkId::SCHEMA,
    attributes: &[
        AttrMapping::at(
            "address_space",
            "properties.addressSpace.addressPrefixes",
            true,
        ),
        AttrMapping::at("dns_servers", "properties.dhcpOptions.dnsServers", false),
    ],
    has_location: true,
    has_tags: true,
    preserve: &["properties.subnets"],
    lock: Some(LockTarget {
        field: "virtual_network_name",
        resource_type: "virtual_network",
    }),
};

pub const SUBNET_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Network/virtualNetworks/subnets",
    api_version: "2023-09-01",
    id_schema: SubnetId::SCHEMA,
    attributes: &[
        AttrMapping::property("address_prefix", true),
        AttrMapping::property("private_endpoint_network_policies", false).enumeration(),
    ],
    has_location: false,
    has_tags: false,
    preserve: &[],
    lock: Some(LockTarget {
        field: "virtual_network_name",
        resource_type: "virtual_network",
    }),
};

pub const NETWORK_SECURITY_GROUP_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Network/networkSecurityGroups",
    api_version: "2023-09-01",
    id_schema: NetworkSecurityGroupId::SCHEMA,
    attributes: &[],
    has_location: true,
    has_tags: true,
    preserve: &["properties.securityRules"],
    lock: Some(LockTarget {
        field: "network_security_group_name",
        resource_type: "network_security_group",
    }),
};

pub const NETWORK_SECURITY_RULE_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Network/networkSecurityGroups/securityRules",
    api_version: "2023-09-01",
    id_schema: NetworkSecurityRuleId::SCHEMA,
    attributes: &[
        AttrMapping::property("priority", true),
        AttrMapping::property("direction", true).enumeration(),
        AttrMapping::property("access", true).enumeration(),
        AttrMapping::property("protocol", true).enumeration(),
        AttrMapping::property("source_port_range", false),
        AttrMapping::property("destination_port_range", false),
        AttrMapping::property("source_address_prefix", false),
        AttrMapping::property("destination_address_prefix", false),
        AttrMapping::property("description", false),
    ],
    has_location: false,
    has_tags: false,
    preserve: &[],
    lock: Some(LockTarget {
        field: "network_security_group_name",
        resource_type: "network_security_group",
    }),
};

pub const FIREWALL_POLICY_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Network/firewallPolicies",
    api_version: "2023-09-01",
    id_schema: FirewallPolicyId::SCHEMA,
    attributes: &[
        AttrMapping::at("sku_tier", "properties.sku.tier", false).enumeration(),
        AttrMapping::at(
            "threat_intelligence_mode",
            "properties.threatIntelMode",
            false,
        )
        .enumeration(),
    ],
    has_location: true,
    has_tags: true,
    preserve: &["properties.ruleCollectionGroups"],
    lock: Some(LockTarget {
        field: "firewall_policy_name",
        resource_type: "firewall_policy",
    }),
};

pub const FIREWALL_POLICY_RULE_COLLECTION_GROUP_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Network/firewallPolicies/ruleCollectionGroups",
    api_version: "2023-09-01",
    id_schema: FirewallPolicyRuleCollectionGroupId::SCHEMA,
    attributes: &[AttrMapping::property("priority", true)],
    has_location: false,
    has_tags: false,
    preserve: &[],
    lock: Some(LockTarget {
        field: "firewall_policy_name",
        resource_type: "firewall_policy",
    }),
};

// =============================================================================
// Cognitive Services Resources
// =============================================================================

pub const COGNITIVE_ACCOUNT_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.CognitiveServices/accounts",
    api_version: "2023-05-01",
    id_schema: CognitiveAccountId::SCHEMA,
    attributes: &[
        AttrMapping::at("kind", "kind", true),
        AttrMapping::at("sku_name", "sku.name", true),
        AttrMapping::at(
            "custom_subdomain_name",
            "properties.customSubDomainName",
            false,
        ),
        AttrMapping::property("public_network_access", false).enumeration(),
    ],
    has_location: true,
    has_tags: true,
    preserve: &[],
    lock: None,
};

// =============================================================================
// CDN Resources
// =============================================================================

pub const CDN_PROFILE_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Cdn/profiles",
    api_version: "2023-05-01",
    id_schema: CdnProfileId::SCHEMA,
    attributes: &[AttrMapping::at("sku_name", "sku.name", true).enumeration()],
    has_location: true,
    has_tags: true,
    preserve: &[],
    lock: None,
};

pub const CDN_ENDPOINT_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Cdn/profiles/endpoints",
    api_version: "2023-05-01",
    id_schema: CdnEndpointId::SCHEMA,
    attributes: &[
        AttrMapping::property("origin_host_header", false),
        AttrMapping::property("origin_path", false),
        AttrMapping::property("is_http_allowed", false),
        AttrMapping::property("is_https_allowed", false),
        AttrMapping::property("is_compression_enabled", false),
    ],
    has_location: true,
    has_tags: true,
    preserve: &["properties.customDomains"],
    lock: Some(LockTarget {
        field: "endpoint_name",
        resource_type: "cdn_endpoint",
    }),
};

pub const CDN_CUSTOM_DOMAIN_CONFIG: ResourceConfig = ResourceConfig {
    arm_type: "Microsoft.Cdn/profiles/endpoints/customDomains",
    api_version: "2023-05-01",
    id_schema: CdnCustomDomainId::SCHEMA,
    attributes: &[AttrMapping::property("host_name", true)],
    has_location: false,
    has_tags: false,
    preserve: &[],
    lock: Some(LockTarget {
        field: "endpoint_name",
        resource_type: "cdn_endpoint",
    }),
};

// =============================================================================
// Config Lookup
// =============================================================================

/// Get resource configuration by type name
pub fn get_resource_config(resource_type: &str) -> Option<&'static ResourceConfig> {
    match resource_type {
        "resource_group" => Some(&RESOURCE_GROUP_CONFIG),
        "storage_account" => Some(&STORAGE_ACCOUNT_CONFIG),
        "virtual_network" => Some(&VIRTUAL_NETWORK_CONFIG),
        "subnet" => Some(&SUBNET_CONFIG),
        "network_security_group" => Some(&NETWORK_SECURITY_GROUP_CONFIG),
        "network_security_rule" => Some(&NETWORK_SECURITY_RULE_CONFIG),
        "cognitive_account" => Some(&COGNITIVE_ACCOUNT_CONFIG),
        "firewall_policy" => Some(&FIREWALL_POLICY_CONFIG),
        "firewall_policy_rule_collection_group" => {
            Some(&FIREWALL_POLICY_RULE_COLLECTION_GROUP_CONFIG)
        }
        "cdn_profile" => Some(&CDN_PROFILE_CONFIG),
        "cdn_endpoint" => Some(&CDN_ENDPOINT_CONFIG),
        "cdn_custom_domain" => Some(&CDN_CUSTOM_DOMAIN_CONFIG),
        _ => None,
    }
}
