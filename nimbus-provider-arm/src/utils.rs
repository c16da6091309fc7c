//! Utility functions for value normalization and conversion

/// Normalize a location (e.g., "West Europe" or "azure.Location.west_europe" -> "westeurope")
pub fn normalize_location(s: &str) -> String {
    let location_part = if s.contains('.') {
        s.split('.').next_back().unwrap_or(s)
    } else {
        s
    };
    location_part
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Convert a namespaced enum value to its ARM form
/// e.g., "azure.SkuName.Standard_LRS" -> "Standard_LRS"
pub fn convert_enum_value(value: &str) -> String {
    let parts: Vec<&str> = value.split('.').collect();
    match parts.len() {
        2 => {
            if parts[0].chars().next().is_some_and(|c| c.is_uppercase()) {
                parts[1].to_string()
            } else {
                value.to_string()
            }
        }
        3 => {
            let provider = parts[0];
            let type_name = parts[1];
            if provider.chars().all(|c| c.is_lowercase())
                && type_name.chars().next().is_some_and(|c| c.is_uppercase())
            {
                parts[2].to_string()
            } else {
                value.to_string()
            }
        }
        _ => value.to_string(),
    }
}

/// Check that a subscription ID is UUID-shaped
pub fn is_uuid(s: &str) -> bool {
    regex::Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    )
    .map(|re| re.is_match(s))
    .unwrap_or(false)
}
