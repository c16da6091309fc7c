use clap::{Parser, Subcommand};
use colored::Colorize;

use nimbus_core::provider::ResourceType;
use nimbus_core::resource_id::{IdSchema, ResourceId};
use nimbus_provider_arm::resources::{get_resource_config, resource_types};

#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "Inspect Azure Resource Manager resource IDs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported resource types and their ID layout
    Types,
    /// Parse a resource ID and print its fields as JSON
    Parse {
        /// Resource type (e.g., subnet). Detected from the ID when omitted
        #[arg(long = "type", short = 't')]
        resource_type: Option<String>,

        /// Resource ID
        id: String,
    },
    /// Build a resource ID from its segment values
    Format {
        /// Resource type (e.g., subnet)
        #[arg(long = "type", short = 't')]
        resource_type: String,

        /// Subscription ID
        #[arg(long)]
        subscription: String,

        /// Resource group name
        #[arg(long)]
        resource_group: String,

        /// Segment values, outermost parent first
        values: Vec<String>,
    },
    /// Rewrite a resource ID with canonical key casing
    Normalize {
        /// Resource type (e.g., subnet). Detected from the ID when omitted
        #[arg(long = "type", short = 't')]
        resource_type: Option<String>,

        /// Resource ID
        id: String,

        /// Exit with an error if the ID is not already canonical
        #[arg(long, short)]
        check: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Types => run_types(),
        Commands::Parse { resource_type, id } => run_parse(resource_type.as_deref(), &id),
        Commands::Format {
            resource_type,
            subscription,
            resource_group,
            values,
        } => run_format(&resource_type, &subscription, &resource_group, &values),
        Commands::Normalize {
            resource_type,
            id,
            check,
        } => run_normalize(resource_type.as_deref(), &id, check),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn find_schema(resource_type: &str) -> Result<&'static IdSchema, String> {
    resource_types()
        .iter()
        .find(|t| t.name() == resource_type)
        .map(|t| t.id_schema())
        .ok_or_else(|| {
            let known: Vec<&str> = resource_types().iter().map(|t| t.name()).collect();
            format!(
                "Unknown resource type '{}'. Supported types: {}",
                resource_type,
                known.join(", ")
            )
        })
}

/// Parse with the given type, or with the only type whose layout matches
fn parse_id(resource_type: Option<&str>, id: &str) -> Result<ResourceId, String> {
    if let Some(resource_type) = resource_type {
        return find_schema(resource_type)?
            .parse(id)
            .map_err(|e| e.to_string());
    }

    let mut matches: Vec<ResourceId> = resource_types()
        .iter()
        .filter_map(|t| t.id_schema().parse(id).ok())
        .collect();
    match matches.len() {
        1 => {
            let parsed = matches.remove(0);
            log::debug!("detected resource type {}", parsed.schema().name);
            Ok(parsed)
        }
        0 => Err(format!(
            "{:?} does not match any supported resource type",
            id
        )),
        _ => {
            let names: Vec<&str> = matches.iter().map(|m| m.schema().name).collect();
            Err(format!(
                "{:?} is ambiguous ({}); pass --type",
                id,
                names.join(", ")
            ))
        }
    }
}

fn id_to_json(id: &ResourceId) -> serde_json::Value {
    let mut fields = serde_json::Map::new();
    fields.insert("resource_type".to_string(), id.schema().name.into());
    if let Some(config) = get_resource_config(id.schema().name) {
        fields.insert("arm_type".to_string(), config.arm_type.into());
    }
    fields.insert("id".to_string(), serde_json::json!(id));
    for (field, value) in id.fields() {
        fields.insert(field.to_string(), value.into());
    }
    serde_json::Value::Object(fields)
}

fn run_types() -> Result<(), String> {
    for resource_type in resource_types() {
        let config = get_resource_config(resource_type.name());
        let arm_type = config.map(|c| c.arm_type).unwrap_or_default();
        let lock = config
            .and_then(|c| c.lock)
            .map(|l| format!(" (locks {} by {})", l.resource_type, l.field))
            .unwrap_or_default();
        println!(
            "{} {}{}\n  {}",
            resource_type.name().cyan().bold(),
            arm_type,
            lock.dimmed(),
            resource_type.id_schema().template()
        );
    }
    Ok(())
}

fn run_parse(resource_type: Option<&str>, id: &str) -> Result<(), String> {
    let parsed = parse_id(resource_type, id)?;
    let json = serde_json::to_string_pretty(&id_to_json(&parsed))
        .map_err(|e| format!("Failed to serialize: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn run_format(
    resource_type: &str,
    subscription: &str,
    resource_group: &str,
    values: &[String],
) -> Result<(), String> {
    let schema = find_schema(resource_type)?;
    let id = schema
        .build(subscription, resource_group, values)
        .map_err(|e| e.to_string())?;
    println!("{}", id);
    Ok(())
}

fn run_normalize(resource_type: Option<&str>, id: &str, check: bool) -> Result<(), String> {
    let canonical = parse_id(resource_type, id)?.to_string();
    if check {
        if canonical == id {
            println!("{}", "ID is canonical.".green());
            return Ok(());
        }
        println!("{} {}", "Canonical form:".yellow(), canonical);
        return Err("ID is not in canonical form".to_string());
    }
    println!("{}", canonical);
    Ok(())
}
