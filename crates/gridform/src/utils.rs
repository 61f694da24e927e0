use colored::Colorize;
use gridform_cloud::{ActionType, ApplyResult, Attributes, Plan, ResourceState, StateManager};
use gridform_provider::{GridProvider, ProviderContext, Registry};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Directory holding the manifest; the state directory lives beside it
pub fn project_root(manifest: &Path) -> PathBuf {
    match manifest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn state_manager(manifest: &Path) -> StateManager {
    StateManager::new(project_root(manifest))
}

/// Load the provider configuration and authenticate
pub async fn connect(config: Option<&Path>) -> anyhow::Result<GridProvider> {
    let config = gridform_config::load(config)?;
    println!(
        "{} {} ({})",
        "Connecting to".blue(),
        config.controller_url.cyan(),
        config.authenticator()
    );
    let ctx = ProviderContext::connect(&config).await?;
    Ok(GridProvider::new(ctx))
}

pub fn print_plan(plan: &Plan) {
    for action in &plan.actions {
        let address = action.address();
        let keys = action.keys.join(", ");
        match action.action_type {
            ActionType::Create => println!("  {} {}", "+".green().bold(), address.green()),
            ActionType::Update => {
                println!("  {} {} ({})", "~".yellow().bold(), address.yellow(), keys)
            }
            ActionType::Replace => println!(
                "  {} {} ({} forces replacement)",
                "-/+".red().bold(),
                address.red(),
                keys
            ),
            ActionType::Delete => {
                let id = action.resource_id.as_deref().unwrap_or("?");
                println!("  {} {} (id {})", "-".red().bold(), address.red(), id)
            }
            ActionType::NoOp => println!("  {} {}", "=".dimmed(), address.dimmed()),
        }
    }
    println!();
    println!("{} {}", "Plan:".bold(), plan.summary());
}

pub fn print_result(result: &ApplyResult) {
    for ok in &result.succeeded {
        println!("  {} {} {}", "✓".green(), ok.address.cyan(), ok.message);
    }
    for failed in &result.failed {
        println!(
            "  {} {} {}",
            "✗".red(),
            failed.address.cyan(),
            failed.error.as_deref().unwrap_or("").red()
        );
    }
    println!();
    println!(
        "{} succeeded, {} failed ({} ms)",
        result.succeeded.len(),
        result.failed.len(),
        result.duration_ms
    );
}

/// Attributes of a resource with sensitive values masked
pub fn displayed_attributes(registry: &Registry, resource: &ResourceState) -> Attributes {
    let sensitive: Vec<&str> = registry
        .schema(&resource.resource_type)
        .map(|schema| schema.sensitive_keys().collect())
        .unwrap_or_default();

    resource
        .attributes
        .iter()
        .map(|(key, value)| {
            let value = if sensitive.contains(&key.as_str()) {
                Value::String("(sensitive)".to_string())
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_root() {
        assert_eq!(project_root(Path::new("gridform-manifest.yaml")), PathBuf::from("."));
        assert_eq!(
            project_root(Path::new("infra/prod/gridform-manifest.yaml")),
            PathBuf::from("infra/prod")
        );
    }

    #[test]
    fn test_sensitive_values_masked() {
        let resource = ResourceState::new("9001", "compute")
            .with_attribute("name", json!("web-1"))
            .with_attribute("guest_logins", json!([{"login": "root", "password": "s3cret"}]));

        let shown = displayed_attributes(&Registry::default(), &resource);
        assert_eq!(shown["name"], json!("web-1"));
        assert_eq!(shown["guest_logins"], json!("(sensitive)"));
    }
}
