use crate::planner::key_of;
use crate::utils;
use colored::Colorize;
use gridform_provider::Registry;
use std::path::Path;

/// Print the saved state, optionally a single `kind.key` address
pub async fn handle(manifest_path: &Path, address: Option<&str>) -> anyhow::Result<()> {
    let store = utils::state_manager(manifest_path);
    let state = store.load().await?;
    let registry = Registry::default();

    if state.resources.is_empty() {
        println!("{}", "No resources in state.".dimmed());
        return Ok(());
    }

    let mut shown = 0;
    for (state_key, resource) in &state.resources {
        let resource_address = format!("{}.{}", resource.resource_type, key_of(state_key));
        if address.is_some_and(|a| a != resource_address) {
            continue;
        }
        shown += 1;

        let status = if resource.is_partial() {
            format!("partial, pending: {}", resource.pending.join(", ")).yellow()
        } else {
            "converged".green()
        };
        println!("{} (id {}) [{}]", resource_address.cyan().bold(), resource.id, status);
        for (key, value) in utils::displayed_attributes(&registry, resource) {
            println!("    {} = {}", key, value);
        }
        println!();
    }

    if let Some(address) = address
        && shown == 0
    {
        anyhow::bail!("{} is not in the state", address);
    }
    println!("State: {}", store.state_path().display().to_string().dimmed());
    Ok(())
}
