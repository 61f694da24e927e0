use crate::manifest::Manifest;
use crate::planner;
use crate::utils;
use colored::Colorize;
use gridform_provider::Registry;
use std::path::Path;

/// Show what `apply` would change. Works offline from the saved state.
pub async fn handle(manifest_path: &Path) -> anyhow::Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let store = utils::state_manager(manifest_path);
    let state = store.load().await?;

    let plan = planner::build_plan(&Registry::default(), &manifest, &state)?;
    if !plan.has_changes() {
        println!("{}", "No changes. Resources match the manifest.".green());
        return Ok(());
    }

    println!("{}", "Planned changes:".bold());
    utils::print_plan(&plan);
    Ok(())
}
