use crate::executor::Executor;
use crate::manifest::Manifest;
use crate::planner;
use crate::utils;
use colored::Colorize;
use std::path::Path;

/// Delete every resource recorded in the state
pub async fn handle(manifest_path: &Path, config: Option<&Path>, yes: bool) -> anyhow::Result<()> {
    // Order deletes by the manifest when one exists
    let manifest = if manifest_path.exists() {
        Manifest::load(manifest_path)?
    } else {
        Manifest::default()
    };
    let store = utils::state_manager(manifest_path);
    let lock = store.acquire_lock().await?;
    let mut state = store.load().await?;

    let plan = planner::destroy_plan(&manifest, &state);
    if !plan.has_changes() {
        println!("{}", "Nothing to destroy.".dimmed());
        lock.release().await?;
        return Ok(());
    }

    println!("{}", "Resources to destroy:".red().bold());
    utils::print_plan(&plan);

    if !yes {
        println!();
        println!(
            "{}",
            "⚠ Computes are deleted permanently together with their attached disks.".yellow()
        );
        println!("{}", "→ Re-run with --yes to destroy".yellow());
        lock.release().await?;
        return Ok(());
    }

    let provider = utils::connect(config).await?;
    let result = Executor::new(&provider, &store)
        .apply(&manifest, &mut state, &plan)
        .await?;
    lock.release().await?;

    utils::print_result(&result);
    if !result.is_success() {
        anyhow::bail!("{} resource(s) could not be destroyed", result.failed.len());
    }
    Ok(())
}
