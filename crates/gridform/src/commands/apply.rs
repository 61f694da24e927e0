use crate::executor::Executor;
use crate::manifest::Manifest;
use crate::planner;
use crate::utils;
use colored::Colorize;
use gridform_provider::Registry;
use std::path::Path;

pub async fn handle(manifest_path: &Path, config: Option<&Path>, yes: bool) -> anyhow::Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let store = utils::state_manager(manifest_path);
    let lock = store.acquire_lock().await?;
    let mut state = store.load().await?;

    let plan = planner::build_plan(&Registry::default(), &manifest, &state)?;
    if !plan.has_changes() {
        println!("{}", "No changes. Resources match the manifest.".green());
        lock.release().await?;
        return Ok(());
    }

    println!("{}", "Planned changes:".bold());
    utils::print_plan(&plan);

    if !yes {
        println!();
        println!("{}", "→ Re-run with --yes to apply".yellow());
        lock.release().await?;
        return Ok(());
    }

    let provider = utils::connect(config).await?;
    println!();
    println!("{}", "Applying...".blue().bold());
    let result = Executor::new(&provider, &store)
        .apply(&manifest, &mut state, &plan)
        .await?;
    lock.release().await?;

    utils::print_result(&result);
    if !result.is_success() {
        anyhow::bail!(
            "{} action(s) failed; state keeps the progress made, run apply again to resume",
            result.failed.len()
        );
    }
    Ok(())
}
