use crate::executor::Executor;
use crate::utils;
use colored::Colorize;
use std::path::Path;

/// Re-read every resource in the state from the Platform
pub async fn handle(manifest_path: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let store = utils::state_manager(manifest_path);
    let lock = store.acquire_lock().await?;
    let mut state = store.load().await?;

    if state.resources.is_empty() {
        println!("{}", "State is empty, nothing to refresh.".dimmed());
        lock.release().await?;
        return Ok(());
    }

    let provider = utils::connect(config).await?;
    println!(
        "{}",
        format!("Refreshing {} resource(s)...", state.resources.len()).blue()
    );
    let result = Executor::new(&provider, &store).refresh(&mut state).await?;
    lock.release().await?;

    utils::print_result(&result);
    if !result.is_success() {
        anyhow::bail!("{} resource(s) could not be read", result.failed.len());
    }
    Ok(())
}
