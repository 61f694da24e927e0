//! Plan execution
//!
//! The state file is saved after every action, so an interrupted apply keeps
//! everything done so far. A failed action that made partial progress is
//! persisted with its pending keys; one that failed before changing anything
//! leaves the prior state untouched.

use crate::manifest::Manifest;
use anyhow::Context;
use gridform_cloud::{
    Action, ActionType, ApplyResult, Attributes, GlobalState, Plan, ResourceData, StateManager,
    resource_key,
};
use gridform_provider::GridProvider;
use std::time::Instant;
use tracing::{info, warn};

pub struct Executor<'a> {
    provider: &'a GridProvider,
    store: &'a StateManager,
}

impl<'a> Executor<'a> {
    pub fn new(provider: &'a GridProvider, store: &'a StateManager) -> Self {
        Self { provider, store }
    }

    pub async fn apply(
        &self,
        manifest: &Manifest,
        state: &mut GlobalState,
        plan: &Plan,
    ) -> anyhow::Result<ApplyResult> {
        let started = Instant::now();
        let mut result = ApplyResult::new();

        for action in &plan.actions {
            let outcome = match action.action_type {
                ActionType::NoOp => continue,
                ActionType::Create => self.create(manifest, state, action).await,
                ActionType::Update => self.update(manifest, state, action).await,
                ActionType::Delete => self.delete(state, action).await,
                ActionType::Replace => match self.delete(state, action).await {
                    Ok(()) => self.create(manifest, state, action).await,
                    Err(e) => Err(e),
                },
            };
            self.store.save(state).await?;

            match outcome {
                Ok(()) => {
                    info!(address = %action.address(), action = ?action.action_type, "Applied");
                    result.add_success(action.address(), describe(action.action_type).to_string());
                }
                Err(e) => {
                    warn!(address = %action.address(), error = %format!("{:#}", e), "Action failed");
                    result.add_failure(action.address(), format!("{:#}", e));
                }
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn create(
        &self,
        manifest: &Manifest,
        state: &mut GlobalState,
        action: &Action,
    ) -> anyhow::Result<()> {
        let state_key = resource_key(&action.kind, &action.key);
        let declared = manifest
            .get(&state_key)
            .with_context(|| format!("{} is not declared", action.address()))?;
        let config = declared.resolved_config(self.provider.registry())?;

        let mut d = ResourceData::new(config);
        let outcome = self.provider.create(&action.kind, &mut d).await;
        if outcome.is_ok() || d.is_partial() {
            persist(state, &state_key, d, &action.kind);
        }
        Ok(outcome?)
    }

    async fn update(
        &self,
        manifest: &Manifest,
        state: &mut GlobalState,
        action: &Action,
    ) -> anyhow::Result<()> {
        let state_key = resource_key(&action.kind, &action.key);
        let declared = manifest
            .get(&state_key)
            .with_context(|| format!("{} is not declared", action.address()))?;
        let config = declared.resolved_config(self.provider.registry())?;
        let prior = state
            .get_resource(&state_key)
            .with_context(|| format!("{} has no state", action.address()))?;

        let mut d = ResourceData::from_state(prior, config);
        let outcome = self.provider.update(&action.kind, &mut d).await;
        if outcome.is_ok() || d.is_partial() {
            persist(state, &state_key, d, &action.kind);
        }
        Ok(outcome?)
    }

    async fn delete(&self, state: &mut GlobalState, action: &Action) -> anyhow::Result<()> {
        let state_key = resource_key(&action.kind, &action.key);
        let Some(prior) = state.get_resource(&state_key) else {
            return Ok(());
        };

        let mut d = ResourceData::from_state(prior, Attributes::new());
        self.provider.delete(&action.kind, &mut d).await?;
        state.remove_resource(&state_key);
        Ok(())
    }

    /// Re-read every resource in the state. Pending keys survive; resources
    /// the Platform no longer has are dropped.
    pub async fn refresh(&self, state: &mut GlobalState) -> anyhow::Result<ApplyResult> {
        let started = Instant::now();
        let mut result = ApplyResult::new();
        let keys: Vec<String> = state.resources.keys().cloned().collect();

        for state_key in keys {
            let Some(prior) = state.get_resource(&state_key).cloned() else {
                continue;
            };
            let address = format!("{}.{}", prior.resource_type, crate::planner::key_of(&state_key));

            let mut d = ResourceData::from_state(&prior, Attributes::new());
            match self.provider.read(&prior.resource_type, &mut d).await {
                Ok(()) => match d.commit(&prior.resource_type) {
                    Some(mut observed) => {
                        observed.set_pending(prior.pending.clone());
                        state.set_resource(state_key, observed);
                        result.add_success(address, "refreshed".to_string());
                    }
                    None => {
                        warn!(address = %address, "Resource no longer exists; dropping from state");
                        state.remove_resource(&state_key);
                        result.add_success(address, "gone".to_string());
                    }
                },
                Err(e) => result.add_failure(address, e.to_string()),
            }
        }

        self.store.save(state).await?;
        result.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }
}

fn persist(state: &mut GlobalState, state_key: &str, d: ResourceData, kind: &str) {
    match d.commit(kind) {
        Some(resource) => {
            if resource.is_partial() {
                warn!(key = state_key, pending = ?resource.pending, "Saved with pending changes");
            }
            state.set_resource(state_key.to_string(), resource);
        }
        None => {
            state.remove_resource(state_key);
        }
    }
}

fn describe(action_type: ActionType) -> &'static str {
    match action_type {
        ActionType::Create => "created",
        ActionType::Update => "updated",
        ActionType::Replace => "replaced",
        ActionType::Delete => "deleted",
        ActionType::NoOp => "unchanged",
    }
}
