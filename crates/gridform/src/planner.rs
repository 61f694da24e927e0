//! Plan building
//!
//! Compares each manifest resource with its persisted state. Resources in the
//! state but no longer declared are deleted first, in reverse state order;
//! declared resources follow in manifest order.

use crate::manifest::Manifest;
use gridform_cloud::{Action, ActionType, GlobalState, Plan, ResourceState};
use gridform_provider::Registry;
use std::collections::BTreeSet;

/// Manifest key of a state entry (`kind:key` → `key`)
pub fn key_of(state_key: &str) -> &str {
    state_key
        .split_once(':')
        .map(|(_, key)| key)
        .unwrap_or(state_key)
}

pub fn build_plan(
    registry: &Registry,
    manifest: &Manifest,
    state: &GlobalState,
) -> anyhow::Result<Plan> {
    let mut actions = Vec::new();

    for (state_key, resource) in state.resources.iter().rev() {
        if manifest.get(state_key).is_none() {
            actions.push(
                Action::new(ActionType::Delete, &resource.resource_type, key_of(state_key))
                    .with_id(&resource.id),
            );
        }
    }

    for declared in &manifest.resources {
        let config = declared.resolved_config(registry)?;
        let action = match state.get_resource(&declared.state_key()) {
            None => Action::new(ActionType::Create, &declared.kind, &declared.key),
            Some(prior) => {
                let schema = registry.schema(&declared.kind)?;
                let replace = schema.force_new_changes(&config, &prior.attributes);
                if !replace.is_empty() {
                    Action::new(ActionType::Replace, &declared.kind, &declared.key)
                        .with_id(&prior.id)
                        .with_keys(replace)
                } else {
                    let keys = changed_keys(schema.diff_keys(&config, &prior.attributes), prior);
                    let action_type = if keys.is_empty() {
                        ActionType::NoOp
                    } else {
                        ActionType::Update
                    };
                    Action::new(action_type, &declared.kind, &declared.key)
                        .with_id(&prior.id)
                        .with_keys(keys)
                }
            }
        };
        actions.push(action);
    }

    Ok(Plan::new(actions))
}

/// Changed keys plus those left pending by an earlier run
fn changed_keys(diff: Vec<String>, prior: &ResourceState) -> Vec<String> {
    let keys: BTreeSet<String> = diff.into_iter().chain(prior.pending.iter().cloned()).collect();
    keys.into_iter().collect()
}

/// Plan removing every resource in the state. Declared resources go in
/// reverse manifest order, the rest before them.
pub fn destroy_plan(manifest: &Manifest, state: &GlobalState) -> Plan {
    let mut actions: Vec<Action> = state
        .resources
        .iter()
        .rev()
        .filter(|(state_key, _)| manifest.get(state_key).is_none())
        .map(|(state_key, r)| {
            Action::new(ActionType::Delete, &r.resource_type, key_of(state_key)).with_id(&r.id)
        })
        .collect();

    for declared in manifest.resources.iter().rev() {
        if let Some(prior) = state.get_resource(&declared.state_key()) {
            actions.push(
                Action::new(ActionType::Delete, &declared.kind, &declared.key).with_id(&prior.id),
            );
        }
    }
    Plan::new(actions)
}
