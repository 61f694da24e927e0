//! Resource lifecycle trait

use crate::context::ProviderContext;
use crate::error::Result;
use async_trait::async_trait;
use gridform_cloud::{ResourceData, Schema};

/// Reconciler for one resource kind
///
/// Every callback works on a [`ResourceData`] bag. `read` clears the bag id
/// when the entity no longer exists; `delete` of an absent entity succeeds.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Kind name used in manifests and state keys
    fn kind(&self) -> &'static str;

    /// Attributes the kind accepts and reports
    fn schema(&self) -> Schema;

    async fn create(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()>;

    async fn read(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()>;

    async fn update(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()>;

    async fn delete(&self, ctx: &ProviderContext, d: &mut ResourceData) -> Result<()>;

    async fn exists(&self, ctx: &ProviderContext, d: &ResourceData) -> Result<bool>;
}

/// Numeric id of the bag, 0 when unset or not numeric
pub(crate) fn numeric_id(d: &ResourceData) -> u64 {
    d.id().parse().unwrap_or(0)
}

/// Mark every declared key whose value is unchanged as applied
pub(crate) fn sync_unchanged(d: &mut ResourceData) {
    let unchanged: Vec<String> = d
        .config()
        .keys()
        .filter(|k| !d.has_change(k))
        .cloned()
        .collect();
    for key in unchanged {
        d.set_partial(&key);
    }
}
