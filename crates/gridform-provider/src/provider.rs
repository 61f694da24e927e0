//! Provider registry
//!
//! Maps resource kinds to their reconcilers and runs each lifecycle call
//! under its deadline.

use crate::compute::ComputeResource;
use crate::context::ProviderContext;
use crate::disk::DiskResource;
use crate::error::{ProviderError, Result};
use crate::pfw::PfwResource;
use crate::resource::Resource;
use crate::rg::RgResource;
use crate::vins::VinsResource;
use gridform_cloud::{CrudOp, ResourceData, Schema, Timeouts, with_deadline};
use std::collections::BTreeMap;
use tracing::debug;

/// Resource kinds and their reconcilers. Needs no Platform connection, so
/// plans can be built offline.
pub struct Registry {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self {
            resources: BTreeMap::new(),
        };
        registry.register(Box::new(ComputeResource));
        registry.register(Box::new(DiskResource));
        registry.register(Box::new(VinsResource));
        registry.register(Box::new(RgResource));
        registry.register(Box::new(PfwResource));
        registry
    }
}

impl Registry {
    fn register(&mut self, resource: Box<dyn Resource>) {
        self.resources.insert(resource.kind(), resource);
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn resource(&self, kind: &str) -> Result<&dyn Resource> {
        self.resources
            .get(kind)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownKind(kind.to_string()))
    }

    pub fn schema(&self, kind: &str) -> Result<Schema> {
        Ok(self.resource(kind)?.schema())
    }
}

pub struct GridProvider {
    ctx: ProviderContext,
    timeouts: Timeouts,
    registry: Registry,
}

impl GridProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        Self {
            ctx,
            timeouts: Timeouts::default(),
            registry: Registry::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn context(&self) -> &ProviderContext {
        &self.ctx
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn resource(&self, kind: &str) -> Result<&dyn Resource> {
        self.registry.resource(kind)
    }

    pub async fn create(&self, kind: &str, d: &mut ResourceData) -> Result<()> {
        let resource = self.resource(kind)?;
        debug!(kind, "create");
        with_deadline(CrudOp::Create, &self.timeouts, resource.create(&self.ctx, d)).await
    }

    pub async fn read(&self, kind: &str, d: &mut ResourceData) -> Result<()> {
        let resource = self.resource(kind)?;
        debug!(kind, id = d.id(), "read");
        with_deadline(CrudOp::Read, &self.timeouts, resource.read(&self.ctx, d)).await
    }

    pub async fn update(&self, kind: &str, d: &mut ResourceData) -> Result<()> {
        let resource = self.resource(kind)?;
        debug!(kind, id = d.id(), "update");
        with_deadline(CrudOp::Update, &self.timeouts, resource.update(&self.ctx, d)).await
    }

    pub async fn delete(&self, kind: &str, d: &mut ResourceData) -> Result<()> {
        let resource = self.resource(kind)?;
        debug!(kind, id = d.id(), "delete");
        with_deadline(CrudOp::Delete, &self.timeouts, resource.delete(&self.ctx, d)).await
    }

    pub async fn exists(&self, kind: &str, d: &ResourceData) -> Result<bool> {
        let resource = self.resource(kind)?;
        with_deadline(CrudOp::Exists, &self.timeouts, resource.exists(&self.ctx, d)).await
    }
}
