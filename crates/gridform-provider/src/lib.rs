//! Grid platform provider for gridform
//!
//! Reconcilers for the Platform's compute, disk, ViNS, resource group and
//! port-forward resources. Each reconciler works on a [`ResourceData`] bag
//! and talks to the Platform through the [`ProviderContext`].
//!
//! # Example
//!
//! ```ignore
//! use gridform_provider::{GridProvider, ProviderContext};
//! use gridform_cloud::ResourceData;
//!
//! let ctx = ProviderContext::connect(&config).await?;
//! let provider = GridProvider::new(ctx);
//!
//! let mut d = ResourceData::new(attributes);
//! provider.create("compute", &mut d).await?;
//! let state = d.commit("compute");
//! ```
//!
//! [`ResourceData`]: gridform_cloud::ResourceData

pub mod compute;
pub mod context;
pub mod disk;
pub mod error;
pub mod flatten;
pub mod pfw;
pub mod provider;
pub mod resolver;
pub mod resource;
pub mod rg;
pub mod schema;
pub mod userdata;
pub mod vins;

pub use compute::ComputeResource;
pub use context::ProviderContext;
pub use disk::DiskResource;
pub use error::{ProviderError, Result};
pub use pfw::PfwResource;
pub use provider::{GridProvider, Registry};
pub use resource::Resource;
pub use rg::RgResource;
pub use userdata::SshKey;
pub use vins::VinsResource;
