//! gridform Platform client
//!
//! Thin async client for the Platform's form-encoded HTTP API plus the
//! decoders that turn its JSON responses into typed records.
//!
//! ```text
//! reconciler ──► PlatformClient::post(endpoint, params) ──► raw body
//!                        │                                     │
//!                 HttpPlatform (reqwest)               models::decode::<T>
//!                 MockPlatform (feature "mock")
//! ```
//!
//! # Example
//!
//! ```ignore
//! use gridform_platform::{endpoints, HttpPlatform, Params, PlatformClient};
//!
//! let platform = HttpPlatform::new(&config)?;
//! let body = platform
//!     .post(endpoints::COMPUTE_GET, &Params::new().with("computeId", 9001))
//!     .await?;
//! let compute: ComputeRecord = models::decode(endpoints::COMPUTE_GET, &body)?;
//! ```

mod auth;
pub mod client;
pub mod endpoints;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod params;

pub use auth::AuthToken;
pub use client::{HttpPlatform, HttpPlatformOptions, PlatformClient};
pub use error::{PlatformError, Result};
pub use models::{
    AccountEntry, ComputeRecord, DiskKind, DiskRecord, GuestLogin, InterfaceRecord,
    LocationEntry, PfwRuleRecord, RgComputeEntry, RgRecord, VinsRecord, VinsSearchEntry,
};
pub use params::Params;
pub use reqwest::Method;
