//! gridform resource framework
//!
//! Host-side primitives shared by the provider and the CLI: the per-invocation
//! state bag, the persisted state file, attribute schemas, list delta planning
//! and operation deadlines.
//!
//! ```text
//!  manifest ──► Schema::validate ──► ResourceData ──► Resource::create/update/...
//!                                         │
//!                                  commit │ (pending keys kept on partial)
//!                                         ▼
//!                         StateManager ◄── GlobalState (.gridform/state.json)
//! ```

pub mod action;
pub mod data;
pub mod delta;
pub mod error;
pub mod lifecycle;
pub mod schema;
pub mod state;

pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use data::{Attributes, ResourceData, is_zero};
pub use delta::{BestEffort, ListDelta};
pub use error::{CloudError, Result};
pub use lifecycle::{CrudOp, Timeouts, with_deadline};
pub use schema::{Attribute, Schema, Validator, ValueType};
pub use state::{
    GlobalState, ResourceState, ResourceStatus, StateLock, StateManager, resource_key,
};
