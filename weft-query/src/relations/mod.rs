//! Association resolution for eager loading.
//!
//! Resolution runs in four stages:
//! - [`Registry`] stores the declared associations between entity types
//! - [`IncludePlan`] validates an include tree and compiles it into
//!   depth-ordered fetch steps
//! - [`RelationLoader`] fetches every step with one batched query (two for
//!   many-to-many)
//! - [`GraphAssembler`] attaches the fetched rows to their parents and
//!   materializes the owned result graph
//!
//! ## Example
//!
//! ```rust,ignore
//! // Tasks with their user and the user's group
//! let tasks = resolver
//!     .query("Task")
//!     .include(IncludeSpec::model("User").include(IncludeSpec::model("Group")))
//!     .exec()
//!     .await?;
//!
//! // Products with their tags (two queries regardless of product count)
//! let products = resolver
//!     .query("Product")
//!     .include(IncludeSpec::alias("tags"))
//!     .exec()
//!     .await?;
//! ```

mod assemble;
mod include;
mod loader;
mod plan;
mod registry;
mod spec;

pub use assemble::{GraphAssembler, StepState};
pub use include::{include, IncludeSpec, IncludeTarget};
pub use loader::{Fetched, RelationLoader};
pub use plan::{IncludePlan, PlannedStep, StepId};
pub use registry::Registry;
pub use spec::{Association, AssociationKind, AssociationOptions, JoinRecord, Through};
