//! Data model for the transform.
//!
//! - `resource`: `Template`, `ResourceMap`, `Resource`, `ResourceType`
//! - `tree`: `PropertyTree` with explicit reference forms
//! - `sub`: `Fn::Sub` pattern parsing
//! - `function`: function descriptors and deployment preferences
//!
//! Everything here is created and consumed within a single pass; only the
//! mutated `ResourceMap` outlives it.

pub mod function;
pub mod resource;
pub mod sub;
pub mod tree;

/// Unique key of a resource inside the template.
pub type LogicalId = String;

pub use function::{DeploymentPreference, FunctionDescriptor, TrafficShiftingSettings};
pub use resource::{Resource, ResourceMap, ResourceType, Template};
pub use sub::{SubPart, SubPattern};
pub use tree::{PropertyTree, Reference, ReferenceKind};
