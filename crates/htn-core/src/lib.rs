//! Hierarchical task network planning and execution.
//!
//! A [`Domain`] holds primitive and compound tasks. [`HtnPlanner`] turns a
//! root task plus a starting [`WorldState`] into a flat [`Plan`] of primitive
//! steps, and an [`Executor`] steps that plan one tick at a time against the
//! host's live world state. [`BatchPlanner`] keeps a worker pool for planning
//! one root against many start states.

pub mod condition;
pub mod domain;
pub mod effect;
pub mod executor;
pub mod plan;
pub mod planner;
pub mod world_state;

pub use condition::{Condition, Precondition, PredicateHook};
pub use contracts::{
    CompareOp, DomainLimits, ExecutorStatus, OpaqueRef, PlanStats, PlanSummary, PlannerConfig,
    TaskStatus, Value, ValueKind, WorldStateLimits,
};
pub use domain::{
    CompoundTask, Domain, ExecuteHook, Method, PrimitiveTask, RegistrationError, Task, TaskId,
    TaskKind,
};
pub use effect::{Effect, EffectHook, Effects};
pub use executor::Executor;
pub use plan::{Plan, ReplayError};
pub use planner::{BatchPlanner, HtnPlanner, PlanningError};
pub use world_state::{WorldState, WorldStateError};
