//! Planning-focused contract re-exports.

pub use crate::{
    CompareOp, DomainLimits, PlanStats, PlanStep, PlanSummary, PlannerConfig, Value, ValueKind,
    DEFAULT_MAX_ITERATIONS, MAX_DECOMPOSITION_DEPTH, MAX_PLAN_LENGTH,
};
