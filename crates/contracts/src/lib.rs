//! Cross-boundary contracts for the HTN planner, its executor, and host code.
//!
//! Everything here is plain data: scalar values stored in world states, the
//! comparison vocabulary used by conditions, status enums reported by hooks and
//! executors, capacity limits, and the serializable plan summary a host can
//! display or persist without holding on to a domain.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod execution;
pub mod planning;
mod serde_ref_string;

pub const DEFAULT_MAX_ITERATIONS: usize = 1000;
pub const MAX_DECOMPOSITION_DEPTH: usize = 32;
pub const MAX_PLAN_LENGTH: usize = 32;
pub const MAX_METHODS_PER_TASK: usize = 8;
pub const MAX_SUBTASKS_PER_METHOD: usize = 8;
pub const MAX_DOMAIN_TASKS: usize = 128;
pub const MAX_TASK_NAME_LEN: usize = 64;
pub const MAX_WORLD_STATE_ENTRIES: usize = 64;
pub const MAX_WORLD_STATE_KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Host-owned handle stored in a world state. The engine never dereferences it.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct OpaqueRef(#[serde(with = "serde_ref_string")] pub u64);

impl fmt::Display for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref:{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    None,
    Int,
    Float,
    Bool,
    Ref,
}

/// Tagged scalar used by world-state entries, condition comparands, and
/// effect payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    None,
    Int(i32),
    Float(f32),
    Bool(bool),
    Ref(OpaqueRef),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::None => ValueKind::None,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
            Self::Ref(_) => ValueKind::Ref,
        }
    }

    /// The zero-like value a read of a missing key yields for this kind.
    pub fn zero_of(kind: ValueKind) -> Self {
        match kind {
            ValueKind::None => Self::None,
            ValueKind::Int => Self::Int(0),
            ValueKind::Float => Self::Float(0.0),
            ValueKind::Bool => Self::Bool(false),
            ValueKind::Ref => Self::Ref(OpaqueRef::default()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Numeric view used for ordered comparisons. Booleans count as 0/1;
    /// references and `None` have no numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Int(v) => Some(f64::from(v)),
            Self::Float(v) => Some(f64::from(v)),
            Self::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
            Self::None | Self::Ref(_) => None,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match *self {
            Self::Int(v) => v,
            Self::Float(v) => v as i32,
            Self::Bool(v) => i32::from(v),
            Self::None | Self::Ref(_) => 0,
        }
    }

    pub fn as_f32(&self) -> f32 {
        match *self {
            Self::Int(v) => v as f32,
            Self::Float(v) => v,
            Self::Bool(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
            Self::None | Self::Ref(_) => 0.0,
        }
    }

    pub fn as_bool(&self) -> bool {
        self.is_truthy()
    }

    pub fn as_ref_handle(&self) -> OpaqueRef {
        match *self {
            Self::Ref(handle) => handle,
            _ => OpaqueRef::default(),
        }
    }

    /// `true`, any non-zero number, or any reference.
    pub fn is_truthy(&self) -> bool {
        match *self {
            Self::None => false,
            Self::Int(v) => v != 0,
            Self::Float(v) => v != 0.0,
            Self::Bool(v) => v,
            Self::Ref(_) => true,
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<OpaqueRef> for Value {
    fn from(value: OpaqueRef) -> Self {
        Self::Ref(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Ref(handle) => write!(f, "{handle}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Has,
    NotHas,
    True,
    False,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Has => "has",
            Self::NotHas => "not_has",
            Self::True => "is_true",
            Self::False => "is_false",
        };
        f.write_str(symbol)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Result of one invocation of a primitive task's execution hook.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorStatus {
    /// No plan attached.
    #[default]
    Idle,
    Running,
    Success,
    Failed,
    /// The attached plan did not come from a successful planning run.
    Invalid,
}

impl ExecutorStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Invalid)
    }
}

// ---------------------------------------------------------------------------
// Limits and configuration
// ---------------------------------------------------------------------------

/// Search bounds for one planning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlannerConfig {
    /// Primitive checks plus method attempts allowed before the search gives
    /// up. Zero selects `DEFAULT_MAX_ITERATIONS`.
    pub max_iterations: usize,
    /// Maximum nesting of compound expansions.
    pub max_depth: usize,
    pub max_plan_length: usize,
    /// Threads used by batch planning; 1 keeps everything on the caller.
    pub worker_threads: usize,
}

impl PlannerConfig {
    pub fn effective_max_iterations(&self) -> usize {
        if self.max_iterations == 0 {
            DEFAULT_MAX_ITERATIONS
        } else {
            self.max_iterations
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_depth: MAX_DECOMPOSITION_DEPTH,
            max_plan_length: MAX_PLAN_LENGTH,
            worker_threads: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DomainLimits {
    pub max_tasks: usize,
    pub max_methods_per_task: usize,
    pub max_subtasks_per_method: usize,
    pub max_name_len: usize,
}

impl Default for DomainLimits {
    fn default() -> Self {
        Self {
            max_tasks: MAX_DOMAIN_TASKS,
            max_methods_per_task: MAX_METHODS_PER_TASK,
            max_subtasks_per_method: MAX_SUBTASKS_PER_METHOD,
            max_name_len: MAX_TASK_NAME_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorldStateLimits {
    pub max_entries: usize,
    pub max_key_len: usize,
}

impl Default for WorldStateLimits {
    fn default() -> Self {
        Self {
            max_entries: MAX_WORLD_STATE_ENTRIES,
            max_key_len: MAX_WORLD_STATE_KEY_LEN,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan summaries
// ---------------------------------------------------------------------------

/// Counters collected while searching for a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlanStats {
    pub iterations: usize,
    /// Deepest compound nesting reached, root compound = 1.
    pub max_depth: usize,
    /// Methods abandoned after being selected.
    pub backtracks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanStep {
    pub index: usize,
    pub task_id: u32,
    pub name: String,
}

/// Domain-independent view of a finished plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanSummary {
    pub root: String,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub stats: PlanStats,
}

impl PlanSummary {
    pub fn task_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_serializes_with_kind_tag() {
        let encoded = serde_json::to_string(&Value::Int(3)).expect("serialize");
        assert_eq!(encoded, r#"{"kind":"int","value":3}"#);

        let none = serde_json::to_string(&Value::None).expect("serialize");
        assert_eq!(none, r#"{"kind":"none"}"#);
    }

    #[test]
    fn opaque_ref_value_uses_string_handle() {
        let value = Value::Ref(OpaqueRef(9_007_199_254_740_993));
        let encoded = serde_json::to_string(&value).expect("serialize");
        assert_eq!(encoded, r#"{"kind":"ref","value":"9007199254740993"}"#);
        let decoded: Value = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, value);
    }

    #[test]
    fn zero_values_are_falsy() {
        for kind in [ValueKind::None, ValueKind::Int, ValueKind::Float, ValueKind::Bool] {
            assert!(!Value::zero_of(kind).is_truthy(), "{kind:?}");
        }
        assert_eq!(Value::zero_of(ValueKind::Ref).kind(), ValueKind::Ref);
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Float(2.9).as_i32(), 2);
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::Ref(OpaqueRef(1)).as_f64(), None);
        assert!(Value::Int(-1).is_numeric());
        assert!(!Value::Bool(true).is_numeric());
    }

    #[test]
    fn planner_config_partial_json_fills_defaults() {
        let config: PlannerConfig =
            serde_json::from_str(r#"{"max_iterations":50}"#).expect("deserialize");
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.max_depth, MAX_DECOMPOSITION_DEPTH);
        assert_eq!(config.max_plan_length, MAX_PLAN_LENGTH);
        assert_eq!(config.worker_threads, 1);
    }

    #[test]
    fn zero_iterations_selects_default_budget() {
        let config = PlannerConfig {
            max_iterations: 0,
            ..PlannerConfig::default()
        };
        assert_eq!(config.effective_max_iterations(), DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn compare_op_uses_snake_case() {
        let encoded = serde_json::to_string(&CompareOp::NotHas).expect("serialize");
        assert_eq!(encoded, r#""not_has""#);
    }

    #[test]
    fn executor_terminal_states() {
        assert!(!ExecutorStatus::Idle.is_terminal());
        assert!(!ExecutorStatus::Running.is_terminal());
        assert!(ExecutorStatus::Success.is_terminal());
        assert!(ExecutorStatus::Failed.is_terminal());
        assert!(ExecutorStatus::Invalid.is_terminal());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn planner_config_round_trip(
                iterations in 0_usize..10_000,
                depth in 1_usize..64,
                length in 1_usize..64,
                threads in 1_usize..8,
            ) {
                let config = PlannerConfig {
                    max_iterations: iterations,
                    max_depth: depth,
                    max_plan_length: length,
                    worker_threads: threads,
                };
                let encoded = serde_json::to_string(&config).expect("serialize");
                let decoded: PlannerConfig = serde_json::from_str(&encoded).expect("deserialize");
                prop_assert_eq!(config, decoded);
            }
        }
    }
}
