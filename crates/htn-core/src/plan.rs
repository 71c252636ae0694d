//! Finished plans: flat, ordered primitive task handles.

use contracts::{PlanStats, PlanStep, PlanSummary};
use thiserror::Error;

use crate::domain::{Domain, TaskId};
use crate::world_state::{WorldState, WorldStateError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("plan was not produced by a successful planning run")]
    InvalidPlan,
    #[error("step {index} refers to {task}, which is not a primitive task of this domain")]
    NotPrimitive { index: usize, task: TaskId },
    #[error("precondition of step {index} ({name}) does not hold")]
    PreconditionFailed { index: usize, name: String },
    #[error("effect of step {index} ({name}) was rejected: {source}")]
    EffectRejected {
        index: usize,
        name: String,
        source: WorldStateError,
    },
}

/// Output of a successful planning run.
///
/// A default-constructed plan is invalid. A plan produced by the planner is
/// valid even when empty: that happens when the root decomposed vacuously
/// into zero primitives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plan {
    root: String,
    steps: Vec<TaskId>,
    names: Vec<String>,
    stats: PlanStats,
    valid: bool,
}

impl Plan {
    pub(crate) fn from_search(
        root: &str,
        steps: Vec<TaskId>,
        names: Vec<String>,
        stats: PlanStats,
    ) -> Self {
        Self {
            root: root.to_string(),
            steps,
            names,
            stats,
            valid: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Name of the task the plan was generated for.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn steps(&self) -> &[TaskId] {
        &self.steps
    }

    pub fn get(&self, index: usize) -> Option<TaskId> {
        self.steps.get(index).copied()
    }

    pub fn task_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.names.iter().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &str)> {
        self.steps
            .iter()
            .copied()
            .zip(self.names.iter().map(String::as_str))
    }

    pub fn stats(&self) -> PlanStats {
        self.stats
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            root: self.root.clone(),
            steps: self
                .iter()
                .enumerate()
                .map(|(index, (task, name))| PlanStep {
                    index,
                    task_id: task.raw(),
                    name: name.to_string(),
                })
                .collect(),
            stats: self.stats,
        }
    }

    /// Re-applies the plan's effects, in order, to a copy of `start`, checking
    /// each primitive's precondition just before its effect. Returns the
    /// resulting state.
    pub fn replay<C>(
        &self,
        domain: &Domain<C>,
        start: &WorldState,
        ctx: &C,
    ) -> Result<WorldState, ReplayError> {
        if !self.valid {
            return Err(ReplayError::InvalidPlan);
        }
        let mut world = start.clone();
        for (index, &task) in self.steps.iter().enumerate() {
            let primitive = domain
                .primitive(task)
                .ok_or(ReplayError::NotPrimitive { index, task })?;
            let name = || domain.name_of(task).unwrap_or_default().to_string();
            if !primitive.precondition().is_satisfied(&world, ctx) {
                return Err(ReplayError::PreconditionFailed {
                    index,
                    name: name(),
                });
            }
            primitive
                .effects()
                .apply(&mut world)
                .map_err(|source| ReplayError::EffectRejected {
                    index,
                    name: name(),
                    source,
                })?;
        }
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PlannerConfig;

    use crate::condition::{Condition, Precondition};
    use crate::domain::PrimitiveTask;
    use crate::effect::Effect;
    use crate::planner::HtnPlanner;

    fn domain() -> Domain<()> {
        let mut domain = Domain::new();
        domain
            .register_primitive(
                "reload",
                PrimitiveTask::instant().with_effects([Effect::set("ammo", 6)]),
            )
            .expect("reload");
        domain
            .register_primitive(
                "fire",
                PrimitiveTask::instant()
                    .with_conditions([Condition::gt("ammo", 0)])
                    .with_effects([Effect::increment("ammo", -1)]),
            )
            .expect("fire");
        domain.register_compound("volley").expect("volley");
        domain
            .add_method(
                "volley",
                Precondition::Always,
                &["reload", "fire", "fire"],
            )
            .expect("method");
        domain
    }

    fn volley(domain: &Domain<()>) -> Plan {
        HtnPlanner::plan(
            domain,
            &WorldState::new(),
            "volley",
            &(),
            &PlannerConfig::default(),
        )
        .expect("plan")
    }

    #[test]
    fn default_plan_is_invalid_and_refuses_replay() {
        let plan = Plan::default();
        assert!(!plan.is_valid());
        assert!(plan.is_empty());
        assert_eq!(
            plan.replay(&domain(), &WorldState::new(), &()),
            Err(ReplayError::InvalidPlan)
        );
    }

    #[test]
    fn summary_lists_steps_in_order() {
        let domain = domain();
        let plan = volley(&domain);
        let summary = plan.summary();

        assert_eq!(summary.root, "volley");
        assert_eq!(summary.task_names(), vec!["reload", "fire", "fire"]);
        assert_eq!(summary.steps[2].index, 2);
        assert_eq!(
            summary.steps[1].task_id,
            domain.find("fire").expect("fire").raw()
        );
        assert_eq!(summary.stats, plan.stats());

        let json = serde_json::to_string(&summary).expect("serialize");
        let back: PlanSummary = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, summary);
    }

    #[test]
    fn replay_applies_effects_to_a_copy() {
        let domain = domain();
        let plan = volley(&domain);
        let start = WorldState::new();

        let end = plan.replay(&domain, &start, &()).expect("replay");
        assert_eq!(end.get_int("ammo"), 4);
        assert!(start.is_empty());
    }

    #[test]
    fn replay_reports_rejected_effects() {
        let domain = domain();
        let plan = volley(&domain);
        let mut cramped = WorldState::with_limits(contracts::WorldStateLimits {
            max_entries: 1,
            ..contracts::WorldStateLimits::default()
        });
        cramped.set_bool("cover", true).expect("set");

        assert_eq!(
            plan.replay(&domain, &cramped, &()),
            Err(ReplayError::EffectRejected {
                index: 0,
                name: "reload".to_string(),
                source: WorldStateError::CapacityExceeded {
                    key: "ammo".to_string(),
                    capacity: 1,
                },
            })
        );
    }

    #[test]
    fn replay_rejects_steps_from_another_domain() {
        let plan = volley(&domain());
        let mut other: Domain<()> = Domain::new();
        other.register_compound("reload").expect("compound");

        assert_eq!(
            plan.replay(&other, &WorldState::new(), &()),
            Err(ReplayError::NotPrimitive {
                index: 0,
                task: plan.steps()[0],
            })
        );
    }
}
