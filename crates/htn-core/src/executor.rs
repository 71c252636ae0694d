//! Tick-driven plan executor.
//!
//! The host calls [`Executor::update`] once per frame. Each call runs the
//! current primitive's hook once: `Running` keeps the executor on the same
//! step for the next tick, `Success` applies the primitive's effect to the
//! host's world state and moves on, `Failed` stops the plan for good. A
//! `Success` whose effect the world state rejects also fails the plan.
//!
//! By default a step's precondition is not re-checked against the live world
//! before its hook runs; the planner only checked it against a simulation.
//! Hosts that want a guard against world drift between planning and execution
//! can opt in with [`Executor::with_precondition_check`].

use contracts::{ExecutorStatus, TaskStatus};
use tracing::{debug, info, warn};

use crate::domain::{Domain, TaskId};
use crate::plan::Plan;
use crate::world_state::WorldState;

#[derive(Debug)]
pub struct Executor<'d, C> {
    domain: &'d Domain<C>,
    plan: Option<Plan>,
    index: usize,
    status: ExecutorStatus,
    /// `update` calls spent on the current step.
    ticks: u32,
    check_preconditions: bool,
}

impl<'d, C> Executor<'d, C> {
    pub fn new(domain: &'d Domain<C>) -> Self {
        Self {
            domain,
            plan: None,
            index: 0,
            status: ExecutorStatus::Idle,
            ticks: 0,
            check_preconditions: false,
        }
    }

    /// Re-evaluate each step's precondition against the live world right
    /// before its hook first runs; a step that no longer qualifies fails the
    /// plan without being invoked.
    pub fn with_precondition_check(mut self, enabled: bool) -> Self {
        self.check_preconditions = enabled;
        self
    }

    /// Takes ownership of `plan` and starts it from the first step.
    pub fn set_plan(&mut self, plan: Plan) -> ExecutorStatus {
        self.plan = Some(plan);
        self.restart()
    }

    /// Rewinds the attached plan to its first step.
    pub fn reset(&mut self) -> ExecutorStatus {
        self.restart()
    }

    /// Cancels the plan. No hook is invoked.
    pub fn abort(&mut self) -> ExecutorStatus {
        if self.plan.is_some() {
            debug!(index = self.index, "plan aborted");
            self.status = ExecutorStatus::Failed;
        }
        self.status
    }

    /// Detaches the plan, leaving the executor idle.
    pub fn take_plan(&mut self) -> Option<Plan> {
        self.index = 0;
        self.ticks = 0;
        self.status = ExecutorStatus::Idle;
        self.plan.take()
    }

    pub fn status(&self) -> ExecutorStatus {
        self.status
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// The step the next `update` will run, if the plan is still running.
    pub fn current_task(&self) -> Option<TaskId> {
        if self.status != ExecutorStatus::Running {
            return None;
        }
        self.plan.as_ref().and_then(|plan| plan.get(self.index))
    }

    pub fn current_task_name(&self) -> Option<&str> {
        self.current_task().and_then(|id| self.domain.name_of(id))
    }

    /// Advances the plan by one tick. Outside `Running` this is a no-op that
    /// reports the current status.
    pub fn update(&mut self, world: &mut WorldState, ctx: &mut C) -> ExecutorStatus {
        if self.status != ExecutorStatus::Running {
            return self.status;
        }
        let Some(task) = self.current_task() else {
            self.status = ExecutorStatus::Success;
            return self.status;
        };
        let domain = self.domain;
        let Some(primitive) = domain.primitive(task) else {
            warn!(%task, index = self.index, "plan step is not a primitive of this domain");
            self.status = ExecutorStatus::Failed;
            return self.status;
        };
        let name = domain.name_of(task).unwrap_or_default();

        if self.check_preconditions
            && self.ticks == 0
            && !primitive.precondition().is_satisfied(world, ctx)
        {
            warn!(task = name, index = self.index, "precondition no longer holds");
            self.status = ExecutorStatus::Failed;
            return self.status;
        }

        match primitive.execute(world, ctx) {
            TaskStatus::Running => {
                self.ticks = self.ticks.saturating_add(1);
            }
            TaskStatus::Success => {
                if let Err(err) = primitive.effects().apply(world) {
                    warn!(task = name, index = self.index, error = %err, "step effect rejected");
                    self.status = ExecutorStatus::Failed;
                    return self.status;
                }
                let ticks = self.ticks.saturating_add(1);
                debug!(task = name, index = self.index, ticks, "step complete");
                self.index += 1;
                self.ticks = 0;
                let len = self.plan.as_ref().map(Plan::len).unwrap_or(0);
                if self.index >= len {
                    info!(steps = len, "plan complete");
                    self.status = ExecutorStatus::Success;
                }
            }
            TaskStatus::Failed => {
                warn!(task = name, index = self.index, "step failed");
                self.status = ExecutorStatus::Failed;
            }
        }
        self.status
    }

    fn restart(&mut self) -> ExecutorStatus {
        self.index = 0;
        self.ticks = 0;
        self.status = match &self.plan {
            None => ExecutorStatus::Idle,
            Some(plan) if !plan.is_valid() => ExecutorStatus::Invalid,
            Some(plan) if plan.is_empty() => ExecutorStatus::Success,
            Some(_) => ExecutorStatus::Running,
        };
        self.status
    }
}
