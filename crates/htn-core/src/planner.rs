//! Depth-first HTN decomposition with backtracking.
//!
//! The planner expands the root task against a forward-simulated copy of the
//! caller's world state. A compound task tries its methods in registration
//! order; the first method whose precondition holds is expanded subtask by
//! subtask. When any subtask cannot be planned, the method is abandoned,
//! the plan buffer and simulated state fall back to what they were when the
//! method was selected, and the next method is tried. A compound task with no
//! method left fails, which in turn fails the method that named it.
//!
//! The search is bounded three ways, each of which aborts planning outright:
//! an iteration budget (primitive checks plus method attempts), a maximum
//! nesting of compound expansions, and a maximum plan length.

use contracts::{PlanStats, PlannerConfig};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::domain::{Domain, TaskId, TaskKind};
use crate::plan::Plan;
use crate::world_state::WorldState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("root task {0:?} is not registered")]
    UnknownRoot(String),
    #[error("no decomposition of {root:?} is possible from the given state")]
    NoDecomposition { root: String },
    #[error("planning exceeded its budget of {limit} iterations")]
    IterationBudgetExhausted { limit: usize },
    #[error("compound tasks nested deeper than {limit} levels")]
    DepthLimitExceeded { limit: usize },
    #[error("plan would exceed {limit} primitive tasks")]
    PlanTooLong { limit: usize },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtnPlanner;

impl HtnPlanner {
    /// Plans `root` from `world`. The caller's state is never modified.
    pub fn plan<C>(
        domain: &Domain<C>,
        world: &WorldState,
        root: &str,
        ctx: &C,
        config: &PlannerConfig,
    ) -> Result<Plan, PlanningError> {
        let root_id = domain
            .find(root)
            .ok_or_else(|| PlanningError::UnknownRoot(root.to_string()))?;

        let mut search = Search {
            domain,
            ctx,
            max_iterations: config.effective_max_iterations(),
            max_depth: config.max_depth,
            max_plan_length: config.max_plan_length,
            stats: PlanStats::default(),
        };
        let mut simulated = world.clone();
        let mut steps = Vec::new();

        let found = search.expand(root_id, &mut simulated, &mut steps, 0);
        let stats = search.stats;
        match found {
            Ok(true) => {
                let names = steps
                    .iter()
                    .map(|&id| domain.name_of(id).unwrap_or_default().to_string())
                    .collect::<Vec<_>>();
                debug!(
                    root,
                    steps = steps.len(),
                    iterations = stats.iterations,
                    backtracks = stats.backtracks,
                    "plan found"
                );
                Ok(Plan::from_search(root, steps, names, stats))
            }
            Ok(false) => {
                debug!(root, iterations = stats.iterations, "no decomposition");
                Err(PlanningError::NoDecomposition {
                    root: root.to_string(),
                })
            }
            Err(err) => {
                debug!(root, iterations = stats.iterations, error = %err, "planning aborted");
                Err(err)
            }
        }
    }
}

/// Plans one root for many start states, on a thread pool built once from
/// the config and reused by every batch.
#[derive(Debug)]
pub struct BatchPlanner {
    config: PlannerConfig,
    pool: Option<rayon::ThreadPool>,
}

impl BatchPlanner {
    /// Builds a pool only when `config.worker_threads > 1`. If the pool
    /// cannot be created, batches run sequentially.
    pub fn new(config: PlannerConfig) -> Self {
        let pool = if config.worker_threads > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.worker_threads)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!(error = %err, "planner pool unavailable, planning sequentially");
                    None
                }
            }
        } else {
            None
        };
        Self { config, pool }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Results are returned in input order.
    pub fn plan_many<C: Sync>(
        &self,
        domain: &Domain<C>,
        states: &[WorldState],
        root: &str,
        ctx: &C,
    ) -> Vec<Result<Plan, PlanningError>> {
        let config = &self.config;
        match &self.pool {
            Some(pool) if states.len() > 1 => pool.install(|| {
                states
                    .par_iter()
                    .map(|world| HtnPlanner::plan(domain, world, root, ctx, config))
                    .collect()
            }),
            _ => states
                .iter()
                .map(|world| HtnPlanner::plan(domain, world, root, ctx, config))
                .collect(),
        }
    }
}

struct Search<'a, C> {
    domain: &'a Domain<C>,
    ctx: &'a C,
    max_iterations: usize,
    max_depth: usize,
    max_plan_length: usize,
    stats: PlanStats,
}

impl<C> Search<'_, C> {
    fn tick(&mut self) -> Result<(), PlanningError> {
        self.stats.iterations += 1;
        if self.stats.iterations > self.max_iterations {
            return Err(PlanningError::IterationBudgetExhausted {
                limit: self.max_iterations,
            });
        }
        Ok(())
    }

    /// Appends a decomposition of `task` to `plan`, advancing `world`.
    /// `Ok(false)` is a local failure; on it, `plan` and `world` are left as
    /// they were on entry.
    fn expand(
        &mut self,
        task: TaskId,
        world: &mut WorldState,
        plan: &mut Vec<TaskId>,
        depth: usize,
    ) -> Result<bool, PlanningError> {
        let domain = self.domain;
        let Some(entry) = domain.task(task) else {
            return Ok(false);
        };
        match entry.kind() {
            TaskKind::Primitive(primitive) => {
                self.tick()?;
                if !primitive.precondition().is_satisfied(world, self.ctx) {
                    trace!(task = entry.name(), "primitive precondition failed");
                    return Ok(false);
                }
                if plan.len() >= self.max_plan_length {
                    return Err(PlanningError::PlanTooLong {
                        limit: self.max_plan_length,
                    });
                }
                if let Err(err) = primitive.effects().apply(world) {
                    warn!(task = entry.name(), error = %err, "effect rejected in simulation");
                    return Ok(false);
                }
                trace!(task = entry.name(), position = plan.len(), "primitive appended");
                plan.push(task);
                Ok(true)
            }
            TaskKind::Compound(compound) => {
                let depth = depth + 1;
                if depth > self.max_depth {
                    return Err(PlanningError::DepthLimitExceeded {
                        limit: self.max_depth,
                    });
                }
                self.stats.max_depth = self.stats.max_depth.max(depth);

                for (method_index, method) in compound.methods().iter().enumerate() {
                    self.tick()?;
                    if !method.precondition().is_satisfied(world, self.ctx) {
                        continue;
                    }
                    debug!(task = entry.name(), method_index, depth, "method selected");

                    let checkpoint = plan.len();
                    let mut simulated = world.clone();
                    let completed = self.expand_all(
                        entry.name(),
                        method.subtasks(),
                        &mut simulated,
                        plan,
                        depth,
                    )?;
                    if completed {
                        *world = simulated;
                        return Ok(true);
                    }
                    plan.truncate(checkpoint);
                    self.stats.backtracks += 1;
                    debug!(task = entry.name(), method_index, "method abandoned");
                }
                Ok(false)
            }
        }
    }

    fn expand_all(
        &mut self,
        parent: &str,
        subtasks: &[String],
        world: &mut WorldState,
        plan: &mut Vec<TaskId>,
        depth: usize,
    ) -> Result<bool, PlanningError> {
        for name in subtasks {
            let Some(subtask) = self.domain.find(name) else {
                warn!(parent, subtask = %name, "method names an unregistered task");
                return Ok(false);
            };
            if !self.expand(subtask, world, plan, depth)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
