//! Task registry: named primitive and compound tasks, addressed by name while
//! authoring and by [`TaskId`] inside plans.
//!
//! A domain is append-only. Tasks are never removed, and the only edit allowed
//! after registration is appending methods to a compound task. Subtask names
//! in a method are resolved when planning runs, so a method may name a task
//! that is registered later.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{DomainLimits, TaskStatus};
use thiserror::Error;

use crate::condition::{Condition, Precondition};
use crate::effect::{Effect, Effects};
use crate::world_state::WorldState;

/// Execution hook of a primitive task, invoked once per executor tick.
pub type ExecuteHook<C> = Box<dyn Fn(&mut WorldState, &mut C) -> TaskStatus + Send + Sync>;

/// Stable handle of a task within its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u32);

impl TaskId {
    pub fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("task name must not be empty")]
    EmptyName,
    #[error("task name {name:?} is longer than {max_len} bytes")]
    NameTooLong { name: String, max_len: usize },
    #[error("task {0:?} is already registered")]
    DuplicateName(String),
    #[error("domain is full ({capacity} tasks)")]
    CapacityExceeded { capacity: usize },
    #[error("no task named {0:?}")]
    UnknownCompound(String),
    #[error("task {0:?} is primitive and cannot hold methods")]
    NotCompound(String),
    #[error("compound task {name:?} already holds {max} methods")]
    TooManyMethods { name: String, max: usize },
    #[error("method for {name:?} lists {count} subtasks, limit is {max}")]
    TooManySubtasks {
        name: String,
        count: usize,
        max: usize,
    },
}

// ---------------------------------------------------------------------------
// Task definitions
// ---------------------------------------------------------------------------

/// Leaf action: an execution hook plus an optional precondition and effect.
pub struct PrimitiveTask<C> {
    execute: ExecuteHook<C>,
    precondition: Precondition<C>,
    effects: Effects,
}

impl<C> PrimitiveTask<C> {
    pub fn new<F>(execute: F) -> Self
    where
        F: Fn(&mut WorldState, &mut C) -> TaskStatus + Send + Sync + 'static,
    {
        Self {
            execute: Box::new(execute),
            precondition: Precondition::Always,
            effects: Effects::None,
        }
    }

    /// A primitive whose hook succeeds on the first tick. Useful for
    /// bookkeeping steps that exist only for their effect.
    pub fn instant() -> Self {
        Self::new(|_, _| TaskStatus::Success)
    }

    pub fn with_precondition(mut self, precondition: Precondition<C>) -> Self {
        self.precondition = precondition;
        self
    }

    pub fn with_conditions(self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.with_precondition(Precondition::conditions(conditions))
    }

    pub fn with_predicate<F>(self, predicate: F) -> Self
    where
        F: Fn(&WorldState, &C) -> bool + Send + Sync + 'static,
    {
        self.with_precondition(Precondition::predicate(predicate))
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects = Effects::list(effects);
        self
    }

    pub fn with_effect_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut WorldState) + Send + Sync + 'static,
    {
        self.effects = Effects::hook(hook);
        self
    }

    pub fn execute(&self, world: &mut WorldState, ctx: &mut C) -> TaskStatus {
        (self.execute)(world, ctx)
    }

    pub fn precondition(&self) -> &Precondition<C> {
        &self.precondition
    }

    pub fn effects(&self) -> &Effects {
        &self.effects
    }
}

impl<C> fmt::Debug for PrimitiveTask<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveTask")
            .field("precondition", &self.precondition)
            .field("effects", &self.effects)
            .finish_non_exhaustive()
    }
}

/// One way of decomposing a compound task.
#[derive(Debug)]
pub struct Method<C> {
    precondition: Precondition<C>,
    subtasks: Vec<String>,
}

impl<C> Method<C> {
    pub fn precondition(&self) -> &Precondition<C> {
        &self.precondition
    }

    pub fn subtasks(&self) -> &[String] {
        &self.subtasks
    }
}

#[derive(Debug)]
pub struct CompoundTask<C> {
    methods: Vec<Method<C>>,
}

impl<C> CompoundTask<C> {
    /// Methods in registration order, which is also preference order.
    pub fn methods(&self) -> &[Method<C>] {
        &self.methods
    }
}

#[derive(Debug)]
pub enum TaskKind<C> {
    Primitive(PrimitiveTask<C>),
    Compound(CompoundTask<C>),
}

#[derive(Debug)]
pub struct Task<C> {
    name: String,
    kind: TaskKind<C>,
}

impl<C> Task<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TaskKind<C> {
        &self.kind
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TaskKind::Primitive(_))
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveTask<C>> {
        match &self.kind {
            TaskKind::Primitive(primitive) => Some(primitive),
            TaskKind::Compound(_) => None,
        }
    }

    pub fn as_compound(&self) -> Option<&CompoundTask<C>> {
        match &self.kind {
            TaskKind::Compound(compound) => Some(compound),
            TaskKind::Primitive(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

/// Registry of tasks for one planning problem family. `C` is the host
/// context type handed to every hook.
#[derive(Debug)]
pub struct Domain<C = ()> {
    tasks: Vec<Task<C>>,
    by_name: BTreeMap<String, TaskId>,
    limits: DomainLimits,
}

impl<C> Domain<C> {
    pub fn new() -> Self {
        Self::with_limits(DomainLimits::default())
    }

    pub fn with_limits(limits: DomainLimits) -> Self {
        Self {
            tasks: Vec::new(),
            by_name: BTreeMap::new(),
            limits,
        }
    }

    pub fn limits(&self) -> &DomainLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn register_primitive(
        &mut self,
        name: &str,
        primitive: PrimitiveTask<C>,
    ) -> Result<TaskId, RegistrationError> {
        self.insert(name, TaskKind::Primitive(primitive))
    }

    /// Registers a compound task with no methods yet.
    pub fn register_compound(&mut self, name: &str) -> Result<TaskId, RegistrationError> {
        self.insert(
            name,
            TaskKind::Compound(CompoundTask {
                methods: Vec::new(),
            }),
        )
    }

    /// Appends a method to `compound` and returns its index. An empty subtask
    /// list is a method that decomposes to nothing once its precondition holds.
    pub fn add_method(
        &mut self,
        compound: &str,
        precondition: Precondition<C>,
        subtasks: &[&str],
    ) -> Result<usize, RegistrationError> {
        let id = self
            .find(compound)
            .ok_or_else(|| RegistrationError::UnknownCompound(compound.to_string()))?;
        let max_methods = self.limits.max_methods_per_task;
        let max_subtasks = self.limits.max_subtasks_per_method;
        let TaskKind::Compound(task) = &mut self.tasks[id.index()].kind else {
            return Err(RegistrationError::NotCompound(compound.to_string()));
        };
        if subtasks.len() > max_subtasks {
            return Err(RegistrationError::TooManySubtasks {
                name: compound.to_string(),
                count: subtasks.len(),
                max: max_subtasks,
            });
        }
        if task.methods.len() >= max_methods {
            return Err(RegistrationError::TooManyMethods {
                name: compound.to_string(),
                max: max_methods,
            });
        }
        task.methods.push(Method {
            precondition,
            subtasks: subtasks.iter().map(|s| s.to_string()).collect(),
        });
        Ok(task.methods.len() - 1)
    }

    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.by_name.get(name).copied()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task<C>> {
        self.tasks.get(id.index())
    }

    pub fn primitive(&self, id: TaskId) -> Option<&PrimitiveTask<C>> {
        self.task(id).and_then(Task::as_primitive)
    }

    /// `false` for compound tasks and for handles this domain never issued.
    pub fn is_primitive(&self, id: TaskId) -> bool {
        self.task(id).map(Task::is_primitive).unwrap_or(false)
    }

    pub fn name_of(&self, id: TaskId) -> Option<&str> {
        self.task(id).map(Task::name)
    }

    /// Tasks in registration order with their handles.
    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &Task<C>)> {
        self.tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| (TaskId(idx as u32), task))
    }

    fn insert(&mut self, name: &str, kind: TaskKind<C>) -> Result<TaskId, RegistrationError> {
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if name.len() > self.limits.max_name_len {
            return Err(RegistrationError::NameTooLong {
                name: name.to_string(),
                max_len: self.limits.max_name_len,
            });
        }
        if self.by_name.contains_key(name) {
            return Err(RegistrationError::DuplicateName(name.to_string()));
        }
        if self.tasks.len() >= self.limits.max_tasks {
            return Err(RegistrationError::CapacityExceeded {
                capacity: self.limits.max_tasks,
            });
        }
        let id = TaskId(self.tasks.len() as u32);
        self.tasks.push(Task {
            name: name.to_string(),
            kind,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }
}

impl<C> Default for Domain<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> PrimitiveTask<()> {
        PrimitiveTask::instant()
    }

    #[test]
    fn registers_and_finds_tasks() {
        let mut domain = Domain::new();
        let aim = domain.register_primitive("aim", noop()).expect("aim");
        let engage = domain.register_compound("engage").expect("engage");

        assert_eq!(domain.find("aim"), Some(aim));
        assert_eq!(domain.find("engage"), Some(engage));
        assert_eq!(domain.find("flee"), None);
        assert!(domain.is_primitive(aim));
        assert!(!domain.is_primitive(engage));
        assert_eq!(domain.name_of(engage), Some("engage"));
        assert_eq!(domain.len(), 2);
    }

    #[test]
    fn handles_are_registration_order() {
        let mut domain = Domain::new();
        let first = domain.register_primitive("a", noop()).expect("a");
        let second = domain.register_compound("b").expect("b");
        assert_eq!(first.raw(), 0);
        assert_eq!(second.raw(), 1);
        let names = domain.tasks().map(|(_, t)| t.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut domain = Domain::new();
        domain.register_primitive("aim", noop()).expect("aim");
        assert_eq!(
            domain.register_compound("aim"),
            Err(RegistrationError::DuplicateName("aim".to_string()))
        );
        assert_eq!(domain.len(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut domain: Domain = Domain::with_limits(DomainLimits {
            max_tasks: 2,
            ..DomainLimits::default()
        });
        domain.register_primitive("a", noop()).expect("a");
        domain.register_primitive("b", noop()).expect("b");
        assert_eq!(
            domain.register_primitive("c", noop()),
            Err(RegistrationError::CapacityExceeded { capacity: 2 })
        );
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut domain: Domain = Domain::new();
        assert_eq!(
            domain.register_compound(""),
            Err(RegistrationError::EmptyName)
        );
        let long = "x".repeat(65);
        assert!(matches!(
            domain.register_compound(&long),
            Err(RegistrationError::NameTooLong { max_len: 64, .. })
        ));
    }

    #[test]
    fn methods_append_in_order() {
        let mut domain: Domain = Domain::new();
        domain.register_compound("engage").expect("engage");
        let first = domain
            .add_method("engage", Precondition::Always, &["aim", "shoot"])
            .expect("first");
        let second = domain
            .add_method("engage", Precondition::Always, &["approach", "melee"])
            .expect("second");
        assert_eq!((first, second), (0, 1));

        let id = domain.find("engage").expect("engage");
        let compound = domain.task(id).and_then(Task::as_compound).expect("compound");
        assert_eq!(compound.methods()[1].subtasks(), ["approach", "melee"]);
    }

    #[test]
    fn forward_references_are_accepted() {
        let mut domain: Domain = Domain::new();
        domain.register_compound("patrol").expect("patrol");
        domain
            .add_method("patrol", Precondition::Always, &["walk_route", "look_around"])
            .expect("method naming unregistered tasks");
    }

    #[test]
    fn method_limits_are_enforced() {
        let mut domain: Domain = Domain::new();
        domain.register_compound("busy").expect("busy");
        let nine = ["t"; 9];
        assert!(matches!(
            domain.add_method("busy", Precondition::Always, &nine),
            Err(RegistrationError::TooManySubtasks {
                count: 9,
                max: 8,
                ..
            })
        ));
        for _ in 0..8 {
            domain
                .add_method("busy", Precondition::Always, &["t"])
                .expect("within limit");
        }
        assert!(matches!(
            domain.add_method("busy", Precondition::Always, &["t"]),
            Err(RegistrationError::TooManyMethods { max: 8, .. })
        ));
    }

    #[test]
    fn methods_need_an_existing_compound() {
        let mut domain = Domain::new();
        domain.register_primitive("aim", noop()).expect("aim");
        assert_eq!(
            domain.add_method("engage", Precondition::Always, &["aim"]),
            Err(RegistrationError::UnknownCompound("engage".to_string()))
        );
        assert_eq!(
            domain.add_method("aim", Precondition::Always, &["aim"]),
            Err(RegistrationError::NotCompound("aim".to_string()))
        );
    }

    #[test]
    fn unknown_handles_are_not_primitive() {
        let domain: Domain = Domain::new();
        assert!(!domain.is_primitive(TaskId(3)));
        assert!(domain.name_of(TaskId(3)).is_none());
    }
}
