//! Preconditions: declarative comparisons against a world state, or a host
//! predicate hook standing in for them.

use std::fmt;

use contracts::{CompareOp, Value};

use crate::world_state::WorldState;

/// Host predicate evaluated against a read-only world state and the caller's
/// context.
pub type PredicateHook<C> = Box<dyn Fn(&WorldState, &C) -> bool + Send + Sync>;

/// One comparison of a world-state entry against a comparand.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Condition {
    pub fn new(key: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::Eq, value)
    }

    pub fn ne(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::Ne, value)
    }

    pub fn gt(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::Gt, value)
    }

    pub fn ge(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::Ge, value)
    }

    pub fn lt(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::Lt, value)
    }

    pub fn le(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::Le, value)
    }

    pub fn has(key: impl Into<String>) -> Self {
        Self::new(key, CompareOp::Has, Value::None)
    }

    pub fn not_has(key: impl Into<String>) -> Self {
        Self::new(key, CompareOp::NotHas, Value::None)
    }

    pub fn is_true(key: impl Into<String>) -> Self {
        Self::new(key, CompareOp::True, Value::None)
    }

    pub fn is_false(key: impl Into<String>) -> Self {
        Self::new(key, CompareOp::False, Value::None)
    }

    /// A missing key compares as the zero value of the comparand's kind.
    pub fn evaluate(&self, world: &WorldState) -> bool {
        match self.op {
            CompareOp::Has => world.has(&self.key),
            CompareOp::NotHas => !world.has(&self.key),
            CompareOp::True => world.get_bool(&self.key),
            CompareOp::False => !world.get_bool(&self.key),
            op => {
                let actual = world
                    .value(&self.key)
                    .unwrap_or_else(|| Value::zero_of(self.value.kind()));
                compare(actual, op, self.value)
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            CompareOp::Has | CompareOp::NotHas | CompareOp::True | CompareOp::False => {
                write!(f, "{} {}", self.op, self.key)
            }
            op => write!(f, "{} {} {}", self.key, op, self.value),
        }
    }
}

fn compare(actual: Value, op: CompareOp, expected: Value) -> bool {
    match (actual, expected) {
        // References only have identity.
        (Value::Ref(a), Value::Ref(b)) => match op {
            CompareOp::Eq => a == b,
            CompareOp::Ne => a != b,
            _ => false,
        },
        (Value::None, Value::None) => matches!(op, CompareOp::Eq | CompareOp::Ge | CompareOp::Le),
        _ => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => match op {
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                _ => false,
            },
            // Incomparable kinds are never equal and never ordered.
            _ => op == CompareOp::Ne,
        },
    }
}

/// Gate on a primitive task or a method. Either variant is a complete check;
/// `Always` is the absent precondition.
pub enum Precondition<C> {
    Always,
    /// Conjunction, short-circuiting on the first failing condition.
    Conditions(Vec<Condition>),
    Predicate(PredicateHook<C>),
}

impl<C> Precondition<C> {
    pub fn conditions(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::Conditions(conditions.into_iter().collect())
    }

    pub fn predicate<F>(hook: F) -> Self
    where
        F: Fn(&WorldState, &C) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Box::new(hook))
    }

    pub fn is_satisfied(&self, world: &WorldState, ctx: &C) -> bool {
        match self {
            Self::Always => true,
            Self::Conditions(conditions) => conditions.iter().all(|c| c.evaluate(world)),
            Self::Predicate(hook) => hook(world, ctx),
        }
    }

    /// The first declarative condition that does not hold. Predicates have no
    /// inspectable parts and always report `None`.
    pub fn first_failing(&self, world: &WorldState) -> Option<&Condition> {
        match self {
            Self::Conditions(conditions) => conditions.iter().find(|c| !c.evaluate(world)),
            Self::Always | Self::Predicate(_) => None,
        }
    }
}

impl<C> Default for Precondition<C> {
    fn default() -> Self {
        Self::Always
    }
}

impl<C> From<Vec<Condition>> for Precondition<C> {
    fn from(conditions: Vec<Condition>) -> Self {
        Self::Conditions(conditions)
    }
}

impl<C> From<Condition> for Precondition<C> {
    fn from(condition: Condition) -> Self {
        Self::Conditions(vec![condition])
    }
}

impl<C> fmt::Debug for Precondition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Conditions(conditions) => f.debug_tuple("Conditions").field(conditions).finish(),
            Self::Predicate(_) => f.write_str("Predicate(<hook>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::OpaqueRef;

    fn world() -> WorldState {
        let mut world = WorldState::new();
        world.set_int("ammo", 2).expect("set");
        world.set_float("health", 0.25).expect("set");
        world.set_bool("has_ammo", true).expect("set");
        world.set_ref("target", OpaqueRef(11)).expect("set");
        world
    }

    #[test]
    fn numeric_comparisons() {
        let world = world();
        assert!(Condition::gt("ammo", 0).evaluate(&world));
        assert!(Condition::ge("ammo", 2).evaluate(&world));
        assert!(!Condition::lt("ammo", 2).evaluate(&world));
        assert!(Condition::le("ammo", 2).evaluate(&world));
        assert!(Condition::eq("ammo", 2).evaluate(&world));
        assert!(Condition::ne("ammo", 3).evaluate(&world));
        assert!(Condition::lt("health", 0.5_f32).evaluate(&world));
        assert!(Condition::gt("ammo", 1.5_f32).evaluate(&world));
    }

    #[test]
    fn missing_key_compares_as_zero() {
        let world = WorldState::new();
        assert!(!Condition::gt("ammo", 0).evaluate(&world));
        assert!(Condition::eq("ammo", 0).evaluate(&world));
        assert!(Condition::eq("alerted", false).evaluate(&world));
    }

    #[test]
    fn presence_checks() {
        let world = world();
        assert!(Condition::has("ammo").evaluate(&world));
        assert!(!Condition::has("gold").evaluate(&world));
        assert!(Condition::not_has("gold").evaluate(&world));
        assert!(!Condition::not_has("ammo").evaluate(&world));
    }

    #[test]
    fn truthiness_checks() {
        let mut world = world();
        world.set_int("empty", 0).expect("set");
        assert!(Condition::is_true("has_ammo").evaluate(&world));
        assert!(Condition::is_true("ammo").evaluate(&world));
        assert!(Condition::is_false("empty").evaluate(&world));
        assert!(Condition::is_false("missing").evaluate(&world));
    }

    #[test]
    fn references_compare_by_identity_only() {
        let world = world();
        assert!(Condition::eq("target", OpaqueRef(11)).evaluate(&world));
        assert!(Condition::ne("target", OpaqueRef(12)).evaluate(&world));
        assert!(!Condition::gt("target", OpaqueRef(1)).evaluate(&world));
        assert!(!Condition::eq("target", 11).evaluate(&world));
        assert!(Condition::ne("target", 11).evaluate(&world));
    }

    #[test]
    fn conjunction_reports_first_failure() {
        let world = world();
        let precondition: Precondition<()> = Precondition::conditions([
            Condition::gt("ammo", 0),
            Condition::eq("has_ammo", false),
            Condition::has("gold"),
        ]);
        assert!(!precondition.is_satisfied(&world, &()));
        let failing = precondition.first_failing(&world).expect("failure");
        assert_eq!(failing.key, "has_ammo");
    }

    #[test]
    fn predicate_sees_context() {
        let world = world();
        let precondition = Precondition::predicate(|world: &WorldState, min: &i32| {
            world.get_int("ammo") >= *min
        });
        assert!(precondition.is_satisfied(&world, &2));
        assert!(!precondition.is_satisfied(&world, &3));
        assert!(precondition.first_failing(&world).is_none());
    }

    #[test]
    fn always_and_empty_list_hold() {
        let world = WorldState::new();
        assert!(Precondition::<()>::Always.is_satisfied(&world, &()));
        assert!(Precondition::<()>::conditions(Vec::new()).is_satisfied(&world, &()));
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(Condition::gt("ammo", 0).to_string(), "ammo > 0");
        assert_eq!(Condition::not_has("gold").to_string(), "not_has gold");
    }
}
