//! Effects applied when a primitive task completes, both during forward
//! simulation and on the live world state.

use std::fmt;

use contracts::Value;

use crate::world_state::{WorldState, WorldStateError};

pub type EffectHook = Box<dyn Fn(&mut WorldState) + Send + Sync>;

/// Write of `value` to `key`: either replacing the entry or adding to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub key: String,
    pub value: Value,
    pub increment: bool,
}

impl Effect {
    pub fn set(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            increment: false,
        }
    }

    /// Adds `amount` to a numeric entry; an absent entry starts from zero.
    pub fn increment(key: impl Into<String>, amount: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: amount.into(),
            increment: true,
        }
    }

    pub fn apply(&self, world: &mut WorldState) -> Result<(), WorldStateError> {
        if self.increment {
            world.increment(&self.key, self.value).map(|_| ())
        } else {
            world.set(&self.key, self.value)
        }
    }
}

/// What a primitive does to the world once it succeeds.
#[derive(Default)]
pub enum Effects {
    #[default]
    None,
    /// Applied in order.
    List(Vec<Effect>),
    Hook(EffectHook),
}

impl Effects {
    pub fn list(effects: impl IntoIterator<Item = Effect>) -> Self {
        Self::List(effects.into_iter().collect())
    }

    pub fn hook<F>(hook: F) -> Self
    where
        F: Fn(&mut WorldState) + Send + Sync + 'static,
    {
        Self::Hook(Box::new(hook))
    }

    /// Applies the whole list or none of it: the first rejected write
    /// leaves `world` as it was and is returned.
    pub fn apply(&self, world: &mut WorldState) -> Result<(), WorldStateError> {
        match self {
            Self::None => Ok(()),
            Self::List(effects) => {
                let mut staged = world.clone();
                for effect in effects {
                    effect.apply(&mut staged)?;
                }
                *world = staged;
                Ok(())
            }
            Self::Hook(hook) => {
                hook(world);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Effects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::List(effects) => f.debug_tuple("List").field(effects).finish(),
            Self::Hook(_) => f.write_str("Hook(<hook>)"),
        }
    }
}

impl From<Vec<Effect>> for Effects {
    fn from(effects: Vec<Effect>) -> Self {
        Self::List(effects)
    }
}
