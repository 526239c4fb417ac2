use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub name: String,
    pub index: usize,
}

impl UnitId {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One isolable step of a larger computation, replayable on its own.
///
/// The captured input lives inside the implementor and is never shared
/// with another unit. `invoke` replays the step on that input once.
pub trait ExecutionUnit {
    fn id(&self) -> &UnitId;

    /// False when the dry run never reached this unit.
    fn has_input(&self) -> bool {
        true
    }

    fn invoke(&mut self) -> anyhow::Result<()>;
}

/// Adapts a closure into an [`ExecutionUnit`] with no separate input.
pub struct FnUnit<F> {
    id: UnitId,
    work: F,
}

impl<F> FnUnit<F>
where
    F: FnMut() -> anyhow::Result<()>,
{
    pub fn new(name: impl Into<String>, index: usize, work: F) -> Self {
        Self {
            id: UnitId::new(name, index),
            work,
        }
    }
}

impl<F> ExecutionUnit for FnUnit<F>
where
    F: FnMut() -> anyhow::Result<()>,
{
    fn id(&self) -> &UnitId {
        &self.id
    }

    fn invoke(&mut self) -> anyhow::Result<()> {
        (self.work)()
    }
}

impl<U: ExecutionUnit + ?Sized> ExecutionUnit for Box<U> {
    fn id(&self) -> &UnitId {
        (**self).id()
    }

    fn has_input(&self) -> bool {
        (**self).has_input()
    }

    fn invoke(&mut self) -> anyhow::Result<()> {
        (**self).invoke()
    }
}
