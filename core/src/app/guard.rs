//! Re-entrant session state flags and their scoped guard.

use std::sync::Mutex;

/// A boolean session flag readable from any thread.
#[derive(Debug, Default)]
pub struct ReentrancyFlag {
    value: Mutex<bool>,
}

impl ReentrancyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> bool {
        *self.value.lock().unwrap()
    }

    pub fn set(&self, value: bool) {
        *self.value.lock().unwrap() = value;
    }
}

/// Scoped acquisition of a `ReentrancyFlag`.
///
/// Captures the prior value and restores it on drop, so nested acquisitions
/// compose: a load-within-a-load leaves the flag true until the outermost
/// guard is released. Safe under early return and unwinding alike.
#[must_use = "the flag is restored when the guard is dropped"]
pub struct FlagGuard<'a> {
    flag: &'a ReentrancyFlag,
    prior: bool,
}

impl<'a> FlagGuard<'a> {
    pub fn acquire(flag: &'a ReentrancyFlag, value: bool) -> Self {
        let mut locked = flag.value.lock().unwrap();
        let prior = *locked;
        *locked = value;
        Self { flag, prior }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.prior);
    }
}

/// The session flags observers use to distinguish bulk/programmatic creation
/// from single interactive creation.
#[derive(Debug, Default)]
pub struct AppFlags {
    /// Set for the duration of any node creation call.
    pub creating_node: ReentrancyFlag,
    /// Set across a bulk/recursive creation burst (group expansion, project
    /// load).
    pub creating_node_tree: ReentrancyFlag,
    /// Set while a composite/scripted group plugin expands its contents.
    pub creating_group: ReentrancyFlag,
}

impl AppFlags {
    pub fn new() -> Self {
        Self::default()
    }
}
