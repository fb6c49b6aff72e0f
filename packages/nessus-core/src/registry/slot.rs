use std::sync::Arc;

/// Where a collection stands. Emptiness says nothing about whether a
/// collection was fetched: a `Loaded` collection may legitimately be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    /// A fetch started and has not settled. Only observable if the load
    /// future was dropped midway.
    Loading,
    Loaded,
}

/// One registry entry: a value plus its load state. The value is only ever
/// replaced as a whole.
#[derive(Debug)]
pub struct Slot<V> {
    state: LoadState,
    value: V,
}

pub type Collection<T> = Slot<Vec<Arc<T>>>;

impl<V: Default> Default for Slot<V> {
    fn default() -> Self {
        Self {
            state: LoadState::Unloaded,
            value: V::default(),
        }
    }
}

impl<V> Slot<V> {
    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn needs_fetch(&self) -> bool {
        self.state != LoadState::Loaded
    }

    pub fn get(&self) -> &V {
        &self.value
    }

    /// Marks a fetch as started, returning the state to restore on failure.
    pub(crate) fn begin(&mut self) -> LoadState {
        let previous = self.state;
        self.state = LoadState::Loading;
        previous
    }

    pub(crate) fn commit(&mut self, value: V) {
        self.value = value;
        self.state = LoadState::Loaded;
    }

    /// Leaves the value untouched and restores the previous state.
    pub(crate) fn abort(&mut self, previous: LoadState) {
        self.state = previous;
    }
}
