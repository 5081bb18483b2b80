//! Root set
//!
//! Execution contexts register the values they hold across a safepoint as
//! roots. The collector traces from here and rewrites each entry in place
//! when its object relocates, so a context reads back the post-cycle value
//! through the same [`RootId`].

use crate::value::Value;

/// Handle to a registered root slot
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RootId(u32);

/// Registered root values, rewritten in place by collection cycles
#[derive(Debug, Default)]
pub struct RootSet {
    slots: Vec<Option<Value>>,
    free: Vec<u32>,
}

impl RootSet {
    /// Create an empty root set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value as a root
    pub fn add(&mut self, value: Value) -> RootId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                RootId(index)
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Some(value));
                RootId(index)
            }
        }
    }

    /// Unregister a root, returning its current value
    pub fn remove(&mut self, id: RootId) -> Option<Value> {
        let value = self.slots.get_mut(id.0 as usize)?.take();
        if value.is_some() {
            self.free.push(id.0);
        }
        value
    }

    /// Read a root's current value
    pub fn get(&self, id: RootId) -> Option<Value> {
        self.slots.get(id.0 as usize).copied().flatten()
    }

    /// Overwrite a root's value
    pub fn set(&mut self, id: RootId, value: Value) {
        match self.slots.get_mut(id.0 as usize) {
            Some(slot @ Some(_)) => *slot = Some(value),
            _ => panic!("root slot {:?} is vacant", id),
        }
    }

    /// Number of registered roots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over registered values
    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.slots.iter().copied().flatten()
    }

    /// Iterate mutably over registered values (collector-internal)
    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.slots.iter_mut().filter_map(|s| s.as_mut())
    }
}
