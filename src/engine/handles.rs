//! Index-based lookup of tap callback contexts
//!
//! The OS hands the tap callback a single opaque pointer. We pass a slot index
//! through it and resolve the context here, so the callback never holds a raw
//! pointer to Rust memory that could outlive its owner.

use std::sync::{Arc, Mutex};

use super::callback::TapContext;

/// Contexts of every installed tap
pub static TAP_CONTEXTS: HandleTable<TapContext> = HandleTable::new();

/// Index into a [`HandleTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(usize);

impl Slot {
    /// Encode as the callback's `user_info`
    pub fn as_user_info(self) -> *mut std::ffi::c_void {
        self.0 as *mut std::ffi::c_void
    }

    /// Decode a callback's `user_info`
    pub fn from_user_info(user_info: *mut std::ffi::c_void) -> Self {
        Self(user_info as usize)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Slot-indexed table of shared values; freed slots are reused
pub struct HandleTable<T> {
    slots: Mutex<Vec<Option<Arc<T>>>>,
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, value: Arc<T>) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = slots.iter().position(Option::is_none) {
            slots[index] = Some(value);
            Slot(index)
        } else {
            slots.push(Some(value));
            Slot(slots.len() - 1)
        }
    }

    pub fn get(&self, slot: Slot) -> Option<Arc<T>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(slot.0).and_then(|entry| entry.clone())
    }

    pub fn remove(&self, slot: Slot) -> Option<Arc<T>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get_mut(slot.0).and_then(Option::take)
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let table = HandleTable::new();
        let slot = table.insert(Arc::new("first"));
        assert_eq!(table.get(slot).as_deref(), Some(&"first"));

        assert!(table.remove(slot).is_some());
        assert!(table.get(slot).is_none());
        assert!(table.remove(slot).is_none());
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let table = HandleTable::new();
        let a = table.insert(Arc::new(1));
        let b = table.insert(Arc::new(2));
        assert_ne!(a, b);

        table.remove(a);
        let c = table.insert(Arc::new(3));
        assert_eq!(c, a);
        assert_eq!(table.get(b).as_deref(), Some(&2));
        assert_eq!(table.get(c).as_deref(), Some(&3));
    }

    #[test]
    fn test_user_info_round_trip() {
        let table = HandleTable::new();
        table.insert(Arc::new(0));
        let slot = table.insert(Arc::new(7));
        let decoded = Slot::from_user_info(slot.as_user_info());
        assert_eq!(decoded, slot);
        assert_eq!(decoded.index(), 1);
    }

    #[test]
    fn test_unknown_slot_is_none() {
        let table: HandleTable<u8> = HandleTable::new();
        assert!(table.get(Slot::from_user_info(std::ptr::null_mut())).is_none());
    }
}
