//! Slot arena owning the skeleton registries of a client context.
//!
//! Handles into the arena carry a generation so a handle kept across a
//! slot's reuse is rejected instead of reading another skeleton's state.
//! The store serializes access with a lock: a producer thread and the
//! polling consumer never race on registry state.

use crate::skeleton::Skeleton;
use crate::{Result, SkelError};
use std::sync::Mutex;

/// Bounds- and generation-checked reference to one arena slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHandle {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Arena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> SlotHandle {
        match self.free.pop() {
            Some(slot) => {
                let s = &mut self.slots[slot as usize];
                s.value = Some(value);
                SlotHandle {
                    slot,
                    generation: s.generation,
                }
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                SlotHandle {
                    slot,
                    generation: 0,
                }
            }
        }
    }

    pub(crate) fn get(&self, handle: SlotHandle) -> Option<&T> {
        self.slots
            .get(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Free a slot, bumping its generation so outstanding handles go stale.
    pub(crate) fn remove(&mut self, handle: SlotHandle) -> Option<T> {
        let s = self.slots.get_mut(handle.slot as usize)?;
        if s.generation != handle.generation {
            return None;
        }
        let value = s.value.take()?;
        s.generation = s.generation.wrapping_add(1);
        self.free.push(handle.slot);
        Some(value)
    }
}

/// Lock-protected arena of skeletons, shared between the context and the
/// read-side views handed to callbacks.
pub struct SkeletonStore {
    inner: Mutex<Arena<Skeleton>>,
}

impl SkeletonStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Arena::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Arena<Skeleton>> {
        // Arena contents are plain data; a poisoning panic cannot leave a
        // half-applied commit behind the lock.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub(crate) fn insert(&self, skeleton: Skeleton) -> SlotHandle {
        self.lock().insert(skeleton)
    }

    pub(crate) fn remove(&self, handle: SlotHandle) -> Option<Skeleton> {
        self.lock().remove(handle)
    }

    /// Run a read against the skeleton behind `handle`.
    pub fn with<R>(
        &self,
        handle: SlotHandle,
        f: impl FnOnce(&Skeleton) -> Result<R>,
    ) -> Result<R> {
        let arena = self.lock();
        let skeleton = arena.get(handle).ok_or(SkelError::InvalidHandle)?;
        f(skeleton)
    }

    pub(crate) fn with_mut<R>(
        &self,
        handle: SlotHandle,
        f: impl FnOnce(&mut Skeleton) -> R,
    ) -> Result<R> {
        let mut arena = self.lock();
        let skeleton = arena.get_mut(handle).ok_or(SkelError::InvalidHandle)?;
        Ok(f(skeleton))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
    }

    #[test]
    fn removed_handle_goes_stale() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        assert_eq!(arena.remove(a), Some(1));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);
    }

    #[test]
    fn slot_reuse_bumps_generation() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        arena.remove(a);
        let b = arena.insert(2);
        assert_eq!(b.slot, a.slot);
        assert_ne!(b.generation, a.generation);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&2));
    }

    #[test]
    fn store_rejects_stale_handles() {
        let store = SkeletonStore::new();
        let h = store.insert(Skeleton::new());
        assert!(store.with(h, |s| Ok(s.count(crate::EntityKind::Joint))).is_ok());
        store.remove(h);
        assert_eq!(
            store.with(h, |s| Ok(s.count(crate::EntityKind::Joint))),
            Err(SkelError::InvalidHandle)
        );
    }

    #[test]
    fn out_of_bounds_slot_is_invalid() {
        let store = SkeletonStore::new();
        let bogus = SlotHandle {
            slot: 17,
            generation: 0,
        };
        assert_eq!(
            store.with(bogus, |_| Ok(())),
            Err(SkelError::InvalidHandle)
        );
    }
}
