//! Registration bookkeeping.
//!
//! Everything here lives behind the scheduler's single registration mutex:
//!
//! - the "to add" and "to remove" staging queues,
//! - the book of registered animations (for synchronous error reporting),
//! - the buffer registry with per-buffer reference counts.
//!
//! Booking an animation and acquiring its buffer happen in the same critical
//! section, so a buffer's reference count always equals the number of booked
//! animations targeting it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::animation::{AnimationId, AnimationKey, AnimationRef, Pacing};
use crate::buffer::{AnimationBuffer, BufferId, BufferTarget};
use crate::error::{SchedulerError, SchedulerResult};
use crate::free_running::FreeRunner;

/// An animation as seen by the scheduler thread.
#[derive(Clone)]
pub(crate) struct LiveAnimation {
    pub(crate) key: AnimationKey,
    pub(crate) id: AnimationId,
    pub(crate) animation: AnimationRef,
    pub(crate) buffer: Option<Arc<AnimationBuffer>>,
    pub(crate) pacing: Pacing,
}

/// What the book remembers about a registered animation.
pub(crate) struct Booking {
    pub(crate) id: AnimationId,
    pub(crate) buffer: Option<BufferId>,
    pub(crate) runner: Option<FreeRunner>,
}

struct BufferEntry {
    buffer: Arc<AnimationBuffer>,
    refs: usize,
}

/// Changes applied by one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DrainOutcome {
    pub(crate) removed: usize,
    pub(crate) added: usize,
}

impl DrainOutcome {
    pub(crate) fn changed(self) -> bool {
        self.removed > 0 || self.added > 0
    }
}

#[derive(Default)]
pub(crate) struct Registrations {
    to_add: Vec<LiveAnimation>,
    to_remove: Vec<AnimationKey>,
    booked: HashMap<AnimationKey, Booking>,
    buffers: BTreeMap<BufferId, BufferEntry>,
    next_id: u64,
}

impl Registrations {
    /// Books `animation`, acquires its buffer and queues the addition.
    pub(crate) fn book(
        &mut self,
        animation: AnimationRef,
        target: Option<BufferTarget>,
    ) -> SchedulerResult<LiveAnimation> {
        let key = AnimationKey::of(&animation);
        if let Some(existing) = self.booked.get(&key) {
            return Err(SchedulerError::AlreadyRegistered(existing.id));
        }
        if let Some(BufferTarget::Existing(id)) = &target {
            if !self.buffers.contains_key(id) {
                return Err(SchedulerError::UnknownBuffer(*id));
            }
        }

        let buffer = target.map(|target| self.acquire_buffer(target));
        self.next_id += 1;
        let id = AnimationId(self.next_id);

        self.booked.insert(
            key,
            Booking {
                id,
                buffer: buffer.as_ref().map(|b| b.id()),
                runner: None,
            },
        );

        let entry = LiveAnimation {
            key,
            id,
            pacing: animation.pacing(),
            animation,
            buffer,
        };
        self.to_add.push(entry.clone());
        Ok(entry)
    }

    pub(crate) fn attach_runner(&mut self, key: AnimationKey, runner: FreeRunner) {
        if let Some(booking) = self.booked.get_mut(&key) {
            booking.runner = Some(runner);
        }
    }

    /// Removes `animation` from the book and queues its removal.
    ///
    /// An addition still waiting in the queue is cancelled instead, so the
    /// animation never receives a step.
    pub(crate) fn unbook(&mut self, animation: &AnimationRef) -> SchedulerResult<Booking> {
        self.unbook_key(AnimationKey::of(animation))
            .ok_or(SchedulerError::NotRegistered)
    }

    pub(crate) fn unbook_key(&mut self, key: AnimationKey) -> Option<Booking> {
        let booking = self.booked.remove(&key)?;

        if let Some(pending) = self.to_add.iter().position(|entry| entry.key == key) {
            self.to_add.remove(pending);
        } else {
            self.to_remove.push(key);
        }

        if let Some(id) = booking.buffer {
            self.release_buffer(id);
        }
        Some(booking)
    }

    /// Unbooks every animation.
    pub(crate) fn unbook_all(&mut self) -> Vec<Booking> {
        let keys: Vec<AnimationKey> = self.booked.keys().copied().collect();
        keys.into_iter()
            .filter_map(|key| self.unbook_key(key))
            .collect()
    }

    /// Forgets everything: book, queues and buffers. Used at session end.
    pub(crate) fn reset(&mut self) -> Vec<Booking> {
        self.to_add.clear();
        self.to_remove.clear();
        self.buffers.clear();
        self.booked.drain().map(|(_, booking)| booking).collect()
    }

    #[cfg(test)]
    pub(crate) fn has_pending(&self) -> bool {
        !self.to_add.is_empty() || !self.to_remove.is_empty()
    }

    /// Applies queued removals, then queued additions, to `live`.
    pub(crate) fn drain(&mut self, live: &mut Vec<LiveAnimation>) -> DrainOutcome {
        let removed = self.drain_removals(live);
        let added = self.to_add.len();
        live.append(&mut self.to_add);
        DrainOutcome { removed, added }
    }

    /// Applies queued removals only.
    pub(crate) fn drain_removals(&mut self, live: &mut Vec<LiveAnimation>) -> usize {
        if self.to_remove.is_empty() {
            return 0;
        }
        let before = live.len();
        let to_remove = std::mem::take(&mut self.to_remove);
        live.retain(|entry| !to_remove.contains(&entry.key));
        before - live.len()
    }

    pub(crate) fn buffer(&self, id: BufferId) -> Option<Arc<AnimationBuffer>> {
        self.buffers.get(&id).map(|entry| Arc::clone(&entry.buffer))
    }

    pub(crate) fn buffer_ref_count(&self, id: BufferId) -> usize {
        self.buffers.get(&id).map_or(0, |entry| entry.refs)
    }

    pub(crate) fn buffer_snapshot(&self) -> Vec<Arc<AnimationBuffer>> {
        self.buffers
            .values()
            .map(|entry| Arc::clone(&entry.buffer))
            .collect()
    }

    pub(crate) fn registered_count(&self) -> usize {
        self.booked.len()
    }

    fn acquire_buffer(&mut self, target: BufferTarget) -> Arc<AnimationBuffer> {
        let id = target.id();
        let entry = self.buffers.entry(id).or_insert_with(|| {
            let buffer = match target {
                BufferTarget::Create(device) => AnimationBuffer::new(device),
                // Checked by the caller before anything was mutated.
                BufferTarget::Existing(id) => unreachable!("{id} is not registered"),
            };
            tracing::debug!(buffer = %id, capacity = buffer.capacity(), "animation buffer created");
            BufferEntry {
                buffer: Arc::new(buffer),
                refs: 0,
            }
        });
        entry.refs += 1;
        Arc::clone(&entry.buffer)
    }

    fn release_buffer(&mut self, id: BufferId) {
        let Some(entry) = self.buffers.get_mut(&id) else {
            return;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            self.buffers.remove(&id);
            tracing::debug!(buffer = %id, "animation buffer released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Animation, Capabilities};
    use crate::device::HostBuffer;

    struct Noop;

    impl Animation for Noop {
        fn capabilities(&self) -> Capabilities {
            Capabilities::CPU
        }
    }

    fn noop() -> AnimationRef {
        Arc::new(Noop)
    }

    #[test]
    fn test_double_registration_rejected() {
        let mut regs = Registrations::default();
        let a = noop();
        regs.book(Arc::clone(&a), None).unwrap();
        assert!(matches!(
            regs.book(a, None),
            Err(SchedulerError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_unknown_buffer_rejected_without_side_effects() {
        let mut regs = Registrations::default();
        let a = noop();
        let result = regs.book(Arc::clone(&a), Some(BufferTarget::Existing(BufferId::new(99))));
        assert!(matches!(result, Err(SchedulerError::UnknownBuffer(_))));
        assert_eq!(regs.registered_count(), 0);
        assert!(!regs.has_pending());
    }

    #[test]
    fn test_buffer_shared_and_refcounted() {
        let mut regs = Registrations::default();
        let (a, b) = (noop(), noop());
        let device = HostBuffer::new(32);
        let id = device.id();

        regs.book(Arc::clone(&a), Some(BufferTarget::create(device))).unwrap();
        regs.book(Arc::clone(&b), Some(BufferTarget::Existing(id))).unwrap();
        assert_eq!(regs.buffer_ref_count(id), 2);

        regs.unbook(&a).unwrap();
        assert_eq!(regs.buffer_ref_count(id), 1);
        assert!(regs.buffer(id).is_some());

        regs.unbook(&b).unwrap();
        assert_eq!(regs.buffer_ref_count(id), 0);
        assert!(regs.buffer(id).is_none());
    }

    #[test]
    fn test_unbook_before_drain_cancels_addition() {
        let mut regs = Registrations::default();
        let a = noop();
        regs.book(Arc::clone(&a), None).unwrap();
        regs.unbook(&a).unwrap();

        let mut live = Vec::new();
        let outcome = regs.drain(&mut live);
        assert!(!outcome.changed());
        assert!(live.is_empty());
    }

    #[test]
    fn test_remove_then_add_in_one_drain() {
        let mut regs = Registrations::default();
        let a = noop();
        let mut live = Vec::new();

        regs.book(Arc::clone(&a), None).unwrap();
        regs.drain(&mut live);
        assert_eq!(live.len(), 1);

        // Leave and rejoin in the same burst: removal applies first.
        regs.unbook(&a).unwrap();
        regs.book(Arc::clone(&a), None).unwrap();
        let outcome = regs.drain(&mut live);

        assert_eq!(outcome, DrainOutcome { removed: 1, added: 1 });
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn test_drain_preserves_registration_order() {
        let mut regs = Registrations::default();
        let animations: Vec<AnimationRef> = (0..4).map(|_| noop()).collect();
        let ids: Vec<AnimationId> = animations
            .iter()
            .map(|a| regs.book(Arc::clone(a), None).unwrap().id)
            .collect();

        let mut live = Vec::new();
        regs.drain(&mut live);
        let live_ids: Vec<AnimationId> = live.iter().map(|entry| entry.id).collect();
        assert_eq!(live_ids, ids);
    }

    #[test]
    fn test_unregister_unknown() {
        let mut regs = Registrations::default();
        assert!(matches!(
            regs.unbook(&noop()),
            Err(SchedulerError::NotRegistered)
        ));
    }
}
