use slab::Slab;

use crate::{reactor::Continuation, request::Tracker};

use super::CorrelationKey;

/// Where a correlation key is in its life. Keys are reserved while a batch is being handed to
/// the driver, and only become [SlotState::Submitted] once the driver accepted them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SlotState {
    Reserved,
    Submitted,
    CancelRequested,
    Dispatching,
}

pub(crate) struct Slot<'buf> {
    generation: u32,
    pub(crate) state: SlotState,
    pub(crate) continuation: Continuation<'buf>,
    pub(crate) tracker: Tracker,
}

/// The in-flight correlation table, an arena of slots addressed by [CorrelationKey]. Every index
/// carries a generation that is bumped when its slot is released, so a key that outlived its
/// slot can never be matched against the next request stored at the same index.
pub(crate) struct InFlightTable<'buf> {
    slots: Slab<Slot<'buf>>,
    generations: Vec<u32>,
    capacity: usize,
}

impl<'buf> InFlightTable<'buf> {
    pub(crate) fn new(capacity: usize) -> InFlightTable<'buf> {
        InFlightTable {
            slots: Slab::with_capacity(capacity),
            generations: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn available(&self) -> usize {
        self.capacity.saturating_sub(self.slots.len())
    }

    /// Reserve a slot for a request that is about to be handed to the driver.
    pub(crate) fn reserve(&mut self, tracker: Tracker) -> CorrelationKey {
        let index = self.slots.vacant_key();
        if index == self.generations.len() {
            self.generations.push(0);
        }
        let generation = self.generations[index];

        self.slots.insert(Slot {
            generation,
            state: SlotState::Reserved,
            continuation: Continuation::default(),
            tracker,
        });
        CorrelationKey::new(index as u32, generation)
    }

    pub(crate) fn get(&self, key: CorrelationKey) -> Option<&Slot<'buf>> {
        self.slots
            .get(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
    }

    pub(crate) fn get_mut(&mut self, key: CorrelationKey) -> Option<&mut Slot<'buf>> {
        self.slots
            .get_mut(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
    }

    /// Free the slot behind `key`, returning it if the key was still live.
    pub(crate) fn release(&mut self, key: CorrelationKey) -> Option<Slot<'buf>> {
        self.get(key)?;

        let index = key.index() as usize;
        self.generations[index] = self.generations[index].wrapping_add(1);
        Some(self.slots.remove(index))
    }
}
