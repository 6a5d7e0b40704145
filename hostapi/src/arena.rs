//! Generational slot arena issuing stable 64-bit handles.
//!
//! Host-resident values are never exposed to the guest by pointer. Each value
//! lives in a slot, and the guest holds an opaque handle packing the slot
//! index with the slot's generation. Destroying a slot bumps its generation,
//! so stale handles fail the generation check and resolve to nothing instead
//! of aliasing whatever the slot holds next.

/// Handle encoding: upper 32 bits = slot index, lower 32 bits = generation.
pub fn encode_handle(index: u32, generation: u32) -> u64 {
    ((index as u64) << 32) | (generation as u64)
}

/// Split a handle back into `(index, generation)`.
pub fn decode_handle(handle: u64) -> (u32, u32) {
    ((handle >> 32) as u32, handle as u32)
}

/// Generation ceiling at which a slot is retired instead of recycled.
///
/// A recycled slot whose generation wrapped around would validate stale
/// handles from an earlier epoch. Retired slots stay inactive forever, so no
/// handle can ever match them again.
pub const GENERATION_CEILING: u32 = u32::MAX - 1;

/// A single arena slot.
#[derive(Debug)]
pub struct Slot<T> {
    index: u32,
    generation: u32,
    active: bool,
    item: Option<T>,
}

impl<T> Slot<T> {
    /// The slot's position, stable for its lifetime.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The slot's current generation.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Whether the slot currently holds an item.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Generational arena: ordered slots plus a LIFO free list.
///
/// The LIFO discipline is observable to guests through handle locality (the
/// most recently freed slot is reused first) and is part of the contract.
#[derive(Debug, Default)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Arena<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Allocate a slot for `item` and return its handle.
    ///
    /// Pops the free list when possible, bumping the slot's generation so the
    /// reused slot never validates a handle issued for a prior occupant;
    /// otherwise appends a fresh slot at generation 0.
    pub fn create(&mut self, item: T) -> u64 {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            assert!(
                !slot.active,
                "arena invariant broken: active slot {} on free list",
                index
            );
            slot.generation += 1;
            slot.active = true;
            slot.item = Some(item);
            encode_handle(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                index,
                generation: 0,
                active: true,
                item: Some(item),
            });
            encode_handle(index, 0)
        }
    }

    fn slot_for(&self, handle: u64) -> Option<&Slot<T>> {
        let (index, generation) = decode_handle(handle);
        let slot = self.slots.get(index as usize)?;
        if !slot.active || slot.generation != generation {
            return None;
        }
        Some(slot)
    }

    fn slot_for_mut(&mut self, handle: u64) -> Option<&mut Slot<T>> {
        let (index, generation) = decode_handle(handle);
        let slot = self.slots.get_mut(index as usize)?;
        if !slot.active || slot.generation != generation {
            return None;
        }
        Some(slot)
    }

    /// Look up the item behind a handle. Stale or out-of-range handles
    /// return `None`; lookups never fail harder than that.
    pub fn get(&self, handle: u64) -> Option<&T> {
        self.slot_for(handle)?.item.as_ref()
    }

    /// Mutable lookup with the same validity rules as [`get`](Self::get).
    pub fn get_mut(&mut self, handle: u64) -> Option<&mut T> {
        self.slot_for_mut(handle)?.item.as_mut()
    }

    /// Whether `handle` currently resolves in this arena.
    pub fn is_valid(&self, handle: u64) -> bool {
        self.slot_for(handle).is_some()
    }

    /// Replace the item behind a valid handle. Returns whether it happened.
    pub fn update(&mut self, handle: u64, item: T) -> bool {
        match self.slot_for_mut(handle) {
            Some(slot) => {
                slot.item = Some(item);
                true
            }
            None => false,
        }
    }

    /// Destroy the slot behind a valid handle. Returns whether it happened;
    /// destroying a stale handle is a safe no-op.
    ///
    /// The generation is bumped so the destroyed handle (and any earlier
    /// handle for the slot) stops resolving. A slot whose bumped generation
    /// reaches [`GENERATION_CEILING`] is retired: it never re-enters the
    /// free list.
    pub fn destroy(&mut self, handle: u64) -> bool {
        let (index, _) = decode_handle(handle);
        let Some(slot) = self.slot_for_mut(handle) else {
            return false;
        };
        slot.item = None;
        slot.active = false;
        slot.generation += 1;
        if slot.generation < GENERATION_CEILING {
            self.free.push(index);
        }
        true
    }

    /// Number of slots ever created (active plus freed plus retired).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena has never allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of currently active slots.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.active).count()
    }

    /// The current generation of slot `index`, if the slot exists.
    pub fn generation_of(&self, index: u32) -> Option<u32> {
        self.slots.get(index as usize).map(|s| s.generation)
    }
}
