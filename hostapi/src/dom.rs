//! DOM heap: an arena preconfigured with reserved root slots.
//!
//! The first five slots are sentinels with well-known meanings the guest can
//! rely on from its very first instruction, without ever allocating them.
//! They are created at generation 0 during construction and can never be
//! destroyed through the guest-facing destroy path.

use crate::arena::{decode_handle, Arena};
use crate::value::Value;

/// Number of reserved sentinel slots at the bottom of the DOM heap.
pub const RESERVED_SLOTS: u32 = 5;

/// Well-known root referenced by a reserved DOM slot.
///
/// On a headless host these are placeholders: stable identities the guest can
/// pass around, with no native widget behind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownRoot {
    /// Slot 0: the bridge itself.
    SelfRef,
    /// Slot 1: the DOM heap.
    Arena,
    /// Slot 2: the host window root.
    Window,
    /// Slot 3: the host document root.
    Document,
    /// Slot 4: the host document body.
    Body,
}

impl WellKnownRoot {
    /// Reserved roots in slot order.
    pub const ALL: [WellKnownRoot; RESERVED_SLOTS as usize] = [
        WellKnownRoot::SelfRef,
        WellKnownRoot::Arena,
        WellKnownRoot::Window,
        WellKnownRoot::Document,
        WellKnownRoot::Body,
    ];
}

/// DOM-heap slot content.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DomEntry {
    /// Pre-allocated slot not yet populated.
    #[default]
    Null,
    /// Reserved sentinel root.
    Root(WellKnownRoot),
    /// Hosted value registered by an invocation result.
    Value(Value),
}

/// Arena for DOM references, with the reserved sentinel slots seeded.
#[derive(Debug)]
pub struct DomArena {
    inner: Arena<DomEntry>,
}

impl Default for DomArena {
    fn default() -> Self {
        Self::new()
    }
}

impl DomArena {
    /// Create the arena and seed slots 0..=4 with the well-known roots.
    pub fn new() -> Self {
        let mut inner = Arena::new();
        for root in WellKnownRoot::ALL {
            inner.create(DomEntry::Root(root));
        }
        Self { inner }
    }

    /// Allocate a fresh slot. Reserved indices are always occupied, so the
    /// returned handle never falls in the reserved range.
    pub fn create(&mut self, entry: DomEntry) -> u64 {
        self.inner.create(entry)
    }

    pub fn get(&self, handle: u64) -> Option<&DomEntry> {
        self.inner.get(handle)
    }

    pub fn is_valid(&self, handle: u64) -> bool {
        self.inner.is_valid(handle)
    }

    pub fn update(&mut self, handle: u64, entry: DomEntry) -> bool {
        self.inner.update(handle, entry)
    }

    /// Destroy a slot, unless it is reserved. Reserved handles are rejected
    /// without touching the slot.
    pub fn destroy(&mut self, handle: u64) -> bool {
        let (index, _) = decode_handle(handle);
        if index < RESERVED_SLOTS {
            return false;
        }
        self.inner.destroy(handle)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.inner.active_count()
    }
}
