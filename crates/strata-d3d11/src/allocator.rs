use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Explicit allocator for resource-cache and layout storage.
///
/// Owners (render device, pipeline states, binding objects) pass it into cache and layout
/// construction. It tracks live slot and allocation counts so lifetime bugs show up as leaked
/// slots instead of going unnoticed.
#[derive(Debug, Default)]
pub struct ResourceCacheAllocator {
    name: String,
    live_slots: AtomicUsize,
    live_allocations: AtomicUsize,
    total_allocations: AtomicU64,
}

/// Receipt for one allocation; hand it back through [`ResourceCacheAllocator::release`].
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct Allocation {
    slots: usize,
}

impl Allocation {
    pub fn slots(&self) -> usize {
        self.slots
    }
}

impl ResourceCacheAllocator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allocate(&self, slots: usize) -> Allocation {
        self.live_slots.fetch_add(slots, Ordering::Relaxed);
        self.live_allocations.fetch_add(1, Ordering::Relaxed);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
        Allocation { slots }
    }

    pub fn release(&self, allocation: Allocation) {
        self.live_slots.fetch_sub(allocation.slots, Ordering::Relaxed);
        self.live_allocations.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn live_slots(&self) -> usize {
        self.live_slots.load(Ordering::Relaxed)
    }

    pub fn live_allocations(&self) -> usize {
        self.live_allocations.load(Ordering::Relaxed)
    }

    pub fn total_allocations(&self) -> u64 {
        self.total_allocations.load(Ordering::Relaxed)
    }
}
