use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;

bitflags! {
    /// Usage roles a buffer or texture is currently in.
    ///
    /// The empty set means the state is unknown and is not tracked by the engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceState: u32 {
        const UNDEFINED = 1 << 0;
        const VERTEX_BUFFER = 1 << 1;
        const CONSTANT_BUFFER = 1 << 2;
        const INDEX_BUFFER = 1 << 3;
        const RENDER_TARGET = 1 << 4;
        const UNORDERED_ACCESS = 1 << 5;
        const DEPTH_WRITE = 1 << 6;
        const DEPTH_READ = 1 << 7;
        const SHADER_RESOURCE = 1 << 8;
        const STREAM_OUT = 1 << 9;
        const INDIRECT_ARGUMENT = 1 << 10;
        const COPY_DEST = 1 << 11;
        const COPY_SOURCE = 1 << 12;
        const RESOLVE_DEST = 1 << 13;
        const RESOLVE_SOURCE = 1 << 14;
        const INPUT_ATTACHMENT = 1 << 15;
        const PRESENT = 1 << 16;
    }
}

impl ResourceState {
    pub const UNKNOWN: ResourceState = ResourceState::empty();

    /// Every read-only state a resource can be in simultaneously.
    pub const GENERIC_READ: ResourceState = ResourceState::VERTEX_BUFFER
        .union(ResourceState::CONSTANT_BUFFER)
        .union(ResourceState::INDEX_BUFFER)
        .union(ResourceState::SHADER_RESOURCE)
        .union(ResourceState::INDIRECT_ARGUMENT)
        .union(ResourceState::COPY_SOURCE);

    pub fn is_unknown(self) -> bool {
        self.is_empty()
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("UNKNOWN");
        }
        for (i, (name, _)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// Interior-mutable resource state stored on the resource object itself.
///
/// Only the device context that currently owns a draw call mutates it; the atomic merely makes
/// shared ownership through `Arc` sound. Concurrent use of one resource from two contexts
/// without external synchronization is the caller's responsibility.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU32);

impl StateCell {
    pub fn new(state: ResourceState) -> Self {
        Self(AtomicU32::new(state.bits()))
    }

    pub fn get(&self) -> ResourceState {
        ResourceState::from_bits_retain(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, state: ResourceState) {
        self.0.store(state.bits(), Ordering::Relaxed);
    }

    pub fn add(&self, state: ResourceState) {
        self.0.fetch_or(state.bits(), Ordering::Relaxed);
    }

    pub fn clear(&self, state: ResourceState) {
        self.0.fetch_and(!state.bits(), Ordering::Relaxed);
    }
}

/// How binding operations treat resource states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionMode {
    /// States are neither changed nor checked.
    None,
    /// Resources are transitioned to the required state, unbinding conflicting bindings.
    #[default]
    Transition,
    /// States are not changed, but resources not already in the required state are reported.
    Verify,
}

impl FromStr for TransitionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "transition" => Ok(Self::Transition),
            "verify" => Ok(Self::Verify),
            other => Err(format!("unknown transition mode '{other}'")),
        }
    }
}
