//! D3D11 slot limits shared by reflection, resource caches and the device context.
//!
//! Every shader stage owns four independent register spaces: `b#` constant buffers, `t#`
//! shader resource views (textures and buffers), `s#` samplers and `u#` unordered access views.
//! Pixel-shader UAVs additionally share the output-merger slot range with render targets.

/// D3D10/11 exposes 14 constant buffer slots per shader stage (`b0..b13`).
pub const D3D11_MAX_CONSTANT_BUFFER_SLOTS: u32 = 14;

/// D3D11 exposes 128 SRV slots per shader stage (`t0..t127`).
pub const D3D11_MAX_SRV_SLOTS: u32 = 128;

/// D3D11 exposes 16 sampler slots per shader stage (`s0..s15`).
pub const D3D11_MAX_SAMPLER_SLOTS: u32 = 16;

/// D3D11 exposes 8 UAV slots to SM5 pixel and compute shaders (`u0..u7`).
///
/// This matches `D3D11_PS_CS_UAV_REGISTER_COUNT`.
pub const D3D11_MAX_UAV_SLOTS: u32 = 8;

/// `D3D11_SIMULTANEOUS_RENDER_TARGET_COUNT`.
pub const D3D11_MAX_RENDER_TARGETS: u32 = 8;

/// `D3D11_IA_VERTEX_INPUT_RESOURCE_SLOT_COUNT`.
pub const D3D11_MAX_VERTEX_BUFFER_SLOTS: u32 = 32;

/// Per-class slot counts of one stage's resource cache.
///
/// The SRV count covers both texture and buffer SRVs; the UAV count covers both texture and
/// buffer UAVs, matching the native register spaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CacheSlotCounts {
    pub cbs: u32,
    pub srvs: u32,
    pub samplers: u32,
    pub uavs: u32,
}

impl CacheSlotCounts {
    pub const fn total(&self) -> u32 {
        self.cbs + self.srvs + self.samplers + self.uavs
    }

    /// Returns `true` if every count fits the D3D11 per-stage limits.
    pub const fn fits_d3d11_limits(&self) -> bool {
        self.cbs <= D3D11_MAX_CONSTANT_BUFFER_SLOTS
            && self.srvs <= D3D11_MAX_SRV_SLOTS
            && self.samplers <= D3D11_MAX_SAMPLER_SLOTS
            && self.uavs <= D3D11_MAX_UAV_SLOTS
    }

    /// Component-wise maximum.
    pub fn max(self, other: Self) -> Self {
        Self {
            cbs: self.cbs.max(other.cbs),
            srvs: self.srvs.max(other.srvs),
            samplers: self.samplers.max(other.samplers),
            uavs: self.uavs.max(other.uavs),
        }
    }
}

/// Tracks the smallest contiguous slot range that changed during a commit pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedSlotRange {
    min: u32,
    max: u32,
}

impl Default for ChangedSlotRange {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangedSlotRange {
    pub const fn new() -> Self {
        Self { min: u32::MAX, max: 0 }
    }

    pub fn mark(&mut self, slot: u32) {
        self.min = self.min.min(slot);
        self.max = self.max.max(slot);
    }

    pub const fn is_empty(&self) -> bool {
        self.min == u32::MAX
    }

    /// Returns the changed range as `start..end`, or `None` if nothing changed.
    pub fn range(&self) -> Option<std::ops::Range<u32>> {
        (!self.is_empty()).then(|| self.min..self.max + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_range_tracks_min_and_max() {
        let mut range = ChangedSlotRange::new();
        assert!(range.is_empty());
        assert_eq!(range.range(), None);

        range.mark(5);
        range.mark(2);
        range.mark(3);
        assert_eq!(range.range(), Some(2..6));
    }

    #[test]
    fn slot_counts_respect_limits() {
        let counts = CacheSlotCounts {
            cbs: 14,
            srvs: 128,
            samplers: 16,
            uavs: 8,
        };
        assert!(counts.fits_d3d11_limits());
        assert_eq!(counts.total(), 166);

        let too_many = CacheSlotCounts { uavs: 9, ..counts };
        assert!(!too_many.fits_d3d11_limits());
    }
}
