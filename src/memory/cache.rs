use crate::foundation::core::Rect;
use crate::foundation::error::{GxError, GxResult};
use crate::memory::arena::{ArenaStats, Bank, Span, TMEM_BYTES, TmemArena};
use crate::surface::format::PixelFormat;
use crate::surface::lut::{Lut, LutParams};
use crate::surface::{
    BankLayout, LUT_HOST_BYTES, Placement, PlaneRegion, ShadowSlot, Surface,
};
use smallvec::SmallVec;

/// Fast-memory window reserved per plane and shadow slot for cached placement.
pub const CACHE_WINDOW_BYTES: u32 = 32 * 1024;

/// Longest shadow ring a surface may request.
pub const MAX_SHADOWS: usize = 8;

/// Texture cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheOpts {
    /// Fast-memory arena size in bytes.
    pub tmem_bytes: u32,
    /// Upper bound on host bytes owned by live surfaces.
    pub host_budget_bytes: usize,
}

impl Default for CacheOpts {
    fn default() -> Self {
        Self {
            tmem_bytes: TMEM_BYTES,
            host_budget_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Cache bookkeeping snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Arena counters.
    pub arena: ArenaStats,
    /// Live surfaces allocated through this cache.
    pub live_surfaces: usize,
    /// Host bytes owned by live surfaces.
    pub host_bytes: usize,
    /// Full-surface uploads into resident slots.
    pub uploads: u64,
    /// Cache-window page-ins for cached slots.
    pub page_ins: u64,
    /// Cache invalidations.
    pub invalidations: u64,
}

/// Read access to one plane of a resolved slot.
///
/// Interleaved planes are stored in two pieces; indexing hides the split.
#[derive(Clone, Copy, Debug)]
pub struct PlaneView<'a> {
    lo: &'a [u8],
    hi: &'a [u8],
}

impl<'a> PlaneView<'a> {
    pub(crate) fn contiguous(bytes: &'a [u8]) -> Self {
        Self { lo: bytes, hi: &[] }
    }

    /// Byte at `i`.
    #[inline]
    pub fn byte(&self, i: usize) -> u8 {
        if i < self.lo.len() {
            self.lo[i]
        } else {
            self.hi[i - self.lo.len()]
        }
    }

    /// Plane length in bytes.
    pub fn len(&self) -> usize {
        self.lo.len() + self.hi.len()
    }

    /// `true` for an empty plane.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the plane into a contiguous buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(self.len());
        v.extend_from_slice(self.lo);
        v.extend_from_slice(self.hi);
        v
    }
}

/// A bound, resolved surface slot as seen by a renderer.
#[derive(Clone, Debug)]
pub struct TexView<'a> {
    /// Surface width.
    pub width: u32,
    /// Surface height.
    pub height: u32,
    /// Texel format.
    pub format: PixelFormat,
    /// Valid sub-rectangle.
    pub rect: Rect,
    /// One view per plane.
    pub planes: SmallVec<[PlaneView<'a>; 3]>,
    /// Transfer tables (indexed formats).
    pub luts: SmallVec<[&'a Lut; 3]>,
}

/// Owner of the fast-memory arena; allocates, binds, uploads and frees surfaces.
#[derive(Debug)]
pub struct TextureCache {
    arena: TmemArena,
    opts: CacheOpts,
    epoch: u64,
    live_surfaces: usize,
    host_bytes: usize,
    uploads: u64,
    page_ins: u64,
    invalidations: u64,
}

impl TextureCache {
    /// Create a cache with a fresh arena.
    pub fn new(opts: CacheOpts) -> GxResult<Self> {
        Ok(Self {
            arena: TmemArena::new(opts.tmem_bytes)?,
            opts,
            epoch: 0,
            live_surfaces: 0,
            host_bytes: 0,
            uploads: 0,
            page_ins: 0,
            invalidations: 0,
        })
    }

    /// Options the cache was built with.
    pub fn opts(&self) -> CacheOpts {
        self.opts
    }

    /// Underlying arena.
    pub fn arena(&self) -> &TmemArena {
        &self.arena
    }

    /// Bookkeeping snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            arena: self.arena.stats(),
            live_surfaces: self.live_surfaces,
            host_bytes: self.host_bytes,
            uploads: self.uploads,
            page_ins: self.page_ins,
            invalidations: self.invalidations,
        }
    }

    /// Allocate a zeroed surface with `plane_count` planes.
    ///
    /// Indexed formats get one transfer table per plane built from `lut` (identity when `None`).
    #[tracing::instrument(skip(self, lut))]
    pub fn allocate_surface(
        &mut self,
        label: &'static str,
        width: u32,
        height: u32,
        format: PixelFormat,
        plane_count: u8,
        lut: Option<&LutParams>,
    ) -> GxResult<Surface> {
        if plane_count == 0 || plane_count > 3 {
            return Err(GxError::validation(format!(
                "'{label}': plane count {plane_count} must be 1..=3"
            )));
        }
        self.allocate(label, width, height, format, plane_count, 0, lut)
    }

    /// Allocate one buffer logically divided into `slice_count` same-sized sub-images stacked
    /// vertically (each `width`x`height`).
    #[tracing::instrument(skip(self))]
    pub fn allocate_surface_sliced(
        &mut self,
        label: &'static str,
        width: u32,
        height: u32,
        format: PixelFormat,
        slice_count: u8,
    ) -> GxResult<Surface> {
        if slice_count == 0 {
            return Err(GxError::validation(format!(
                "'{label}': slice count must be positive"
            )));
        }
        let total_h = height
            .checked_mul(u32::from(slice_count))
            .ok_or_else(|| GxError::allocation(format!("'{label}': sliced height overflows")))?;
        let mut s = self.allocate(label, width, total_h, format, 1, slice_count, None)?;
        s.rect = Rect::sized(width, height);
        Ok(s)
    }

    #[allow(clippy::too_many_arguments)]
    fn allocate(
        &mut self,
        label: &'static str,
        width: u32,
        height: u32,
        format: PixelFormat,
        plane_count: u8,
        slices: u8,
        lut: Option<&LutParams>,
    ) -> GxResult<Surface> {
        if width == 0 || height == 0 {
            return Err(GxError::allocation(format!(
                "'{label}': zero-sized surface {width}x{height}"
            )));
        }
        let plane_bytes = format.plane_bytes(width, height).ok_or_else(|| {
            GxError::allocation(format!("'{label}': {width}x{height} plane size overflows"))
        })?;
        let lut_bytes = if format.is_indexed() {
            LUT_HOST_BYTES * usize::from(plane_count)
        } else {
            0
        };
        let total = plane_bytes
            .checked_mul(usize::from(plane_count))
            .and_then(|b| b.checked_add(lut_bytes))
            .ok_or_else(|| GxError::allocation(format!("'{label}': host size overflows")))?;
        if self.host_bytes.saturating_add(total) > self.opts.host_budget_bytes {
            return Err(GxError::allocation(format!(
                "'{label}': {total} host bytes exceed budget ({} of {} in use)",
                self.host_bytes, self.opts.host_budget_bytes
            )));
        }

        let planes: SmallVec<[Vec<u8>; 3]> =
            (0..plane_count).map(|_| vec![0u8; plane_bytes]).collect();
        let luts: SmallVec<[Box<Lut>; 3]> = if format.is_indexed() {
            (0..usize::from(plane_count))
                .map(|ch| {
                    Box::new(match lut {
                        Some(p) => Lut::build(p, ch),
                        None => Lut::identity(),
                    })
                })
                .collect()
        } else {
            SmallVec::new()
        };

        self.host_bytes = self.host_bytes.saturating_add(total);
        self.live_surfaces = self.live_surfaces.saturating_add(1);
        tracing::debug!(label, width, height, ?format, plane_count, "surface allocated");

        Ok(Surface {
            label,
            width,
            height,
            format,
            planes,
            slices,
            luts,
            placement: Placement::Unbound,
            shadows: Vec::new(),
            shadow_index: 0,
            rect: Rect::sized(width, height),
            dirty: false,
            revision: 0,
        })
    }

    /// Rebuild the transfer tables of an indexed surface in place.
    pub fn refill_luts(&mut self, surface: &mut Surface, params: &LutParams) {
        for (ch, lut) in surface.luts.iter_mut().enumerate() {
            **lut = Lut::build(params, ch);
        }
    }

    /// Map every shadow slot of every plane permanently into fast memory.
    #[tracing::instrument(skip(self, surface), fields(label = surface.label))]
    pub fn bind_resident(
        &mut self,
        surface: &mut Surface,
        banks: &[BankLayout],
        shadow_count: usize,
    ) -> GxResult<()> {
        let bytes = u32::try_from(surface.plane_bytes()).map_err(|_| {
            GxError::allocation(format!("'{}': plane too large for fast memory", surface.label))
        })?;
        self.bind(surface, banks, shadow_count, Placement::Resident, bytes)
    }

    /// Reserve cache windows for every shadow slot of every plane.
    #[tracing::instrument(skip(self, surface), fields(label = surface.label))]
    pub fn bind_cached(
        &mut self,
        surface: &mut Surface,
        banks: &[BankLayout],
        shadow_count: usize,
    ) -> GxResult<()> {
        self.bind(
            surface,
            banks,
            shadow_count,
            Placement::Cached,
            CACHE_WINDOW_BYTES,
        )
    }

    fn bind(
        &mut self,
        surface: &mut Surface,
        banks: &[BankLayout],
        shadow_count: usize,
        placement: Placement,
        bytes: u32,
    ) -> GxResult<()> {
        if surface.is_bound() {
            return Err(GxError::mismatch(format!(
                "'{}' is already bound ({:?})",
                surface.label, surface.placement
            )));
        }
        if shadow_count == 0 || shadow_count > MAX_SHADOWS {
            return Err(GxError::validation(format!(
                "'{}': shadow count {shadow_count} must be 1..={MAX_SHADOWS}",
                surface.label
            )));
        }
        if banks.len() != surface.plane_count() {
            return Err(GxError::mismatch(format!(
                "'{}': {} bank layouts for {} planes",
                surface.label,
                banks.len(),
                surface.plane_count()
            )));
        }

        let mut taken: Vec<Span> = Vec::new();
        let mut shadows = Vec::with_capacity(shadow_count);
        for _ in 0..shadow_count {
            let mut planes = SmallVec::new();
            for &layout in banks {
                match self.reserve_plane(layout, bytes, &mut taken) {
                    Ok(r) => planes.push(r),
                    Err(e) => {
                        for span in taken {
                            // Spans were just reserved; freeing them cannot fail.
                            let _ = self.arena.free(span);
                        }
                        tracing::warn!(label = surface.label, ?placement, "bind failed: {e}");
                        return Err(e);
                    }
                }
            }
            shadows.push(ShadowSlot {
                planes,
                loaded_epoch: None,
                revision: None,
            });
        }

        surface.placement = placement;
        surface.shadows = shadows;
        surface.shadow_index = 0;
        tracing::debug!(
            label = surface.label,
            ?placement,
            shadow_count,
            fast_bytes = surface.fast_bytes(),
            "surface bound"
        );
        Ok(())
    }

    fn reserve_plane(
        &mut self,
        layout: BankLayout,
        bytes: u32,
        taken: &mut Vec<Span>,
    ) -> GxResult<PlaneRegion> {
        match layout {
            BankLayout::Even | BankLayout::Odd => {
                let lo = self.arena.alloc(layout.primary_bank(), bytes)?;
                taken.push(lo);
                Ok(PlaneRegion {
                    lo,
                    hi: None,
                    split: bytes,
                })
            }
            BankLayout::Interleaved => {
                let split = bytes.div_ceil(2);
                let lo = self.arena.alloc(Bank::Even, split)?;
                taken.push(lo);
                let hi = self.arena.alloc(Bank::Odd, bytes - split)?;
                taken.push(hi);
                Ok(PlaneRegion {
                    lo,
                    hi: Some(hi),
                    split,
                })
            }
        }
    }

    /// Start a new frame: every cached slot must be paged in again before it is sampled.
    pub fn invalidate_cached(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.invalidations = self.invalidations.saturating_add(1);
    }

    /// Upload a dirty surface into its next shadow slot and clear `dirty`.
    ///
    /// The ring advances by one slot per resolved write, so after the call slot
    /// `shadow_index + L` holds frame `t - L`. Calling again before the next write is a no-op,
    /// except that an invalidated cached slot is paged in again.
    pub fn resolve_preload(&mut self, surface: &mut Surface) -> GxResult<()> {
        if !surface.is_bound() {
            return Err(GxError::mismatch(format!(
                "'{}' sampled before being bound",
                surface.label
            )));
        }
        let n = surface.shadows.len();
        if surface.dirty {
            surface.shadow_index = (surface.shadow_index + n - 1) % n;
            self.load_slot(surface)?;
            surface.shadows[surface.shadow_index].revision = Some(surface.revision);
            surface.dirty = false;
            tracing::trace!(
                label = surface.label,
                slot = surface.shadow_index,
                "preload resolved"
            );
        } else if surface.placement == Placement::Cached
            && surface.shadows[surface.shadow_index].loaded_epoch != Some(self.epoch)
        {
            self.load_slot(surface)?;
        }
        Ok(())
    }

    fn load_slot(&mut self, surface: &mut Surface) -> GxResult<()> {
        let slot_idx = surface.shadow_index;
        match surface.placement {
            Placement::Resident => {
                let slot = &surface.shadows[slot_idx];
                for (plane, region) in surface.planes.iter().zip(slot.planes.iter()) {
                    let split = (region.split as usize).min(plane.len());
                    self.arena.write(region.lo, &plane[..split]);
                    if let Some(hi) = region.hi {
                        self.arena.write(hi, &plane[split..]);
                    }
                }
                self.uploads = self.uploads.saturating_add(1);
            }
            Placement::Cached => {
                self.page_ins = self.page_ins.saturating_add(1);
            }
            Placement::Unbound => {
                return Err(GxError::mismatch(format!(
                    "'{}' has no fast-memory placement",
                    surface.label
                )));
            }
        }
        surface.shadows[slot_idx].loaded_epoch = Some(self.epoch);
        Ok(())
    }

    /// Sample view of frame `t - look_back`.
    ///
    /// Fails with `StalePreload` when the surface is dirty or a cached slot was invalidated since
    /// its last page-in, and with `ConfigurationMismatch` when the look-back exceeds the ring or
    /// the placement cannot serve history.
    pub fn view<'a>(&'a self, surface: &'a Surface, look_back: usize) -> GxResult<TexView<'a>> {
        if !surface.is_bound() {
            return Err(GxError::mismatch(format!(
                "'{}' sampled before being bound",
                surface.label
            )));
        }
        if surface.dirty {
            return Err(GxError::stale(format!(
                "'{}' is dirty for slot {}",
                surface.label, surface.shadow_index
            )));
        }
        let Some(slot_idx) = surface.slot_for(look_back) else {
            return Err(GxError::mismatch(format!(
                "'{}': look-back {look_back} exceeds {} shadow slots",
                surface.label,
                surface.shadow_count()
            )));
        };
        let slot = &surface.shadows[slot_idx];

        let mut planes = SmallVec::new();
        match surface.placement {
            Placement::Resident => {
                // Slots not written yet read back as zeroed memory.
                let plane_len = surface.plane_bytes() as u32;
                for region in &slot.planes {
                    let lo_used = region.split.min(plane_len);
                    let lo = self.arena.read(region.lo, lo_used);
                    let hi = match region.hi {
                        Some(hi) => self.arena.read(hi, plane_len - lo_used),
                        None => &[],
                    };
                    planes.push(PlaneView { lo, hi });
                }
            }
            Placement::Cached => {
                if look_back != 0 {
                    return Err(GxError::mismatch(format!(
                        "'{}' is cached and keeps no history (look-back {look_back})",
                        surface.label
                    )));
                }
                if slot.loaded_epoch != Some(self.epoch) {
                    return Err(GxError::stale(format!(
                        "'{}' cache slot {slot_idx} invalidated since last page-in",
                        surface.label
                    )));
                }
                for p in &surface.planes {
                    planes.push(PlaneView::contiguous(p));
                }
            }
            Placement::Unbound => {
                return Err(GxError::mismatch(format!(
                    "'{}' has no fast-memory placement",
                    surface.label
                )));
            }
        }

        Ok(TexView {
            width: surface.width,
            height: surface.height,
            format: surface.format,
            rect: surface.rect,
            planes,
            luts: surface.luts.iter().map(|b| &**b).collect(),
        })
    }

    /// Release every host buffer, region and table of `surface` and reset it.
    #[tracing::instrument(skip(self, surface), fields(label = surface.label))]
    pub fn free_surface(&mut self, surface: &mut Surface) -> GxResult<()> {
        if surface.planes.is_empty() {
            return Err(GxError::mismatch(format!(
                "'{}' freed twice",
                surface.label
            )));
        }
        for slot in surface.shadows.drain(..) {
            for region in &slot.planes {
                for span in region.spans() {
                    self.arena.free(span)?;
                }
            }
        }
        let bytes = surface.host_bytes();
        self.host_bytes = self.host_bytes.saturating_sub(bytes);
        self.live_surfaces = self.live_surfaces.saturating_sub(1);

        surface.planes.clear();
        surface.luts.clear();
        surface.slices = 0;
        surface.placement = Placement::Unbound;
        surface.shadow_index = 0;
        surface.rect = Rect::default();
        surface.dirty = false;
        surface.width = 0;
        surface.height = 0;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/memory/cache.rs"]
mod tests;
