//! Logical image buffers and their fast-memory metadata.

pub(crate) mod format;
pub(crate) mod lut;

use crate::foundation::core::Rect;
use crate::foundation::error::{GxError, GxResult};
use crate::memory::arena::{Bank, Span};
use format::PixelFormat;
use lut::Lut;
use smallvec::SmallVec;

/// Fast-memory residency of a surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Allocated in host memory only.
    #[default]
    Unbound,
    /// Full copies of every shadow slot live in fast memory.
    Resident,
    /// Only cache windows are reserved; texels are paged in from host memory before use.
    Cached,
}

/// Where the fast-memory region of one plane goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankLayout {
    /// Entirely in the even bank.
    Even,
    /// Entirely in the odd bank.
    Odd,
    /// First half in the even bank, second half in the odd bank.
    Interleaved,
}

impl BankLayout {
    pub(crate) fn primary_bank(self) -> Bank {
        match self {
            Self::Even | Self::Interleaved => Bank::Even,
            Self::Odd => Bank::Odd,
        }
    }
}

/// Fast-memory descriptor for one plane in one shadow slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneRegion {
    /// Span holding the first `split` bytes.
    pub lo: Span,
    /// Span holding the remainder, for interleaved planes.
    pub hi: Option<Span>,
    /// Bytes of plane data stored in `lo`.
    pub split: u32,
}

impl PlaneRegion {
    /// Total reserved bytes.
    pub fn reserved(&self) -> u32 {
        self.lo.len + self.hi.map_or(0, |s| s.len)
    }

    pub(crate) fn spans(&self) -> impl Iterator<Item = Span> + '_ {
        std::iter::once(self.lo).chain(self.hi)
    }
}

/// One entry of a surface's shadow ring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadowSlot {
    /// Region per plane.
    pub planes: SmallVec<[PlaneRegion; 3]>,
    /// Cache epoch the slot was last loaded in; `None` until first load.
    pub(crate) loaded_epoch: Option<u64>,
    /// Producer revision copied into this slot.
    pub(crate) revision: Option<u64>,
}

/// A logical image buffer backed by host planes and, once bound, fast-memory regions.
///
/// Surfaces are created by [`crate::TextureCache::allocate_surface`] and must be released with
/// [`crate::TextureCache::free_surface`].
#[derive(Debug)]
pub struct Surface {
    pub(crate) label: &'static str,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) format: PixelFormat,
    pub(crate) planes: SmallVec<[Vec<u8>; 3]>,
    pub(crate) slices: u8,
    pub(crate) luts: SmallVec<[Box<Lut>; 3]>,
    pub(crate) placement: Placement,
    pub(crate) shadows: Vec<ShadowSlot>,
    pub(crate) shadow_index: usize,
    pub(crate) rect: Rect,
    pub(crate) dirty: bool,
    pub(crate) revision: u64,
}

impl Surface {
    /// Debug label.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels (for sliced surfaces, the height of the whole buffer).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Texel format.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Number of planes.
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Number of slices (0 when the surface is not sliced).
    pub fn slice_count(&self) -> usize {
        usize::from(self.slices)
    }

    /// Bytes per plane.
    pub fn plane_bytes(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    /// Host bytes owned (planes plus tables).
    pub fn host_bytes(&self) -> usize {
        self.planes.iter().map(Vec::len).sum::<usize>() + self.luts.len() * LUT_HOST_BYTES
    }

    /// Fast-memory bytes reserved across all shadow slots.
    pub fn fast_bytes(&self) -> usize {
        self.shadows
            .iter()
            .flat_map(|s| s.planes.iter())
            .map(|r| r.reserved() as usize)
            .sum()
    }

    /// Read-only host plane.
    pub fn plane(&self, i: usize) -> &[u8] {
        &self.planes[i]
    }

    /// Sub-image `i` of a sliced surface.
    pub fn slice(&self, i: usize) -> GxResult<&[u8]> {
        let (start, end) = self.slice_range(i)?;
        Ok(&self.planes[0][start..end])
    }

    /// Mutable sub-image `i` of a sliced surface. Marks the surface dirty.
    pub fn slice_mut(&mut self, i: usize) -> GxResult<&mut [u8]> {
        let (start, end) = self.slice_range(i)?;
        self.mark_dirty();
        Ok(&mut self.planes[0][start..end])
    }

    fn slice_range(&self, i: usize) -> GxResult<(usize, usize)> {
        if i >= self.slice_count() {
            return Err(GxError::validation(format!(
                "slice {i} out of range for '{}' ({} slices)",
                self.label, self.slices
            )));
        }
        let len = self.plane_bytes() / self.slice_count();
        Ok((i * len, (i + 1) * len))
    }

    /// Transfer table of plane `i` (indexed formats only).
    pub fn lut(&self, i: usize) -> Option<&Lut> {
        self.luts.get(i).map(|b| &**b)
    }

    /// Current placement.
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// `true` once bound to fast memory.
    pub fn is_bound(&self) -> bool {
        self.placement != Placement::Unbound
    }

    /// Shadow ring length (0 while unbound).
    pub fn shadow_count(&self) -> usize {
        self.shadows.len()
    }

    /// Slot holding the most recent frame.
    pub fn shadow_index(&self) -> usize {
        self.shadow_index
    }

    /// Slot holding frame `t - look_back`.
    pub fn slot_for(&self, look_back: usize) -> Option<usize> {
        if look_back >= self.shadows.len() {
            return None;
        }
        Some((self.shadow_index + look_back) % self.shadows.len())
    }

    /// Shadow slot descriptors.
    pub fn shadows(&self) -> &[ShadowSlot] {
        &self.shadows
    }

    /// Valid pixel rectangle.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Set the valid pixel rectangle; it must fit the surface.
    pub fn set_rect(&mut self, rect: Rect) -> GxResult<()> {
        if rect.w == 0 || rect.h == 0 || !rect.fits_in(self.width, self.height) {
            return Err(GxError::validation(format!(
                "rect {rect:?} does not fit '{}' ({}x{})",
                self.label, self.width, self.height
            )));
        }
        self.rect = rect;
        Ok(())
    }

    /// `true` when host planes hold data not yet uploaded to the current slot.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the host planes as rewritten.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision = self.revision.wrapping_add(1);
    }

    /// Number of producer writes so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mutable host planes for a producer. The caller marks the surface dirty when done.
    pub(crate) fn planes_mut(&mut self) -> &mut [Vec<u8>] {
        &mut self.planes
    }

    /// Shape summary used by stage validation and logging.
    pub fn shape(&self) -> SurfaceShape {
        SurfaceShape {
            width: self.width,
            height: self.height,
            format: self.format,
            planes: self.planes.len() as u8,
        }
    }
}

pub(crate) const LUT_HOST_BYTES: usize = 256 * 3;

/// Size/format/plane-count signature of a surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceShape {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Texel format.
    pub format: PixelFormat,
    /// Plane count.
    pub planes: u8,
}

#[cfg(test)]
#[path = "../../tests/unit/surface/surface.rs"]
mod tests;
