use crate::foundation::error::{GxError, GxResult};
use std::collections::BTreeMap;

/// Default fast-memory size (1 MiB, split evenly between the two banks).
pub const TMEM_BYTES: u32 = 1 << 20;

/// Allocation granularity inside a bank.
pub const TMEM_ALIGN: u32 = 32;

/// One half of the fast-memory pool.
///
/// Planes can be split across both banks so that paired fetches hit different banks.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Bank {
    /// Lower half.
    Even,
    /// Upper half.
    Odd,
}

impl Bank {
    fn index(self) -> usize {
        match self {
            Self::Even => 0,
            Self::Odd => 1,
        }
    }
}

/// A reserved byte range of the arena. `offset` is absolute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    /// Bank the span lives in.
    pub bank: Bank,
    /// Absolute arena offset.
    pub offset: u32,
    /// Reserved length (multiple of [`TMEM_ALIGN`]).
    pub len: u32,
}

impl Span {
    /// One past the last byte.
    pub fn end(self) -> u32 {
        self.offset + self.len
    }

    /// `true` when the two spans share at least one byte.
    pub fn overlaps(self, other: Span) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Arena bookkeeping snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArenaStats {
    /// Spans currently reserved.
    pub live_spans: usize,
    /// Bytes currently reserved.
    pub live_bytes: usize,
    /// High-water mark of `live_bytes`.
    pub peak_bytes: usize,
    /// Successful allocations since creation.
    pub allocs: u64,
    /// Rejected allocations since creation.
    pub failed_allocs: u64,
}

#[derive(Debug, Clone)]
struct BankState {
    base: u32,
    size: u32,
    // Sorted by offset, never adjacent (coalesced on free).
    free: Vec<(u32, u32)>,
}

impl BankState {
    fn new(base: u32, size: u32) -> Self {
        Self {
            base,
            size,
            free: vec![(base, size)],
        }
    }

    fn best_fit(&self, len: u32) -> Option<usize> {
        self.free
            .iter()
            .enumerate()
            .filter(|(_, (_, flen))| *flen >= len)
            .min_by_key(|(_, (off, flen))| (*flen, *off))
            .map(|(i, _)| i)
    }

    fn take(&mut self, idx: usize, len: u32) -> u32 {
        let (off, flen) = self.free[idx];
        if flen == len {
            self.free.remove(idx);
        } else {
            self.free[idx] = (off + len, flen - len);
        }
        off
    }

    fn give_back(&mut self, off: u32, len: u32) {
        let pos = self.free.partition_point(|(o, _)| *o < off);
        self.free.insert(pos, (off, len));
        // Merge with the following block, then with the preceding one.
        if pos + 1 < self.free.len() {
            let (o, l) = self.free[pos];
            let (no, nl) = self.free[pos + 1];
            if o + l == no {
                self.free[pos] = (o, l + nl);
                self.free.remove(pos + 1);
            }
        }
        if pos > 0 {
            let (po, pl) = self.free[pos - 1];
            let (o, l) = self.free[pos];
            if po + pl == o {
                self.free[pos - 1] = (po, pl + l);
                self.free.remove(pos);
            }
        }
    }

    fn available(&self) -> u32 {
        self.free.iter().map(|(_, l)| *l).sum()
    }

    fn largest_free(&self) -> u32 {
        self.free.iter().map(|(_, l)| *l).max().unwrap_or(0)
    }
}

/// Fixed-size fast-memory arena with two banks and best-fit placement.
///
/// Stands in for the hand-placed bank addresses a fixed-function GPU would use: every
/// reservation is computed when a surface is bound, and live spans never alias.
#[derive(Debug, Clone)]
pub struct TmemArena {
    bytes: Vec<u8>,
    banks: [BankState; 2],
    live: BTreeMap<u32, Span>,
    stats: ArenaStats,
}

impl TmemArena {
    /// Create an arena of `total` bytes. `total` must be a non-zero multiple of `2 * TMEM_ALIGN`.
    pub fn new(total: u32) -> GxResult<Self> {
        if total == 0 || total % (2 * TMEM_ALIGN) != 0 {
            return Err(GxError::validation(format!(
                "tmem size {total} must be a non-zero multiple of {}",
                2 * TMEM_ALIGN
            )));
        }
        let half = total / 2;
        Ok(Self {
            bytes: vec![0; total as usize],
            banks: [BankState::new(0, half), BankState::new(half, half)],
            live: BTreeMap::new(),
            stats: ArenaStats::default(),
        })
    }

    /// Total arena size in bytes.
    pub fn capacity(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Size of one bank.
    pub fn bank_capacity(&self, bank: Bank) -> u32 {
        self.banks[bank.index()].size
    }

    /// Free bytes in `bank` (possibly fragmented).
    pub fn available(&self, bank: Bank) -> u32 {
        self.banks[bank.index()].available()
    }

    /// Largest contiguous free block in `bank`.
    pub fn largest_free(&self, bank: Bank) -> u32 {
        self.banks[bank.index()].largest_free()
    }

    /// Bookkeeping snapshot.
    pub fn stats(&self) -> ArenaStats {
        self.stats.clone()
    }

    /// Reserve `len` bytes (rounded up to [`TMEM_ALIGN`]) in `bank`.
    pub fn alloc(&mut self, bank: Bank, len: u32) -> GxResult<Span> {
        let rounded = len
            .max(1)
            .checked_next_multiple_of(TMEM_ALIGN)
            .ok_or_else(|| GxError::allocation(format!("tmem request of {len} bytes overflows")))?;
        let state = &mut self.banks[bank.index()];
        let Some(idx) = state.best_fit(rounded) else {
            self.stats.failed_allocs = self.stats.failed_allocs.saturating_add(1);
            return Err(GxError::allocation(format!(
                "{bank:?} bank cannot fit {rounded} bytes (largest free block {})",
                state.largest_free()
            )));
        };
        let offset = state.take(idx, rounded);
        let span = Span {
            bank,
            offset,
            len: rounded,
        };
        self.live.insert(offset, span);
        self.bytes[offset as usize..span.end() as usize].fill(0);

        self.stats.live_spans = self.stats.live_spans.saturating_add(1);
        self.stats.live_bytes = self.stats.live_bytes.saturating_add(rounded as usize);
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.stats.live_bytes);
        self.stats.allocs = self.stats.allocs.saturating_add(1);
        Ok(span)
    }

    /// Release a span previously returned by [`TmemArena::alloc`].
    pub fn free(&mut self, span: Span) -> GxResult<()> {
        match self.live.get(&span.offset) {
            Some(live) if *live == span => {}
            _ => {
                return Err(GxError::mismatch(format!(
                    "freeing span {span:?} that is not live"
                )));
            }
        }
        self.live.remove(&span.offset);
        let state = &mut self.banks[span.bank.index()];
        debug_assert!(span.offset >= state.base && span.end() <= state.base + state.size);
        state.give_back(span.offset, span.len);

        self.stats.live_spans = self.stats.live_spans.saturating_sub(1);
        self.stats.live_bytes = self.stats.live_bytes.saturating_sub(span.len as usize);
        Ok(())
    }

    /// `true` when `span` is currently reserved.
    pub fn is_live(&self, span: Span) -> bool {
        self.live.get(&span.offset) == Some(&span)
    }

    /// Copy `src` into the start of `span`; extra bytes are ignored.
    pub(crate) fn write(&mut self, span: Span, src: &[u8]) {
        let n = src.len().min(span.len as usize);
        let start = span.offset as usize;
        self.bytes[start..start + n].copy_from_slice(&src[..n]);
    }

    /// The first `used` bytes of `span`.
    pub(crate) fn read(&self, span: Span, used: u32) -> &[u8] {
        let start = span.offset as usize;
        let n = used.min(span.len) as usize;
        &self.bytes[start..start + n]
    }

    /// Deterministic layout listing (live spans in address order, then free blocks per bank).
    pub fn dump(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("TmemArena {} bytes\n", self.bytes.len()));
        s.push_str(&format!("live: {}\n", self.live.len()));
        for span in self.live.values() {
            s.push_str(&format!(
                "  {:?} 0x{:05X}..0x{:05X} ({} bytes)\n",
                span.bank,
                span.offset,
                span.end(),
                span.len
            ));
        }
        for bank in [Bank::Even, Bank::Odd] {
            let st = &self.banks[bank.index()];
            s.push_str(&format!("free {:?}: {:?}\n", bank, st.free));
        }
        s
    }
}

#[cfg(test)]
#[path = "../../tests/unit/memory/arena.rs"]
mod tests;
