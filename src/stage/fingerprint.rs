use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x6a09e667f3bcc908;

/// 128-bit identity of a built command block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BlockFingerprint {
    /// High half.
    pub hi: u64,
    /// Low half.
    pub lo: u64,
}

pub(crate) struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    pub(crate) fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    pub(crate) fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub(crate) fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub(crate) fn finish(self) -> BlockFingerprint {
        let v = self.inner.digest128();
        BlockFingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}
