// SPDX-License-Identifier: CEPL-1.0

/// Index over the fixed set of in-flight frame slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRing {
    current: usize,
    len: usize,
}

impl FrameRing {
    /// A ring of at least one slot.
    pub fn new(len: usize) -> Self {
        Self {
            current: 0,
            len: len.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn slots(&self) -> usize {
        self.len
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.len;
    }
}
