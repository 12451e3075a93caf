//! Read-only access to block ancestry.
//!
//! The retargeting engine only ever walks backwards from a tip. Storage stays
//! with the caller: anything that can answer [`ChainView`] can drive the
//! engine. [`ChainIndex`] is an append-only arena for callers that hold the
//! active chain in memory.

use alloc::vec::Vec;

/// Handle to a block inside a [`ChainView`].
///
/// A plain index, never an owning link: the chain outlives every call that
/// reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

/// What the engine needs to know about an accepted block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainBlock {
    /// Height above genesis.
    pub height: u32,
    /// Header timestamp (Unix time).
    pub time: i64,
    /// Difficulty target in compact "bits" format.
    pub bits: u32,
    /// Immediate predecessor, `None` for genesis.
    pub prev: Option<BlockId>,
}

/// Narrow read interface over stored block ancestry.
///
/// Implementations must be safe for concurrent reads if the engine is called
/// from several threads; the engine itself never writes.
pub trait ChainView {
    /// Look up a block by handle.
    fn block(&self, id: BlockId) -> Option<&ChainBlock>;

    /// Find the ancestor of `id` at `height`.
    ///
    /// The default walks predecessor links one at a time; stores with a
    /// height index should override it.
    fn ancestor(&self, id: BlockId, height: u32) -> Option<BlockId> {
        let mut current = id;
        loop {
            let block = self.block(current)?;
            if block.height == height {
                return Some(current);
            }
            if block.height < height {
                return None;
            }
            current = block.prev?;
        }
    }
}

impl<T: ChainView + ?Sized> ChainView for &T {
    fn block(&self, id: BlockId) -> Option<&ChainBlock> {
        (**self).block(id)
    }

    fn ancestor(&self, id: BlockId, height: u32) -> Option<BlockId> {
        (**self).ancestor(id, height)
    }
}

/// Append-only arena holding a single chain from genesis.
///
/// Arena slot equals height, so ancestor-at-height lookups are O(1).
#[derive(Debug, Clone, Default)]
pub struct ChainIndex {
    blocks: Vec<ChainBlock>,
}

impl ChainIndex {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty chain with room for `capacity` blocks.
    pub fn with_capacity(capacity: usize) -> Self {
        ChainIndex {
            blocks: Vec::with_capacity(capacity),
        }
    }

    /// Append a block on top of the current tip and return its handle.
    pub fn push(&mut self, time: i64, bits: u32) -> BlockId {
        let id = BlockId(self.blocks.len());
        let block = ChainBlock {
            height: id.0 as u32,
            time,
            bits,
            prev: self.tip(),
        };
        self.blocks.push(block);
        id
    }

    /// Handle of the most recent block, if any.
    pub fn tip(&self) -> Option<BlockId> {
        self.blocks.len().checked_sub(1).map(BlockId)
    }

    /// Block behind `id`.
    pub fn get(&self, id: BlockId) -> Option<&ChainBlock> {
        self.blocks.get(id.0)
    }

    /// Handle of the block at `height`.
    pub fn at_height(&self, height: u32) -> Option<BlockId> {
        let index = height as usize;
        (index < self.blocks.len()).then_some(BlockId(index))
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True before genesis has been appended.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks from genesis to tip.
    pub fn iter(&self) -> impl Iterator<Item = &ChainBlock> {
        self.blocks.iter()
    }
}

impl ChainView for ChainIndex {
    fn block(&self, id: BlockId) -> Option<&ChainBlock> {
        self.get(id)
    }

    fn ancestor(&self, id: BlockId, height: u32) -> Option<BlockId> {
        let block = self.get(id)?;
        (height <= block.height).then_some(BlockId(height as usize))
    }
}

impl Extend<(i64, u32)> for ChainIndex {
    fn extend<I: IntoIterator<Item = (i64, u32)>>(&mut self, iter: I) {
        for (time, bits) in iter {
            self.push(time, bits);
        }
    }
}

impl FromIterator<(i64, u32)> for ChainIndex {
    fn from_iter<I: IntoIterator<Item = (i64, u32)>>(iter: I) -> Self {
        let mut chain = ChainIndex::new();
        chain.extend(iter);
        chain
    }
}
