//! Domain model: blocks, adjacency, and the source that produces them.

use serde::{Deserialize, Serialize};

/// Identifies one block within the domain.
pub type BlockId = u32;

/// Which side of an axis an adjacent block sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Lower,
    Upper,
}

/// Adjacency of one block face to a neighboring block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNeighbor {
    /// The axis the shared face is normal to.
    pub dimension: usize,
    /// Which side of that axis the neighbor lies on.
    pub side: Side,
    /// The neighboring block.
    pub block: BlockId,
}

/// A named sub-region of the domain, immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    pub neighbors: Vec<BlockNeighbor>,
}

/// The decomposed domain: an ordered set of blocks.
///
/// Block order is the creation order the distributor iterates in, so it is
/// part of the deterministic-placement contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    blocks: Vec<Block>,
}

impl Domain {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Look up a block by id.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }
}

/// Produces a domain description plus per-block refinement and extents.
///
/// The kernel is geometry-agnostic; all mesh construction logic lives in
/// the `DomainSource` implementation. The source is consumed read-only:
/// the distributor never mutates what it returns.
pub trait DomainSource: Send + Sync {
    /// Build the domain: blocks with adjacency.
    fn create_domain(&self) -> Domain;

    /// Per-block, per-dimension subdivision counts, indexed by block id.
    ///
    /// Refinement `r` along an axis splits that axis into `2^r` segments.
    fn initial_refinement(&self) -> Vec<Vec<u32>>;

    /// Per-block, per-dimension grid-point extents handed to each element
    /// at local initialization.
    fn initial_extents(&self) -> Vec<Vec<usize>>;
}
