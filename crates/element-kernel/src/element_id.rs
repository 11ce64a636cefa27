//! Element identities: deterministic, structural, unique across the domain.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::BlockId;

/// One segment of a refined axis: which of the `2^level` pieces this is.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SegmentId {
    pub refinement_level: u32,
    pub index: u64,
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}I{}", self.refinement_level, self.index)
    }
}

/// Uniquely identifies one element within the whole domain.
///
/// Derived deterministically from the block and the block's refinement
/// spec; immutable for the lifetime of the element. Renaming under
/// migration is future work and is deliberately not representable here.
#[derive(
    Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ElementId {
    pub block: BlockId,
    pub segments: Vec<SegmentId>,
}

impl ElementId {
    pub fn new(block: BlockId, segments: Vec<SegmentId>) -> Self {
        Self { block, segments }
    }

    pub fn dim(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.block)?;
        for segment in &self.segments {
            write!(f, ":{}", segment)?;
        }
        Ok(())
    }
}

/// Number of elements a refinement spec implies: product over dims of `2^r`.
pub fn element_count(refinement: &[u32]) -> u64 {
    refinement.iter().map(|&r| 1u64 << r).product()
}

/// Compute the concrete element identities for one block.
///
/// Order is lexicographic in segment indices with the last dimension
/// varying fastest; together with domain block order this fixes the
/// global creation order the distributor assigns workers in.
pub fn initial_element_ids(block: BlockId, refinement: &[u32]) -> Vec<ElementId> {
    let mut prefixes: Vec<Vec<SegmentId>> = vec![Vec::new()];
    for &level in refinement {
        let segments_on_axis = 1u64 << level;
        let mut next = Vec::with_capacity(prefixes.len() * segments_on_axis as usize);
        for prefix in &prefixes {
            for index in 0..segments_on_axis {
                let mut segments = prefix.clone();
                segments.push(SegmentId {
                    refinement_level: level,
                    index,
                });
                next.push(segments);
            }
        }
        prefixes = next;
    }
    prefixes
        .into_iter()
        .map(|segments| ElementId::new(block, segments))
        .collect()
}
