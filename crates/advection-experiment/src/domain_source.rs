//! A line of 1-D blocks as the domain source.

use element_kernel::{Block, BlockNeighbor, Domain, DomainSource, Side};

/// `blocks` equally sized 1-D blocks in a line, each refined `refinement`
/// times along the single axis and carrying `points` grid points per
/// element.
#[derive(Debug, Clone)]
pub struct LineDomainSource {
    pub blocks: u32,
    pub refinement: u32,
    pub points: usize,
}

impl DomainSource for LineDomainSource {
    fn create_domain(&self) -> Domain {
        let blocks = (0..self.blocks)
            .map(|id| {
                let mut neighbors = Vec::new();
                if id > 0 {
                    neighbors.push(BlockNeighbor {
                        dimension: 0,
                        side: Side::Lower,
                        block: id - 1,
                    });
                }
                if id + 1 < self.blocks {
                    neighbors.push(BlockNeighbor {
                        dimension: 0,
                        side: Side::Upper,
                        block: id + 1,
                    });
                }
                Block {
                    id,
                    name: format!("segment_{}", id),
                    neighbors,
                }
            })
            .collect();
        Domain::new(blocks)
    }

    fn initial_refinement(&self) -> Vec<Vec<u32>> {
        vec![vec![self.refinement]; self.blocks as usize]
    }

    fn initial_extents(&self) -> Vec<Vec<usize>> {
        vec![vec![self.points]; self.blocks as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_blocks_have_two_neighbors() {
        let source = LineDomainSource {
            blocks: 3,
            refinement: 1,
            points: 4,
        };
        let domain = source.create_domain();
        assert_eq!(domain.blocks().len(), 3);
        assert_eq!(domain.blocks()[0].neighbors.len(), 1);
        assert_eq!(domain.blocks()[1].neighbors.len(), 2);
        assert_eq!(domain.blocks()[2].neighbors.len(), 1);

        let middle = &domain.blocks()[1];
        assert!(middle
            .neighbors
            .iter()
            .any(|n| n.side == Side::Lower && n.block == 0));
        assert!(middle
            .neighbors
            .iter()
            .any(|n| n.side == Side::Upper && n.block == 2));
    }

    #[test]
    fn refinement_and_extents_cover_every_block() {
        let source = LineDomainSource {
            blocks: 5,
            refinement: 2,
            points: 8,
        };
        assert_eq!(source.initial_refinement(), vec![vec![2]; 5]);
        assert_eq!(source.initial_extents(), vec![vec![8]; 5]);
    }
}
