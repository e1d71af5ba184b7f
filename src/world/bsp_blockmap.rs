//! Coarse grid that short-cuts BSP point location.
//!
//! Each cell remembers the deepest BSP node whose subtree holds the
//! whole cell, or the leaf itself when the cell sits entirely inside one
//! convex region.  `leaf_at` then answers in O(1) for most positions and
//! otherwise resumes the descent part-way down instead of at the root.

use glam::Vec2;
use tracing::info;

use super::bsp::{BspError, BspTree, LeafId, is_leaf, CHILD_MASK};
use super::geometry::{Aabb, SectorId};
use crate::blockmap::Grid;
use crate::config::BlockmapConfig;

/// Cell boxes are grown by this fraction of a cell before classification
/// so float error at cell borders cannot land a point outside its box.
const CELL_SLOP: f32 = 1.0 / 1024.0;

#[derive(Debug)]
pub struct BspBlockmap {
    tree: BspTree,
    grid: Grid,
    cells: Vec<u32>,
}

/// How many cells resolved straight to a leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BspCacheStats {
    pub cells: usize,
    pub leaf_cells: usize,
}

impl BspBlockmap {
    pub fn new(tree: BspTree, config: &BlockmapConfig) -> Result<Self, BspError> {
        config.validate()?;

        let grid = Grid::new(tree.bounds(), config.bsp_cell_size);
        let count = (grid.width as usize)
            .checked_mul(grid.height as usize)
            .filter(|&n| n <= config.max_cells)
            .ok_or(BspError::CacheTooLarge {
                width: grid.width,
                height: grid.height,
            })?;

        let slop = grid.cell_size * CELL_SLOP;
        let mut cells = Vec::with_capacity(count);
        for y in 0..grid.height {
            for x in 0..grid.width {
                let cell = grid.cell_box(x, y);
                let cell = Aabb::new(cell.min - Vec2::splat(slop), cell.max + Vec2::splat(slop));
                cells.push(Self::classify(&tree, &cell));
            }
        }

        let cache = Self { tree, grid, cells };
        let stats = cache.stats();
        info!(
            width = grid.width,
            height = grid.height,
            leaf_cells = stats.leaf_cells,
            "built BSP point-location cache"
        );
        Ok(cache)
    }

    /// Deepest child reference known to contain all of `cell`.
    fn classify(tree: &BspTree, cell: &Aabb) -> u32 {
        let root = tree.root();
        let mut parent = root;
        let mut cur = root;

        while !is_leaf(cur) {
            let node = &tree.nodes()[cur as usize];
            match node.box_side(cell) {
                Some(side) => {
                    parent = cur;
                    cur = node.child[side as usize];
                }
                None => return cur,
            }
        }

        let leaf = tree.leaf(cur & CHILD_MASK);
        let corners = cell.corners();
        let inside = leaf.segs.iter().all(|seg| {
            let side = seg.point_side(corners[0]);
            corners[1..].iter().all(|&c| seg.point_side(c) == side)
        });
        if inside { cur } else { parent }
    }

    #[inline]
    pub fn tree(&self) -> &BspTree {
        &self.tree
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Leaf containing `p`; identical to `BspTree::locate_leaf`.
    #[inline]
    pub fn leaf_at(&self, p: Vec2) -> LeafId {
        match self.grid.try_cell_at(p) {
            Some((x, y)) => self.tree.descend_from(self.cells[self.grid.index(x, y)], p),
            None => self.tree.locate_leaf(p),
        }
    }

    #[inline]
    pub fn sector_at(&self, p: Vec2) -> SectorId {
        self.tree.leaf(self.leaf_at(p)).sector
    }

    pub fn stats(&self) -> BspCacheStats {
        BspCacheStats {
            cells: self.cells.len(),
            leaf_cells: self.cells.iter().filter(|&&c| is_leaf(c)).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::bsp::test_trees::random_tree;
    use crate::world::bsp::{LEAF_BIT, Leaf, Node};
    use crate::world::Segment;
    use glam::vec2;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn cache_agrees_with_full_descent() {
        let tree = random_tree(0xD00D, 5, 1024.0);
        let cache = BspBlockmap::new(tree, &BlockmapConfig::default().with_bsp_cell_size(32.0))
            .unwrap();
        assert!(cache.stats().leaf_cells > 0);
        assert!(cache.stats().leaf_cells < cache.stats().cells);

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10_000 {
            let p = vec2(rng.gen_range(0.0..1024.0), rng.gen_range(0.0..1024.0));
            assert_eq!(cache.leaf_at(p), cache.tree().locate_leaf(p), "at {p:?}");
        }
    }

    #[test]
    fn outside_coverage_falls_back_to_descent() {
        let tree = random_tree(5, 4, 512.0);
        let cache = BspBlockmap::new(tree, &BlockmapConfig::default()).unwrap();
        for p in [vec2(-300.0, 40.0), vec2(2000.0, 2000.0), vec2(100.0, -1.0)] {
            assert_eq!(cache.leaf_at(p), cache.tree().locate_leaf(p));
        }
    }

    fn halves() -> BspTree {
        // split at x = 100; front (x >= 100) is leaf 0
        let square = |x0: f32, x1: f32, sector| {
            let c = [vec2(x0, 0.0), vec2(x0, 256.0), vec2(x1, 256.0), vec2(x1, 0.0)];
            Leaf {
                bbox: Aabb::new(vec2(x0, 0.0), vec2(x1, 256.0)),
                segs: (0..4).map(|i| Segment::new(c[i], c[(i + 1) % 4])).collect(),
                sector,
            }
        };
        BspTree::new(
            vec![Node { x: 100.0, y: 0.0, dx: 0.0, dy: 1.0, child: [LEAF_BIT, LEAF_BIT | 1] }],
            vec![square(100.0, 256.0, 4), square(0.0, 100.0, 9)],
        )
        .unwrap()
    }

    #[test]
    fn cells_inside_one_leaf_cache_the_leaf() {
        let cache =
            BspBlockmap::new(halves(), &BlockmapConfig::default().with_bsp_cell_size(64.0)).unwrap();
        let g = *cache.grid();
        assert_eq!((g.width, g.height), (4, 4));

        // (128..192, 64..128) is well inside the front half
        assert_eq!(cache.cells[g.index(2, 1)], LEAF_BIT);
        // column 1 straddles x = 100
        assert_eq!(cache.cells[g.index(1, 1)], cache.tree().root());
        assert_eq!(cache.sector_at(vec2(30.0, 100.0)), 9);
        assert_eq!(cache.sector_at(vec2(150.0, 100.0)), 4);
    }

    #[test]
    fn leaf_edges_crossing_the_cell_fall_back_to_parent() {
        let cache =
            BspBlockmap::new(halves(), &BlockmapConfig::default().with_bsp_cell_size(64.0)).unwrap();
        let g = *cache.grid();
        // map border runs along the outer cells
        assert_eq!(cache.cells[g.index(0, 1)], cache.tree().root());
        assert_eq!(cache.cells[g.index(3, 2)], cache.tree().root());
        assert_eq!(cache.leaf_at(vec2(250.0, 150.0)), 0);
        assert_eq!(cache.leaf_at(vec2(10.0, 100.0)), 1);
    }

    #[test]
    fn oversized_cache_is_a_load_error() {
        let cfg = BlockmapConfig::default().with_bsp_cell_size(1.0).with_max_cells(16);
        assert!(matches!(
            BspBlockmap::new(halves(), &cfg),
            Err(BspError::CacheTooLarge { .. })
        ));
    }
}
