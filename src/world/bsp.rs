//! Read-only view of a prebuilt BSP tree.
//!
//! Children use the vanilla encoding: the top bit marks a leaf
//! (subsector) index, otherwise the value is a node index.  Nodes are
//! stored children-first so the root is always the last node.

use glam::Vec2;
use thiserror::Error;

use super::geometry::{Aabb, Segment, SectorId};
use crate::config::ConfigError;

pub type NodeId = u32;
pub type LeafId = u32;

pub const CHILD_MASK: u32 = 0x7FFF_FFFF;

pub const LEAF_BIT: u32 = 0x8000_0000;

#[derive(Error, Debug, PartialEq)]
pub enum BspError {
    #[error("BSP tree has no leaves")]
    NoLeaves,

    #[error("node {node} child {side} references leaf {leaf} of {count}")]
    BadLeaf {
        node: NodeId,
        side: usize,
        leaf: LeafId,
        count: usize,
    },

    #[error("node {node} child {side} references node {child} which is not built before it")]
    BadChild {
        node: NodeId,
        side: usize,
        child: NodeId,
    },

    #[error("node {0} has a zero-length splitter")]
    DegenerateSplit(NodeId),

    #[error("tree with {0} nodes is too large for 31-bit child indices")]
    TooLarge(usize),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("point-location cache of {width}×{height} cells is too large")]
    CacheTooLarge { width: i32, height: i32 },
}

/// Split plane plus its two children (`child[0]` = front, `child[1]` = back).
#[derive(Clone, Debug)]
pub struct Node {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub child: [u32; 2],
}

/// Convex terminal region.
#[derive(Clone, Debug)]
pub struct Leaf {
    pub bbox: Aabb,
    pub segs: Vec<Segment>,
    pub sector: SectorId,
}

#[derive(Debug)]
pub struct BspTree {
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
}

#[inline(always)]
pub fn is_leaf(child: u32) -> bool {
    child & LEAF_BIT != 0
}

impl BspTree {
    /// Validate and wrap a tree handed over by the map loader.
    pub fn new(nodes: Vec<Node>, leaves: Vec<Leaf>) -> Result<Self, BspError> {
        if leaves.is_empty() {
            return Err(BspError::NoLeaves);
        }
        if nodes.len() > CHILD_MASK as usize || leaves.len() > CHILD_MASK as usize {
            return Err(BspError::TooLarge(nodes.len().max(leaves.len())));
        }

        for (idx, node) in nodes.iter().enumerate() {
            let node_id = idx as NodeId;
            if node.dx == 0.0 && node.dy == 0.0 {
                return Err(BspError::DegenerateSplit(node_id));
            }
            for (side, &child) in node.child.iter().enumerate() {
                let target = child & CHILD_MASK;
                if is_leaf(child) {
                    if target as usize >= leaves.len() {
                        return Err(BspError::BadLeaf {
                            node: node_id,
                            side,
                            leaf: target,
                            count: leaves.len(),
                        });
                    }
                } else if target >= node_id {
                    // also rules out cycles
                    return Err(BspError::BadChild {
                        node: node_id,
                        side,
                        child: target,
                    });
                }
            }
        }

        Ok(Self { nodes, leaves })
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    #[inline]
    pub fn leaf(&self, id: LeafId) -> &Leaf {
        &self.leaves[id as usize]
    }

    /// Root child reference (`nodes.len()-1` in Doom; a lone leaf otherwise).
    #[inline(always)]
    pub fn root(&self) -> u32 {
        match self.nodes.len() {
            0 => LEAF_BIT,
            n => (n - 1) as u32,
        }
    }

    /// Union of every leaf box.
    pub fn bounds(&self) -> Aabb {
        self.leaves
            .iter()
            .skip(1)
            .fold(self.leaves[0].bbox, |acc, l| acc.union(&l.bbox))
    }

    /// Walk the whole tree and return the leaf containing `p`.
    #[inline]
    pub fn locate_leaf(&self, p: Vec2) -> LeafId {
        self.descend_from(self.root(), p)
    }

    /// Resume a top-down walk at `start` (a node or leaf reference).
    pub fn descend_from(&self, start: u32, p: Vec2) -> LeafId {
        let mut child = start;
        while !is_leaf(child) {
            let node = &self.nodes[child as usize];
            child = node.child[node.point_side(p) as usize];
        }
        child & CHILD_MASK
    }
}

// ──────────────────────────────────────────────────────────────────────────
//                       Node geometry helpers
// ──────────────────────────────────────────────────────────────────────────
impl Node {
    /// 0 = *front* of splitter, 1 = *back*.
    #[inline(always)]
    pub fn point_side(&self, p: Vec2) -> i32 {
        let d = (p.x - self.x) * self.dy - (p.y - self.y) * self.dx;
        (d < 0.0) as i32
    }

    /// Side shared by all four corners of `b`, or `None` if the splitter
    /// crosses the box.
    pub fn box_side(&self, b: &Aabb) -> Option<i32> {
        let mut sides = b.corners().map(|c| self.point_side(c));
        sides.sort_unstable();
        (sides[0] == sides[3]).then_some(sides[0])
    }
}

// ──────────────────────────────────────────────────────────────────────────
// Test trees
// ──────────────────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod test_trees {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    /// Keep the part of convex `poly` on one side of the split.
    fn clip_poly(poly: &[Vec2], node: &Node, keep_front: bool) -> Vec<Vec2> {
        let dist = |p: Vec2| {
            let d = (p.x - node.x) * node.dy - (p.y - node.y) * node.dx;
            if keep_front { d } else { -d }
        };
        let mut out = Vec::new();
        for i in 0..poly.len() {
            let a = poly[i];
            let b = poly[(i + 1) % poly.len()];
            let (da, db) = (dist(a), dist(b));
            if da >= 0.0 {
                out.push(a);
            }
            if (da >= 0.0) != (db >= 0.0) {
                out.push(a + (b - a) * (da / (da - db)));
            }
        }
        out
    }

    fn leaf_from(poly: &[Vec2], sector: SectorId) -> Leaf {
        let first = poly.first().copied().unwrap_or_default();
        let mut bbox = Aabb::new(first, first);
        for &p in poly {
            bbox = bbox.union(&Aabb::new(p, p));
        }
        let segs = (0..poly.len())
            .map(|i| Segment::new(poly[i], poly[(i + 1) % poly.len()]))
            .collect();
        Leaf { bbox, segs, sector }
    }

    fn build(
        poly: Vec<Vec2>,
        depth: u32,
        rng: &mut StdRng,
        nodes: &mut Vec<Node>,
        leaves: &mut Vec<Leaf>,
    ) -> u32 {
        if depth == 0 || poly.len() < 3 {
            leaves.push(leaf_from(&poly, leaves.len() as SectorId));
            return (leaves.len() - 1) as u32 | LEAF_BIT;
        }
        let centre = poly.iter().copied().sum::<Vec2>() / poly.len() as f32;
        let angle: f32 = rng.gen_range(0.0..std::f32::consts::PI);
        let node = Node {
            x: centre.x,
            y: centre.y,
            dx: angle.cos(),
            dy: angle.sin(),
            child: [0, 0],
        };
        let front = clip_poly(&poly, &node, true);
        let back = clip_poly(&poly, &node, false);
        let f = build(front, depth - 1, rng, nodes, leaves);
        let b = build(back, depth - 1, rng, nodes, leaves);
        nodes.push(Node {
            child: [f, b],
            ..node
        });
        (nodes.len() - 1) as u32
    }

    /// Random convex partition of the square `[0, size]²`.
    pub(crate) fn random_tree(seed: u64, depth: u32, size: f32) -> BspTree {
        let mut rng = StdRng::seed_from_u64(seed);
        let square = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(size, 0.0),
            Vec2::new(size, size),
            Vec2::new(0.0, size),
        ];
        let mut nodes = Vec::new();
        let mut leaves = Vec::new();
        build(square, depth, &mut rng, &mut nodes, &mut leaves);
        BspTree::new(nodes, leaves).unwrap()
    }
}
