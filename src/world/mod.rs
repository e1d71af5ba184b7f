pub(crate) mod bsp;
mod bsp_blockmap;
mod geometry;

pub use geometry::{Aabb, Line, LineId, LinedefFlags, SectorId, Segment};

pub use bsp::{BspError, BspTree, CHILD_MASK, LEAF_BIT, Leaf, LeafId, Node, NodeId, is_leaf};

pub use bsp_blockmap::{BspBlockmap, BspCacheStats};
