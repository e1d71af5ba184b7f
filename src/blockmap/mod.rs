//! Runtime blockmap – the uniform grid of static lines and live actors.
//!
//! * Static lines are rasterized once when the map loads.
//! * Actors are written through by the movement code: `link_actor`
//!   after every position change, `unlink_actor` before removal.
//! * Sector islands and moving wall sides hang off the same cells
//!   (see `islands`).
//!
//! Traversals stamp records through `Cell`s and take `&self`; the map is
//! therefore `!Sync` and meant to live on the simulation thread.

mod actor;
mod block;
mod grid;
mod islands;
mod traverse;
mod validcount;

pub use actor::{Actor, ActorId, RaiseInfo};
pub use block::{Block, LineRef};
pub use grid::{CellRange, Grid, LineCells};
pub use islands::{Island, SideRef};
pub use traverse::{BlockQuery, Intercept, InterceptKind};
pub use validcount::Validcount;

use glam::Vec2;
use thiserror::Error;
use tracing::{info, trace};

use crate::config::{BlockmapConfig, ConfigError};
use crate::defs::MobjFlags;
use crate::world::{Aabb, Line, LineId};
use islands::{IslandPool, SidePool};

/*──────────────────────────── Error type ───────────────────────────*/

#[derive(Error, Debug, PartialEq)]
pub enum BlockmapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("line {line} has a non-finite vertex ({x}, {y})")]
    NonFiniteVertex { line: LineId, x: f32, y: f32 },

    #[error("{count} lines do not fit 32-bit line ids")]
    TooManyLines { count: usize },

    #[error("blockmap of {width}×{height} cells exceeds the limit of {max}")]
    TooManyCells { width: i32, height: i32, max: usize },
}

/// Summary of the static rasterization.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BlockmapStats {
    pub width: i32,
    pub height: i32,
    pub line_refs: usize,
    pub max_lines_in_block: usize,
    pub empty_blocks: usize,
}

/*──────────────────────────── core type ────────────────────────────*/

#[derive(Debug)]
pub struct BlockMap {
    grid: Grid,
    blocks: Vec<Block>,
    lines: Vec<Line>,
    actors: Vec<Option<Actor>>,
    free_actors: Vec<ActorId>,
    islands: IslandPool,
    sides: SidePool,
    validcount: Validcount,
}

impl BlockMap {
    /// Build the grid over the bounds of `lines` and rasterize them.
    pub fn new(lines: Vec<Line>, config: &BlockmapConfig) -> Result<Self, BlockmapError> {
        config.validate()?;
        if lines.len() > u32::MAX as usize {
            return Err(BlockmapError::TooManyLines { count: lines.len() });
        }
        for (id, line) in lines.iter().enumerate() {
            for v in [line.seg.v1, line.seg.v2] {
                if !v.is_finite() {
                    return Err(BlockmapError::NonFiniteVertex {
                        line: id as LineId,
                        x: v.x,
                        y: v.y,
                    });
                }
            }
        }

        let bounds = lines
            .iter()
            .map(Line::bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or(Aabb::new(Vec2::ZERO, Vec2::ONE));

        let grid = Grid::new(bounds, config.cell_size);
        let count = (grid.width as usize)
            .checked_mul(grid.height as usize)
            .filter(|&n| n <= config.max_cells)
            .ok_or(BlockmapError::TooManyCells {
                width: grid.width,
                height: grid.height,
                max: config.max_cells,
            })?;

        let mut blocks: Vec<Block> = (0..count as i32)
            .map(|i| Block::new(i % grid.width, i / grid.width))
            .collect();

        for (id, line) in lines.iter().enumerate() {
            if line.seg.is_degenerate() {
                trace!(line = id, "skipping zero-length line");
                continue;
            }
            let lref = LineRef {
                seg: line.seg,
                line: id as LineId,
                one_sided: line.is_one_sided(),
                front: line.front,
                back: line.back,
            };
            for cell in grid.cells_along(&line.seg) {
                blocks[cell].lines.push(lref);
            }
        }

        let map = Self {
            grid,
            blocks,
            lines,
            actors: Vec::new(),
            free_actors: Vec::new(),
            islands: IslandPool::default(),
            sides: SidePool::default(),
            validcount: Validcount::default(),
        };

        let stats = map.stats();
        info!(
            width = stats.width,
            height = stats.height,
            lines = map.lines.len(),
            line_refs = stats.line_refs,
            densest = stats.max_lines_in_block,
            "built blockmap"
        );
        Ok(map)
    }

    /*──────────────────────── accessors ────────────────────────*/

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block at `(x, y)`, clamped into the grid like every other lookup.
    #[inline]
    pub fn block(&self, x: i32, y: i32) -> &Block {
        let x = x.clamp(0, self.grid.width - 1);
        let y = y.clamp(0, self.grid.height - 1);
        &self.blocks[self.grid.index(x, y)]
    }

    #[inline]
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    #[inline]
    pub fn line(&self, id: LineId) -> &Line {
        &self.lines[id as usize]
    }

    #[inline]
    pub fn validcount(&self) -> &Validcount {
        &self.validcount
    }

    pub fn stats(&self) -> BlockmapStats {
        self.blocks.iter().fold(
            BlockmapStats {
                width: self.grid.width,
                height: self.grid.height,
                ..BlockmapStats::default()
            },
            |mut s, b| {
                s.line_refs += b.lines.len();
                s.max_lines_in_block = s.max_lines_in_block.max(b.lines.len());
                s.empty_blocks += b.lines.is_empty() as usize;
                s
            },
        )
    }

    /*──────────────────────── actor table ──────────────────────*/

    /// Store a new actor record.  It is **not** linked yet.
    pub fn spawn_actor(&mut self, actor: Actor) -> ActorId {
        let actor = Actor {
            block_range: None,
            ..actor
        };
        match self.free_actors.pop() {
            Some(id) => {
                self.actors[id as usize] = Some(actor);
                id
            }
            None => {
                self.actors.push(Some(actor));
                (self.actors.len() - 1) as ActorId
            }
        }
    }

    /// Unlink and drop an actor record; the id may be reused.
    pub fn remove_actor(&mut self, id: ActorId) -> Option<Actor> {
        self.unlink_actor(id);
        let actor = self.actors.get_mut(id as usize)?.take()?;
        self.free_actors.push(id);
        Some(actor)
    }

    #[inline]
    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(id as usize)?.as_ref()
    }

    /// Direct access; call `link_actor(id, true)` after moving or resizing.
    #[inline]
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(id as usize)?.as_mut()
    }

    pub fn actors(&self) -> impl Iterator<Item = (ActorId, &Actor)> {
        self.actors
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.as_ref().map(|a| (i as ActorId, a)))
    }

    /// Teleport/move an actor and relink it.
    pub fn move_actor(&mut self, id: ActorId, pos: Vec2, z: f32) {
        if let Some(actor) = self.actor_mut(id) {
            actor.pos = pos;
            actor.z = z;
            self.link_actor(id, true);
        }
    }

    /*──────────────────────── link / unlink ────────────────────*/

    /// Put the actor into every block its footprint overlaps.
    ///
    /// With `recheck_last` an unchanged block range is left alone.
    /// Without it the actor must not be linked already.
    pub fn link_actor(&mut self, id: ActorId, recheck_last: bool) {
        let Some(actor) = self.actors.get(id as usize).and_then(Option::as_ref) else {
            debug_assert!(false, "link_actor: no actor {id}");
            return;
        };

        if actor.flags.contains(MobjFlags::NOBLOCKMAP) {
            self.unlink_actor(id);
            return;
        }

        let range = self.grid.range_of(&actor.bbox());
        if recheck_last {
            if actor.block_range == Some(range) {
                return;
            }
        } else {
            debug_assert!(
                actor.block_range.is_none(),
                "link_actor: actor {id} is already linked"
            );
        }

        self.unlink_actor(id);
        for cell in range.indices(self.grid.width) {
            self.blocks[cell].add_actor(id);
        }
        if let Some(actor) = self.actor_mut(id) {
            actor.block_range = Some(range);
        }
        trace!(actor = id, ?range, "linked");
    }

    /// Remove the actor from every block it was linked into.
    pub fn unlink_actor(&mut self, id: ActorId) {
        let Some(actor) = self.actor_mut(id) else {
            return;
        };
        let Some(range) = actor.block_range.take() else {
            return;
        };
        for cell in range.indices(self.grid.width) {
            let removed = self.blocks[cell].remove_actor(id);
            debug_assert!(removed, "unlink_actor: actor {id} missing from block {cell}");
        }
    }
}
