use smallvec::SmallVec;

use super::actor::ActorId;
use crate::world::{LineId, SectorId, Segment};

/// Copy of a static line kept inside every block it crosses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineRef {
    pub seg: Segment,
    pub line: LineId,
    pub one_sided: bool,
    pub front: SectorId,
    pub back: Option<SectorId>,
}

/// Small actor list – a handful of live mobjs per block is the norm.
pub(crate) type ActorList = SmallVec<[ActorId; 4]>;

/// One blockmap cell.
#[derive(Debug, Default)]
pub struct Block {
    pub x: i32,
    pub y: i32,
    pub(crate) lines: Vec<LineRef>,
    pub(crate) actors: ActorList,
    pub(crate) sides: Vec<u32>,
    pub(crate) static_islands: Option<u32>,
    pub(crate) dynamic_islands: Option<u32>,
}

impl Block {
    pub(crate) fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            ..Self::default()
        }
    }

    #[inline]
    pub fn lines(&self) -> &[LineRef] {
        &self.lines
    }

    #[inline]
    pub fn actors(&self) -> &[ActorId] {
        &self.actors
    }

    #[inline]
    pub(crate) fn add_actor(&mut self, id: ActorId) {
        self.actors.push(id);
    }

    /// Order is not preserved.
    #[inline]
    pub(crate) fn remove_actor(&mut self, id: ActorId) -> bool {
        match self.actors.iter().position(|&a| a == id) {
            Some(i) => {
                self.actors.swap_remove(i);
                true
            }
            None => false,
        }
    }
}
