//! Actor records as the blockmap stores them.
//!
//! The owning ECS entity is kept for the caller's benefit; the queries
//! only read the cylinder, the flags and the resurrection data.

use glam::Vec2;
use hecs::Entity;
use std::cell::Cell;

use super::grid::CellRange;
use crate::defs::MobjFlags;
use crate::world::Aabb;

pub type ActorId = u32;

/// What a corpse turns back into when raised.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RaiseInfo {
    pub state: u16,
    pub radius: f32,
    pub height: f32,
}

#[derive(Clone, Debug)]
pub struct Actor {
    pub ent: Entity,
    pub pos: Vec2,
    /// Feet height.
    pub z: f32,
    pub radius: f32,
    pub height: f32,
    pub flags: MobjFlags,
    /// Tics left in the current state; `-1` = resting in a final state.
    pub tics: i32,
    pub is_player: bool,
    pub raise: Option<RaiseInfo>,
    pub(crate) block_range: Option<CellRange>,
    pub(crate) validcount: [Cell<u32>; 2],
}

impl Actor {
    pub fn new(ent: Entity, pos: Vec2, radius: f32, height: f32, flags: MobjFlags) -> Self {
        Self {
            ent,
            pos,
            z: 0.0,
            radius,
            height,
            flags,
            tics: -1,
            is_player: false,
            raise: None,
            block_range: None,
            validcount: [Cell::new(0), Cell::new(0)],
        }
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }

    pub fn with_tics(mut self, tics: i32) -> Self {
        self.tics = tics;
        self
    }

    pub fn with_raise(mut self, raise: RaiseInfo) -> Self {
        self.raise = Some(raise);
        self
    }

    pub fn player(mut self) -> Self {
        self.is_player = true;
        self
    }

    /// Square footprint of the cylinder.
    #[inline]
    pub fn bbox(&self) -> Aabb {
        Aabb::around(self.pos, self.radius)
    }

    /// Blocks this actor is currently linked into.
    #[inline]
    pub fn block_range(&self) -> Option<CellRange> {
        self.block_range
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.block_range.is_some()
    }
}
