use glam::Vec2;

use crate::blockmap::{ActorId, RaiseInfo};
use crate::defs::MobjFlags;

/// World‑space position.  z is separate to match Doom’s 2½‑D maths.
#[derive(Debug, Clone, Copy)]
pub struct Position(pub Vec2, pub f32);

/// Collision cylinder.
#[derive(Debug, Clone, Copy)]
pub struct Body {
    pub radius: f32,
    pub height: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct ActorFlags(pub MobjFlags);

/// Marks the player's own mobj; players are never raised.
#[derive(Clone, Copy, Debug, Default)]
pub struct Player;

/// Dead body that may be resurrected.
#[derive(Clone, Copy, Debug)]
pub struct Corpse {
    pub raise: RaiseInfo,
    /// `-1` once the death animation has finished.
    pub tics: i32,
}

/// Entity ↔ blockmap record.  Present only while the entity is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLink(pub ActorId);
