//! Keeps `hecs` entities mirrored in the [`BlockMap`].
//!
//! * `register_actors` gives every new collidable entity a blockmap record
//!   and links it for the first time.
//! * `relink_actors` runs once per tic after movement; an actor whose
//!   block range did not change is left where it is.
//! * `unregister_actor` drops the record before the entity despawns.

use hecs::{Entity, World};
use tracing::{debug, trace};

use crate::blockmap::{Actor, BlockMap};

use super::{ActorFlags, BlockLink, Body, Corpse, Player, Position};

/*──────────────────────── helpers ───────────────────────────*/

fn sync(actor: &mut Actor, pos: &Position, body: &Body, flags: &ActorFlags, corpse: Option<&Corpse>) {
    actor.pos = pos.0;
    actor.z = pos.1;
    actor.radius = body.radius;
    actor.height = body.height;
    actor.flags = flags.0;
    actor.raise = corpse.map(|c| c.raise);
    actor.tics = corpse.map_or(-1, |c| c.tics);
}

/*───────────────────────── systems ──────────────────────────*/

/// Spawn and link a blockmap record for every entity that has a body but
/// no [`BlockLink`] yet.  Returns how many were registered.
pub fn register_actors(world: &mut World, blockmap: &mut BlockMap) -> usize {
    let fresh: Vec<Actor> = world
        .query::<(&Position, &Body, &ActorFlags, Option<&Corpse>, Option<&Player>)>()
        .without::<&BlockLink>()
        .iter()
        .map(|(e, (pos, body, flags, corpse, player))| {
            let mut actor = Actor::new(e, pos.0, body.radius, body.height, flags.0);
            sync(&mut actor, pos, body, flags, corpse);
            actor.is_player = player.is_some();
            actor
        })
        .collect();

    let mut registered = 0;
    for actor in fresh {
        let ent = actor.ent;
        let id = blockmap.spawn_actor(actor);
        blockmap.link_actor(id, false);
        if world.insert_one(ent, BlockLink(id)).is_err() {
            blockmap.remove_actor(id);
            continue;
        }
        registered += 1;
    }

    if registered > 0 {
        debug!(registered, "registered actors in blockmap");
    }
    registered
}

/// Copy moved/resized/re-flagged entities into their records and relink.
pub fn relink_actors(world: &mut World, blockmap: &mut BlockMap) {
    for (e, (pos, body, flags, corpse, link)) in
        world.query_mut::<(&Position, &Body, &ActorFlags, Option<&Corpse>, &BlockLink)>()
    {
        let Some(actor) = blockmap.actor_mut(link.0) else {
            trace!(?e, actor = link.0, "stale blockmap link");
            continue;
        };
        sync(actor, pos, body, flags, corpse);
        blockmap.link_actor(link.0, true);
    }
}

/// Forget `entity`'s blockmap record.  Returns the record if there was one.
pub fn unregister_actor(world: &mut World, blockmap: &mut BlockMap, entity: Entity) -> Option<Actor> {
    let link = world.remove_one::<BlockLink>(entity).ok()?;
    blockmap.remove_actor(link.0)
}
