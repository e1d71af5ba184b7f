mod components;
mod spacial;

pub use components::{ActorFlags, BlockLink, Body, Corpse, Player, Position};
pub use spacial::{register_actors, relink_actors, unregister_actor};
