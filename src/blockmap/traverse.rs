//! Blockmap traversals – sight, shot, use, radius and blocking queries.
//!
//! Every traversal draws one generation from the map's `Validcount` and
//! stamps each line/actor it looks at, so a record spanning several
//! blocks is considered once.  Ordered traversals write into a caller
//! owned buffer to keep the per-tic path allocation-free.

use glam::Vec2;
use std::cmp::Ordering;

use super::actor::{Actor, ActorId};
use super::block::LineRef;
use super::validcount::{BLOCK, VISIT, mark};
use super::BlockMap;
use crate::defs::MobjFlags;
use crate::world::{Aabb, Line, LineId, Segment};

/// What a trace crossed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterceptKind {
    Line(LineId),
    Actor(ActorId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intercept {
    /// Parametric position along the trace, `0..=1`.
    pub frac: f32,
    pub kind: InterceptKind,
}

impl Intercept {
    #[inline]
    fn line(frac: f32, id: LineId) -> Self {
        Self {
            frac,
            kind: InterceptKind::Line(id),
        }
    }

    #[inline]
    fn actor(frac: f32, id: ActorId) -> Self {
        Self {
            frac,
            kind: InterceptKind::Actor(id),
        }
    }

    /// Ascending `frac`; equal fractions put lines before actors, then
    /// lower ids first.
    fn order(a: &Self, b: &Self) -> Ordering {
        let key = |i: &Self| match i.kind {
            InterceptKind::Line(id) => (0u8, id),
            InterceptKind::Actor(id) => (1u8, id),
        };
        a.frac.total_cmp(&b.frac).then_with(|| key(a).cmp(&key(b)))
    }
}

#[inline]
fn sort_intercepts(out: &mut [Intercept]) {
    out.sort_unstable_by(Intercept::order);
}

/// Cylinder to test with `solid_block_traverse`.
#[derive(Clone, Copy, Debug)]
pub struct BlockQuery {
    pub pos: Vec2,
    pub z: f32,
    pub radius: f32,
    pub height: f32,
    /// Actor doing the moving; never blocks itself.
    pub mover: Option<ActorId>,
    pub flags: MobjFlags,
    /// Also require the cylinders to overlap vertically.
    pub check_z: bool,
}

impl BlockQuery {
    pub fn at(pos: Vec2, radius: f32, height: f32) -> Self {
        Self {
            pos,
            z: 0.0,
            radius,
            height,
            mover: None,
            flags: MobjFlags::empty(),
            check_z: false,
        }
    }

    /// The actor's own cylinder moved to `pos`.
    pub fn for_actor(id: ActorId, actor: &Actor, pos: Vec2) -> Self {
        Self {
            pos,
            z: actor.z,
            radius: actor.radius,
            height: actor.height,
            mover: Some(id),
            flags: actor.flags,
            check_z: false,
        }
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self.check_z = true;
        self
    }

    /// Pair rule: does `other` stop this cylinder?
    fn blocked_by(&self, id: ActorId, other: &Actor) -> bool {
        if self.mover == Some(id) {
            return false;
        }
        if !other.flags.contains(MobjFlags::SOLID)
            || self.flags.contains(MobjFlags::NOCLIP)
            || other.flags.contains(MobjFlags::NOCLIP)
        {
            return false;
        }

        let block_dist = other.radius + self.radius;
        if (other.pos.x - self.pos.x).abs() >= block_dist
            || (other.pos.y - self.pos.y).abs() >= block_dist
        {
            return false;
        }

        if self.check_z && (self.z >= other.z + other.height || self.z + self.height <= other.z) {
            return false; // over or under
        }
        true
    }
}

impl BlockMap {
    /*──────────────────────── shared walkers ───────────────────*/

    /// Visit unique lines crossed by `trace`, in block order.
    /// `f` gets the line and its fraction; returning `false` stops.
    fn trace_lines<F>(&self, trace: &Segment, generation: u32, mut f: F) -> bool
    where
        F: FnMut(&LineRef, f32) -> bool,
    {
        for cell in self.grid.cells_along(trace) {
            for lref in &self.blocks[cell].lines {
                if !mark(&self.lines[lref.line as usize].validcount, generation) {
                    continue;
                }
                if let Some(frac) = trace.intercept(&lref.seg) {
                    if !f(lref, frac) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Visit unique actors whose footprint touches `bbox`, row-major.
    fn visit_actors<F>(&self, bbox: &Aabb, slot: usize, generation: u32, mut f: F) -> bool
    where
        F: FnMut(ActorId, &Actor) -> bool,
    {
        for cell in self.grid.cells_in_box(bbox) {
            for &id in &self.blocks[cell].actors {
                let Some(actor) = self.actors[id as usize].as_ref() else {
                    continue;
                };
                if !mark(&actor.validcount[slot], generation) || !actor.bbox().overlaps(bbox) {
                    continue;
                }
                if !f(id, actor) {
                    return false;
                }
            }
        }
        true
    }

    /*──────────────────────── ray queries ──────────────────────*/

    /// Line-of-sight check.
    ///
    /// Returns `true` when a one-sided line cuts the trace; `out` is then
    /// empty.  Otherwise `out` holds every two-sided line crossed, sorted
    /// by fraction.
    pub fn sight_traverse(&self, trace: &Segment, out: &mut Vec<Intercept>) -> bool {
        out.clear();
        let generation = self.validcount.next();
        let clear = self.trace_lines(trace, generation, |lref, frac| {
            if lref.one_sided {
                return false;
            }
            out.push(Intercept::line(frac, lref.line));
            true
        });

        if !clear {
            out.clear();
            return true;
        }
        sort_intercepts(out);
        false
    }

    /// Hitscan: every line and every shootable actor along the trace,
    /// sorted by fraction.  Actor fractions are where the trace enters
    /// the actor's box.
    ///
    /// Parts of the trace outside the grid are still tested against the
    /// actors of the border cells, which is where actors standing past
    /// the edge are linked.
    pub fn shot_traverse(
        &self,
        trace: &Segment,
        shooter: Option<ActorId>,
        out: &mut Vec<Intercept>,
    ) {
        out.clear();
        if trace.is_degenerate() {
            return;
        }
        let generation = self.validcount.next();

        for cell in self.grid.cells_along(trace) {
            for lref in &self.blocks[cell].lines {
                if !mark(&self.lines[lref.line as usize].validcount, generation) {
                    continue;
                }
                if let Some(frac) = trace.intercept(&lref.seg) {
                    out.push(Intercept::line(frac, lref.line));
                }
            }
            self.shoot_actors(cell, trace, shooter, generation, out);
        }

        let outside = match self.grid.extent().clip_segment(trace.v1, trace.v2) {
            Some((t0, t1)) => [(0.0, t0), (t1, 1.0)],
            None => [(0.0, 1.0), (1.0, 1.0)],
        };
        for (a, b) in outside {
            if b <= a {
                continue;
            }
            let piece = Aabb::from_points(trace.point_at(a), trace.point_at(b));
            for cell in self.grid.cells_in_box(&piece) {
                self.shoot_actors(cell, trace, shooter, generation, out);
            }
        }
        sort_intercepts(out);
    }

    fn shoot_actors(
        &self,
        cell: usize,
        trace: &Segment,
        shooter: Option<ActorId>,
        generation: u32,
        out: &mut Vec<Intercept>,
    ) {
        for &id in &self.blocks[cell].actors {
            let Some(actor) = self.actors[id as usize].as_ref() else {
                continue;
            };
            if !mark(&actor.validcount[VISIT], generation)
                || shooter == Some(id)
                || !actor.flags.contains(MobjFlags::SHOOTABLE)
            {
                continue;
            }
            if let Some((enter, _)) = actor.bbox().clip_segment(trace.v1, trace.v2) {
                out.push(Intercept::actor(enter, id));
            }
        }
    }

    /// Every line along a short use ray, nearest first.
    pub fn use_traverse(&self, trace: &Segment, out: &mut Vec<Intercept>) {
        out.clear();
        let generation = self.validcount.next();
        self.trace_lines(trace, generation, |lref, frac| {
            out.push(Intercept::line(frac, lref.line));
            true
        });
        sort_intercepts(out);
    }

    /*──────────────────────── box queries ──────────────────────*/

    /// Splash damage: every shootable actor touching `bbox`.
    pub fn radius_attack_traverse<F>(&self, bbox: &Aabb, mut f: F)
    where
        F: FnMut(ActorId, &Actor),
    {
        let generation = self.validcount.next();
        self.visit_actors(bbox, VISIT, generation, |id, actor| {
            if actor.flags.contains(MobjFlags::SHOOTABLE) {
                f(id, actor);
            }
            true
        });
    }

    /// Resurrection search: the first corpse in `bbox` that can be raised
    /// where it lies.  `f` is called on it and its id returned.
    pub fn heal_traverse<F>(&self, bbox: &Aabb, f: F) -> Option<ActorId>
    where
        F: FnOnce(ActorId, &Actor),
    {
        let generation = self.validcount.next();
        let mut found = None;
        self.visit_actors(bbox, VISIT, generation, |id, actor| {
            if self.can_raise(id, actor) {
                found = Some(id);
                return false;
            }
            true
        });

        let id = found?;
        let actor = self.actors[id as usize].as_ref()?;
        f(id, actor);
        Some(id)
    }

    fn can_raise(&self, id: ActorId, corpse: &Actor) -> bool {
        let Some(raise) = corpse.raise else {
            return false;
        };
        if !corpse.flags.contains(MobjFlags::CORPSE) || corpse.tics != -1 || corpse.is_player {
            return false;
        }
        let query = BlockQuery {
            radius: raise.radius,
            height: raise.height,
            ..BlockQuery::for_actor(id, corpse, corpse.pos)
        }
        .with_z(corpse.z);
        self.solid_block_traverse(&query)
    }

    /// Every actor touching `bbox`, whatever its flags.
    /// Stops when `f` returns `false`; returns `false` iff stopped.
    pub fn actors_in_box<F>(&self, bbox: &Aabb, f: F) -> bool
    where
        F: FnMut(ActorId, &Actor) -> bool,
    {
        let generation = self.validcount.next();
        self.visit_actors(bbox, VISIT, generation, f)
    }

    /// `true` if the cylinder can stand at `query.pos` without touching a
    /// solid actor; `false` on the first one that blocks.
    pub fn solid_block_traverse(&self, query: &BlockQuery) -> bool {
        let bbox = Aabb::around(query.pos, query.radius);
        let generation = self.validcount.next();
        self.visit_actors(&bbox, BLOCK, generation, |id, other| {
            !query.blocked_by(id, other)
        })
    }

    /// Unique lines whose bounding box touches `bbox`
    /// (vanilla `P_BlockLinesIterator`).  Stops when `f` returns `false`.
    pub fn lines_in_box<F>(&self, bbox: &Aabb, mut f: F) -> bool
    where
        F: FnMut(LineId, &Line) -> bool,
    {
        let generation = self.validcount.next();
        for cell in self.grid.cells_in_box(bbox) {
            for lref in &self.blocks[cell].lines {
                let line = &self.lines[lref.line as usize];
                if !mark(&line.validcount, generation) || !line.bbox().overlaps(bbox) {
                    continue;
                }
                if !f(lref.line, line) {
                    return false;
                }
            }
        }
        true
    }
}
