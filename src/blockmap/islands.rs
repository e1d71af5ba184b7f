//! Sector islands and moving wall sides hanging off blockmap cells.
//!
//! Islands are linked into cells through pooled list nodes.  Each cell
//! keeps two intrusive, doubly linked lists (static and dynamic) and each
//! island record chains the nodes it owns, so a whole sector can be
//! dropped without scanning the grid.  Freed nodes and records go back on
//! free lists and are reused by the next link.
//!
//! Moving wall sides are keyed by `(line, side)`; linking one again moves
//! it instead of adding a second copy.

use smallvec::SmallVec;
use std::cell::Cell;
use std::collections::HashMap;
use tracing::debug;

use super::BlockMap;
use super::validcount::mark;
use crate::world::{Aabb, LineId, SectorId, Segment};

/// One maximal connected piece of a sector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Island {
    pub bbox: Aabb,
    /// Never rendered or collided with; skipped when linking.
    pub closet: bool,
}

/// A moving / scrolling wall side registered for render queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SideRef {
    pub seg: Segment,
    pub line: LineId,
    /// 0 = front side, 1 = back side.
    pub side: u8,
}

#[derive(Debug)]
struct IslandRecord {
    sector: SectorId,
    island: Island,
    dynamic: bool,
    first_node: Option<u32>,
    validcount: Cell<u32>,
}

#[derive(Clone, Copy, Debug)]
struct IslandNode {
    record: u32,
    block: u32,
    prev: Option<u32>,
    next: Option<u32>,
    next_of_record: Option<u32>,
}

#[derive(Debug)]
struct DynSide {
    side: SideRef,
    validcount: Cell<u32>,
}

/// Slot table for moving sides; slot ids stay stable while linked.
#[derive(Debug, Default)]
pub(crate) struct SidePool {
    slots: Vec<Option<DynSide>>,
    free: Vec<u32>,
    by_key: HashMap<(LineId, u8), u32>,
}

impl SidePool {
    fn alloc(&mut self, side: DynSide) -> u32 {
        match self.free.pop() {
            Some(i) => {
                self.slots[i as usize] = Some(side);
                i
            }
            None => {
                self.slots.push(Some(side));
                (self.slots.len() - 1) as u32
            }
        }
    }

    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.by_key.len()
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.by_key.clear();
    }
}

#[derive(Debug, Default)]
pub(crate) struct IslandPool {
    records: Vec<Option<IslandRecord>>,
    free_records: Vec<u32>,
    nodes: Vec<IslandNode>,
    free_nodes: Vec<u32>,
    by_sector: Vec<SmallVec<[u32; 2]>>,
}

impl IslandPool {
    fn alloc_record(&mut self, rec: IslandRecord) -> u32 {
        match self.free_records.pop() {
            Some(i) => {
                self.records[i as usize] = Some(rec);
                i
            }
            None => {
                self.records.push(Some(rec));
                (self.records.len() - 1) as u32
            }
        }
    }

    fn alloc_node(&mut self, node: IslandNode) -> u32 {
        match self.free_nodes.pop() {
            Some(i) => {
                self.nodes[i as usize] = node;
                i
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    fn sector_slot(&mut self, sector: SectorId) -> &mut SmallVec<[u32; 2]> {
        let idx = sector as usize;
        if self.by_sector.len() <= idx {
            self.by_sector.resize_with(idx + 1, SmallVec::new);
        }
        &mut self.by_sector[idx]
    }

    fn record(&self, id: u32) -> Option<&IslandRecord> {
        self.records.get(id as usize)?.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn live_nodes(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }
}

impl BlockMap {
    /*──────────────────────── sector islands ───────────────────*/

    /// (Re)link the static islands of `sector`.  Done once per map load.
    pub fn link_sector(&mut self, sector: SectorId, islands: &[Island]) {
        self.unlink_sector_islands(sector, false);
        self.link_islands(sector, islands, false);
    }

    /// (Re)link the islands of a sector that started moving.
    pub fn link_dynamic_sector(&mut self, sector: SectorId, islands: &[Island]) {
        self.unlink_sector_islands(sector, true);
        self.link_islands(sector, islands, true);
    }

    /// Drop the dynamic islands of one sector that stopped moving.
    pub fn unlink_dynamic_sector(&mut self, sector: SectorId) {
        self.unlink_sector_islands(sector, true);
    }

    fn link_islands(&mut self, sector: SectorId, islands: &[Island], dynamic: bool) {
        for island in islands.iter().filter(|i| !i.closet) {
            let rec_id = self.islands.alloc_record(IslandRecord {
                sector,
                island: *island,
                dynamic,
                first_node: None,
                validcount: Cell::new(0),
            });
            self.islands.sector_slot(sector).push(rec_id);

            let mut chain = None;
            for cell in self.grid.cells_in_box(&island.bbox) {
                let block = &mut self.blocks[cell];
                let head = if dynamic {
                    &mut block.dynamic_islands
                } else {
                    &mut block.static_islands
                };
                let node = self.islands.alloc_node(IslandNode {
                    record: rec_id,
                    block: cell as u32,
                    prev: None,
                    next: *head,
                    next_of_record: chain,
                });
                if let Some(old) = *head {
                    self.islands.nodes[old as usize].prev = Some(node);
                }
                *head = Some(node);
                chain = Some(node);
            }

            if let Some(Some(rec)) = self.islands.records.get_mut(rec_id as usize) {
                rec.first_node = chain;
            }
        }
    }

    fn unlink_sector_islands(&mut self, sector: SectorId, dynamic: bool) {
        let Some(owned) = self.islands.by_sector.get_mut(sector as usize) else {
            return;
        };
        let records = &self.islands.records;
        let (drop, keep): (SmallVec<[u32; 2]>, SmallVec<[u32; 2]>) = owned
            .iter()
            .copied()
            .partition(|&r| records[r as usize].as_ref().is_some_and(|r| r.dynamic == dynamic));
        *owned = keep;

        for rec_id in drop {
            self.free_island_record(rec_id);
        }
    }

    /// Unhook every node of one record from its cell list, then free it.
    fn free_island_record(&mut self, rec_id: u32) {
        let Some(rec) = self.islands.records[rec_id as usize].take() else {
            return;
        };
        let mut cursor = rec.first_node;
        while let Some(n) = cursor {
            let node = self.islands.nodes[n as usize];
            match node.prev {
                Some(p) => self.islands.nodes[p as usize].next = node.next,
                None => {
                    let block = &mut self.blocks[node.block as usize];
                    if rec.dynamic {
                        block.dynamic_islands = node.next;
                    } else {
                        block.static_islands = node.next;
                    }
                }
            }
            if let Some(nx) = node.next {
                self.islands.nodes[nx as usize].prev = node.prev;
            }
            self.islands.free_nodes.push(n);
            cursor = node.next_of_record;
        }
        self.islands.free_records.push(rec_id);
    }

    /*──────────────────────── dynamic sides ────────────────────*/

    /// Register a moving wall side in every cell its segment crosses.
    ///
    /// A side already linked under the same `(line, side)` is first
    /// removed from the cells of its old segment.  Returns the slot id.
    pub fn link_dynamic_side(&mut self, side: SideRef) -> u32 {
        self.unlink_dynamic_side(side.line, side.side);

        let slot = self.sides.alloc(DynSide {
            side,
            validcount: Cell::new(0),
        });
        self.sides.by_key.insert((side.line, side.side), slot);
        for cell in self.grid.cells_along(&side.seg) {
            self.blocks[cell].sides.push(slot);
        }
        slot
    }

    /// Drop one moving side.  `false` if it was not linked.
    pub fn unlink_dynamic_side(&mut self, line: LineId, side: u8) -> bool {
        let Some(slot) = self.sides.by_key.remove(&(line, side)) else {
            return false;
        };
        let Some(old) = self.sides.slots[slot as usize].take() else {
            return false;
        };
        // same segment, same grid: the walk visits the same cells as the link
        for cell in self.grid.cells_along(&old.side.seg) {
            let sides = &mut self.blocks[cell].sides;
            if let Some(i) = sides.iter().position(|&s| s == slot) {
                sides.swap_remove(i);
            }
        }
        self.sides.free.push(slot);
        true
    }

    /// Free every dynamic island node and dynamic side in the grid.
    /// Static islands are untouched.
    pub fn clear_dynamic(&mut self) {
        let mut freed = 0usize;
        for b in 0..self.blocks.len() {
            let mut cursor = self.blocks[b].dynamic_islands.take();
            while let Some(n) = cursor {
                let node = self.islands.nodes[n as usize];
                self.islands.free_nodes.push(n);
                freed += 1;
                if let Some(Some(rec)) = self.islands.records.get_mut(node.record as usize) {
                    rec.first_node = None;
                }
                cursor = node.next;
            }
            self.blocks[b].sides.clear();
        }

        let pool = &mut self.islands;
        for (i, slot) in pool.records.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|r| r.dynamic) {
                *slot = None;
                pool.free_records.push(i as u32);
            }
        }
        let records = &pool.records;
        for owned in pool.by_sector.iter_mut() {
            owned.retain(|r| records[*r as usize].is_some());
        }

        debug!(nodes = freed, sides = self.sides.live(), "cleared dynamic blockmap links");
        self.sides.clear();
    }

    /*──────────────────────── queries ──────────────────────────*/

    /// Unique islands (static and dynamic) whose box touches `bbox`.
    /// Stops early when `f` returns `false`.
    pub fn islands_in_box<F>(&self, bbox: &Aabb, mut f: F) -> bool
    where
        F: FnMut(SectorId, &Island) -> bool,
    {
        let generation = self.validcount.next();
        for cell in self.grid.cells_in_box(bbox) {
            let block = &self.blocks[cell];
            for head in [block.static_islands, block.dynamic_islands] {
                let mut cursor = head;
                while let Some(n) = cursor {
                    let node = &self.islands.nodes[n as usize];
                    cursor = node.next;
                    let Some(rec) = self.islands.record(node.record) else {
                        continue;
                    };
                    if !mark(&rec.validcount, generation) || !rec.island.bbox.overlaps(bbox) {
                        continue;
                    }
                    if !f(rec.sector, &rec.island) {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Unique dynamic sides registered in the cells touched by `bbox`.
    pub fn sides_in_box<F>(&self, bbox: &Aabb, mut f: F) -> bool
    where
        F: FnMut(&SideRef) -> bool,
    {
        let generation = self.validcount.next();
        for cell in self.grid.cells_in_box(bbox) {
            for &s in &self.blocks[cell].sides {
                let Some(dyn_side) = self.sides.slots[s as usize].as_ref() else {
                    continue;
                };
                if !mark(&dyn_side.validcount, generation) {
                    continue;
                }
                if dyn_side.side.seg.bbox().overlaps(bbox) && !f(&dyn_side.side) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockmap::tests::room;
    use glam::{Vec2, vec2};

    fn island(min: (f32, f32), max: (f32, f32)) -> Island {
        Island {
            bbox: Aabb::new(vec2(min.0, min.1), vec2(max.0, max.1)),
            closet: false,
        }
    }

    fn collect(map: &BlockMap, bbox: Aabb) -> Vec<SectorId> {
        let mut out = Vec::new();
        map.islands_in_box(&bbox, |s, _| {
            out.push(s);
            true
        });
        out.sort_unstable();
        out
    }

    fn list_len(map: &BlockMap, head: Option<u32>) -> usize {
        let mut n = 0;
        let mut cursor = head;
        while let Some(i) = cursor {
            n += 1;
            cursor = map.islands.nodes[i as usize].next;
        }
        n
    }

    #[test]
    fn islands_link_into_overlapping_cells_once() {
        let mut map = room(512.0, 64.0);
        map.link_sector(3, &[island((10.0, 10.0), (200.0, 100.0))]);

        // 4 × 2 cells, reported once
        assert_eq!(map.islands.live_nodes(), 8);
        assert_eq!(collect(&map, Aabb::new(Vec2::ZERO, vec2(512.0, 512.0))), vec![3]);
        assert!(collect(&map, Aabb::new(vec2(300.0, 300.0), vec2(400.0, 400.0))).is_empty());
    }

    #[test]
    fn closets_are_skipped() {
        let mut map = room(512.0, 64.0);
        let mut closet = island((10.0, 10.0), (20.0, 20.0));
        closet.closet = true;
        map.link_sector(1, &[closet]);
        assert_eq!(map.islands.live_nodes(), 0);
    }

    #[test]
    fn clear_dynamic_keeps_static_islands() {
        let mut map = room(512.0, 64.0);
        map.link_sector(1, &[island((0.0, 0.0), (100.0, 100.0))]);
        map.link_dynamic_sector(2, &[island((50.0, 50.0), (150.0, 150.0))]);
        map.link_dynamic_sector(4, &[island((300.0, 300.0), (310.0, 310.0))]);

        let everything = Aabb::new(Vec2::ZERO, vec2(512.0, 512.0));
        assert_eq!(collect(&map, everything), vec![1, 2, 4]);

        map.clear_dynamic();
        assert_eq!(collect(&map, everything), vec![1]);
        assert!(map.blocks().iter().all(|b| b.dynamic_islands.is_none()));
        assert_eq!(map.islands.live_nodes(), 4);
    }

    #[test]
    fn unlinking_one_sector_repairs_shared_lists() {
        let mut map = room(512.0, 64.0);
        let shared = island((70.0, 70.0), (120.0, 120.0));
        map.link_dynamic_sector(1, &[shared]);
        map.link_dynamic_sector(2, &[shared]);
        map.link_dynamic_sector(3, &[shared]);
        assert_eq!(list_len(&map, map.block(1, 1).dynamic_islands), 3);

        // middle of the list
        map.unlink_dynamic_sector(2);
        assert_eq!(list_len(&map, map.block(1, 1).dynamic_islands), 2);
        assert_eq!(collect(&map, shared.bbox), vec![1, 3]);

        // relinking replaces instead of duplicating
        map.link_dynamic_sector(1, &[shared]);
        assert_eq!(list_len(&map, map.block(1, 1).dynamic_islands), 2);

        // freed nodes are reused
        let before = map.islands.nodes.len();
        map.link_dynamic_sector(2, &[shared]);
        assert_eq!(map.islands.nodes.len(), before);
    }

    #[test]
    fn dynamic_sides_are_deduped_and_cleared() {
        let mut map = room(512.0, 64.0);
        map.link_dynamic_side(SideRef {
            seg: Segment::new(vec2(10.0, 100.0), vec2(300.0, 100.0)),
            line: 0,
            side: 0,
        });

        let mut hits = 0;
        map.sides_in_box(&Aabb::new(Vec2::ZERO, vec2(512.0, 512.0)), |_| {
            hits += 1;
            true
        });
        assert_eq!(hits, 1);

        map.clear_dynamic();
        let mut hits = 0;
        map.sides_in_box(&Aabb::new(Vec2::ZERO, vec2(512.0, 512.0)), |_| {
            hits += 1;
            true
        });
        assert_eq!(hits, 0);
    }

    fn sides_hit(map: &BlockMap, bbox: Aabb) -> Vec<(LineId, f32)> {
        let mut out = Vec::new();
        map.sides_in_box(&bbox, |s| {
            out.push((s.line, s.seg.v1.y));
            true
        });
        out
    }

    #[test]
    fn relinking_a_side_moves_it() {
        let mut map = room(512.0, 64.0);
        let at = |y: f32| SideRef {
            seg: Segment::new(vec2(10.0, y), vec2(50.0, y)),
            line: 7,
            side: 0,
        };
        let first = map.link_dynamic_side(at(20.0));
        let second = map.link_dynamic_side(at(400.0));
        assert_eq!(first, second, "slot is reused");

        assert!(sides_hit(&map, Aabb::new(Vec2::ZERO, vec2(60.0, 60.0))).is_empty());
        assert_eq!(
            sides_hit(&map, Aabb::new(Vec2::ZERO, vec2(512.0, 512.0))),
            vec![(7, 400.0)]
        );
        assert!(map.block(0, 0).sides.is_empty());

        // the back side of the same line is a separate entry
        map.link_dynamic_side(SideRef { side: 1, ..at(30.0) });
        assert_eq!(sides_hit(&map, Aabb::new(Vec2::ZERO, vec2(512.0, 512.0))).len(), 2);
    }

    #[test]
    fn unlink_dynamic_side_empties_its_cells() {
        let mut map = room(512.0, 64.0);
        map.link_dynamic_side(SideRef {
            seg: Segment::new(vec2(10.0, 100.0), vec2(300.0, 100.0)),
            line: 3,
            side: 1,
        });
        assert!(map.unlink_dynamic_side(3, 1));
        assert!(!map.unlink_dynamic_side(3, 1));
        assert!(map.blocks().iter().all(|b| b.sides.is_empty()));
        assert!(sides_hit(&map, Aabb::new(Vec2::ZERO, vec2(512.0, 512.0))).is_empty());
    }
}
