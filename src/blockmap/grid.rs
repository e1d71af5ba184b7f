//! Uniform square grid shared by the blockmap and the BSP cache.
//!
//! Cell `(x, y)` covers `[origin + (x, y) * size, origin + (x + 1, y + 1) * size)`.
//! Every lookup clamps; nothing here can fail.

use glam::Vec2;

use crate::world::{Aabb, Segment};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    pub origin: Vec2,
    pub cell_size: f32,
    pub width: i32,
    pub height: i32,
}

/// Inclusive block range, as recorded on linked actors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl CellRange {
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.x0..=self.x1).contains(&x) && (self.y0..=self.y1).contains(&y)
    }

    /// Cell indices, row-major (y outer, x inner).
    pub fn indices(self, width: i32) -> impl Iterator<Item = usize> {
        (self.y0..=self.y1)
            .flat_map(move |y| (self.x0..=self.x1).map(move |x| (y * width + x) as usize))
    }
}

impl Grid {
    /// Grid covering `bounds` with `cell_size` squares (at least 1×1).
    pub fn new(bounds: Aabb, cell_size: f32) -> Self {
        let size = bounds.size();
        Self {
            origin: bounds.min,
            cell_size,
            width: ((size.x / cell_size).ceil() as i32).max(1),
            height: ((size.y / cell_size).ceil() as i32).max(1),
        }
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Area actually covered by the cells.
    #[inline]
    pub fn extent(&self) -> Aabb {
        Aabb::new(
            self.origin,
            self.origin + Vec2::new(self.width as f32, self.height as f32) * self.cell_size,
        )
    }

    /// Convert one world-space coordinate to an unclamped block coordinate.
    #[inline]
    pub fn world_to_block(&self, v: f32, origin: f32) -> i32 {
        ((v - origin) / self.cell_size).floor() as i32
    }

    /// Row-major index of an in-range cell.  Out-of-range coordinates
    /// are a caller bug; use `cell_at` to clamp first.
    #[inline]
    pub fn index(&self, x: i32, y: i32) -> usize {
        debug_assert!(
            (0..self.width).contains(&x) && (0..self.height).contains(&y),
            "cell ({x}, {y}) outside {}×{} grid",
            self.width,
            self.height
        );
        (y * self.width + x) as usize
    }

    #[inline]
    pub fn cell_box(&self, x: i32, y: i32) -> Aabb {
        let min = self.origin + Vec2::new(x as f32, y as f32) * self.cell_size;
        Aabb::new(min, min + Vec2::splat(self.cell_size))
    }

    /// Cell containing `p`, clamped into the grid.
    #[inline]
    pub fn cell_at(&self, p: Vec2) -> (i32, i32) {
        (
            self.world_to_block(p.x, self.origin.x).clamp(0, self.width - 1),
            self.world_to_block(p.y, self.origin.y).clamp(0, self.height - 1),
        )
    }

    /// Cell containing `p`, or `None` outside the grid.
    #[inline]
    pub fn try_cell_at(&self, p: Vec2) -> Option<(i32, i32)> {
        let x = self.world_to_block(p.x, self.origin.x);
        let y = self.world_to_block(p.y, self.origin.y);
        ((0..self.width).contains(&x) && (0..self.height).contains(&y)).then_some((x, y))
    }

    /// Clamped inclusive range of cells touched by `bbox`.
    #[inline]
    pub fn range_of(&self, bbox: &Aabb) -> CellRange {
        let (x0, y0) = self.cell_at(bbox.min);
        let (x1, y1) = self.cell_at(bbox.max);
        CellRange { x0, y0, x1, y1 }
    }

    #[inline]
    pub fn cells_in_box(&self, bbox: &Aabb) -> impl Iterator<Item = usize> + use<> {
        self.range_of(bbox).indices(self.width)
    }

    /// Every cell the segment passes through, in order from `v1` to `v2`.
    pub fn cells_along(&self, seg: &Segment) -> LineCells {
        LineCells::new(self, seg)
    }
}

/*────────────────────────── DDA walker ──────────────────────────*/

/// Grid walk along a segment.
///
/// The next boundary crossing is recomputed from the cell index every
/// step, so long segments do not drift.  When both boundaries are hit at
/// once (a corner), x steps first and y on the following call, which
/// visits both neighbours instead of cutting the corner.
#[derive(Clone, Debug)]
pub struct LineCells {
    origin: Vec2,
    size: f32,
    width: i32,
    height: i32,
    start: Vec2,
    delta: Vec2,
    cx: i32,
    cy: i32,
    ex: i32,
    ey: i32,
    sx: i32,
    sy: i32,
    steps_left: u32,
    done: bool,
}

impl LineCells {
    fn new(grid: &Grid, seg: &Segment) -> Self {
        let mut walk = Self {
            origin: grid.origin,
            size: grid.cell_size,
            width: grid.width,
            height: grid.height,
            start: seg.v1,
            delta: Vec2::ZERO,
            cx: 0,
            cy: 0,
            ex: 0,
            ey: 0,
            sx: 0,
            sy: 0,
            steps_left: (grid.width + grid.height + 2) as u32,
            done: true,
        };

        if seg.is_degenerate() {
            return walk;
        }
        let Some((t0, t1)) = grid.extent().clip_segment(seg.v1, seg.v2) else {
            return walk;
        };

        let a = seg.point_at(t0);
        let b = seg.point_at(t1);
        (walk.cx, walk.cy) = grid.cell_at(a);
        (walk.ex, walk.ey) = grid.cell_at(b);
        walk.start = a;
        walk.delta = b - a;
        walk.sx = walk.delta.x.partial_cmp(&0.0).map_or(0, |o| o as i32);
        walk.sy = walk.delta.y.partial_cmp(&0.0).map_or(0, |o| o as i32);
        walk.done = false;
        walk
    }

    #[inline]
    fn boundary_t(&self, cell: i32, step: i32, origin: f32, start: f32, delta: f32) -> f32 {
        match step {
            1 => (origin + (cell + 1) as f32 * self.size - start) / delta,
            -1 => (origin + cell as f32 * self.size - start) / delta,
            _ => f32::INFINITY,
        }
    }
}

impl Iterator for LineCells {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.done {
            return None;
        }
        let out = (self.cy * self.width + self.cx) as usize;

        if (self.cx, self.cy) == (self.ex, self.ey) || self.steps_left == 0 {
            self.done = true;
            return Some(out);
        }
        self.steps_left -= 1;

        let tx = self.boundary_t(self.cx, self.sx, self.origin.x, self.start.x, self.delta.x);
        let ty = self.boundary_t(self.cy, self.sy, self.origin.y, self.start.y, self.delta.y);
        if tx.min(ty) > 1.0 {
            self.done = true;
            return Some(out);
        }

        if tx <= ty {
            self.cx += self.sx;
        } else {
            self.cy += self.sy;
        }
        if !(0..self.width).contains(&self.cx) || !(0..self.height).contains(&self.cy) {
            self.done = true;
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    fn grid_4x4() -> Grid {
        Grid::new(Aabb::new(Vec2::ZERO, vec2(256.0, 256.0)), 64.0)
    }

    #[test]
    fn dimensions_round_up() {
        let g = grid_4x4();
        assert_eq!((g.width, g.height), (4, 4));

        let g = Grid::new(Aabb::new(Vec2::ZERO, vec2(257.0, 10.0)), 64.0);
        assert_eq!((g.width, g.height), (5, 1));

        let flat = Grid::new(Aabb::new(Vec2::ZERO, vec2(0.0, 0.0)), 64.0);
        assert_eq!(flat.cell_count(), 1);
    }

    #[test]
    fn cell_lookup_clamps() {
        let g = grid_4x4();
        assert_eq!(g.cell_at(vec2(-100.0, 70.0)), (0, 1));
        assert_eq!(g.cell_at(vec2(256.0, 1e9)), (3, 3));
        assert_eq!(g.try_cell_at(vec2(-1.0, 5.0)), None);
        assert_eq!(g.try_cell_at(vec2(65.0, 5.0)), Some((1, 0)));
    }

    #[test]
    fn box_iteration_is_row_major() {
        let g = grid_4x4();
        let cells: Vec<usize> = g
            .cells_in_box(&Aabb::new(vec2(70.0, 70.0), vec2(130.0, 130.0)))
            .collect();
        assert_eq!(cells, vec![5, 6, 9, 10]);
    }

    #[test]
    fn corner_crossing_visits_both_neighbours() {
        let g = grid_4x4();
        let cells: Vec<usize> = g
            .cells_along(&Segment::new(vec2(32.0, 32.0), vec2(96.0, 96.0)))
            .collect();
        assert_eq!(cells, vec![0, 1, 5]);
    }

    #[test]
    fn degenerate_and_outside_segments_are_empty() {
        let g = grid_4x4();
        let p = vec2(10.0, 10.0);
        assert_eq!(g.cells_along(&Segment::new(p, p)).count(), 0);
        let outside = Segment::new(vec2(-50.0, -10.0), vec2(-10.0, 300.0));
        assert_eq!(g.cells_along(&outside).count(), 0);
    }

    #[test]
    fn rasterization_matches_brute_force() {
        let g = Grid::new(Aabb::new(vec2(-300.0, -200.0), vec2(700.0, 500.0)), 64.0);
        let mut rng = StdRng::seed_from_u64(0xB10C);

        for _ in 0..2_000 {
            let a = vec2(rng.gen_range(-400.0..800.0), rng.gen_range(-300.0..600.0));
            let b = vec2(rng.gen_range(-400.0..800.0), rng.gen_range(-300.0..600.0));
            let seg = Segment::new(a, b);
            let walked: HashSet<usize> = g.cells_along(&seg).collect();
            let len = (b - a).length();

            for y in 0..g.height {
                for x in 0..g.width {
                    let Some((t0, t1)) = g.cell_box(x, y).clip_segment(a, b) else {
                        continue;
                    };
                    if (t1 - t0) * len > 1e-3 {
                        assert!(
                            walked.contains(&g.index(x, y)),
                            "segment {a:?} -> {b:?} skipped cell ({x}, {y})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn axis_aligned_walk_stays_in_row() {
        let g = grid_4x4();
        let cells: Vec<usize> = g
            .cells_along(&Segment::new(vec2(250.0, 130.0), vec2(5.0, 130.0)))
            .collect();
        assert_eq!(cells, vec![11, 10, 9, 8]);
    }
}
