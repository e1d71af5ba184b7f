use bitflags::bitflags;
use glam::Vec2;
use std::cell::Cell;

pub type LineId = u32;
pub type SectorId = u16;

/*------------------------- bounding boxes ---------------------------*/

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    #[inline]
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Square footprint of a cylinder standing at `center`.
    #[inline]
    pub fn around(center: Vec2, radius: f32) -> Self {
        Self {
            min: center - Vec2::splat(radius),
            max: center + Vec2::splat(radius),
        }
    }

    #[inline]
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Closed-interval overlap (touching boxes overlap).
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    #[inline]
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            Vec2::new(self.min.x, self.max.y),
            self.max,
        ]
    }

    /// Liang–Barsky clip of `a → b` against the box.
    ///
    /// Returns the parametric `[t_enter, t_exit]` interval (within `0..=1`)
    /// or `None` when the segment misses the box.
    pub fn clip_segment(&self, a: Vec2, b: Vec2) -> Option<(f32, f32)> {
        let d = b - a;
        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;

        for (p, q) in [
            (-d.x, a.x - self.min.x),
            (d.x, self.max.x - a.x),
            (-d.y, a.y - self.min.y),
            (d.y, self.max.y - a.y),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None; // parallel and outside
                }
                continue;
            }
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                t0 = t0.max(r);
            } else {
                if r < t0 {
                    return None;
                }
                t1 = t1.min(r);
            }
        }
        Some((t0, t1))
    }
}

/*--------------------------- segments -------------------------------*/

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub v1: Vec2,
    pub v2: Vec2,
}

impl Segment {
    #[inline]
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        Self { v1, v2 }
    }

    #[inline]
    pub fn delta(&self) -> Vec2 {
        self.v2 - self.v1
    }

    #[inline]
    pub fn bbox(&self) -> Aabb {
        Aabb::from_points(self.v1, self.v2)
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.v1 == self.v2
    }

    #[inline]
    pub fn point_at(&self, t: f32) -> Vec2 {
        self.v1 + self.delta() * t
    }

    /// 0 = *front* of the segment, 1 = *back* (same rule as BSP splits).
    #[inline]
    pub fn point_side(&self, p: Vec2) -> i32 {
        let d = self.delta();
        let cross = (p.x - self.v1.x) * d.y - (p.y - self.v1.y) * d.x;
        (cross < 0.0) as i32
    }

    /// Parametric position along `self` where it crosses `other`, if both
    /// segments overlap within their closed extents. Parallel → `None`.
    pub fn intercept(&self, other: &Segment) -> Option<f32> {
        let d = self.delta();
        let e = other.delta();
        let denom = d.perp_dot(e);
        if denom == 0.0 {
            return None;
        }
        let w = other.v1 - self.v1;
        let t = w.perp_dot(e) / denom;
        let u = w.perp_dot(d) / denom;
        ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then_some(t)
    }
}

/*--------------------------- linedefs -------------------------------*/

bitflags! {
    /// Vanilla linedef flags, passed through for callers that inspect the
    /// lines a trace returns.  Only `TWO_SIDED` changes blockmap results.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct LinedefFlags: u16 {
        const IMPASSABLE      = 0x0001;
        const BLOCK_MONSTERS  = 0x0002;
        const TWO_SIDED       = 0x0004;
        const BLOCK_SOUND     = 0x0080;
    }
}

/// Static wall as the blockmap sees it.
#[derive(Clone, Debug)]
pub struct Line {
    pub seg: Segment,
    pub flags: LinedefFlags,
    pub front: SectorId,
    pub back: Option<SectorId>,
    pub(crate) validcount: Cell<u32>,
}

impl Line {
    /// `back == None` makes a one-sided wall.
    pub fn new(v1: Vec2, v2: Vec2, front: SectorId, back: Option<SectorId>) -> Self {
        let flags = if back.is_some() {
            LinedefFlags::TWO_SIDED
        } else {
            LinedefFlags::empty()
        };
        Self {
            seg: Segment::new(v1, v2),
            flags,
            front,
            back,
            validcount: Cell::new(0),
        }
    }

    pub fn with_flags(mut self, flags: LinedefFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[inline]
    pub fn is_one_sided(&self) -> bool {
        self.back.is_none() || !self.flags.contains(LinedefFlags::TWO_SIDED)
    }

    #[inline]
    pub fn bbox(&self) -> Aabb {
        self.seg.bbox()
    }
}
