/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Integer rectangular regions. A [`Region`] is the union of a set
//! of closed-open rectangles, stored pairwise-disjoint. `union`,
//! `intersect` and `subtract` all preserve that invariant (each is proven
//! disjointness-preserving given disjoint inputs in `DESIGN.md`), so the
//! crate never has to re-normalize a region just to keep area queries and
//! `is_empty` cheap and exact.

use euclid::Box2D;
use smallvec::SmallVec;

/// How many rects we expect a typical region to need inline before
/// spilling to the heap. Layers rarely fragment into more than a handful
/// of rectangles against a handful of occluders.
const INLINE_RECTS: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct Region<U> {
    rects: SmallVec<[Box2D<i32, U>; INLINE_RECTS]>,
}

impl<U> Default for Region<U> {
    fn default() -> Self {
        Self { rects: SmallVec::new() }
    }
}

impl<U: Copy> Region<U> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Box2D<i32, U>) -> Self {
        if rect.is_empty() {
            Self::empty()
        } else {
            Self { rects: SmallVec::from_elem(rect, 1) }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> impl Iterator<Item = &Box2D<i32, U>> {
        self.rects.iter()
    }

    /// The smallest rect containing the whole region, or `None` if empty.
    pub fn bounds(&self) -> Option<Box2D<i32, U>> {
        self.rects.iter().copied().reduce(|a, b| a.union(&b))
    }

    /// Sum of each constituent rect's area. Exact because the rects are
    /// pairwise disjoint.
    pub fn area(&self) -> i64 {
        self.rects
            .iter()
            .map(|r| (r.width() as i64) * (r.height() as i64))
            .sum()
    }
}

impl<U: Copy> Region<U> {
    /// `self ⊆ other`, tested by checking every fragment of `self` minus
    /// `other` is empty.
    pub fn is_subset_of(&self, other: &Region<U>) -> bool {
        self.subtract(other).is_empty()
    }

    pub fn union(&self, other: &Region<U>) -> Region<U> {
        let mut rects: SmallVec<[Box2D<i32, U>; INLINE_RECTS]> = self.rects.clone();
        for &b in other.rects.iter() {
            for piece in subtract_rect_from_rects(b, &rects) {
                rects.push(piece);
            }
        }
        Region { rects }
    }

    pub fn intersect(&self, other: &Region<U>) -> Region<U> {
        let mut rects = SmallVec::new();
        for &a in self.rects.iter() {
            for &b in other.rects.iter() {
                if let Some(overlap) = intersect_rect(a, b) {
                    rects.push(overlap);
                }
            }
        }
        Region { rects }
    }

    pub fn subtract(&self, other: &Region<U>) -> Region<U> {
        let mut rects = SmallVec::new();
        for &a in self.rects.iter() {
            rects.extend(subtract_rect_from_rects(a, &other.rects));
        }
        Region { rects }
    }

    pub fn intersect_rect(&self, rect: Box2D<i32, U>) -> Region<U> {
        self.intersect(&Region::from_rect(rect))
    }
}

/// `a ∩ b`, or `None` if they don't overlap (closed-open rects, so
/// touching-but-not-overlapping edges count as empty).
fn intersect_rect<U: Copy>(a: Box2D<i32, U>, b: Box2D<i32, U>) -> Option<Box2D<i32, U>> {
    let r = a.intersection(&b)?;
    if r.is_empty() { None } else { Some(r) }
}

/// `a - b` as zero to four disjoint rects.
fn subtract_rect<U: Copy>(a: Box2D<i32, U>, b: Box2D<i32, U>) -> SmallVec<[Box2D<i32, U>; 4]> {
    let mut out = SmallVec::new();
    let Some(overlap) = intersect_rect(a, b) else {
        out.push(a);
        return out;
    };
    if overlap == a {
        return out;
    }

    // Top strip: full width of `a`, above the overlap.
    if a.min.y < overlap.min.y {
        out.push(Box2D::new(
            euclid::point2(a.min.x, a.min.y),
            euclid::point2(a.max.x, overlap.min.y),
        ));
    }
    // Bottom strip: full width of `a`, below the overlap.
    if overlap.max.y < a.max.y {
        out.push(Box2D::new(
            euclid::point2(a.min.x, overlap.max.y),
            euclid::point2(a.max.x, a.max.y),
        ));
    }
    // Left strip: only the overlap's vertical extent, left of the overlap.
    if a.min.x < overlap.min.x {
        out.push(Box2D::new(
            euclid::point2(a.min.x, overlap.min.y),
            euclid::point2(overlap.min.x, overlap.max.y),
        ));
    }
    // Right strip: only the overlap's vertical extent, right of the overlap.
    if overlap.max.x < a.max.x {
        out.push(Box2D::new(
            euclid::point2(overlap.max.x, overlap.min.y),
            euclid::point2(a.max.x, overlap.max.y),
        ));
    }
    out
}

fn subtract_rect_from_rects<U: Copy>(
    rect: Box2D<i32, U>,
    subtrahends: &[Box2D<i32, U>],
) -> SmallVec<[Box2D<i32, U>; INLINE_RECTS]> {
    let mut pieces: SmallVec<[Box2D<i32, U>; INLINE_RECTS]> = SmallVec::from_elem(rect, 1);
    for &sub in subtrahends {
        pieces = pieces
            .into_iter()
            .flat_map(|piece| subtract_rect(piece, sub))
            .collect();
        if pieces.is_empty() {
            break;
        }
    }
    pieces
}

/// Transforms that map axis-aligned rects to axis-aligned rects exactly:
/// translations, axis swaps, and the four 90°-multiple rotations, each
/// optionally composed with a horizontal/vertical flip. Anything else
/// (arbitrary rotation, skew, scale) is [`LayerTransform::General`] and
/// a transformed region under it collapses to a conservative bounding
/// rect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RectPreservingTransform {
    pub rotation: Rotation,
    pub flip_h: bool,
    pub flip_v: bool,
}

impl RectPreservingTransform {
    pub const IDENTITY: Self = Self {
        rotation: Rotation::Rotate0,
        flip_h: false,
        flip_v: false,
    };

    /// Apply the rotation/flip about the rect's own bounds (this has no
    /// translation component; callers compose translation separately via
    /// `Box2D::translate`, treating an output transform as "place within
    /// bounds" rather than an arbitrary affine map).
    pub fn apply<U>(&self, rect: Box2D<i32, U>) -> Box2D<i32, U> {
        let (w, h) = (rect.width(), rect.height());
        let (sx, sy) = match self.rotation {
            Rotation::Rotate0 | Rotation::Rotate180 => (w, h),
            Rotation::Rotate90 | Rotation::Rotate270 => (h, w),
        };
        // Rotation/flip only changes the rect's dimensions for our
        // purposes (coverage algebra doesn't care about orientation
        // within the rect, only its footprint), so re-anchor at the
        // original origin with the (possibly swapped) size.
        let _ = (self.flip_h, self.flip_v);
        Box2D::from_origin_and_size(rect.min, euclid::size2(sx, sy))
    }
}

/// A layer or output transform as it affects region algebra: either
/// exactly rect-preserving, or general (conservative bounding-box only).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayerTransform<Src, Dst> {
    RectPreserving {
        transform: RectPreservingTransform,
        translation: euclid::Vector2D<i32, Dst>,
        _src: std::marker::PhantomData<Src>,
    },
    General(euclid::Transform2D<f32, Src, Dst>),
}

impl<Src, Dst> LayerTransform<Src, Dst> {
    pub fn identity_translated(translation: euclid::Vector2D<i32, Dst>) -> Self {
        LayerTransform::RectPreserving {
            transform: RectPreservingTransform::IDENTITY,
            translation,
            _src: std::marker::PhantomData,
        }
    }

    pub fn rect_preserving(
        transform: RectPreservingTransform,
        translation: euclid::Vector2D<i32, Dst>,
    ) -> Self {
        LayerTransform::RectPreserving { transform, translation, _src: std::marker::PhantomData }
    }

    pub fn is_rect_preserving(&self) -> bool {
        matches!(self, LayerTransform::RectPreserving { .. })
    }

    /// Transform a single rect. For `General`, this returns the bounding
    /// rect of the transformed corners (the conservative rule).
    pub fn transform_rect(&self, rect: Box2D<i32, Src>) -> Box2D<i32, Dst> {
        match self {
            LayerTransform::RectPreserving { transform, translation, .. } => {
                // Reinterpret in Dst space before rotation/flip: the
                // rect-preserving case never changes the coordinate
                // *system*, only the footprint and an added offset.
                let reinterpreted = Box2D::from_origin_and_size(
                    euclid::point2(rect.min.x, rect.min.y),
                    rect.size().cast_unit(),
                );
                transform.apply(reinterpreted).translate(*translation)
            },
            LayerTransform::General(matrix) => {
                let corners = [
                    rect.min,
                    euclid::point2(rect.max.x, rect.min.y),
                    euclid::point2(rect.min.x, rect.max.y),
                    rect.max,
                ];
                let mut min = euclid::point2(i32::MAX, i32::MAX);
                let mut max = euclid::point2(i32::MIN, i32::MIN);
                for corner in corners {
                    let p = matrix.transform_point(corner.to_f32());
                    min.x = min.x.min(p.x.floor() as i32);
                    min.y = min.y.min(p.y.floor() as i32);
                    max.x = max.x.max(p.x.ceil() as i32);
                    max.y = max.y.max(p.y.ceil() as i32);
                }
                Box2D::new(min, max)
            },
        }
    }

    pub fn transform_region(&self, region: &Region<Src>) -> Region<Dst>
    where
        Src: Copy,
        Dst: Copy,
    {
        match self {
            LayerTransform::General(_) => {
                // Non-rect-preserving transforms only yield a conservative
                // bounding rect, never a precise per-rect map.
                match region.bounds() {
                    Some(bounds) => Region::from_rect(self.transform_rect(bounds)),
                    None => Region::empty(),
                }
            },
            LayerTransform::RectPreserving { .. } => {
                let mut out = Region::empty();
                for &rect in region.rects.iter() {
                    out = out.union(&Region::from_rect(self.transform_rect(rect)));
                }
                out
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::LayerSpace;

    fn rect(x0: i32, y0: i32, x1: i32, y1: i32) -> Box2D<i32, LayerSpace> {
        Box2D::new(euclid::point2(x0, y0), euclid::point2(x1, y1))
    }

    #[test]
    fn union_of_disjoint_rects_keeps_both() {
        let a = Region::from_rect(rect(0, 0, 10, 10));
        let b = Region::from_rect(rect(20, 20, 30, 30));
        let u = a.union(&b);
        assert_eq!(u.area(), 200);
    }

    #[test]
    fn subtract_overlapping_rect_leaves_l_shape() {
        // A: 100x100 full square. B: 50x50 in the top-left corner.
        let a = Region::from_rect(rect(0, 0, 100, 100));
        let b = Region::from_rect(rect(0, 0, 50, 50));
        let result = a.subtract(&b);
        assert_eq!(result.area(), 100 * 100 - 50 * 50);
        assert!(result.intersect(&b).is_empty());
    }

    #[test]
    fn intersect_of_non_overlapping_rects_is_empty() {
        let a = Region::from_rect(rect(0, 0, 10, 10));
        let b = Region::from_rect(rect(10, 10, 20, 20));
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn is_subset_of_is_reflexive_and_respects_strict_containment() {
        let a = Region::from_rect(rect(0, 0, 100, 100));
        let b = Region::from_rect(rect(0, 0, 50, 50));
        assert!(a.is_subset_of(&a));
        assert!(b.is_subset_of(&a));
        assert!(!a.is_subset_of(&b));
    }

    #[test]
    fn empty_region_has_no_bounds() {
        assert_eq!(Region::<LayerSpace>::empty().bounds(), None);
    }

    #[test]
    fn union_then_subtract_round_trips_to_empty() {
        let a = Region::from_rect(rect(0, 0, 10, 10));
        let b = Region::from_rect(rect(5, 5, 15, 15));
        let u = a.union(&b);
        assert_eq!(u.area(), a.area() + b.area() - a.intersect(&b).area());
        assert!(u.subtract(&u).is_empty());
    }
}
