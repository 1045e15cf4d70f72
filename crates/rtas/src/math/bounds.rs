use glam::Vec3;

use super::transform::AffineTransform;

/// Axis Aligned Bounding Box
///
/// An empty box has `min > max` on every axis, see [Bounds::EMPTY].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds {
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        points
            .iter()
            .fold(Self::EMPTY, |bounds, &p| bounds.extend(p))
    }

    pub fn extend(self, p: Vec3) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    pub fn center(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    pub fn diag(&self) -> Vec3 {
        self.max - self.min
    }

    /// Index of the axis along which the box is the widest
    pub fn main_axis(&self) -> usize {
        let Vec3 { x, y, z } = self.diag();
        if x >= y && x >= z {
            0
        } else if y >= z {
            1
        } else {
            2
        }
    }

    /// Bounds of the 8 transformed corners
    pub fn transform(&self, xfm: &AffineTransform) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        (0..8).fold(Self::EMPTY, |bounds, corner| {
            let p = Vec3::new(
                if corner & 1 == 0 { self.min.x } else { self.max.x },
                if corner & 2 == 0 { self.min.y } else { self.max.y },
                if corner & 4 == 0 { self.min.z } else { self.max.z },
            );
            bounds.extend(xfm.transform_point(p))
        })
    }

    /// Slab test. Returns the entry distance clamped to `t_range.0` if the ray
    /// `origin + t * dir` crosses the box for some t in `t_range`.
    ///
    /// `inv_dir` is the componentwise inverse of the ray direction, infinite components are fine.
    pub fn ray_intersect(&self, origin: Vec3, inv_dir: Vec3, t_range: (f32, f32)) -> Option<f32> {
        // R(t) = origin + t*dir. self.min <= R(t) <= self.max gives for each axis an interval of t,
        // the box is hit where all of them overlap.
        // 0 * inf gives NaN for a ray lying on a slab plane, f32::min / f32::max ignore it.
        let ts_start = (self.min - origin) * inv_dir;
        let ts_end = (self.max - origin) * inv_dir;

        let t_min = ts_start.min(ts_end).max_element().max(t_range.0);
        let t_max = ts_start.max(ts_end).min_element().min(t_range.1);

        (t_min <= t_max).then_some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::Bounds;
    use crate::math::transform::AffineTransform;

    #[test]
    fn union_and_empty() {
        assert!(Bounds::EMPTY.is_empty());
        let a = Bounds::new(Vec3::ZERO, Vec3::ONE);
        assert!(!a.is_empty());
        assert_eq!(Bounds::EMPTY.union(a), a);

        let b = Bounds::from_points(&[Vec3::new(2.0, -1.0, 0.5), Vec3::new(3.0, 0.0, 0.5)]);
        let u = a.union(b);
        assert_eq!(u.min, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(u.max, Vec3::new(3.0, 1.0, 1.0));
        assert_eq!(u.main_axis(), 0);
    }

    #[test]
    fn slab_test() {
        let b = Bounds::new(Vec3::ZERO, Vec3::ONE);
        let dir = Vec3::new(0.0, 0.0, 1.0);
        let inv = dir.recip();

        let t = b.ray_intersect(Vec3::new(0.5, 0.5, -1.0), inv, (0.0, f32::INFINITY));
        assert_eq!(t, Some(1.0));

        // Interval ends before the box
        assert_eq!(b.ray_intersect(Vec3::new(0.5, 0.5, -1.0), inv, (0.0, 0.5)), None);
        // Passing beside the box
        assert_eq!(b.ray_intersect(Vec3::new(1.5, 0.5, -1.0), inv, (0.0, f32::INFINITY)), None);
        // Starting inside
        assert_eq!(b.ray_intersect(Vec3::splat(0.5), inv, (0.0, f32::INFINITY)), Some(0.0));
    }

    #[test]
    fn flat_box_is_hit() {
        let b = Bounds::new(Vec3::ZERO, Vec3::new(4.0, 4.0, 0.0));
        let dir = Vec3::Z;
        let t = b.ray_intersect(Vec3::new(1.0, 2.0, -1.0), dir.recip(), (0.0, 10.0));
        assert_eq!(t, Some(1.0));
    }

    #[test]
    fn transformed_bounds() {
        let b = Bounds::new(Vec3::ZERO, Vec3::ONE);
        let xfm = AffineTransform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let t = b.transform(&xfm);
        assert_eq!(t.min, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.max, Vec3::new(2.0, 3.0, 4.0));
        assert!(Bounds::EMPTY.transform(&xfm).is_empty());
    }
}
