use glam::{Vec2, Vec3};

use crate::{math::float::FloatAsExt, ray::Ray};

/// Where a ray crosses the plane of a triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub t: f32,
    /// Weights of `v1` and `v2`
    pub barycentrics: Vec2,
    /// The ray goes against `(v1 - v0) x (v2 - v0)`
    pub front_face: bool,
}

/// Möller-Trumbore intersection. Returns None if the ray misses the triangle or is parallel to it,
/// the distance is not checked against the ray interval.
pub fn intersect_triangle(ray: &Ray, [v0, v1, v2]: [Vec3; 3]) -> Option<TriangleHit> {
    let e1 = v1 - v0;
    let e2 = v2 - v0;

    let pvec = ray.direction.cross(e2);
    // det = -dot(direction, e1 x e2)
    let det = e1.dot(pvec).into_non_zero(0.0)?;
    let inv_det = 1.0 / det;

    let tvec = ray.origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(e1);
    let v = ray.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(qvec) * inv_det;
    t.is_finite().then_some(TriangleHit {
        t,
        barycentrics: Vec2::new(u, v),
        front_face: det > 0.0,
    })
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::intersect_triangle;
    use crate::ray::Ray;

    const TRI: [Vec3; 3] = [Vec3::ZERO, Vec3::X, Vec3::Y];

    #[test]
    fn hit() {
        let ray = Ray::new(Vec3::new(0.1, 0.6, -1.0), Vec3::new(0.0, 0.0, 1.0));
        let hit = intersect_triangle(&ray, TRI).unwrap();
        assert!((hit.t - 1.0).abs() < 1e-6);
        assert!((hit.barycentrics - Vec2::new(0.1, 0.6)).length() < 1e-6);
        // Going along the normal
        assert!(!hit.front_face);

        let ray = Ray::new(Vec3::new(0.1, 0.6, 1.0), Vec3::new(0.0, 0.0, -2.0));
        let hit = intersect_triangle(&ray, TRI).unwrap();
        assert!((hit.t - 0.5).abs() < 1e-6);
        assert!(hit.front_face);
    }

    #[test]
    fn miss() {
        let ray = Ray::new(Vec3::new(0.6, 0.6, -1.0), Vec3::Z);
        assert_eq!(intersect_triangle(&ray, TRI), None);
        let ray = Ray::new(Vec3::new(-0.1, 0.5, -1.0), Vec3::Z);
        assert_eq!(intersect_triangle(&ray, TRI), None);
        // Parallel
        let ray = Ray::new(Vec3::new(0.1, 0.1, -1.0), Vec3::X);
        assert_eq!(intersect_triangle(&ray, TRI), None);
    }

    #[test]
    fn behind_origin() {
        let ray = Ray::new(Vec3::new(0.1, 0.1, 1.0), Vec3::Z);
        let hit = intersect_triangle(&ray, TRI).unwrap();
        assert!(hit.t < 0.0);
    }
}
