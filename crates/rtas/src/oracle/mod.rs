//! Self-checking ray query tests.
//!
//! A grid plane is split into random geometries, one ray is shot at a known point of every triangle and
//! the hit reported by the traversal is compared, field by field, with the hit computed from the geometry
//! alone.

mod execute;
mod render;
mod scene;

use std::fmt::Debug;

use derive_more::Display;
use glam::Vec3;

pub use execute::{execute_test, TestConfig, TestReport};
pub use render::{render, render_loop, AnyHitDecision};
pub use scene::{ExpectedHit, TestScene, INSTANCE_BLOCK_SIZE};

use crate::{
    geometry::GeometryFlags,
    query::CandidateKind,
    ray::{Ray, RayFlags},
};

/// Barycentric coordinates of the point every test ray aims at
pub const HIT_BARYCENTRICS: (f32, f32) = (0.1, 0.6);

/// Tolerance on distances, barycentrics and vertices
pub const DEFAULT_EPS: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TestType {
    /// Opaque triangles, a single round has to end on the committed hit
    #[display("triangles committed hit")]
    TrianglesCommittedHit,
    /// Non opaque triangles, a single round has to stop on the potential hit
    #[display("triangles potential hit")]
    TrianglesPotentialHit,
    /// Non opaque triangles, every candidate is committed
    #[display("triangles any hit shader commit")]
    TrianglesAnyHitShaderCommit,
    /// Non opaque triangles, every candidate is rejected
    #[display("triangles any hit shader reject")]
    TrianglesAnyHitShaderReject,
    /// Opaque triangles placed in the scene through one level of instances
    #[display("triangles instanced committed hit")]
    TrianglesInstancedCommittedHit,
}

impl TestType {
    pub const ALL: [TestType; 5] = [
        TestType::TrianglesCommittedHit,
        TestType::TrianglesPotentialHit,
        TestType::TrianglesAnyHitShaderCommit,
        TestType::TrianglesAnyHitShaderReject,
        TestType::TrianglesInstancedCommittedHit,
    ];

    pub fn geometry_flags(self) -> GeometryFlags {
        match self {
            TestType::TrianglesCommittedHit | TestType::TrianglesInstancedCommittedHit => GeometryFlags::OPAQUE,
            _ => GeometryFlags::empty(),
        }
    }

    pub fn is_instanced(self) -> bool {
        self == TestType::TrianglesInstancedCommittedHit
    }

    pub fn expected_hit_type(self) -> TestHitType {
        match self {
            TestType::TrianglesCommittedHit
            | TestType::TrianglesAnyHitShaderCommit
            | TestType::TrianglesInstancedCommittedHit => TestHitType::Committed,
            TestType::TrianglesPotentialHit => TestHitType::Potential,
            TestType::TrianglesAnyHitShaderReject => TestHitType::Miss,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
pub enum TestHitType {
    Committed,
    Potential,
    #[default]
    Miss,
}

/// Ray of one test case
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestInput {
    pub origin: Vec3,
    pub direction: Vec3,
    pub tnear: f32,
    pub tfar: f32,
    pub mask: u8,
    pub flags: RayFlags,
}

impl TestInput {
    /// Ray going along +z through `target`, starting one unit before it
    pub fn towards(target: Vec3) -> Self {
        Self {
            origin: target - Vec3::Z,
            direction: Vec3::Z,
            tnear: 0.0,
            tfar: 10000.0,
            mask: 0xFF,
            flags: RayFlags::empty(),
        }
    }

    pub fn ray(&self) -> Ray {
        Ray::new(self.origin, self.direction)
            .with_range(self.tnear, self.tfar)
            .with_mask(self.mask)
            .with_flags(self.flags)
    }
}

/// Ray fields as recorded in a [TestOutput]
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RayRecord {
    pub origin: Vec3,
    pub direction: Vec3,
    pub tnear: f32,
    pub mask: u32,
    pub flags: u32,
}

impl From<Ray> for RayRecord {
    fn from(ray: Ray) -> Self {
        Self {
            origin: ray.origin,
            direction: ray.direction,
            tnear: ray.tnear,
            mask: ray.mask.into(),
            flags: ray.flags.bits(),
        }
    }
}

/// What a test case observed. Fields of a miss keep their default value.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TestOutput {
    /// Ray at level 0
    pub ray0: RayRecord,
    /// Ray at the level of the hit
    pub ray_n: RayRecord,

    pub hit_type: TestHitType,
    pub bvh_level: u32,
    pub hit_candidate: CandidateKind,
    pub t: f32,
    pub u: f32,
    pub v: f32,
    pub front_face: bool,
    pub geom_id: u32,
    pub prim_id: u32,
    /// Primitive ID through the triangle specific accessor
    pub prim_id_triangle: u32,
    pub inst_id: u32,
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
}

struct Comparison {
    tid: u32,
    eps: f32,
    errors: u32,
}

impl Comparison {
    fn exact<T: PartialEq + Debug>(&mut self, field: &str, test: T, expected: T) {
        if test != expected {
            self.mismatch(field, test, expected);
        }
    }

    fn approx(&mut self, field: &str, test: f32, expected: f32) {
        // Written so that NaN fails
        if !((test - expected).abs() <= self.eps) {
            self.mismatch(field, test, expected);
        }
    }

    fn approx3(&mut self, field: &str, test: Vec3, expected: Vec3) {
        if !((test - expected).abs().max_element() <= self.eps) {
            self.mismatch(field, test, expected);
        }
    }

    fn mismatch(&mut self, field: &str, test: impl Debug, expected: impl Debug) {
        self.errors += 1;
        log::error!(
            target: "rtas::oracle",
            "test {}: {field} is {test:?}, expected {expected:?}",
            self.tid
        );
    }
}

macro_rules! compare {
    ($cmp:ident, $method:ident, $test:ident, $expected:ident, $($field:ident).+) => {
        $cmp.$method(stringify!($($field).+), $test.$($field).+, $expected.$($field).+)
    };
}

/// Compares every field of `test` with `expected`, logs each mismatch and returns how many there are.
///
/// Discrete fields and ray fields must be equal, distances, barycentrics and vertices are allowed an
/// absolute error of `eps`.
pub fn compare_test_output(tid: u32, test: &TestOutput, expected: &TestOutput, eps: f32) -> u32 {
    let mut cmp = Comparison { tid, eps, errors: 0 };

    compare!(cmp, exact, test, expected, ray0.origin);
    compare!(cmp, exact, test, expected, ray0.direction);
    compare!(cmp, exact, test, expected, ray0.tnear);
    compare!(cmp, exact, test, expected, ray0.mask);
    compare!(cmp, exact, test, expected, ray0.flags);

    compare!(cmp, exact, test, expected, ray_n.origin);
    compare!(cmp, exact, test, expected, ray_n.direction);
    compare!(cmp, exact, test, expected, ray_n.tnear);
    compare!(cmp, exact, test, expected, ray_n.mask);
    compare!(cmp, exact, test, expected, ray_n.flags);

    compare!(cmp, exact, test, expected, hit_type);
    compare!(cmp, exact, test, expected, bvh_level);
    compare!(cmp, exact, test, expected, hit_candidate);
    compare!(cmp, approx, test, expected, t);
    compare!(cmp, approx, test, expected, u);
    compare!(cmp, approx, test, expected, v);
    compare!(cmp, exact, test, expected, front_face);
    compare!(cmp, exact, test, expected, geom_id);
    compare!(cmp, exact, test, expected, prim_id);
    compare!(cmp, exact, test, expected, prim_id_triangle);
    compare!(cmp, exact, test, expected, inst_id);
    compare!(cmp, approx3, test, expected, v0);
    compare!(cmp, approx3, test, expected, v1);
    compare!(cmp, approx3, test, expected, v2);

    cmp.errors
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{compare_test_output, TestHitType, TestInput, TestOutput, TestType, DEFAULT_EPS};

    fn output() -> TestOutput {
        let ray = TestInput::towards(Vec3::new(0.1, 0.6, 0.0)).ray().into();
        TestOutput {
            ray0: ray,
            ray_n: ray,
            hit_type: TestHitType::Committed,
            t: 1.0,
            u: 0.1,
            v: 0.6,
            inst_id: u32::MAX,
            v1: Vec3::X,
            v2: Vec3::Y,
            ..Default::default()
        }
    }

    #[test]
    fn identical_outputs() {
        assert_eq!(compare_test_output(0, &output(), &output(), DEFAULT_EPS), 0);
        let miss = TestOutput::default();
        assert_eq!(compare_test_output(0, &miss, &miss, DEFAULT_EPS), 0);
    }

    #[test]
    fn tolerance() {
        let expected = output();
        let mut test = output();
        test.t += 1e-6;
        test.v0.x -= 1e-6;
        assert_eq!(compare_test_output(0, &test, &expected, DEFAULT_EPS), 0);

        test.t += 1e-3;
        test.u = f32::NAN;
        test.v2.z = 1.0;
        assert_eq!(compare_test_output(0, &test, &expected, DEFAULT_EPS), 3);
    }

    #[test]
    fn exact_fields() {
        let expected = output();
        let mut test = output();
        // Rays don't get any tolerance
        test.ray0.origin.x += 1e-6;
        test.ray_n.flags = 1;
        test.front_face = true;
        test.prim_id_triangle = 3;
        test.hit_type = TestHitType::Potential;
        assert_eq!(compare_test_output(7, &test, &expected, DEFAULT_EPS), 5);
    }

    #[test]
    fn test_types() {
        assert_eq!(TestType::TrianglesAnyHitShaderReject.expected_hit_type(), TestHitType::Miss);
        assert_eq!(TestType::TrianglesPotentialHit.expected_hit_type(), TestHitType::Potential);
        assert!(TestType::TrianglesInstancedCommittedHit.is_instanced());
        assert!(TestType::TrianglesCommittedHit.geometry_flags().contains(crate::geometry::GeometryFlags::OPAQUE));
        assert!(TestType::TrianglesAnyHitShaderCommit.geometry_flags().is_empty());
        assert_eq!(TestType::ALL.len(), 5);
    }
}
