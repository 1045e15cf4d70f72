//! Scene content handed to the accel builder:
//! - triangle meshes
//! - procedural boxes, for which the application decides the hit distance
//! - instances of another scene, placed with an affine transform
//!
//! A [Scene] holds an ordered list of [Geometry]. The position of a geometry in the scene is its geometry ID.

pub mod instance;
pub mod mesh;
pub mod procedural;
pub mod scene;

pub use instance::InstanceGeometry;
pub use mesh::{Triangle, TriangleMesh};
pub use procedural::ProceduralGeometry;
pub use scene::Scene;

use bitflags::bitflags;

use crate::math::bounds::Bounds;

bitflags! {
    /// Per geometry build flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GeometryFlags: u32 {
        /// Hits are committed without asking the application
        const OPAQUE = 0x1;
    }
}

#[derive(Debug, Clone)]
pub enum Geometry {
    TriangleMesh(TriangleMesh),
    Instance(InstanceGeometry),
    Procedural(ProceduralGeometry),
}

impl Geometry {
    /// World space bounds of the geometry, empty if it has no primitive
    pub fn bounds(&self) -> Bounds {
        match self {
            Geometry::TriangleMesh(mesh) => mesh.bounds(),
            Geometry::Instance(instance) => instance.bounds(),
            Geometry::Procedural(procedural) => procedural.bounds(),
        }
    }
}

impl From<TriangleMesh> for Geometry {
    fn from(mesh: TriangleMesh) -> Self {
        Self::TriangleMesh(mesh)
    }
}

impl From<InstanceGeometry> for Geometry {
    fn from(instance: InstanceGeometry) -> Self {
        Self::Instance(instance)
    }
}

impl From<ProceduralGeometry> for Geometry {
    fn from(procedural: ProceduralGeometry) -> Self {
        Self::Procedural(procedural)
    }
}
