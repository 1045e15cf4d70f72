use super::GeometryFlags;
use crate::math::bounds::Bounds;

/// User defined primitives known only by their bounding box.
///
/// The traversal reports a box entered by the ray as a potential hit, the application then decides
/// where the primitive is hit with [crate::query::RayQuery::commit_potential_hit_override].
#[derive(Debug, Clone, Default)]
pub struct ProceduralGeometry {
    pub flags: GeometryFlags,
    pub mask: u8,
    pub boxes: Vec<Bounds>,
}

impl ProceduralGeometry {
    pub fn new(flags: GeometryFlags, boxes: Vec<Bounds>) -> Self {
        Self {
            flags,
            mask: 0xFF,
            boxes,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.boxes.iter().fold(Bounds::EMPTY, |b, &other| b.union(other))
    }
}
