use std::sync::Arc;

use super::Scene;
use crate::math::{bounds::Bounds, transform::AffineTransform};

/// Places the accel of another scene in the parent scene
///
/// The instanced scene must have been built before the parent is, see [Scene::build_accel].
#[derive(Debug, Clone)]
pub struct InstanceGeometry {
    pub local_to_world: AffineTransform,
    pub scene: Arc<Scene>,
    pub mask: u8,
}

impl InstanceGeometry {
    pub fn new(local_to_world: AffineTransform, scene: Arc<Scene>) -> Self {
        Self {
            local_to_world,
            scene,
            mask: 0xFF,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.scene.bounds().transform(&self.local_to_world)
    }
}
