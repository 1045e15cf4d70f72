use bitflags::bitflags;
use glam::Vec3;

use crate::math::transform::AffineTransform;

bitflags! {
    /// Per-ray traversal flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RayFlags: u32 {
        /// Treat every triangle as opaque
        const FORCE_OPAQUE = 0x1;
        /// Treat every triangle as non opaque
        const FORCE_NON_OPAQUE = 0x2;
        /// Stop as soon as a hit is committed
        const ACCEPT_FIRST_HIT_AND_END_SEARCH = 0x4;
        /// Carried for the shader side, ignored by the traversal
        const SKIP_CLOSEST_HIT_SHADER = 0x8;
        const CULL_BACK_FACING_TRIANGLES = 0x10;
        const CULL_FRONT_FACING_TRIANGLES = 0x20;
        const CULL_OPAQUE = 0x40;
        const CULL_NON_OPAQUE = 0x80;
        const SKIP_TRIANGLES = 0x100;
        const SKIP_PROCEDURAL_PRIMITIVES = 0x200;
    }
}

/// A ray `origin + t * direction` restricted to `tnear <= t < tfar`
///
/// The direction is kept as given: hit distances are expressed in units of its length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub tnear: f32,
    pub tfar: f32,
    pub mask: u8,
    pub flags: RayFlags,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            tnear: 0.0,
            tfar: f32::INFINITY,
            mask: 0xFF,
            flags: RayFlags::empty(),
        }
    }

    pub fn with_range(self, tnear: f32, tfar: f32) -> Self {
        Self { tnear, tfar, ..self }
    }

    pub fn with_mask(self, mask: u8) -> Self {
        Self { mask, ..self }
    }

    pub fn with_flags(self, flags: RayFlags) -> Self {
        Self { flags, ..self }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + t * self.direction
    }

    /// Same ray expressed in the space `world_to_local` maps to.
    /// The interval, mask and flags are carried over unchanged.
    pub fn transformed(&self, world_to_local: &AffineTransform) -> Self {
        Self {
            origin: world_to_local.transform_point(self.origin),
            direction: world_to_local.transform_vector(self.direction),
            ..*self
        }
    }
}
