pub mod bounds;
pub mod float;
pub mod transform;

pub use glam::{Vec2, Vec3};
