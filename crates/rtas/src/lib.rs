//! Acceleration-structure build and ray-query traversal.
//!
//! The flow through the crate is:
//! [geometry::Scene] → [accel::GeometryDesc] → [accel::build_accel] → [accel::Accel] → [query::RayQuery].
//!
//! The [oracle] module synthesizes test scenes, computes the expected hits analytically and compares
//! them with what the traversal reports.

pub mod accel;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod math;
pub mod oracle;
pub mod query;
pub mod ray;
pub mod utils;

pub use rand_xoshiro::Xoshiro256StarStar as Rng;

pub use error::{BuildError, LayoutError, QueryError};
