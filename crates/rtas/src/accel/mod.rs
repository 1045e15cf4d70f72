//! Acceleration structures
//!
//! A backend turns a list of [GeometryDesc] into an opaque byte buffer. The size of that buffer is not
//! known in advance: the backend only gives an expected and a worst-case size. [build_accel] grows the buffer
//! geometrically from the former until the build fits.

pub mod buffer;
pub mod builder;
pub mod layout;
pub mod software;

pub use buffer::{AccelBuffer, ACCEL_ALIGNMENT};
pub use builder::build_accel;

use std::sync::Arc;

use glam::Vec3;

use crate::{
    error::{BuildError, LayoutError},
    geometry::GeometryFlags,
    math::bounds::Bounds,
};

use layout::AccelView;

/// Borrowed view of one geometry, as consumed by an [AccelBackend]
#[derive(Debug, Clone)]
pub enum GeometryDesc<'a> {
    Triangles(TrianglesDesc<'a>),
    Procedural(ProceduralDesc<'a>),
    Instance(InstanceDesc),
}

#[derive(Debug, Clone, Copy)]
pub struct TrianglesDesc<'a> {
    pub flags: GeometryFlags,
    pub mask: u8,
    pub vertices: &'a [Vec3],
    pub triangles: &'a [[u32; 3]],
}

#[derive(Debug, Clone, Copy)]
pub struct ProceduralDesc<'a> {
    pub flags: GeometryFlags,
    pub mask: u8,
    pub boxes: &'a [Bounds],
}

#[derive(Debug, Clone)]
pub struct InstanceDesc {
    pub mask: u8,
    pub instance_id: u32,
    /// Local to world, row-major 3x4
    pub transform: [f32; 12],
    pub accel: Arc<Accel>,
}

impl GeometryDesc<'_> {
    pub fn primitive_count(&self) -> usize {
        match self {
            GeometryDesc::Triangles(t) => t.triangles.len(),
            GeometryDesc::Procedural(p) => p.boxes.len(),
            GeometryDesc::Instance(_) => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelSize {
    pub expected_bytes: usize,
    pub worst_case_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildReport {
    pub bounds: Bounds,
    pub used_bytes: usize,
}

/// Builds accels into caller provided buffers
pub trait AccelBackend {
    /// Required alignment of the buffer handed to [AccelBackend::build]
    fn alignment(&self) -> usize;

    /// Fails when a descriptor is malformed
    fn estimate_size(&self, descs: &[GeometryDesc]) -> Result<AccelSize, BuildError>;

    /// Returns [BuildError::OutOfMemory] when `buffer` is too small, the caller may then retry with a bigger one
    fn build(&self, descs: &[GeometryDesc], buffer: &mut AccelBuffer) -> Result<BuildReport, BuildError>;
}

/// A built acceleration structure
///
/// Keeps the accels it instances alive. They are listed in the order of the instance descriptors it was built from,
/// which is how the buffer refers to them.
#[derive(Debug)]
pub struct Accel {
    buffer: AccelBuffer,
    pub bounds: Bounds,
    pub used_bytes: usize,
    pub instanced: Vec<Arc<Accel>>,
}

impl Accel {
    pub fn new(buffer: AccelBuffer, report: BuildReport, instanced: Vec<Arc<Accel>>) -> Self {
        Self {
            buffer,
            bounds: report.bounds,
            used_bytes: report.used_bytes,
            instanced,
        }
    }

    pub fn buffer(&self) -> &AccelBuffer {
        &self.buffer
    }

    pub fn view(&self) -> Result<AccelView<'_>, LayoutError> {
        let bytes = self
            .buffer
            .as_bytes()
            .get(..self.used_bytes)
            .ok_or(LayoutError::Truncated { section: "buffer" })?;
        AccelView::parse(bytes)
    }

    pub fn instanced(&self, index: u32) -> Result<&Accel, LayoutError> {
        self.instanced
            .get(index as usize)
            .map(|accel| &**accel)
            .ok_or(LayoutError::BadChild { index })
    }
}

/// The accels instanced by `descs`, in descriptor order
pub fn instanced_accels(descs: &[GeometryDesc]) -> Vec<Arc<Accel>> {
    descs
        .iter()
        .filter_map(|desc| match desc {
            GeometryDesc::Instance(instance) => Some(instance.accel.clone()),
            _ => None,
        })
        .collect()
}
