//! Byte layout of the accels built by the [super::software::SoftwareBackend]
//!
//! ```text
//! | Header | Node * node_count | Leaf * leaf_count | InstanceRecord * instance_count |
//! ```
//!
//! Node 0 is the root. The two children of an interior node are stored next to each other,
//! starting at `first`. A leaf node references `count` consecutive leaf records starting at `first`.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::{error::LayoutError, math::bounds::Bounds};

pub const ACCEL_MAGIC: u32 = u32::from_le_bytes(*b"RTAS");

/// `count` of an interior node
pub const INTERIOR_NODE: u32 = u32::MAX;

pub const LEAF_TRIANGLE: u32 = 0;
pub const LEAF_PROCEDURAL: u32 = 1;
pub const LEAF_INSTANCE: u32 = 2;

pub const LEAF_FLAG_OPAQUE: u32 = 0x1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Header {
    pub magic: u32,
    pub node_count: u32,
    pub leaf_count: u32,
    pub instance_count: u32,
    pub bounds_min: [f32; 3],
    pub used_bytes: u32,
    pub bounds_max: [f32; 3],
    pub _pad0: u32,
    pub node_offset: u32,
    pub leaf_offset: u32,
    pub instance_offset: u32,
    pub _pad1: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Node {
    pub min: [f32; 3],
    pub first: u32,
    pub max: [f32; 3],
    pub count: u32,
}

impl Node {
    pub fn new(bounds: Bounds, first: u32, count: u32) -> Self {
        Self {
            min: bounds.min.to_array(),
            first,
            max: bounds.max.to_array(),
            count,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min: Vec3::from_array(self.min),
            max: Vec3::from_array(self.max),
        }
    }

    pub fn is_interior(&self) -> bool {
        self.count == INTERIOR_NODE
    }
}

/// A primitive. Triangles store their vertices, procedural boxes their min in `v0` and max in `v1`,
/// instances the index of their [InstanceRecord] in `payload`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Leaf {
    pub kind: u32,
    pub geom_id: u32,
    pub prim_id: u32,
    pub flags: u32,
    pub v0: [f32; 3],
    pub mask: u32,
    pub v1: [f32; 3],
    pub payload: u32,
    pub v2: [f32; 3],
    pub _pad: u32,
}

impl Leaf {
    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2].map(Vec3::from_array)
    }

    pub fn is_opaque(&self) -> bool {
        self.flags & LEAF_FLAG_OPAQUE != 0
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct InstanceRecord {
    pub local_to_world: [f32; 12],
    pub world_to_local: [f32; 12],
    pub instance_id: u32,
    /// Index in [crate::accel::Accel::instanced]
    pub child: u32,
    pub mask: u32,
    pub _pad: u32,
}

pub const HEADER_SIZE: usize = std::mem::size_of::<Header>();
pub const NODE_SIZE: usize = std::mem::size_of::<Node>();
pub const LEAF_SIZE: usize = std::mem::size_of::<Leaf>();
pub const INSTANCE_SIZE: usize = std::mem::size_of::<InstanceRecord>();

/// Number of bytes taken by an accel with the given record counts
pub fn layout_bytes(nodes: usize, leaves: usize, instances: usize) -> usize {
    HEADER_SIZE + nodes * NODE_SIZE + leaves * LEAF_SIZE + instances * INSTANCE_SIZE
}

/// Typed, checked view over the bytes of an accel
#[derive(Debug, Clone, Copy)]
pub struct AccelView<'a> {
    pub header: &'a Header,
    pub nodes: &'a [Node],
    pub leaves: &'a [Leaf],
    pub instances: &'a [InstanceRecord],
}

fn section<'a, T: Pod>(
    bytes: &'a [u8],
    offset: u32,
    count: u32,
    section: &'static str,
) -> Result<&'a [T], LayoutError> {
    let start = offset as usize;
    let end = start + count as usize * std::mem::size_of::<T>();
    let bytes = bytes
        .get(start..end)
        .ok_or(LayoutError::Truncated { section })?;
    bytemuck::try_cast_slice(bytes).map_err(|_| LayoutError::Misaligned { section })
}

impl<'a> AccelView<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, LayoutError> {
        let header_bytes = bytes
            .get(..HEADER_SIZE)
            .ok_or(LayoutError::Truncated { section: "header" })?;
        let header: &Header = bytemuck::try_from_bytes(header_bytes)
            .map_err(|_| LayoutError::Misaligned { section: "header" })?;

        if header.magic != ACCEL_MAGIC {
            return Err(LayoutError::BadMagic);
        }
        if header.used_bytes as usize > bytes.len() {
            return Err(LayoutError::Truncated { section: "buffer" });
        }
        let bytes = &bytes[..header.used_bytes as usize];

        let view = Self {
            header,
            nodes: section(bytes, header.node_offset, header.node_count, "nodes")?,
            leaves: section(bytes, header.leaf_offset, header.leaf_count, "leaves")?,
            instances: section(bytes, header.instance_offset, header.instance_count, "instances")?,
        };
        if view.nodes.is_empty() {
            return Err(LayoutError::Truncated { section: "nodes" });
        }
        Ok(view)
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            min: Vec3::from_array(self.header.bounds_min),
            max: Vec3::from_array(self.header.bounds_max),
        }
    }

    pub fn node(&self, index: u32) -> Result<&'a Node, LayoutError> {
        self.nodes
            .get(index as usize)
            .ok_or(LayoutError::Truncated { section: "nodes" })
    }

    pub fn leaf(&self, index: u32) -> Result<&'a Leaf, LayoutError> {
        self.leaves
            .get(index as usize)
            .ok_or(LayoutError::BadLeaf { index })
    }

    pub fn instance(&self, index: u32) -> Result<&'a InstanceRecord, LayoutError> {
        self.instances
            .get(index as usize)
            .ok_or(LayoutError::Truncated { section: "instances" })
    }
}
