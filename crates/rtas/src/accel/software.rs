//! Reference backend building a binary BVH on the CPU
//!
//! Primitives are split top down at the median of their centroids along the widest axis, until at most
//! [MAX_LEAF_PRIMITIVES] remain. How many leaves this produces depends on the primitive count only, which makes
//! the expected size a lower bound of the used size.

use bytemuck::Zeroable;
use glam::Vec3;

use super::{
    buffer::{AccelBuffer, ACCEL_ALIGNMENT},
    layout::{
        layout_bytes, Header, InstanceRecord, Leaf, Node, ACCEL_MAGIC, HEADER_SIZE, INTERIOR_NODE,
        LEAF_FLAG_OPAQUE, LEAF_INSTANCE, LEAF_PROCEDURAL, LEAF_SIZE, LEAF_TRIANGLE, NODE_SIZE,
    },
    AccelBackend, AccelSize, BuildReport, GeometryDesc,
};
use crate::{
    error::BuildError,
    geometry::GeometryFlags,
    math::{bounds::Bounds, transform::AffineTransform},
};

pub const MAX_LEAF_PRIMITIVES: usize = 4;

#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareBackend;

struct Primitive {
    bounds: Bounds,
    centroid: Vec3,
    leaf: Leaf,
}

struct Counts {
    primitives: usize,
    instances: usize,
}

fn invalid(geom_id: usize, reason: impl Into<String>) -> BuildError {
    BuildError::InvalidGeometry {
        geom_id: geom_id as u32,
        reason: reason.into(),
    }
}

fn validate(descs: &[GeometryDesc]) -> Result<Counts, BuildError> {
    let mut counts = Counts {
        primitives: 0,
        instances: 0,
    };

    for (geom_id, desc) in descs.iter().enumerate() {
        match desc {
            GeometryDesc::Triangles(t) => {
                if let Some(i) = t.vertices.iter().position(|v| !v.is_finite()) {
                    return Err(invalid(geom_id, format!("vertex {i} is not finite")));
                }
                let vertex_count = t.vertices.len();
                if let Some(prim_id) = t
                    .triangles
                    .iter()
                    .position(|tri| tri.iter().any(|&i| i as usize >= vertex_count))
                {
                    return Err(invalid(
                        geom_id,
                        format!("triangle {prim_id} indexes past the {vertex_count} vertices"),
                    ));
                }
            }
            GeometryDesc::Procedural(p) => {
                if let Some(prim_id) = p
                    .boxes
                    .iter()
                    .position(|b| !b.is_finite() || b.is_empty())
                {
                    return Err(invalid(geom_id, format!("box {prim_id} is empty or not finite")));
                }
            }
            GeometryDesc::Instance(instance) => {
                if AffineTransform::from_row_major(&instance.transform)
                    .inverse()
                    .is_none()
                {
                    return Err(invalid(geom_id, "transform is not invertible"));
                }
                counts.instances += 1;
            }
        }
        counts.primitives += desc.primitive_count();
    }

    Ok(counts)
}

fn expected_nodes(primitives: usize) -> usize {
    (2 * primitives.div_ceil(MAX_LEAF_PRIMITIVES)).max(2) - 1
}

fn worst_case_nodes(primitives: usize) -> usize {
    (2 * primitives).max(2) - 1
}

fn collect_primitives(descs: &[GeometryDesc]) -> (Vec<Primitive>, Vec<InstanceRecord>) {
    let mut primitives = Vec::with_capacity(descs.iter().map(GeometryDesc::primitive_count).sum());
    let mut instances = Vec::new();

    for (geom_id, desc) in descs.iter().enumerate() {
        let geom_id = geom_id as u32;
        match desc {
            GeometryDesc::Triangles(t) => {
                let flags = if t.flags.contains(GeometryFlags::OPAQUE) {
                    LEAF_FLAG_OPAQUE
                } else {
                    0
                };
                primitives.extend(t.triangles.iter().enumerate().map(|(prim_id, tri)| {
                    let [v0, v1, v2] = tri.map(|i| t.vertices[i as usize]);
                    let bounds = Bounds::from_points(&[v0, v1, v2]);
                    Primitive {
                        bounds,
                        centroid: bounds.center(),
                        leaf: Leaf {
                            kind: LEAF_TRIANGLE,
                            geom_id,
                            prim_id: prim_id as u32,
                            flags,
                            mask: t.mask as u32,
                            v0: v0.to_array(),
                            v1: v1.to_array(),
                            v2: v2.to_array(),
                            ..Leaf::zeroed()
                        },
                    }
                }));
            }
            GeometryDesc::Procedural(p) => {
                let flags = if p.flags.contains(GeometryFlags::OPAQUE) {
                    LEAF_FLAG_OPAQUE
                } else {
                    0
                };
                primitives.extend(p.boxes.iter().enumerate().map(|(prim_id, bounds)| Primitive {
                    bounds: *bounds,
                    centroid: bounds.center(),
                    leaf: Leaf {
                        kind: LEAF_PROCEDURAL,
                        geom_id,
                        prim_id: prim_id as u32,
                        flags,
                        mask: p.mask as u32,
                        v0: bounds.min.to_array(),
                        v1: bounds.max.to_array(),
                        ..Leaf::zeroed()
                    },
                }));
            }
            GeometryDesc::Instance(instance) => {
                let local_to_world = AffineTransform::from_row_major(&instance.transform);
                // Checked by `validate`
                let world_to_local = local_to_world.inverse().unwrap_or_default();
                let child = instances.len() as u32;
                instances.push(InstanceRecord {
                    local_to_world: instance.transform,
                    world_to_local: world_to_local.to_row_major(),
                    instance_id: instance.instance_id,
                    child,
                    mask: instance.mask as u32,
                    _pad: 0,
                });

                let bounds = instance.accel.bounds.transform(&local_to_world);
                primitives.push(Primitive {
                    bounds,
                    centroid: if bounds.is_empty() {
                        Vec3::ZERO
                    } else {
                        bounds.center()
                    },
                    leaf: Leaf {
                        kind: LEAF_INSTANCE,
                        geom_id,
                        mask: instance.mask as u32,
                        payload: child,
                        ..Leaf::zeroed()
                    },
                });
            }
        }
    }

    (primitives, instances)
}

#[derive(Default)]
struct BvhBuilder {
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
}

impl BvhBuilder {
    fn build(primitives: &mut [Primitive]) -> Self {
        let mut builder = Self::default();
        builder.nodes.push(Node::zeroed());
        builder.build_node(0, primitives);
        builder
    }

    fn build_node(&mut self, node: usize, primitives: &mut [Primitive]) {
        let bounds = primitives
            .iter()
            .fold(Bounds::EMPTY, |b, p| b.union(p.bounds));

        if primitives.len() <= MAX_LEAF_PRIMITIVES {
            self.nodes[node] = Node::new(bounds, self.leaves.len() as u32, primitives.len() as u32);
            self.leaves.extend(primitives.iter().map(|p| p.leaf));
            return;
        }

        let axis = primitives
            .iter()
            .fold(Bounds::EMPTY, |b, p| b.extend(p.centroid))
            .main_axis();
        let half = primitives.len() / 2;
        primitives.select_nth_unstable_by(half, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));

        let first = self.nodes.len();
        self.nodes.push(Node::zeroed());
        self.nodes.push(Node::zeroed());
        self.nodes[node] = Node::new(bounds, first as u32, INTERIOR_NODE);

        let (left, right) = primitives.split_at_mut(half);
        self.build_node(first, left);
        self.build_node(first + 1, right);
    }
}

impl AccelBackend for SoftwareBackend {
    fn alignment(&self) -> usize {
        ACCEL_ALIGNMENT
    }

    fn estimate_size(&self, descs: &[GeometryDesc]) -> Result<AccelSize, BuildError> {
        let Counts {
            primitives,
            instances,
        } = validate(descs)?;

        let expected_bytes = layout_bytes(expected_nodes(primitives), primitives, instances);
        let max_bytes = layout_bytes(worst_case_nodes(primitives), primitives, instances);
        // Leaves room for the last geometric step below the worst case to hold the largest layout
        let worst_case_bytes = (max_bytes * 6).div_ceil(5) + ACCEL_ALIGNMENT;

        Ok(AccelSize {
            expected_bytes,
            worst_case_bytes,
        })
    }

    fn build(&self, descs: &[GeometryDesc], buffer: &mut AccelBuffer) -> Result<BuildReport, BuildError> {
        if buffer.as_bytes().as_ptr() as usize % ACCEL_ALIGNMENT != 0 {
            return Err(BuildError::Misaligned {
                alignment: ACCEL_ALIGNMENT,
            });
        }
        validate(descs)?;

        let (mut primitives, instances) = collect_primitives(descs);
        let BvhBuilder { nodes, leaves } = BvhBuilder::build(&mut primitives);

        let used_bytes = layout_bytes(nodes.len(), leaves.len(), instances.len());
        if used_bytes > buffer.len() {
            return Err(BuildError::OutOfMemory {
                provided: buffer.len(),
            });
        }
        let used_bytes_u32 = u32::try_from(used_bytes)
            .map_err(|_| BuildError::Backend(format!("accel of {used_bytes} bytes is too large")))?;

        let bounds = nodes[0].bounds();
        let node_offset = HEADER_SIZE;
        let leaf_offset = node_offset + nodes.len() * NODE_SIZE;
        let instance_offset = leaf_offset + leaves.len() * LEAF_SIZE;
        let header = Header {
            magic: ACCEL_MAGIC,
            node_count: nodes.len() as u32,
            leaf_count: leaves.len() as u32,
            instance_count: instances.len() as u32,
            bounds_min: bounds.min.to_array(),
            used_bytes: used_bytes_u32,
            bounds_max: bounds.max.to_array(),
            node_offset: node_offset as u32,
            leaf_offset: leaf_offset as u32,
            instance_offset: instance_offset as u32,
            ..Header::zeroed()
        };

        let bytes = buffer.as_bytes_mut();
        bytes[..node_offset].copy_from_slice(bytemuck::bytes_of(&header));
        bytes[node_offset..leaf_offset].copy_from_slice(bytemuck::cast_slice(&nodes));
        bytes[leaf_offset..instance_offset].copy_from_slice(bytemuck::cast_slice(&leaves));
        bytes[instance_offset..used_bytes].copy_from_slice(bytemuck::cast_slice(&instances));

        Ok(BuildReport { bounds, used_bytes })
    }
}
