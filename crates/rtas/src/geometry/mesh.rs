use std::collections::HashMap;

use glam::Vec3;

use super::GeometryFlags;
use crate::math::bounds::Bounds;

/// A triangle resolved from a mesh, with the index of the triangle it originates from
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub index: u32,
}

impl Triangle {
    /// Point of barycentric coordinates `(u, v)`: `(1 - u - v) * v0 + u * v1 + v * v2`
    pub fn sample(&self, u: f32, v: f32) -> Vec3 {
        // Expressed from v0 to keep the rounding error relative to the triangle size
        self.v0 + u * (self.v1 - self.v0) + v * (self.v2 - self.v0)
    }

    pub fn center(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    pub fn vertices(&self) -> [Vec3; 3] {
        [self.v0, self.v1, self.v2]
    }
}

/// Indexed triangle mesh
///
/// Vertices are deduplicated on their exact bit pattern. Each triangle remembers the index it had
/// in the mesh it was split from, see [TriangleMesh::split].
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    pub flags: GeometryFlags,
    /// Rays whose mask shares no bit with it skip the mesh
    pub mask: u8,
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
    pub indices: Vec<u32>,
    vertex_map: HashMap<[u32; 3], u32>,
}

impl TriangleMesh {
    pub fn new(flags: GeometryFlags) -> Self {
        Self {
            flags,
            mask: 0xFF,
            ..Default::default()
        }
    }

    pub fn is_opaque(&self) -> bool {
        self.flags.contains(GeometryFlags::OPAQUE)
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Panics if `prim_id` is out of range
    pub fn triangle(&self, prim_id: usize) -> Triangle {
        let [i0, i1, i2] = self.triangles[prim_id];
        Triangle {
            v0: self.vertices[i0 as usize],
            v1: self.vertices[i1 as usize],
            v2: self.vertices[i2 as usize],
            index: self.indices[prim_id],
        }
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.len()).map(|prim_id| self.triangle(prim_id))
    }

    /// Returns the index of `v`, inserting it if no vertex with the same bits exists
    pub fn add_vertex(&mut self, v: Vec3) -> u32 {
        let key = v.to_array().map(f32::to_bits);
        *self.vertex_map.entry(key).or_insert_with(|| {
            self.vertices.push(v);
            (self.vertices.len() - 1) as u32
        })
    }

    pub fn add_triangle(&mut self, tri: &Triangle) {
        let i0 = self.add_vertex(tri.v0);
        let i1 = self.add_vertex(tri.v1);
        let i2 = self.add_vertex(tri.v2);
        self.triangles.push([i0, i1, i2]);
        self.indices.push(tri.index);
    }

    /// Distributes the triangles over two meshes along the plane going through `p` with normal `n`.
    /// A triangle whose center is strictly behind the plane goes to the first mesh.
    pub fn split(&self, p: Vec3, n: Vec3) -> (Self, Self) {
        let mut behind = Self {
            mask: self.mask,
            ..Self::new(self.flags)
        };
        let mut front = Self {
            mask: self.mask,
            ..Self::new(self.flags)
        };

        for tri in self.triangles() {
            if (tri.center() - p).dot(n) < 0.0 {
                behind.add_triangle(&tri);
            } else {
                front.add_triangle(&tri);
            }
        }

        (behind, front)
    }

    /// Same mesh moved by `offset`, triangles keep their order and index
    pub fn translated(&self, offset: Vec3) -> Self {
        let mut mesh = Self {
            mask: self.mask,
            ..Self::new(self.flags)
        };
        for tri in self.triangles() {
            mesh.add_triangle(&Triangle {
                v0: tri.v0 + offset,
                v1: tri.v1 + offset,
                v2: tri.v2 + offset,
                index: tri.index,
            });
        }
        mesh
    }

    /// A `width` × `height` grid starting at `p0` with cells spanned by `dx` and `dy`.
    ///
    /// Cell `(x, y)` holds the triangles `2 * (y * width + x)` and `2 * (y * width + x) + 1`.
    pub fn plane(p0: Vec3, dx: Vec3, dy: Vec3, width: u32, height: u32, flags: GeometryFlags) -> Self {
        let mut mesh = Self::new(flags);
        let point = |x: u32, y: u32| p0 + x as f32 * dx + y as f32 * dy;

        for y in 0..height {
            for x in 0..width {
                let p00 = point(x, y);
                let p01 = point(x + 1, y);
                let p10 = point(x, y + 1);
                let p11 = point(x + 1, y + 1);

                let index = 2 * (y * width + x);
                mesh.add_triangle(&Triangle {
                    v0: p00,
                    v1: p01,
                    v2: p10,
                    index,
                });
                mesh.add_triangle(&Triangle {
                    v0: p11,
                    v1: p10,
                    v2: p01,
                    index: index + 1,
                });
            }
        }
        mesh
    }

    pub fn bounds(&self) -> Bounds {
        self.triangles
            .iter()
            .flatten()
            .fold(Bounds::EMPTY, |b, &i| b.extend(self.vertices[i as usize]))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{Triangle, TriangleMesh};
    use crate::geometry::GeometryFlags;

    fn grid(w: u32, h: u32) -> TriangleMesh {
        TriangleMesh::plane(Vec3::ZERO, Vec3::X, Vec3::Y, w, h, GeometryFlags::OPAQUE)
    }

    #[test]
    fn plane_layout() {
        let mesh = grid(3, 2);
        assert_eq!(mesh.len(), 12);
        assert_eq!(mesh.vertices.len(), 12);
        assert_eq!(mesh.indices, (0..12).collect::<Vec<_>>());

        // Cell (1, 1), second triangle
        let tri = mesh.triangle(2 * (3 + 1) + 1);
        assert_eq!(tri.index, 9);
        assert_eq!(tri.v0, Vec3::new(2.0, 2.0, 0.0));
        assert_eq!(tri.v1, Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(tri.v2, Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn vertices_are_deduplicated() {
        let mut mesh = TriangleMesh::new(GeometryFlags::empty());
        let a = mesh.add_vertex(Vec3::new(1.0, 2.0, 3.0));
        let b = mesh.add_vertex(Vec3::new(1.0, 2.0, 3.0));
        let c = mesh.add_vertex(Vec3::new(-0.0, 2.0, 3.0));
        let d = mesh.add_vertex(Vec3::new(0.0, 2.0, 3.0));
        assert_eq!(a, b);
        // Compared on bits, -0 and 0 differ
        assert_ne!(c, d);
        assert_eq!(mesh.vertices.len(), 3);
    }

    #[test]
    fn split_conserves_triangles() {
        let mesh = grid(8, 8);
        let (a, b) = mesh.split(Vec3::new(4.0, 4.0, 0.0), Vec3::new(0.6, 0.8, 0.0));
        assert_eq!(a.len() + b.len(), mesh.len());
        assert!(!a.is_empty() && !b.is_empty());
        assert!(a.is_opaque() && b.is_opaque());

        let mut indices: Vec<u32> = a.indices.iter().chain(&b.indices).copied().collect();
        indices.sort_unstable();
        assert_eq!(indices, mesh.indices);

        for tri in a.triangles() {
            assert!((tri.center() - Vec3::new(4.0, 4.0, 0.0)).dot(Vec3::new(0.6, 0.8, 0.0)) < 0.0);
            assert_eq!(tri, mesh.triangle(tri.index as usize));
        }
    }

    #[test]
    fn translated() {
        let mesh = grid(2, 2);
        let moved = mesh.translated(Vec3::new(0.5, -1.0, 2.0));
        assert_eq!(moved.len(), mesh.len());
        assert_eq!(moved.indices, mesh.indices);
        assert_eq!(moved.triangle(5).v0, mesh.triangle(5).v0 + Vec3::new(0.5, -1.0, 2.0));
        assert_eq!(moved.bounds().min, Vec3::new(0.5, -1.0, 2.0));
    }

    #[test]
    fn sample() {
        let tri = Triangle {
            v0: Vec3::ZERO,
            v1: Vec3::X,
            v2: Vec3::Y,
            index: 0,
        };
        assert_eq!(tri.sample(0.0, 0.0), Vec3::ZERO);
        assert!(tri.sample(0.1, 0.6).distance(Vec3::new(0.1, 0.6, 0.0)) < 1e-6);
        assert_eq!(grid(2, 1).bounds().max, Vec3::new(2.0, 1.0, 0.0));
    }
}
