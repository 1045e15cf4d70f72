use std::{f32::consts::PI, sync::Arc};

use glam::Vec3;
use rand::{seq::SliceRandom, Rng};

use crate::{
    accel::AccelBackend,
    error::BuildError,
    geometry::{GeometryFlags, InstanceGeometry, Scene, Triangle, TriangleMesh},
    math::transform::AffineTransform,
};

/// Number of consecutive geometries sharing an instance in the instanced scene
pub const INSTANCE_BLOCK_SIZE: usize = 4;

/// Where a triangle of the original plane ended up after the splits
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ExpectedHit {
    pub geom_id: u32,
    pub prim_id: u32,
    pub triangle: Triangle,
}

/// A grid plane in z = 0, split into several meshes
#[derive(Debug, Clone)]
pub struct TestScene {
    width: u32,
    height: u32,
    geometries: Vec<TriangleMesh>,
}

impl TestScene {
    /// A single geometry covering `[0, width] x [0, height]` with unit cells
    pub fn new(width: u32, height: u32, flags: GeometryFlags) -> Self {
        Self {
            width,
            height,
            geometries: vec![TriangleMesh::plane(
                Vec3::ZERO,
                Vec3::X,
                Vec3::Y,
                width,
                height,
                flags,
            )],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn geometries(&self) -> &[TriangleMesh] {
        &self.geometries
    }

    pub fn triangle_count(&self) -> usize {
        2 * self.width as usize * self.height as usize
    }

    /// Splits geometries until there are `count` of them.
    ///
    /// Each step picks a random non empty geometry and one of its triangles, and splits the geometry
    /// along a vertical plane going through the center of that triangle with a random orientation.
    pub fn split_into_geometries(&mut self, count: usize, rng: &mut impl Rng) {
        while self.geometries.len() < count {
            let candidates: Vec<usize> = self
                .geometries
                .iter()
                .enumerate()
                .filter(|(_, mesh)| !mesh.is_empty())
                .map(|(geom_id, _)| geom_id)
                .collect();
            let Some(&geom_id) = candidates.choose(rng) else {
                log::warn!(target: "rtas::oracle", "no triangle left to split, stopping at {} geometries", self.geometries.len());
                return;
            };

            let mesh = &self.geometries[geom_id];
            let tri = mesh.triangle(rng.gen_range(0..mesh.len()));
            let angle = 2.0 * PI * rng.gen::<f32>();
            let normal = Vec3::new(angle.cos(), angle.sin(), 0.0);

            let (behind, front) = mesh.split(tri.center(), normal);
            self.geometries[geom_id] = behind;
            self.geometries.push(front);
        }
    }

    /// Expected hit of every triangle of the original plane, indexed by triangle index
    pub fn ground_truth(&self) -> Vec<ExpectedHit> {
        let mut hits = vec![
            ExpectedHit {
                geom_id: u32::MAX,
                prim_id: u32::MAX,
                ..Default::default()
            };
            self.triangle_count()
        ];

        for (geom_id, mesh) in self.geometries.iter().enumerate() {
            for (prim_id, triangle) in mesh.triangles().enumerate() {
                hits[triangle.index as usize] = ExpectedHit {
                    geom_id: geom_id as u32,
                    prim_id: prim_id as u32,
                    triangle,
                };
            }
        }
        hits
    }

    /// The geometries as the top level of a scene
    pub fn scene(&self) -> Scene {
        let mut scene = Scene::new();
        for mesh in &self.geometries {
            scene.push(mesh.clone());
        }
        scene
    }

    /// Translation of the instance holding block `block`
    pub fn instance_translation(block: usize) -> Vec3 {
        // Multiples of 0.25 keep the local vertices exact
        Vec3::new(0.25, 0.5, 1.0) * block as f32
    }

    /// Scene made of one instance per block of [INSTANCE_BLOCK_SIZE] geometries.
    ///
    /// Each block is moved back by its instance translation and built with `backend`, so that the
    /// instanced scene covers the same plane as [TestScene::scene].
    pub fn instanced_scene(&self, backend: &impl AccelBackend) -> Result<Scene, BuildError> {
        let mut scene = Scene::new();
        for (block, meshes) in self.geometries.chunks(INSTANCE_BLOCK_SIZE).enumerate() {
            let translation = Self::instance_translation(block);

            let mut sub_scene = Scene::new();
            for mesh in meshes {
                sub_scene.push(mesh.translated(-translation));
            }
            sub_scene.build_accel(backend)?;

            scene.push(InstanceGeometry::new(
                AffineTransform::from_translation(translation),
                Arc::new(sub_scene),
            ));
        }
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::{TestScene, INSTANCE_BLOCK_SIZE};
    use crate::{
        accel::software::SoftwareBackend,
        geometry::{Geometry, GeometryFlags},
        Rng,
    };

    fn split_scene(seed: u64, count: usize) -> TestScene {
        let mut scene = TestScene::new(16, 8, GeometryFlags::OPAQUE);
        scene.split_into_geometries(count, &mut Rng::seed_from_u64(seed));
        scene
    }

    #[test]
    fn split_conserves_triangles() {
        for seed in 0..8 {
            let scene = split_scene(seed, 16);
            assert_eq!(scene.geometries().len(), 16);

            let mut indices: Vec<u32> = scene
                .geometries()
                .iter()
                .flat_map(|mesh| mesh.indices.iter().copied())
                .collect();
            indices.sort_unstable();
            assert_eq!(indices, (0..256).collect::<Vec<_>>());
            assert!(scene.geometries().iter().all(|mesh| mesh.is_opaque()));
        }
    }

    #[test]
    fn split_is_deterministic() {
        let a = split_scene(0x56FE238A, 7);
        let b = split_scene(0x56FE238A, 7);
        for (a, b) in a.geometries().iter().zip(b.geometries()) {
            assert_eq!(a.indices, b.indices);
        }
    }

    #[test]
    fn split_more_geometries_than_triangles() {
        let mut scene = TestScene::new(1, 1, GeometryFlags::empty());
        scene.split_into_geometries(5, &mut Rng::seed_from_u64(1));
        assert_eq!(scene.geometries().len(), 5);
        assert_eq!(scene.geometries().iter().map(|m| m.len()).sum::<usize>(), 2);

        let mut empty = TestScene::new(0, 4, GeometryFlags::empty());
        empty.split_into_geometries(3, &mut Rng::seed_from_u64(1));
        assert_eq!(empty.geometries().len(), 1);
    }

    #[test]
    fn ground_truth() {
        let scene = split_scene(3, 10);
        let hits = scene.ground_truth();
        assert_eq!(hits.len(), 256);

        for (index, hit) in hits.iter().enumerate() {
            assert_eq!(hit.triangle.index as usize, index);
            let mesh = &scene.geometries()[hit.geom_id as usize];
            assert_eq!(mesh.triangle(hit.prim_id as usize), hit.triangle);
        }

        // Cell (3, 2), first triangle
        let tri = hits[2 * (2 * 16 + 3)].triangle;
        assert_eq!(tri.v0, glam::Vec3::new(3.0, 2.0, 0.0));
    }

    #[test]
    fn instanced_scene() {
        let scene = split_scene(5, 10);
        let instanced = scene.instanced_scene(&SoftwareBackend).unwrap();
        assert_eq!(instanced.len(), 10_usize.div_ceil(INSTANCE_BLOCK_SIZE));

        let Some(Geometry::Instance(instance)) = instanced.geometry(2) else {
            panic!("expected an instance");
        };
        assert_eq!(instance.scene.len(), 2);
        assert!(instance.scene.accel().is_some());
        assert_eq!(
            instance.local_to_world.p,
            TestScene::instance_translation(2)
        );
        assert!(instanced.bounds().max.distance(glam::Vec3::new(16.0, 8.0, 0.0)) < 1e-6);
    }
}
