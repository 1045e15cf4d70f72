use std::sync::Arc;

use super::Geometry;
use crate::{
    accel::{
        build_accel, Accel, AccelBackend, GeometryDesc, InstanceDesc, ProceduralDesc, TrianglesDesc,
    },
    error::BuildError,
    math::bounds::Bounds,
};

/// Ordered list of geometries and, once built, their accel
#[derive(Debug, Clone, Default)]
pub struct Scene {
    geometries: Vec<Geometry>,
    accel: Option<Arc<Accel>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a geometry and returns its geometry ID.
    ///
    /// The accel built so far no longer describes the scene and is dropped.
    pub fn push(&mut self, geometry: impl Into<Geometry>) -> u32 {
        self.accel = None;
        self.geometries.push(geometry.into());
        (self.geometries.len() - 1) as u32
    }

    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    pub fn geometry(&self, geom_id: u32) -> Option<&Geometry> {
        self.geometries.get(geom_id as usize)
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn accel(&self) -> Option<&Arc<Accel>> {
        self.accel.as_ref()
    }

    /// Bounds published by the accel if built, else the union of the geometry bounds
    pub fn bounds(&self) -> Bounds {
        match &self.accel {
            Some(accel) => accel.bounds,
            None => self
                .geometries
                .iter()
                .fold(Bounds::EMPTY, |b, geometry| b.union(geometry.bounds())),
        }
    }

    /// One descriptor per geometry, in geometry ID order.
    ///
    /// Meshes and boxes are borrowed, instances share the accel of their scene.
    pub fn descriptors(&self) -> Result<Vec<GeometryDesc<'_>>, BuildError> {
        let mut descs = Vec::with_capacity(self.geometries.len());
        for (geom_id, geometry) in self.geometries.iter().enumerate() {
            let geom_id = geom_id as u32;
            descs.push(match geometry {
                Geometry::TriangleMesh(mesh) => GeometryDesc::Triangles(TrianglesDesc {
                    flags: mesh.flags,
                    mask: mesh.mask,
                    vertices: &mesh.vertices,
                    triangles: &mesh.triangles,
                }),
                Geometry::Instance(instance) => {
                    let accel = instance
                        .scene
                        .accel()
                        .ok_or(BuildError::UnbuiltInstance { geom_id })?;
                    GeometryDesc::Instance(InstanceDesc {
                        mask: instance.mask,
                        instance_id: geom_id,
                        transform: instance.local_to_world.to_row_major(),
                        accel: accel.clone(),
                    })
                }
                Geometry::Procedural(procedural) => GeometryDesc::Procedural(ProceduralDesc {
                    flags: procedural.flags,
                    mask: procedural.mask,
                    boxes: &procedural.boxes,
                }),
            });
        }
        Ok(descs)
    }

    /// Builds the accel of the scene with `backend` and keeps it
    pub fn build_accel(&mut self, backend: &impl AccelBackend) -> Result<Arc<Accel>, BuildError> {
        let accel = {
            let descs = self.descriptors()?;
            Arc::new(build_accel(backend, &descs)?)
        };
        self.accel = Some(accel.clone());
        Ok(accel)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec3;

    use super::Scene;
    use crate::{
        accel::{software::SoftwareBackend, GeometryDesc},
        error::BuildError,
        geometry::{GeometryFlags, InstanceGeometry, ProceduralGeometry, TriangleMesh},
        math::{bounds::Bounds, transform::AffineTransform},
    };

    fn quad() -> TriangleMesh {
        TriangleMesh::plane(Vec3::ZERO, Vec3::X, Vec3::Y, 1, 1, GeometryFlags::OPAQUE)
    }

    #[test]
    fn descriptors_follow_geometry_ids() {
        let mut scene = Scene::new();
        assert_eq!(scene.push(quad()), 0);
        assert_eq!(
            scene.push(ProceduralGeometry::new(
                GeometryFlags::empty(),
                vec![Bounds::new(Vec3::ZERO, Vec3::ONE)]
            )),
            1
        );

        let descs = scene.descriptors().unwrap();
        assert_eq!(descs.len(), 2);
        match &descs[0] {
            GeometryDesc::Triangles(t) => {
                assert_eq!(t.triangles.len(), 2);
                assert_eq!(t.vertices.len(), 4);
                assert_eq!(t.mask, 0xFF);
                assert!(t.flags.contains(GeometryFlags::OPAQUE));
            }
            _ => panic!("expected a triangle descriptor"),
        }
        assert!(matches!(&descs[1], GeometryDesc::Procedural(p) if p.boxes.len() == 1));
    }

    #[test]
    fn instance_needs_built_scene() {
        let mut child = Scene::new();
        child.push(quad());

        let mut parent = Scene::new();
        parent.push(quad());
        parent.push(InstanceGeometry::new(
            AffineTransform::IDENTITY,
            Arc::new(child.clone()),
        ));
        assert_eq!(
            parent.descriptors().err(),
            Some(BuildError::UnbuiltInstance { geom_id: 1 })
        );

        child.build_accel(&SoftwareBackend).unwrap();
        let child = Arc::new(child);
        let mut parent = Scene::new();
        parent.push(quad());
        parent.push(InstanceGeometry::new(
            AffineTransform::from_translation(Vec3::Z),
            child.clone(),
        ));
        match &parent.descriptors().unwrap()[1] {
            GeometryDesc::Instance(instance) => {
                assert_eq!(instance.instance_id, 1);
                assert!(Arc::ptr_eq(&instance.accel, child.accel().unwrap()));
                assert_eq!(instance.transform[11], 1.0);
            }
            _ => panic!("expected an instance descriptor"),
        }

        let accel = parent.build_accel(&SoftwareBackend).unwrap();
        assert_eq!(accel.bounds.max, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(accel.instanced.len(), 1);
    }

    #[test]
    fn push_drops_accel() {
        let mut scene = Scene::new();
        scene.push(quad());
        scene.build_accel(&SoftwareBackend).unwrap();
        assert!(scene.accel().is_some());
        scene.push(quad());
        assert!(scene.accel().is_none());
    }
}
