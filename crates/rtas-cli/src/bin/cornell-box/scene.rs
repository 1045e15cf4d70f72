use glam::Vec3;
use rtas::geometry::{GeometryFlags, Scene, Triangle, TriangleMesh};

pub const FLOOR: u32 = 0;
pub const SHORT_BLOCK: u32 = 5;
pub const TALL_BLOCK: u32 = 6;

/// Quads of the room, in millimeters
const ROOM: [[[f32; 3]; 4]; 5] = [
    // Floor
    [[552.8, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 559.2], [549.6, 0.0, 559.2]],
    // Ceiling
    [[556.0, 548.8, 0.0], [556.0, 548.8, 559.2], [0.0, 548.8, 559.2], [0.0, 548.8, 0.0]],
    // Back wall
    [[549.6, 0.0, 559.2], [0.0, 0.0, 559.2], [0.0, 548.8, 559.2], [556.0, 548.8, 559.2]],
    // Right wall
    [[0.0, 0.0, 559.2], [0.0, 0.0, 0.0], [0.0, 548.8, 0.0], [0.0, 548.8, 559.2]],
    // Left wall
    [[552.8, 0.0, 0.0], [549.6, 0.0, 559.2], [556.0, 548.8, 559.2], [556.0, 548.8, 0.0]],
];

const SHORT: [[[f32; 3]; 4]; 5] = [
    [[130.0, 165.0, 65.0], [82.0, 165.0, 225.0], [240.0, 165.0, 272.0], [290.0, 165.0, 114.0]],
    [[290.0, 0.0, 114.0], [290.0, 165.0, 114.0], [240.0, 165.0, 272.0], [240.0, 0.0, 272.0]],
    [[130.0, 0.0, 65.0], [130.0, 165.0, 65.0], [290.0, 165.0, 114.0], [290.0, 0.0, 114.0]],
    [[82.0, 0.0, 225.0], [82.0, 165.0, 225.0], [130.0, 165.0, 65.0], [130.0, 0.0, 65.0]],
    [[240.0, 0.0, 272.0], [240.0, 165.0, 272.0], [82.0, 165.0, 225.0], [82.0, 0.0, 225.0]],
];

const TALL: [[[f32; 3]; 4]; 5] = [
    [[423.0, 330.0, 247.0], [265.0, 330.0, 296.0], [314.0, 330.0, 456.0], [472.0, 330.0, 406.0]],
    [[423.0, 0.0, 247.0], [423.0, 330.0, 247.0], [472.0, 330.0, 406.0], [472.0, 0.0, 406.0]],
    [[472.0, 0.0, 406.0], [472.0, 330.0, 406.0], [314.0, 330.0, 456.0], [314.0, 0.0, 456.0]],
    [[314.0, 0.0, 456.0], [314.0, 330.0, 456.0], [265.0, 330.0, 296.0], [265.0, 0.0, 296.0]],
    [[265.0, 0.0, 296.0], [265.0, 330.0, 296.0], [423.0, 330.0, 247.0], [423.0, 0.0, 247.0]],
];

/// Each quad `v0 v1 v2 v3` is made of the triangles `v0 v1 v3` and `v2 v3 v1`
fn quad_mesh(quads: &[[[f32; 3]; 4]]) -> TriangleMesh {
    let mut mesh = TriangleMesh::new(GeometryFlags::OPAQUE);
    for (i, quad) in quads.iter().enumerate() {
        let [v0, v1, v2, v3] = quad.map(Vec3::from_array);
        let index = 2 * i as u32;
        mesh.add_triangle(&Triangle { v0, v1, v2: v3, index });
        mesh.add_triangle(&Triangle {
            v0: v2,
            v1: v3,
            v2: v1,
            index: index + 1,
        });
    }
    mesh
}

/// Walls, floor and ceiling are one geometry each, followed by the two blocks
pub fn cornell_box() -> Scene {
    let mut scene = Scene::new();
    for quad in &ROOM {
        scene.push(quad_mesh(std::slice::from_ref(quad)));
    }
    scene.push(quad_mesh(&SHORT));
    scene.push(quad_mesh(&TALL));
    scene
}
