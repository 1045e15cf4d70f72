use super::{TestHitType, TestInput, TestOutput};
use crate::{
    accel::Accel,
    error::QueryError,
    query::{CandidateKind, HitInfo, HitKind, RayQuery},
};

/// What the any hit shader of [render_loop] does with a triangle candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnyHitDecision {
    Commit,
    Reject,
}

fn record_hit(query: &RayQuery, kind: HitKind, hit_type: TestHitType, out: &mut TestOutput) {
    let Some(hit) = query.hit(kind) else {
        return;
    };

    if let Some(ray) = query.ray(hit.bvh_level) {
        out.ray_n = ray.into();
    }
    out.hit_type = hit_type;
    out.bvh_level = hit.bvh_level;
    out.hit_candidate = hit.candidate;
    out.t = hit.t;
    out.u = hit.barycentrics.x;
    out.v = hit.barycentrics.y;
    out.front_face = hit.front_face;
    out.geom_id = hit.geom_id;
    out.prim_id = hit.prim_id;
    out.prim_id_triangle = query.hit_prim_id_triangle(kind).unwrap_or(u32::MAX);
    out.inst_id = hit.instance_id;
    [out.v0, out.v1, out.v2] = hit.vertices;
}

/// Runs a single traversal round and records where it stopped: on a potential hit, on the committed
/// hit, or on a miss.
pub fn render(accel: &Accel, input: &TestInput) -> Result<TestOutput, QueryError> {
    let mut query = RayQuery::new(accel, input.ray())?;
    query.start_traversal()?;
    query.sync()?;

    let mut out = TestOutput::default();
    if let Some(ray) = query.ray(0) {
        out.ray0 = ray.into();
    }

    if !query.is_traversal_done() {
        record_hit(&query, HitKind::Potential, TestHitType::Potential, &mut out);
    } else if query.has_committed_hit() {
        record_hit(&query, HitKind::Committed, TestHitType::Committed, &mut out);
    }
    Ok(out)
}

/// Runs rounds until the traversal is done, letting `any_hit` decide on every triangle candidate.
/// Procedural candidates are rejected. Records the committed hit, if any.
pub fn render_loop(
    accel: &Accel,
    input: &TestInput,
    mut any_hit: impl FnMut(&HitInfo) -> AnyHitDecision,
) -> Result<TestOutput, QueryError> {
    let mut query = RayQuery::new(accel, input.ray())?;
    query.start_traversal()?;
    query.sync()?;

    let mut out = TestOutput::default();
    if let Some(ray) = query.ray(0) {
        out.ray0 = ray.into();
    }

    while !query.is_traversal_done() {
        if let Some(&hit) = query.hit(HitKind::Potential) {
            if hit.candidate == CandidateKind::Triangle && any_hit(&hit) == AnyHitDecision::Commit {
                query.commit_potential_hit()?;
            }
        }
        // An undecided candidate is rejected by the next round
        query.start_traversal()?;
        query.sync()?;
    }

    if query.has_committed_hit() {
        record_hit(&query, HitKind::Committed, TestHitType::Committed, &mut out);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{render, render_loop, AnyHitDecision};
    use crate::{
        accel::software::SoftwareBackend,
        geometry::{GeometryFlags, Scene, TriangleMesh},
        oracle::{RayRecord, TestHitType, TestInput},
        query::CandidateKind,
    };

    fn scene(flags: GeometryFlags) -> Scene {
        let mut scene = Scene::new();
        scene.push(TriangleMesh::plane(Vec3::ZERO, Vec3::X, Vec3::Y, 2, 2, flags));
        // A second layer behind the first one
        scene.push(TriangleMesh::plane(Vec3::Z, Vec3::X, Vec3::Y, 2, 2, flags));
        scene
    }

    #[test]
    fn single_poll_opaque() {
        let mut scene = scene(GeometryFlags::OPAQUE);
        let accel = scene.build_accel(&SoftwareBackend).unwrap();
        let input = TestInput::towards(Vec3::new(0.25, 0.25, 0.0));

        let out = render(&accel, &input).unwrap();
        assert_eq!(out.hit_type, TestHitType::Committed);
        assert_eq!(out.geom_id, 0);
        assert_eq!(out.prim_id, 0);
        assert_eq!(out.prim_id_triangle, 0);
        assert_eq!(out.inst_id, u32::MAX);
        assert_eq!(out.hit_candidate, CandidateKind::Triangle);
        assert!((out.t - 1.0).abs() < 1e-6);
        assert!(!out.front_face);
        assert_eq!(out.ray0, RayRecord::from(input.ray()));
        assert_eq!(out.ray_n, out.ray0);
    }

    #[test]
    fn single_poll_non_opaque() {
        let mut scene = scene(GeometryFlags::empty());
        let accel = scene.build_accel(&SoftwareBackend).unwrap();

        let out = render(&accel, &TestInput::towards(Vec3::new(0.25, 0.25, 0.0))).unwrap();
        assert_eq!(out.hit_type, TestHitType::Potential);
        assert_eq!(out.prim_id, out.prim_id_triangle);

        // Nothing to hit
        let out = render(&accel, &TestInput::towards(Vec3::new(5.0, 5.0, 0.0))).unwrap();
        assert_eq!(out.hit_type, TestHitType::Miss);
        assert_eq!(out.ray_n, RayRecord::default());
        assert_eq!(out.ray0.origin, Vec3::new(5.0, 5.0, -1.0));
    }

    #[test]
    fn any_hit_loop() {
        let mut scene = scene(GeometryFlags::empty());
        let accel = scene.build_accel(&SoftwareBackend).unwrap();
        let input = TestInput::towards(Vec3::new(1.25, 0.25, 0.0));

        let mut candidates = 0;
        let out = render_loop(&accel, &input, |_| {
            candidates += 1;
            AnyHitDecision::Commit
        })
        .unwrap();
        assert!(candidates >= 1);
        assert_eq!(out.hit_type, TestHitType::Committed);
        assert_eq!(out.geom_id, 0);
        assert!((out.t - 1.0).abs() < 1e-6);

        let mut candidates = 0;
        let out = render_loop(&accel, &input, |_| {
            candidates += 1;
            AnyHitDecision::Reject
        })
        .unwrap();
        // Both layers are offered
        assert_eq!(candidates, 2);
        assert_eq!(out.hit_type, TestHitType::Miss);
        assert_eq!(out.ray0, RayRecord::from(input.ray()));
        assert_eq!(out.ray_n, RayRecord::default());

        // Only the far layer is kept
        let out = render_loop(&accel, &input, |hit| {
            if hit.geom_id == 1 {
                AnyHitDecision::Commit
            } else {
                AnyHitDecision::Reject
            }
        })
        .unwrap();
        assert_eq!(out.geom_id, 1);
        assert!((out.t - 2.0).abs() < 1e-6);
    }
}
