use rand::SeedableRng;

use super::{
    compare_test_output, render, render_loop, AnyHitDecision, ExpectedHit, TestHitType, TestInput,
    TestOutput, TestScene, TestType, DEFAULT_EPS, HIT_BARYCENTRICS, INSTANCE_BLOCK_SIZE,
};
use crate::{
    accel::{Accel, AccelBackend},
    dispatch::{dispatch, ExecutionMode},
    error::{BuildError, QueryError},
    math::transform::AffineTransform,
    query::CandidateKind,
    Rng,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestConfig {
    pub test: TestType,
    pub width: u32,
    pub height: u32,
    /// Number of geometries the plane is split into
    pub geometries: usize,
    pub seed: u64,
    pub mode: ExecutionMode,
    pub eps: f32,
}

impl TestConfig {
    pub const DEFAULT_SEED: u64 = 0x56FE238A;

    /// 128x128 plane split into 16 geometries
    pub fn new(test: TestType) -> Self {
        Self {
            test,
            width: 128,
            height: 128,
            geometries: 16,
            seed: Self::DEFAULT_SEED,
            mode: ExecutionMode::default(),
            eps: DEFAULT_EPS,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TestReport {
    pub tests: u32,
    pub errors: u32,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.errors == 0
    }
}

/// Ray aimed at [HIT_BARYCENTRICS] on the triangle of `hit`
fn test_input(hit: &ExpectedHit) -> TestInput {
    let (u, v) = HIT_BARYCENTRICS;
    TestInput::towards(hit.triangle.sample(u, v))
}

/// What `test` should observe for `input`. `world_to_local` is the inverse transform of the instance the
/// triangle is in, if any.
fn expected_output(
    test: TestType,
    input: &TestInput,
    hit: &ExpectedHit,
    world_to_local: Option<&AffineTransform>,
) -> TestOutput {
    let ray0 = input.ray();
    let mut expected = TestOutput {
        ray0: ray0.into(),
        hit_type: test.expected_hit_type(),
        ..Default::default()
    };
    if expected.hit_type == TestHitType::Miss {
        return expected;
    }

    let (u, v) = HIT_BARYCENTRICS;
    let mut vertices = hit.triangle.vertices();
    expected.ray_n = ray0.into();
    expected.bvh_level = 0;
    expected.hit_candidate = CandidateKind::Triangle;
    expected.t = 1.0;
    expected.u = u;
    expected.v = v;
    // Rays go along the triangle normal
    expected.front_face = false;
    expected.geom_id = hit.geom_id;
    expected.prim_id = hit.prim_id;
    expected.prim_id_triangle = hit.prim_id;
    expected.inst_id = u32::MAX;

    if let Some(world_to_local) = world_to_local {
        let block = hit.geom_id / INSTANCE_BLOCK_SIZE as u32;
        let offset = TestScene::instance_translation(block as usize);
        expected.ray_n = ray0.transformed(world_to_local).into();
        expected.bvh_level = 1;
        expected.geom_id = hit.geom_id % INSTANCE_BLOCK_SIZE as u32;
        expected.inst_id = block;
        vertices = vertices.map(|v| v - offset);
    }
    [expected.v0, expected.v1, expected.v2] = vertices;
    expected
}

fn run_test(test: TestType, accel: &Accel, input: &TestInput) -> Result<TestOutput, QueryError> {
    match test {
        TestType::TrianglesCommittedHit
        | TestType::TrianglesPotentialHit
        | TestType::TrianglesInstancedCommittedHit => render(accel, input),
        TestType::TrianglesAnyHitShaderCommit => render_loop(accel, input, |_| AnyHitDecision::Commit),
        TestType::TrianglesAnyHitShaderReject => render_loop(accel, input, |_| AnyHitDecision::Reject),
    }
}

/// Builds the scene of `config` with `backend`, runs one test per triangle and compares each result with
/// the expected one.
///
/// Fails only if the accel can't be built, test failures are counted in the report and logged.
pub fn execute_test(config: &TestConfig, backend: &impl AccelBackend) -> Result<TestReport, BuildError> {
    let test = config.test;
    log::info!(
        target: "rtas::oracle",
        "{test}: {}x{} plane split into {} geometries",
        config.width,
        config.height,
        config.geometries
    );

    let mut rng = Rng::seed_from_u64(config.seed);
    let mut test_scene = TestScene::new(config.width, config.height, test.geometry_flags());
    test_scene.split_into_geometries(config.geometries, &mut rng);
    let ground_truth = test_scene.ground_truth();

    let (mut scene, world_to_local) = if test.is_instanced() {
        let scene = test_scene.instanced_scene(backend)?;
        let world_to_local: Vec<AffineTransform> = (0..scene.len())
            .map(|block| {
                AffineTransform::from_translation(TestScene::instance_translation(block))
                    .inverse()
                    .unwrap_or_default()
            })
            .collect();
        (scene, world_to_local)
    } else {
        (test_scene.scene(), Vec::new())
    };
    let accel = scene.build_accel(backend)?;

    let tests = ground_truth.len() as u32;
    let errors: Vec<u32> = dispatch(tests, config.mode, |tid| {
        let hit = &ground_truth[tid as usize];
        let input = test_input(hit);
        let instance = world_to_local.get(hit.geom_id as usize / INSTANCE_BLOCK_SIZE);
        let expected = expected_output(test, &input, hit, instance);

        match run_test(test, &accel, &input) {
            Ok(output) => compare_test_output(tid, &output, &expected, config.eps),
            Err(err) => {
                log::error!(target: "rtas::oracle", "test {tid}: ray query failed: {err}");
                1
            }
        }
    });

    let report = TestReport {
        tests,
        errors: errors.iter().sum(),
    };
    if report.passed() {
        log::info!(target: "rtas::oracle", "{test}: {} tests passed", report.tests);
    } else {
        log::error!(
            target: "rtas::oracle",
            "{test}: {} errors over {} tests",
            report.errors,
            report.tests
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::{execute_test, expected_output, test_input, TestConfig, TestReport};
    use crate::{
        accel::software::SoftwareBackend,
        dispatch::ExecutionMode,
        geometry::GeometryFlags,
        oracle::{compare_test_output, render, TestScene, TestType, DEFAULT_EPS},
        Rng,
    };

    fn config(test: TestType) -> TestConfig {
        TestConfig {
            width: 8,
            height: 8,
            geometries: 4,
            ..TestConfig::new(test)
        }
    }

    #[test]
    fn all_tests_pass() {
        for test in TestType::ALL {
            let report = execute_test(&config(test), &SoftwareBackend).unwrap();
            assert_eq!(report, TestReport { tests: 128, errors: 0 }, "{test}");
        }
    }

    #[test]
    fn sequential_execution() {
        for test in [TestType::TrianglesPotentialHit, TestType::TrianglesInstancedCommittedHit] {
            let config = TestConfig {
                mode: ExecutionMode::Sequential,
                width: 5,
                height: 3,
                geometries: 9,
                ..TestConfig::new(test)
            };
            let report = execute_test(&config, &SoftwareBackend).unwrap();
            assert!(report.passed(), "{test}");
            assert_eq!(report.tests, 30);
        }
    }

    #[test]
    fn single_geometry() {
        let config = TestConfig {
            geometries: 1,
            ..config(TestType::TrianglesCommittedHit)
        };
        assert!(execute_test(&config, &SoftwareBackend).unwrap().passed());
    }

    #[test]
    fn wrong_expectation_is_counted() {
        let mut scene = TestScene::new(2, 2, GeometryFlags::OPAQUE);
        scene.split_into_geometries(1, &mut Rng::seed_from_u64(0));
        let hits = scene.ground_truth();
        let mut world = scene.scene();
        let accel = world.build_accel(&SoftwareBackend).unwrap();

        let input = test_input(&hits[3]);
        let output = render(&accel, &input).unwrap();
        let expected = expected_output(TestType::TrianglesCommittedHit, &input, &hits[3], None);
        assert_eq!(compare_test_output(3, &output, &expected, DEFAULT_EPS), 0);

        // Expecting the neighbour triangle: prim IDs and vertices differ
        let wrong = expected_output(TestType::TrianglesCommittedHit, &input, &hits[2], None);
        assert!(compare_test_output(3, &output, &wrong, DEFAULT_EPS) >= 2);

        // A potential hit is expected where the opaque triangle commits
        let wrong = expected_output(TestType::TrianglesPotentialHit, &input, &hits[3], None);
        assert_eq!(compare_test_output(3, &output, &wrong, DEFAULT_EPS), 1);
    }
}
