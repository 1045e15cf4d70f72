mod utils;

use std::process::ExitCode;

use anyhow::Result;
use clap::{error::ErrorKind, Parser};
use rtas::{
    accel::software::SoftwareBackend,
    dispatch::ExecutionMode,
    oracle::{execute_test, TestConfig, TestType},
    utils::counter,
};
use utils::{parse_seed, Dimensions};

/// Exactly one test has to be selected
#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
struct TestSelection {
    /// Opaque triangles, the first round ends on the committed hit
    #[arg(long)]
    triangles_committed_hit: bool,

    /// Non opaque triangles, the first round stops on a potential hit
    #[arg(long)]
    triangles_potential_hit: bool,

    /// Non opaque triangles, the any hit shader commits every candidate
    #[arg(long = "triangles-anyhit-shader-commit")]
    triangles_any_hit_shader_commit: bool,

    /// Non opaque triangles, the any hit shader rejects every candidate
    #[arg(long = "triangles-anyhit-shader-reject")]
    triangles_any_hit_shader_reject: bool,

    /// Opaque triangles placed through instances
    #[arg(long)]
    triangles_instanced_committed_hit: bool,
}

impl TestSelection {
    fn test_type(&self) -> TestType {
        if self.triangles_committed_hit {
            TestType::TrianglesCommittedHit
        } else if self.triangles_potential_hit {
            TestType::TrianglesPotentialHit
        } else if self.triangles_any_hit_shader_commit {
            TestType::TrianglesAnyHitShaderCommit
        } else if self.triangles_any_hit_shader_reject {
            TestType::TrianglesAnyHitShaderReject
        } else {
            TestType::TrianglesInstancedCommittedHit
        }
    }
}

#[derive(Parser, Debug)]
/// Builds a split plane, traces one ray per triangle and checks every reported hit
struct Args {
    #[command(flatten)]
    selection: TestSelection,

    #[arg(short, long, default_value = "128x128")]
    /// Plane dimension in format `width`x`height`
    dimensions: Dimensions,

    #[arg(short, long, default_value_t = 16)]
    /// Number of geometries the plane is split into
    geometries: usize,

    #[arg(long, default_value = "0x56FE238A", value_parser = parse_seed)]
    /// Seed of the splits. Given a seed, the scene is deterministic.
    seed: u64,

    #[arg(short, long, default_value_t)]
    /// parallel or sequential
    execution_mode: ExecutionMode,

    #[arg(long)]
    /// Number of worker threads, defaults to one per core
    threads: Option<usize>,
}

fn run(args: Args) -> Result<bool> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let config = TestConfig {
        width: args.dimensions.width,
        height: args.dimensions.height,
        geometries: args.geometries,
        seed: args.seed,
        mode: args.execution_mode,
        ..TestConfig::new(args.selection.test_type())
    };
    log::info!("execution mode: {}", config.mode);

    let report = execute_test(&config, &SoftwareBackend)?;
    counter::report_counters();

    if report.passed() {
        println!("PASSED");
    } else {
        println!("FAILED ({} errors)", report.errors);
    }
    Ok(report.passed())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("worker panicked: {info}");
        default_hook(info);
    }));

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rtas::{dispatch::ExecutionMode, oracle::TestType};

    use super::Args;

    #[test]
    fn exactly_one_test() {
        assert!(Args::try_parse_from(["rtas-cli"]).is_err());
        assert!(Args::try_parse_from([
            "rtas-cli",
            "--triangles-committed-hit",
            "--triangles-potential-hit"
        ])
        .is_err());
        assert!(Args::try_parse_from(["rtas-cli", "--triangles-bogus"]).is_err());

        let args = Args::try_parse_from(["rtas-cli", "--triangles-anyhit-shader-reject"]).unwrap();
        assert_eq!(args.selection.test_type(), TestType::TrianglesAnyHitShaderReject);
        assert_eq!(args.dimensions.to_string(), "128x128");
        assert_eq!(args.geometries, 16);
        assert_eq!(args.seed, 0x56FE238A);
        assert_eq!(args.execution_mode, ExecutionMode::Parallel);
    }

    #[test]
    fn options() {
        let args = Args::try_parse_from([
            "rtas-cli",
            "--triangles-instanced-committed-hit",
            "--dimensions",
            "16x8",
            "--geometries",
            "3",
            "--seed",
            "7",
            "--execution-mode",
            "sequential",
        ])
        .unwrap();
        assert_eq!(args.selection.test_type(), TestType::TrianglesInstancedCommittedHit);
        assert_eq!((args.dimensions.width, args.dimensions.height), (16, 8));
        assert_eq!(args.geometries, 3);
        assert_eq!(args.seed, 7);
        assert_eq!(args.execution_mode, ExecutionMode::Sequential);
    }
}
