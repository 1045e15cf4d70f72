mod scene;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{error::ErrorKind, Parser};
use glam::Vec3;
use image::RgbImage;
use rtas::{
    accel::{software::SoftwareBackend, Accel},
    dispatch::{dispatch, ExecutionMode},
    query::{HitInfo, HitKind, RayQuery},
    ray::Ray,
    utils::counter,
    QueryError,
};

const WIDTH: u32 = 512;
const HEIGHT: u32 = 512;

#[derive(Parser, Debug)]
/// Renders a Cornell box colored by barycentric coordinates and compares it with a reference image
struct Args {
    #[arg(long, default_value = "cornell_box_reference.png")]
    /// Reference image, must match pixel for pixel
    compare: PathBuf,

    #[arg(short, long, default_value = "cornell_box.png")]
    output: PathBuf,

    #[arg(short, long, default_value_t)]
    /// parallel or sequential
    execution_mode: ExecutionMode,
}

/// Primary ray of pixel `(x, y)` from the fixed camera
fn primary_ray(x: u32, y: u32) -> Ray {
    let vx = Vec3::new(-1.0, 0.0, 0.0);
    let vy = Vec3::new(0.0, -1.0, 0.0);
    let vz = Vec3::new(32.0, 32.0, 95.6379);
    let p = Vec3::new(278.0, 273.0, -800.0);

    Ray::new(p, x as f32 * vx / 8.0 + y as f32 * vy / 8.0 + vz)
}

fn trace(accel: &Accel, x: u32, y: u32) -> Result<Option<HitInfo>, QueryError> {
    let mut query = RayQuery::new(accel, primary_ray(x, y))?;
    query.start_traversal()?;
    query.sync()?;
    Ok(query.hit(HitKind::Committed).copied())
}

/// `(u, v, 1 - u - v)` of the committed hit, black on a miss
fn shade(hit: Option<&HitInfo>) -> [u8; 3] {
    let (u, v) = hit.map_or((0.0, 0.0), |hit| (hit.barycentrics.x, hit.barycentrics.y));
    [u, v, 1.0 - u - v].map(|c| (255.0 * c) as u8)
}

fn render(accel: &Accel, width: u32, height: u32, mode: ExecutionMode) -> Result<RgbImage> {
    let pixels = dispatch(width * height, mode, |i| {
        trace(accel, i % width, i / width).map(|hit| shade(hit.as_ref()))
    });

    let mut bytes = Vec::with_capacity(3 * pixels.len());
    for pixel in pixels {
        bytes.extend(pixel?);
    }
    RgbImage::from_vec(width, height, bytes).context("image buffer has the wrong size")
}

/// Number of pixels that differ, None if the dimensions do not match
fn compare_images(a: &RgbImage, b: &RgbImage) -> Option<usize> {
    (a.dimensions() == b.dimensions()).then(|| a.pixels().zip(b.pixels()).filter(|(a, b)| a != b).count())
}

fn run(args: Args) -> Result<bool> {
    log::info!("building scene");
    let mut scene = scene::cornell_box();
    let accel = scene.build_accel(&SoftwareBackend)?;

    log::info!("rendering {WIDTH}x{HEIGHT}, execution mode: {}", args.execution_mode);
    let image = render(&accel, WIDTH, HEIGHT, args.execution_mode)?;
    image
        .save(&args.output)
        .with_context(|| format!("could not save {}", args.output.display()))?;
    counter::report_counters();

    let reference = image::open(&args.compare)
        .with_context(|| format!("could not open {}", args.compare.display()))?
        .to_rgb8();
    let passed = match compare_images(&image, &reference) {
        Some(0) => true,
        Some(mismatches) => {
            log::error!("{mismatches} pixels differ from {}", args.compare.display());
            false
        }
        None => {
            log::error!(
                "{} is {}x{}, expected {WIDTH}x{HEIGHT}",
                args.compare.display(),
                reference.width(),
                reference.height()
            );
            false
        }
    };

    println!("cornell_box [{}]", if passed { "PASSED" } else { "FAILED" });
    Ok(passed)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

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
