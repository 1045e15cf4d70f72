use super::{instanced_accels, Accel, AccelBackend, AccelBuffer, GeometryDesc, ACCEL_ALIGNMENT};
use crate::{counter, error::BuildError, utils::timer::timed_scope_log};

/// Size of the attempt following an out of memory one: 1.2 times bigger rounded up, and always strictly bigger
pub fn next_attempt_size(bytes: usize) -> usize {
    bytes.saturating_mul(6).div_ceil(5).max(bytes.saturating_add(1))
}

/// Builds an accel with `backend`, growing the buffer until the build fits.
///
/// Starts from the expected size given by the backend and grows it with [next_attempt_size] after each
/// out of memory error, as long as it stays strictly below the worst-case size. Any other error stops the build.
pub fn build_accel(backend: &impl AccelBackend, descs: &[GeometryDesc]) -> Result<Accel, BuildError> {
    timed_scope_log("accel build", || build_accel_(backend, descs))
}

fn build_accel_(backend: &impl AccelBackend, descs: &[GeometryDesc]) -> Result<Accel, BuildError> {
    let alignment = backend.alignment();
    if !alignment.is_power_of_two() || alignment > ACCEL_ALIGNMENT {
        log::error!(target: "rtas::build", "backend requires an alignment of {alignment} bytes");
        return Err(BuildError::Misaligned { alignment });
    }

    let size = backend.estimate_size(descs).map_err(|err| {
        log::error!(target: "rtas::build", "size estimation failed: {err}");
        err
    })?;
    log::debug!(
        target: "rtas::build",
        "{} geometries: expecting {} bytes, at worst {} bytes",
        descs.len(),
        size.expected_bytes,
        size.worst_case_bytes
    );

    let mut bytes = size.expected_bytes;
    let mut last_attempt_bytes = 0;
    while bytes < size.worst_case_bytes {
        counter!("Accel build attempts");
        log::debug!(target: "rtas::build", "build attempt with {bytes} bytes");

        let mut buffer = AccelBuffer::zeroed(bytes);
        last_attempt_bytes = bytes;
        match backend.build(descs, &mut buffer) {
            Ok(report) if report.used_bytes > buffer.len() => {
                let err = BuildError::Backend(format!(
                    "backend reports {} used bytes in a buffer of {}",
                    report.used_bytes,
                    buffer.len()
                ));
                log::error!(target: "rtas::build", "{err}");
                return Err(err);
            }
            Ok(report) => {
                log::debug!(
                    target: "rtas::build",
                    "accel built: {} bytes used out of {}",
                    report.used_bytes,
                    bytes
                );
                return Ok(Accel::new(buffer, report, instanced_accels(descs)));
            }
            Err(err) if err.is_out_of_memory() => {
                bytes = next_attempt_size(bytes);
            }
            Err(err) => {
                log::error!(target: "rtas::build", "build failed: {err}");
                return Err(err);
            }
        }
    }

    log::error!(
        target: "rtas::build",
        "accel does not fit below {} bytes",
        size.worst_case_bytes
    );
    Err(BuildError::SizeExhausted {
        worst_case_bytes: size.worst_case_bytes,
        last_attempt_bytes,
    })
}
