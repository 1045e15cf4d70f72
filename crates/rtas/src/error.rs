use thiserror::Error;

/// Errors reported while sizing or building an accel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// The descriptor is malformed. Reported by the size estimation as well as the build.
    #[error("geometry {geom_id} is malformed: {reason}")]
    InvalidGeometry { geom_id: u32, reason: String },

    /// An instance references a scene whose accel has not been built yet
    #[error("instance {geom_id} references a scene without a built accel")]
    UnbuiltInstance { geom_id: u32 },

    /// The buffer handed to the backend is too small. The only recoverable error.
    #[error("accel buffer of {provided} bytes is too small")]
    OutOfMemory { provided: usize },

    #[error("accel buffer is not aligned to {alignment} bytes")]
    Misaligned { alignment: usize },

    /// Geometric growth reached the worst case reported by the backend without the build succeeding
    #[error(
        "accel does not fit below the worst case of {worst_case_bytes} bytes (last attempt: {last_attempt_bytes} bytes)"
    )]
    SizeExhausted {
        worst_case_bytes: usize,
        last_attempt_bytes: usize,
    },

    #[error("backend failure: {0}")]
    Backend(String),
}

impl BuildError {
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

/// Inconsistencies found while reading an accel buffer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    #[error("accel buffer does not start with the expected magic")]
    BadMagic,
    #[error("accel buffer is truncated in the {section} section")]
    Truncated { section: &'static str },
    #[error("accel buffer {section} section is misaligned")]
    Misaligned { section: &'static str },
    #[error("accel references instanced accel {index} which does not exist")]
    BadChild { index: u32 },
    #[error("leaf record {index} is malformed")]
    BadLeaf { index: u32 },
}

/// Errors reported by a [crate::query::RayQuery]
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum QueryError {
    #[error("traversal is done, the query cannot be used anymore")]
    TraversalDone,
    #[error("no traversal round has been started")]
    NoRoundInFlight,
    #[error("a traversal round is already in flight")]
    RoundInFlight,
    #[error("no potential hit is pending")]
    NoPotentialHit,
    #[error("the pending potential hit is not a procedural primitive")]
    NotProcedural,
    #[error("hit distance {t} is outside of the ray interval")]
    HitOutOfRange { t: f32 },
    #[error("corrupt accel: {0}")]
    CorruptAccel(#[from] LayoutError),
}
