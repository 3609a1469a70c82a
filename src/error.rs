use thiserror::Error;

/// Failure to build a background model from calibration frames.
///
/// The owning detector stays unready after this error; per-frame calls keep
/// returning "no detection" until a later calibration succeeds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    /// No frames were supplied for a policy that needs a stored background.
    #[error("no frames provided for background")]
    NoFrames,

    /// Frames were supplied but none of them carried any pixels.
    #[error("no usable background frames ({supplied} supplied, all empty)")]
    NoUsableFrames { supplied: usize },
}
