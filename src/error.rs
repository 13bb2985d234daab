use plotters::drawing::DrawingAreaErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Band index {band} is out of range ({available} available)")]
    BandOutOfRange { band: usize, available: usize },

    #[error("Chain column {0} has zero variance; autocorrelation is undefined")]
    ZeroVariance(usize),

    #[error("Frame {index} is {found:?} pixels, expected {expected:?}")]
    FrameSizeMismatch {
        index: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Unknown panel token '{0}'")]
    UnknownPanel(String),

    #[error("Parameter '{0}' not found in chain archive")]
    MissingParameter(String),

    /// Any failure reported by a plotters backend.
    #[error("Drawing error: {0}")]
    Draw(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("NPZ error: {0}")]
    Npz(#[from] ndarray_npy::ReadNpzError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl<E> From<DrawingAreaErrorKind<E>> for DiagError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        DiagError::Draw(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DiagError>;

pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(DiagError::InvalidInput(msg.into()))
}
