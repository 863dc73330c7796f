use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The crate's error type.
#[derive(Debug)]
pub enum MlErr {
    /// None of the annotated, sparse or dense term types was requested.
    NoTermTypes,
    /// A decoder weight block has no proximal operator registered for it.
    MissingRegularization { term: &'static str },
    /// A shape invariant was violated between two matrices.
    ShapeMismatch {
        what: &'static str,
        got: (usize, usize),
        expected: (usize, usize),
    },
    /// Two flat buffers that must have the same length do not.
    SizeMismatch { got: usize, expected: usize },
    /// An input is invalid for semantic or domain reasons.
    InvalidInput(&'static str),
    /// `backward` was called on a layer that has no train-mode forward cached.
    MissingForwardCache { layer: &'static str },
    /// The batch loss overflowed or became NaN.
    NonFiniteLoss { epoch: usize, step: usize },
    /// A text input could not be parsed.
    Parse { line: usize, detail: String },
    Io(io::Error),
    Config(serde_json::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::NoTermTypes => write!(f, "at least one type of terms should be chosen"),
            MlErr::MissingRegularization { term } => {
                write!(f, "provide a regularization coefficient for the {term} terms")
            }
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {what}: got {got:?}, expected {expected:?}"
            ),
            MlErr::SizeMismatch { got, expected } => {
                write!(f, "size mismatch: got {got} values, expected {expected}")
            }
            MlErr::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            MlErr::MissingForwardCache { layer } => write!(
                f,
                "backward called on a {layer} layer without a train-mode forward pass"
            ),
            MlErr::NonFiniteLoss { epoch, step } => {
                write!(f, "non-finite batch loss at epoch {epoch}, step {step}")
            }
            MlErr::Parse { line, detail } => write!(f, "parse error at line {line}: {detail}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
            MlErr::Config(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            MlErr::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for MlErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}
