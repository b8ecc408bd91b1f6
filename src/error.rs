use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

/// The result type used in the entire dataset preparation crate.
pub type Result<T> = std::result::Result<T, DatasetErr>;

/// The dataset preparation error type.
///
/// Every failure is fail-fast: a build either completes with consistent
/// partitions or returns one of these before any partition is handed out.
#[derive(Debug)]
pub enum DatasetErr {
    /// A required column, function or ratio is missing or out of range.
    InvalidArgument(String),
    /// The synthetic `id` column would overwrite an undeclared existing column.
    NameConflict { column: String },
    /// Persisting into a directory that is already there.
    AlreadyExists(PathBuf),
    /// Loading from a directory that is not there.
    NotFound(PathBuf),
    IndexOutOfRange {
        index: usize,
        len: usize,
    },
    /// The dataset is not in a state that allows the operation.
    InvalidState(String),
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    SingularMatrix(&'static str),
    Io(io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
    Npy(String),
}

impl Display for DatasetErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetErr::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            DatasetErr::NameConflict { column } => write!(
                f,
                "'{column}' column has been occupied, please offer another id column"
            ),
            DatasetErr::AlreadyExists(path) => {
                write!(f, "directory {} already exists", path.display())
            }
            DatasetErr::NotFound(path) => write!(f, "directory {} does not exist", path.display()),
            DatasetErr::IndexOutOfRange { index, len } => {
                write!(f, "index {index} is out of range for a dataset of {len} samples")
            }
            DatasetErr::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            DatasetErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            DatasetErr::SingularMatrix(which) => write!(f, "{which} is singular"),
            DatasetErr::Io(e) => write!(f, "io error: {e}"),
            DatasetErr::Json(e) => write!(f, "json error: {e}"),
            DatasetErr::Csv(e) => write!(f, "csv error: {e}"),
            DatasetErr::Npy(msg) => write!(f, "npy error: {msg}"),
        }
    }
}

impl Error for DatasetErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DatasetErr::Io(e) => Some(e),
            DatasetErr::Json(e) => Some(e),
            DatasetErr::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DatasetErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for DatasetErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<csv::Error> for DatasetErr {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<ndarray_npy::WriteNpyError> for DatasetErr {
    fn from(value: ndarray_npy::WriteNpyError) -> Self {
        Self::Npy(value.to_string())
    }
}

impl From<ndarray_npy::ReadNpyError> for DatasetErr {
    fn from(value: ndarray_npy::ReadNpyError) -> Self {
        Self::Npy(value.to_string())
    }
}

impl From<ndarray::ShapeError> for DatasetErr {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::InvalidState(format!("shape error: {value}"))
    }
}
