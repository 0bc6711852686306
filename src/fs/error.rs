use std::{io, path::PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("parent is missing or is not a directory")]
    InvalidParent,
    #[error("an entry named {0:?} already exists")]
    DuplicateName(String),
    #[error("no such file or directory")]
    NotFound,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("directory {0:?} is not empty")]
    NonEmptyDirectory(String),
    #[error("allocation failed: {0}")]
    AllocationFailure(String),
    #[error("failed to load master file table {}: {source}", path.display())]
    Load { path: PathBuf, source: io::Error },
    #[error("failed to save master file table {}: {source}", path.display())]
    Save { path: PathBuf, source: io::Error },
    #[error("corrupt master file table: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<bincode::Error> for FsError {
    fn from(error: bincode::Error) -> Self {
        match *error {
            bincode::ErrorKind::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                FsError::Corrupt("unexpected end of table".into())
            }
            bincode::ErrorKind::Io(err) => FsError::Io(err),
            other => FsError::Corrupt(other.to_string()),
        }
    }
}
