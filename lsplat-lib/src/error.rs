use std::io;

use thiserror::Error;

use crate::structures::RowLayout;

#[derive(Debug, Error)]
pub enum SplatError {
    #[error(
        "Buffer of {len} bytes is not a whole number of {layout} rows ({row_len} bytes per row)"
    )]
    LayoutMismatch {
        layout: RowLayout,
        len: usize,
        row_len: usize,
    },
    #[error("Column '{field}' has the wrong size: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Selection entry {index} is {value}, expected 0 or 1")]
    InvalidSelection { index: usize, value: u8 },
    #[error("The {layout} layout needs similarity channels, but none are loaded")]
    MissingSimilarity { layout: RowLayout },
    #[error("The store is detached, its columns must be reattached first")]
    Detached,
    #[error("An I/O error occurred: {0}")]
    IoError(#[from] io::Error),
}
