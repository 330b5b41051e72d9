//! Fixed-size batching of ordered work items.

use std::fmt;
use std::num::NonZeroUsize;
use std::slice::Chunks;
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of items submitted to a model in one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSize(NonZeroUsize);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchSizeError {
    #[error("batch size must be a positive integer, got {0}")]
    NotPositive(i128),
    #[error("batch size `{value}` is not an integer: {reason}")]
    Unparseable { value: String, reason: String },
}

impl BatchSize {
    pub fn new(size: usize) -> Result<Self, BatchSizeError> {
        NonZeroUsize::new(size)
            .map(Self)
            .ok_or(BatchSizeError::NotPositive(0))
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl FromStr for BatchSize {
    type Err = BatchSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i128 = s
            .trim()
            .parse()
            .map_err(|err: std::num::ParseIntError| BatchSizeError::Unparseable {
                value: s.to_string(),
                reason: err.to_string(),
            })?;
        if value <= 0 {
            return Err(BatchSizeError::NotPositive(value));
        }
        let size = usize::try_from(value).map_err(|err| BatchSizeError::Unparseable {
            value: s.to_string(),
            reason: err.to_string(),
        })?;
        Self::new(size)
    }
}

impl fmt::Display for BatchSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split `items` into contiguous slices of at most `size` elements.
///
/// The iterator is lazy and covers the input exactly once, in order. Only the last slice can be
/// shorter than `size`.
pub fn batches<T>(items: &[T], size: BatchSize) -> Chunks<'_, T> {
    items.chunks(size.get())
}

/// Number of batches [`batches`] yields for `len` items
pub fn batch_count(len: usize, size: BatchSize) -> usize {
    len.div_ceil(size.get())
}
