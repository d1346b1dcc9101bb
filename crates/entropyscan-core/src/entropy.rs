//! Shannon entropy over the byte-value histogram of a file.
//!
//! Packed or encrypted executables look like random data: close to 8 bits
//! per byte. Ordinary compiled code sits somewhere around 5-6.5.

use std::path::Path;

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::target;

/// Upper bound of the entropy scale for an 8-bit alphabet.
pub const MAX_ENTROPY: f64 = 8.0;

/// Running count of every byte value seen so far.
#[derive(Debug, Clone)]
pub struct ByteHistogram {
    counts: [u64; 256],
    total: u64,
}

impl Default for ByteHistogram {
    fn default() -> Self {
        Self {
            counts: [0; 256],
            total: 0,
        }
    }
}

impl ByteHistogram {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.counts[usize::from(byte)] += 1;
        }
        self.total += data.len() as u64;
    }

    /// Number of bytes counted.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Unrounded Shannon entropy in bits per byte; 0.0 when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let len = self.total as f64;
        self.counts
            .iter()
            .filter(|&&count| count > 0)
            .map(|&count| {
                let p = count as f64 / len;
                -p * p.log2()
            })
            .sum()
    }
}

/// Round to two decimal places, half away from zero (`f64::round`).
#[must_use]
pub fn round_entropy(entropy: f64) -> f64 {
    (entropy * 100.0).round() / 100.0
}

/// Entropy of an in-memory buffer, rounded like [`file_entropy`].
#[must_use]
pub fn shannon_entropy(data: &[u8]) -> f64 {
    let mut histogram = ByteHistogram::new();
    histogram.update(data);
    round_entropy(histogram.entropy())
}

/// Stream the file at `path` once and return its entropy, rounded to two
/// decimals.
///
/// Fails for non-regular files and files above [`target::MAX_FILE_SIZE`].
/// An empty file has entropy 0.0.
pub async fn file_entropy(path: &Path, chunk_size: usize, cancel: &CancellationToken) -> Result<f64> {
    let opened = target::open_regular(path).await?;
    if opened.size == 0 {
        return Ok(0.0);
    }

    let mut histogram = ByteHistogram::new();
    target::stream_chunks(path, opened, chunk_size, cancel, |chunk| {
        histogram.update(chunk);
    })
    .await?;

    Ok(round_entropy(histogram.entropy()))
}
