//! Deterministic gzip compression for tile blobs.

use flate2::{Compression, GzBuilder};
use std::io::{self, Write};

/// Gzip-compresses a byte slice with the default level.
///
/// The header timestamp is pinned to zero so equal inputs always produce
/// byte-equal outputs; the encoder's memoized replay and whole-run
/// determinism both depend on that.
pub fn gzip_compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
