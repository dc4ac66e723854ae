//! Header/body separation for fixed-header raster containers.
//!
//! The native container is BMP: the pixel array starts at the offset stored at address `0x0A`.
//! Only the low byte of that field is read, so headers longer than 255 bytes are out of reach.
//! Everything before the offset is the header, everything after is the body.

use std::path::Path;

use anyhow::Context as _;

use crate::{
    foundation::error::{BendError, BendResult},
    foundation::naming::ensure_parent_dir,
};

/// Address of the byte holding the header length.
pub const HEADER_OFFSET_FIELD: usize = 0x0A;

/// Smallest container that can hold the offset field (the 14-byte BMP file header).
pub const MIN_CONTAINER_LEN: usize = 14;

/// A container split into its immutable header and its mutable body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeparatedPair {
    /// Bytes `[0, offset)`.
    pub header: Vec<u8>,
    /// Bytes `[offset, end)`.
    pub body: Vec<u8>,
}

impl SeparatedPair {
    /// Length of the body; the length every transformed body is normalized back to.
    pub fn body_length(&self) -> usize {
        self.body.len()
    }

    /// Reassemble the original container.
    pub fn recapitate(&self) -> Vec<u8> {
        recapitate(&self.header, &self.body)
    }
}

/// Split container bytes at the header offset.
pub fn split(bytes: &[u8]) -> BendResult<SeparatedPair> {
    if bytes.len() < MIN_CONTAINER_LEN {
        return Err(BendError::malformed(format!(
            "container is {} bytes, shorter than the {MIN_CONTAINER_LEN}-byte minimum header",
            bytes.len()
        )));
    }

    let blade = usize::from(bytes[HEADER_OFFSET_FIELD]);
    if blade < MIN_CONTAINER_LEN {
        return Err(BendError::malformed(format!(
            "payload offset {blade} points inside the {MIN_CONTAINER_LEN}-byte file header"
        )));
    }
    if blade > bytes.len() {
        return Err(BendError::malformed(format!(
            "payload offset {blade} is past the end of a {}-byte container",
            bytes.len()
        )));
    }

    let (head, body) = bytes.split_at(blade);
    Ok(SeparatedPair {
        header: head.to_vec(),
        body: body.to_vec(),
    })
}

/// Read `path`, split it, and persist header and body to `head_path` and `body_path`.
pub fn decapitate(path: &Path, head_path: &Path, body_path: &Path) -> BendResult<SeparatedPair> {
    let bytes = std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
    let pair = split(&bytes)?;

    ensure_parent_dir(head_path)?;
    std::fs::write(head_path, &pair.header)
        .with_context(|| format!("write header '{}'", head_path.display()))?;
    ensure_parent_dir(body_path)?;
    std::fs::write(body_path, &pair.body)
        .with_context(|| format!("write body '{}'", body_path.display()))?;

    Ok(pair)
}

/// Header followed by body. No validation of either.
pub fn recapitate(header: &[u8], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(header.len() + body.len());
    out.extend_from_slice(header);
    out.extend_from_slice(body);
    out
}

/// File-level [`recapitate`]: join `head_path` and `body_path` into `out_path`.
pub fn recapitate_files(head_path: &Path, body_path: &Path, out_path: &Path) -> BendResult<()> {
    let head =
        std::fs::read(head_path).with_context(|| format!("read '{}'", head_path.display()))?;
    let body =
        std::fs::read(body_path).with_context(|| format!("read '{}'", body_path.display()))?;
    ensure_parent_dir(out_path)?;
    std::fs::write(out_path, recapitate(&head, &body))
        .with_context(|| format!("write '{}'", out_path.display()))?;
    Ok(())
}

/// Truncate or zero-pad `buffer` to exactly `target_len` bytes.
pub fn rescale(buffer: &[u8], target_len: usize) -> Vec<u8> {
    let mut out = buffer[..buffer.len().min(target_len)].to_vec();
    out.resize(target_len, 0);
    out
}

/// In-place [`rescale`].
pub fn rescale_in_place(buffer: &mut Vec<u8>, target_len: usize) {
    buffer.resize(target_len, 0);
    debug_assert_eq!(buffer.len(), target_len);
}

/// File-level [`rescale`]: rewrite `path` so it is exactly `target_len` bytes.
pub fn rescale_file(path: &Path, target_len: usize) -> BendResult<()> {
    let mut body = std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
    rescale_in_place(&mut body, target_len);
    std::fs::write(path, &body).with_context(|| format!("write '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/container/separator.rs"]
mod tests;
