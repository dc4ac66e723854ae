//! Default file naming for working files and enumerated frames.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

/// Digits used for enumerated frame names, like `frame_0002.bmp`.
pub const FRAME_INDEX_WIDTH: usize = 4;

/// Placeholder replaced by the zero-padded frame index in frame patterns.
pub const FRAME_PLACEHOLDER: &str = "{}";

/// Default directory for separated header/body files.
pub const DEFAULT_WORK_DIR: &str = "organs";

/// Default pattern for bent frames.
pub const DEFAULT_FRAME_PATTERN: &str = "frames/frame_{}.bmp";

/// Flatten a path into a single file name component (`a/b.bmp` -> `a_b.bmp`).
///
/// Distinct input paths map to distinct names, which keeps per-session working files apart when
/// several sessions share one work directory.
pub fn sanitize(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(0);

/// A tag unique to this process and call, like `4121_7`.
///
/// Working files carry it so two sessions over the same input never share files.
pub fn session_tag() -> String {
    format!(
        "{}_{}",
        std::process::id(),
        NEXT_SESSION.fetch_add(1, Ordering::Relaxed)
    )
}

/// Header and body working file paths for `input` inside `work_dir`, keyed by `tag`.
pub fn organ_paths(work_dir: &Path, input: &Path, tag: &str) -> (PathBuf, PathBuf) {
    let base = format!("{}_{tag}", sanitize(input));
    (
        work_dir.join(format!("{base}_head")),
        work_dir.join(format!("{base}_body")),
    )
}

/// Expand a frame pattern for `index`.
///
/// Every `{}` is replaced by the index padded to [`FRAME_INDEX_WIDTH`] digits. A pattern without
/// a placeholder gets the index appended before the extension, so frames never overwrite each
/// other.
pub fn frame_path(pattern: &str, index: usize) -> PathBuf {
    let idx = format!("{index:0width$}", width = FRAME_INDEX_WIDTH);
    if pattern.contains(FRAME_PLACEHOLDER) {
        return PathBuf::from(pattern.replace(FRAME_PLACEHOLDER, &idx));
    }

    let path = Path::new(pattern);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{idx}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{idx}"),
    };
    path.with_file_name(name)
}

/// `<dir>/<stem>_bent.<ext>` next to `input`.
pub fn default_bent_path(input: &Path, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    input.with_file_name(format!("{stem}_bent.{ext}"))
}

/// Lowercased extension of `path`, if any.
pub fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Create the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> crate::BendResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/naming.rs"]
mod tests;
