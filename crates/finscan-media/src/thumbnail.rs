//! Thumbnail export.

use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// Index of the frame copied as the segment thumbnail, clamped to the
/// last available frame for very short segments.
const THUMBNAIL_FRAME_INDEX: usize = 2;

/// Copy a fixed-index frame of the segment into the cache directory as
/// `<stem>.jpg`. Returns the thumbnail path.
pub fn export_thumbnail(images: &[PathBuf], cache_dir: &Path, stem: &str) -> MediaResult<PathBuf> {
    let source = images
        .get(THUMBNAIL_FRAME_INDEX.min(images.len().saturating_sub(1)))
        .ok_or_else(|| MediaError::EmptySequence(cache_dir.to_path_buf()))?;
    let target = cache_dir.join(format!("{stem}.jpg"));
    std::fs::copy(source, &target)?;
    Ok(target)
}
