//! Sequential batch extraction and persistence.

use std::path::{Path, PathBuf};

use crate::error::{EmbedError, EmbedResult};
use crate::pipeline::FeatureExtractor;
use crate::storage::{
    FeatureFileCodec, FeatureMatrix, IndexFileCodec, FEATURE_FILE_NAME, INDEX_FILE_NAME,
};

use super::index::GalleryIndex;

/// Result of a batch run: the embedding matrix and its parallel index.
#[derive(Debug)]
pub struct GalleryExtraction {
    pub features: FeatureMatrix,
    pub index: GalleryIndex,
}

/// List regular files in a directory by filename.
///
/// Subdirectories are skipped. Filenames are taken lossily as UTF-8; the
/// order of the returned list is whatever the filesystem produced, index
/// assignment happens later against the sorted order.
pub fn list_image_files(dir: &Path) -> EmbedResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Extract embeddings for every image in a directory.
///
/// Files are processed in index order (sorted filenames), one at a time.
/// The first extraction failure aborts the batch.
pub fn extract_gallery(
    extractor: &dyn FeatureExtractor,
    gallery_dir: &Path,
) -> EmbedResult<GalleryExtraction> {
    let index = GalleryIndex::from_names(list_image_files(gallery_dir)?);
    let total = index.len();
    tracing::info!(
        target: "sphere_embed::gallery",
        gallery = %gallery_dir.display(),
        images = total,
        "starting gallery extraction"
    );

    let mut features = FeatureMatrix::new(extractor.dimension());
    for (i, name) in index.iter() {
        let embedding = extractor.embed(&gallery_dir.join(name))?;
        if embedding.len() != extractor.dimension() {
            return Err(EmbedError::DimensionMismatch {
                expected: extractor.dimension(),
                actual: embedding.len(),
            });
        }
        features.push_row(&embedding).map_err(EmbedError::from)?;
        tracing::info!(
            target: "sphere_embed::gallery",
            "extracted {}/{}: {}",
            i + 1,
            total,
            name
        );
    }

    tracing::info!(
        target: "sphere_embed::gallery",
        images = total,
        "finished gallery extraction"
    );
    Ok(GalleryExtraction { features, index })
}

/// Persist both artifacts into a directory, overwriting unconditionally.
///
/// Returns the paths written: (`gallery_feats.bin`, `gallery_index.bin`).
pub fn persist_gallery(
    out_dir: &Path,
    extraction: &GalleryExtraction,
) -> EmbedResult<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(out_dir)?;

    let feats_path = out_dir.join(FEATURE_FILE_NAME);
    let feats_bytes = FeatureFileCodec::new().encode(&extraction.features)?;
    std::fs::write(&feats_path, feats_bytes)?;

    let index_path = out_dir.join(INDEX_FILE_NAME);
    let index_bytes = IndexFileCodec::new().encode(&extraction.index)?;
    std::fs::write(&index_path, index_bytes)?;

    tracing::info!(
        target: "sphere_embed::gallery",
        feats = %feats_path.display(),
        index = %index_path.display(),
        "gallery artifacts written"
    );
    Ok((feats_path, index_path))
}
