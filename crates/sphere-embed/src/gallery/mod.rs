//! Batch extraction over a directory of gallery images.
//!
//! The driver lists a directory, assigns stable indices in lexicographic
//! filename order, extracts one embedding per file sequentially, and
//! persists the embedding matrix and the index table side by side. One
//! failure aborts the whole batch; there is no partial-failure recovery.

mod driver;
mod index;

pub use driver::{extract_gallery, list_image_files, persist_gallery, GalleryExtraction};
pub use index::GalleryIndex;
