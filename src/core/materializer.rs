use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{SplitError, SplitResult};
use crate::metadata::ImageId;

/// Copy every assigned image's raw asset and mask asset into a subset's
/// destination, preserving the Images/ and Masks/ layout of the source.
///
/// Copies are byte-identical, never re-encoded, and overwrite any previous
/// run's output so reruns converge on the same tree. A missing source
/// asset aborts the run with the offending identifier rather than leaving
/// a silently incomplete subset.
pub fn materialize_subset(
    ids: &BTreeSet<ImageId>,
    dataset_root: &Path,
    destination: &Path,
    image_extension: &str,
) -> SplitResult<()> {
    let destination_images = destination.join("Images");
    let destination_masks = destination.join("Masks");
    fs::create_dir_all(&destination_images)?;
    fs::create_dir_all(&destination_masks)?;

    for &id in ids {
        let image_name = format!("{}.{}", id, image_extension);
        let mask_name = format!("{}.npy", id);
        copy_asset(
            id,
            &dataset_root.join("Images").join(&image_name),
            &destination_images.join(&image_name),
        )?;
        copy_asset(
            id,
            &dataset_root.join("Masks").join(&mask_name),
            &destination_masks.join(&mask_name),
        )?;
    }

    info!(
        "Copied {} image/mask pairs into {:?}",
        ids.len(),
        destination
    );
    Ok(())
}

fn copy_asset(id: ImageId, source: &Path, destination: &Path) -> SplitResult<()> {
    fs::copy(source, destination)
        .map(|_| ())
        .map_err(|e| SplitError::AssetCopy {
            id,
            path: source.to_path_buf(),
            source: e,
        })
}
