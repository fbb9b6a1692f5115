//! Point-in-time JSON captures of the listing (`toys_data.json`,
//! `toys_with_local_images.json`, ...) and the merge that reconciles them.

use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{CatalogError, CatalogResult};
use crate::model::{RawEntry, RawImage};

fn snapshot_err(path: &Path, reason: impl ToString) -> CatalogError {
    CatalogError::Snapshot {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

pub fn load(path: impl AsRef<Path>) -> CatalogResult<Vec<RawEntry>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| snapshot_err(path, e))?;
    let entries: Vec<RawEntry> = serde_json::from_str(&raw).map_err(|e| snapshot_err(path, e))?;
    info!(path = %path.display(), entries = entries.len(), "snapshot loaded");
    Ok(entries)
}

/// Write entries as a pretty-printed UTF-8 JSON array.
pub fn save(path: impl AsRef<Path>, entries: &[RawEntry]) -> CatalogResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| snapshot_err(path, e))?;
    }
    let json = serde_json::to_string_pretty(entries).map_err(|e| snapshot_err(path, e))?;
    std::fs::write(path, json).map_err(|e| snapshot_err(path, e))?;
    info!(path = %path.display(), entries = entries.len(), "snapshot saved");
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub entries: Vec<RawEntry>,
    /// Toys in the local capture that had a non-empty image list.
    pub indexed: usize,
    /// Entries whose image list was replaced.
    pub updated: usize,
}

/// Overlay local image lists onto the complete-metadata snapshot.
///
/// A matched entry's image list is replaced wholesale by the local one, so
/// remote-only images that the local capture lacks are dropped. Unmatched
/// entries keep their original images.
pub fn merge_local_images(complete: Vec<RawEntry>, local: &[RawEntry]) -> MergeOutcome {
    let by_toy: HashMap<&str, &Vec<RawImage>> = local
        .iter()
        .filter_map(|entry| {
            let toy = entry.toy.as_ref()?;
            let id = entry.toy_id()?;
            (!toy.images.is_empty()).then_some((id, &toy.images))
        })
        .collect();

    let mut updated = 0;
    let entries = complete
        .into_iter()
        .map(|mut entry| {
            let local_images = entry.toy_id().and_then(|id| by_toy.get(id).copied());
            if let (Some(images), Some(toy)) = (local_images, entry.toy.as_mut()) {
                toy.images = images.clone();
                updated += 1;
            }
            entry
        })
        .collect();

    MergeOutcome {
        entries,
        indexed: by_toy.len(),
        updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawToy;

    fn image(url: &str, local: Option<&str>) -> RawImage {
        RawImage {
            url: Some(url.into()),
            local_path: local.map(str::to_string),
            key: None,
        }
    }

    fn entry(id: &str, name: &str, images: Vec<RawImage>) -> RawEntry {
        RawEntry {
            toy: Some(RawToy {
                id: Some(id.into()),
                name: Some(name.into()),
                images,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn local_images_replace_remote_set() {
        let complete = vec![
            entry(
                "T1",
                "Walker",
                vec![image("r1", None), image("r2", None), image("r3", None)],
            ),
            entry("T2", "Blocks", vec![image("r4", None)]),
        ];
        let local = vec![entry(
            "T1",
            "",
            vec![
                image("r1", Some("toy_images/T1_0.jpg")),
                image("r2", Some("toy_images/T1_1.jpg")),
            ],
        )];

        let merged = merge_local_images(complete, &local);

        assert_eq!(merged.updated, 1);
        let t1 = merged.entries[0].toy.as_ref().unwrap();
        assert_eq!(t1.images.len(), 2);
        assert_eq!(t1.name.as_deref(), Some("Walker"));
        assert_eq!(t1.images[1].local_path.as_deref(), Some("toy_images/T1_1.jpg"));
        let t2 = merged.entries[1].toy.as_ref().unwrap();
        assert_eq!(t2.images, vec![image("r4", None)]);
    }

    #[test]
    fn empty_local_lists_are_not_indexed() {
        let complete = vec![entry("T1", "Walker", vec![image("r1", None)])];
        let local = vec![entry("T1", "", vec![]), RawEntry::default()];

        let merged = merge_local_images(complete, &local);

        assert_eq!(merged.indexed, 0);
        assert_eq!(merged.updated, 0);
        assert_eq!(merged.entries[0].toy.as_ref().unwrap().images.len(), 1);
    }

    #[test]
    fn save_then_load_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("toys.json");
        let entries = vec![entry("T1", "Walker", vec![image("r1", Some("a/b.jpg"))])];

        save(&path, &entries).unwrap();
        let back = load(&path).unwrap();

        assert_eq!(back, entries);
    }

    #[test]
    fn missing_file_is_a_snapshot_error() {
        let err = load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CatalogError::Snapshot { .. }));
    }
}
