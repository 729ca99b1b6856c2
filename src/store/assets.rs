//! Filesystem layout for ingested assets.
//!
//! One directory per asset id under the upload root, holding `<id>.m3u8`
//! plus its numbered `segment###.ts` files. Directory existence doubles
//! as the asset index; there is no other registry.

use std::path::{Component, Path, PathBuf};

#[derive(Clone, Debug)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staging location of a raw upload before transcoding.
    pub fn staging_path(&self, audio_id: &str, extension: Option<&str>) -> PathBuf {
        match extension {
            Some(ext) => self.root.join(format!("{}.{}", audio_id, ext)),
            None => self.root.join(audio_id),
        }
    }

    /// Directory holding the transcoded representation of one asset.
    pub fn asset_dir(&self, audio_id: &str) -> PathBuf {
        self.root.join(audio_id)
    }

    pub fn playlist_path(&self, audio_id: &str) -> PathBuf {
        self.asset_dir(audio_id).join(format!("{}.m3u8", audio_id))
    }

    /// Segment location under the asset directory, or `None` when the
    /// name would escape it.
    pub fn segment_path(&self, audio_id: &str, segment: &str) -> Option<PathBuf> {
        if !segment_name_is_valid(segment) {
            return None;
        }
        Some(self.asset_dir(audio_id).join(segment))
    }

    /// Create the asset directory, parents included. Succeeds when the
    /// directory already exists.
    pub async fn create_asset_dir(&self, audio_id: &str) -> std::io::Result<PathBuf> {
        let dir = self.asset_dir(audio_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    pub async fn asset_exists(&self, audio_id: &str) -> bool {
        if !id_is_valid(audio_id) {
            return false;
        }
        tokio::fs::try_exists(self.asset_dir(audio_id))
            .await
            .unwrap_or(false)
    }

    pub async fn segment_exists(&self, audio_id: &str, segment: &str) -> bool {
        if !id_is_valid(audio_id) {
            return false;
        }
        match self.segment_path(audio_id, segment) {
            Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            None => false,
        }
    }
}

/// A value is safe to join under the store root only when it is a single
/// normal path component: not empty, no separators, no `..`.
pub fn id_is_valid(value: &str) -> bool {
    if value.is_empty() || value.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Segment names from request paths obey the same single-component rule
/// as asset ids.
pub fn segment_name_is_valid(segment: &str) -> bool {
    id_is_valid(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_valid_names() {
        assert!(id_is_valid("1717171717171"));
        assert!(segment_name_is_valid("segment000.ts"));
        assert!(segment_name_is_valid("segment123.ts"));
    }

    #[test]
    fn test_invalid_name_with_parent() {
        assert!(!segment_name_is_valid(".."));
        assert!(!segment_name_is_valid("../secret.ts"));
        assert!(!segment_name_is_valid("../../etc/passwd"));
    }

    #[test]
    fn test_invalid_name_with_separators() {
        assert!(!segment_name_is_valid("dir/segment000.ts"));
        assert!(!segment_name_is_valid("dir\\segment000.ts"));
        assert!(!id_is_valid("/root_directory"));
    }

    #[test]
    fn test_invalid_empty_and_current_dir() {
        assert!(!id_is_valid(""));
        assert!(!id_is_valid("."));
    }

    #[test]
    fn test_segment_path_rejects_traversal() {
        let store = AssetStore::new("/srv/uploads");
        assert!(store.segment_path("123", "../../etc/passwd").is_none());
        assert_eq!(
            store.segment_path("123", "segment000.ts"),
            Some(PathBuf::from("/srv/uploads/123/segment000.ts"))
        );
    }

    #[tokio::test]
    async fn test_create_asset_dir_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = AssetStore::new(dir.path());

        let first = store.create_asset_dir("42").await.unwrap();
        assert!(first.is_dir());

        // A second call over an existing directory must not fail.
        let second = store.create_asset_dir("42").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_existence_checks() {
        let dir = tempdir().unwrap();
        let store = AssetStore::new(dir.path());

        assert!(!store.asset_exists("42").await);

        store.create_asset_dir("42").await.unwrap();
        tokio::fs::write(store.asset_dir("42").join("segment000.ts"), b"ts")
            .await
            .unwrap();

        assert!(store.asset_exists("42").await);
        assert!(store.segment_exists("42", "segment000.ts").await);
        assert!(!store.segment_exists("42", "segment001.ts").await);
        assert!(!store.segment_exists("42", "../42/segment000.ts").await);
        assert!(!store.asset_exists("../42").await);
    }
}
