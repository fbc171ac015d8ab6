//! Catalog of bundled and user-imported LUTs.
//!
//! Bundled LUTs are rediscovered from the packaged directory on every load and
//! never persisted. User LUTs live in a writable directory; their catalog
//! record list is the only source of truth for them across restarts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use clipgrade_media::{read_cube, ColorTransform};
use clipgrade_models::{LutDescriptor, LutId, LutSource};

use crate::error::{LutError, LutResult};
use crate::store::{JsonFileStore, RecordStore};

/// File extension of LUT files.
pub const CUBE_EXTENSION: &str = "cube";
/// Catalog file name inside the user LUT directory.
pub const CATALOG_FILE: &str = "luts.json";

/// Persisted record of one imported LUT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLutRecord {
    pub id: LutId,
    pub name: String,
    /// Path relative to the user LUT directory
    pub path: PathBuf,
}

#[derive(Debug, Default)]
struct Catalog {
    bundled: Vec<LutDescriptor>,
    user: Vec<UserLutRecord>,
}

/// Shared LUT catalog.
///
/// Cheap to clone; clones share the same catalog.
#[derive(Clone)]
pub struct LutRegistry {
    bundled_dir: Option<PathBuf>,
    user_dir: PathBuf,
    store: Arc<dyn RecordStore<UserLutRecord>>,
    catalog: Arc<RwLock<Catalog>>,
}

impl std::fmt::Debug for LutRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LutRegistry")
            .field("bundled_dir", &self.bundled_dir)
            .field("user_dir", &self.user_dir)
            .finish_non_exhaustive()
    }
}

impl LutRegistry {
    /// Open the registry with the catalog stored as JSON in `user_dir`.
    pub async fn open(bundled_dir: Option<PathBuf>, user_dir: impl Into<PathBuf>) -> LutResult<Self> {
        let user_dir = user_dir.into();
        let store: JsonFileStore<UserLutRecord> = JsonFileStore::new(user_dir.join(CATALOG_FILE));
        Self::load(bundled_dir, user_dir, Arc::new(store)).await
    }

    /// Load the registry from an explicit catalog store.
    pub async fn load(
        bundled_dir: Option<PathBuf>,
        user_dir: impl Into<PathBuf>,
        store: Arc<dyn RecordStore<UserLutRecord>>,
    ) -> LutResult<Self> {
        let user_dir = user_dir.into();
        let bundled = match &bundled_dir {
            Some(dir) => scan_bundled(dir).await?,
            None => Vec::new(),
        };
        let user = store.load().await?;

        info!(
            bundled = bundled.len(),
            user = user.len(),
            "Loaded LUT registry"
        );

        Ok(Self {
            bundled_dir,
            user_dir,
            store,
            catalog: Arc::new(RwLock::new(Catalog { bundled, user })),
        })
    }

    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    /// All LUTs: bundled first (by file name), then user LUTs in import order.
    pub async fn list(&self) -> Vec<LutDescriptor> {
        let catalog = self.catalog.read().await;
        catalog
            .bundled
            .iter()
            .cloned()
            .chain(catalog.user.iter().map(|r| self.user_descriptor(r)))
            .collect()
    }

    /// Look up one LUT by id.
    pub async fn get(&self, id: &LutId) -> Option<LutDescriptor> {
        let catalog = self.catalog.read().await;
        if id.is_bundled() {
            return catalog.bundled.iter().find(|d| &d.id == id).cloned();
        }
        catalog
            .user
            .iter()
            .find(|r| &r.id == id)
            .map(|r| self.user_descriptor(r))
    }

    /// Look up a LUT by id, falling back to a case-insensitive display name match.
    pub async fn find(&self, id_or_name: &str) -> Option<LutDescriptor> {
        if let Some(found) = self.get(&LutId::from_string(id_or_name)).await {
            return Some(found);
        }
        self.list()
            .await
            .into_iter()
            .find(|d| d.name.eq_ignore_ascii_case(id_or_name))
    }

    /// Import a `.cube` file into user storage.
    ///
    /// The file is parsed first; malformed tables are rejected before
    /// anything is copied. The catalog is persisted before this returns.
    pub async fn import(&self, source: impl AsRef<Path>, name: Option<&str>) -> LutResult<LutDescriptor> {
        let source = source.as_ref();

        read_cube(source).await.map_err(|e| {
            if e.is_lut_parse() {
                LutError::InvalidLut {
                    path: source.to_path_buf(),
                    source: e,
                }
            } else {
                LutError::Media(e)
            }
        })?;

        let id = LutId::new_user();
        let relative = PathBuf::from(format!("{}.{}", id, CUBE_EXTENSION));
        let name = name
            .map(str::to_string)
            .or_else(|| source.file_stem().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| id.to_string());

        tokio::fs::create_dir_all(&self.user_dir).await?;
        let dest = self.user_dir.join(&relative);
        tokio::fs::copy(source, &dest).await?;

        let record = UserLutRecord {
            id: id.clone(),
            name,
            path: relative,
        };

        let mut catalog = self.catalog.write().await;
        catalog.user.push(record.clone());
        if let Err(e) = self.store.save(&catalog.user).await {
            catalog.user.pop();
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(e);
        }

        info!(lut_id = %id, name = %record.name, "Imported LUT");
        Ok(self.user_descriptor(&record))
    }

    /// Delete a user LUT. Bundled LUTs are protected and left untouched.
    pub async fn delete(&self, id: &LutId) -> LutResult<()> {
        let mut catalog = self.catalog.write().await;

        if id.is_bundled() || catalog.bundled.iter().any(|d| &d.id == id) {
            warn!(lut_id = %id, "Refusing to delete bundled LUT");
            return Err(LutError::Protected(id.to_string()));
        }

        let index = catalog
            .user
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| LutError::not_found(id.as_str()))?;

        let removed = catalog.user.remove(index);
        if let Err(e) = self.store.save(&catalog.user).await {
            catalog.user.insert(index, removed);
            return Err(e);
        }

        // The catalog no longer references the file
        let file = self.user_dir.join(&removed.path);
        if let Err(e) = tokio::fs::remove_file(&file).await {
            warn!(path = %file.display(), "Failed to remove LUT file: {}", e);
        }

        info!(lut_id = %id, "Deleted LUT");
        Ok(())
    }

    /// Parse a LUT from the catalog into a color transform.
    pub async fn load_transform(&self, id: &LutId) -> LutResult<ColorTransform> {
        let descriptor = self
            .get(id)
            .await
            .ok_or_else(|| LutError::not_found(id.as_str()))?;

        let cube = read_cube(&descriptor.path).await.map_err(|e| {
            if e.is_lut_parse() {
                LutError::InvalidLut {
                    path: descriptor.path.clone(),
                    source: e,
                }
            } else {
                LutError::Media(e)
            }
        })?;

        debug!(lut_id = %id, dimension = cube.dimension(), "Loaded LUT");
        Ok(ColorTransform::new(cube, descriptor.name))
    }

    /// Rescan the bundled directory.
    pub async fn refresh_bundled(&self) -> LutResult<()> {
        let bundled = match &self.bundled_dir {
            Some(dir) => scan_bundled(dir).await?,
            None => Vec::new(),
        };
        self.catalog.write().await.bundled = bundled;
        Ok(())
    }

    fn user_descriptor(&self, record: &UserLutRecord) -> LutDescriptor {
        // Stored files are named by id; auto-map targets match the display name
        LutDescriptor {
            id: record.id.clone(),
            file_name: format!("{}.{}", record.name, CUBE_EXTENSION),
            name: record.name.clone(),
            path: self.user_dir.join(&record.path),
            source: LutSource::User,
        }
    }
}

/// Discover `.cube` files in the bundled directory, sorted by file name.
async fn scan_bundled(dir: &Path) -> LutResult<Vec<LutDescriptor>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %dir.display(), "Bundled LUT directory not found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_cube = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(CUBE_EXTENSION))
            .unwrap_or(false);
        if !is_cube || !entry.file_type().await?.is_file() {
            continue;
        }

        let (Some(stem), Some(file_name)) = (path.file_stem(), path.file_name()) else {
            continue;
        };
        let stem = stem.to_string_lossy().to_string();
        found.push(LutDescriptor {
            id: LutId::bundled(&stem),
            name: stem,
            file_name: file_name.to_string_lossy().to_string(),
            path,
            source: LutSource::Bundled,
        });
    }

    found.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use clipgrade_media::ColorCube;
    use tempfile::TempDir;

    async fn write_identity(path: &Path) {
        ColorCube::identity(2).write(path).await.unwrap();
    }

    async fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let bundled = dir.path().join("bundled");
        let user = dir.path().join("user");
        tokio::fs::create_dir_all(&bundled).await.unwrap();
        write_identity(&bundled.join("SLog3SGamut3.CineToLC-709.cube")).await;
        write_identity(&bundled.join("VLog_to_V709.cube")).await;
        tokio::fs::write(bundled.join("README.txt"), b"not a lut").await.unwrap();
        (dir, bundled, user)
    }

    #[tokio::test]
    async fn test_bundled_discovery() {
        let (_dir, bundled, user) = setup().await;
        let registry = LutRegistry::open(Some(bundled), user).await.unwrap();

        let luts = registry.list().await;
        assert_eq!(luts.len(), 2);
        assert!(luts.iter().all(|d| d.is_bundled()));
        assert_eq!(luts[0].id, LutId::bundled("SLog3SGamut3.CineToLC-709"));
    }

    #[tokio::test]
    async fn test_import_persists_across_reload() {
        let (dir, bundled, user) = setup().await;
        let source = dir.path().join("MyGrade.cube");
        write_identity(&source).await;

        let registry = LutRegistry::open(Some(bundled.clone()), &user).await.unwrap();
        let imported = registry.import(&source, None).await.unwrap();
        assert_eq!(imported.name, "MyGrade");
        assert_eq!(imported.source, LutSource::User);
        assert!(imported.path.exists());

        let reopened = LutRegistry::open(Some(bundled), &user).await.unwrap();
        let luts = reopened.list().await;
        assert_eq!(luts.len(), 3);
        assert_eq!(luts[2].id, imported.id);
        tokio_test::assert_ok!(reopened.load_transform(&imported.id).await);
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_lut() {
        let (dir, bundled, user) = setup().await;
        let source = dir.path().join("broken.cube");
        tokio::fs::write(&source, "LUT_3D_SIZE 2\n0 0 0\n").await.unwrap();

        let registry = LutRegistry::open(Some(bundled), &user).await.unwrap();
        let err = registry.import(&source, Some("Broken")).await.unwrap_err();
        assert!(err.is_parse_error());
        assert_eq!(registry.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_bundled_is_refused() {
        let (_dir, bundled, user) = setup().await;
        let registry = LutRegistry::open(Some(bundled), user).await.unwrap();
        let id = LutId::bundled("VLog_to_V709");

        let err = registry.delete(&id).await.unwrap_err();
        assert!(matches!(err, LutError::Protected(_)));
        assert!(registry.get(&id).await.unwrap().path.exists());
    }

    #[tokio::test]
    async fn test_delete_user_lut() {
        let (dir, bundled, user) = setup().await;
        let source = dir.path().join("Mine.cube");
        write_identity(&source).await;

        let store: Arc<MemoryStore<UserLutRecord>> = Arc::new(MemoryStore::new());
        let registry = LutRegistry::load(Some(bundled), &user, store.clone()).await.unwrap();
        let imported = registry.import(&source, Some("Mine")).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);

        registry.delete(&imported.id).await.unwrap();
        assert!(registry.get(&imported.id).await.is_none());
        assert!(!imported.path.exists());
        assert!(store.load().await.unwrap().is_empty());

        assert!(matches!(
            registry.delete(&imported.id).await,
            Err(LutError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_name() {
        let (_dir, bundled, user) = setup().await;
        let registry = LutRegistry::open(Some(bundled), user).await.unwrap();
        assert!(registry.find("vlog_to_v709").await.is_some());
        assert!(registry.find("bundled:VLog_to_V709").await.is_some());
        assert!(registry.find("missing").await.is_none());
    }
}
