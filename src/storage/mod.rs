//! On-disk image layout: the shared sample pool, per-user folders and
//! the captures directory.
//!
//! ```text
//! {root}/images_data/captures/                 uploads and camera shots
//! {root}/images_data/{user}/favourites/        copies of favorited pool images
//! {root}/images_data/{user}/food_to_analyse/   copies of the user's captures
//! ```

mod pool;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use self::pool::{find_pool, is_pool_image, SamplePool, POOL_CANDIDATES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

/// What a favorite toggle did. Warnings are file-system failures that did
/// not undo the in-memory change.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleOutcome {
    pub toggle: Toggle,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedImage {
    pub path: PathBuf,
    pub user_copy: Option<PathBuf>,
    pub warnings: Vec<String>,
}

pub struct ImageStore {
    root: PathBuf,
}

/// Folder name for a user. Percent-encoding keeps distinct names apart and
/// keeps them from escaping `images_data/`.
fn user_segment(user: &str) -> String {
    if user.is_empty() {
        return "%".to_string();
    }
    urlencoding::encode(user).replace('.', "%2E")
}

fn base_name(path: &Path) -> Option<&std::ffi::OsStr> {
    path.file_name()
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Only pool images and current favorites may be toggled.
pub fn can_toggle(path: &Path, pool: &[PathBuf], favorites: &[PathBuf]) -> bool {
    favorites.iter().any(|f| f == path) || pool.iter().any(|p| p == path)
}

/// Flip membership of `path` in `favorites`, in memory only.
pub fn toggle_membership(favorites: &mut Vec<PathBuf>, path: &Path) -> Toggle {
    match favorites.iter().position(|f| f == path) {
        Some(pos) => {
            favorites.remove(pos);
            Toggle::Removed
        }
        None => {
            favorites.push(path.to_path_buf());
            Toggle::Added
        }
    }
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images_data")
    }

    pub fn captures_dir(&self) -> PathBuf {
        self.images_dir().join("captures")
    }

    pub fn favorites_dir(&self, user: &str) -> PathBuf {
        self.images_dir().join(user_segment(user)).join("favourites")
    }

    pub fn analysis_dir(&self, user: &str) -> PathBuf {
        self.images_dir()
            .join(user_segment(user))
            .join("food_to_analyse")
    }

    pub fn pool(&self) -> Option<SamplePool> {
        find_pool(&self.root)
    }

    pub fn pool_images(&self) -> Vec<PathBuf> {
        self.pool().map(|p| p.images).unwrap_or_default()
    }

    /// Flip membership of `path` in `favorites`. With a user, mirror the
    /// change in their favourites folder.
    pub fn toggle_favorite(
        &self,
        favorites: &mut Vec<PathBuf>,
        path: &Path,
        user: Option<&str>,
    ) -> ToggleOutcome {
        let toggle = toggle_membership(favorites, path);
        let warnings = match user {
            Some(user) => self.mirror_favorite(toggle, path, user),
            None => Vec::new(),
        };
        ToggleOutcome { toggle, warnings }
    }

    /// Copy or delete the user's copy of a toggled favorite. Failures come
    /// back as warnings; the favorites set is never rolled back.
    pub fn mirror_favorite(&self, toggle: Toggle, path: &Path, user: &str) -> Vec<String> {
        let mut warnings = Vec::new();
        match toggle {
            Toggle::Removed => {
                let Some(name) = base_name(path) else {
                    return warnings;
                };
                let target = self.favorites_dir(user).join(name);
                if target.exists() {
                    if let Err(e) = fs::remove_file(&target) {
                        tracing::warn!("Could not remove {}: {}", target.display(), e);
                        warnings.push("Could not remove favorite from user folder".to_string());
                    }
                }
            }
            Toggle::Added => {
                if let Err(e) = self.copy_favorite(path, user) {
                    tracing::warn!("Could not copy favorite {}: {}", path.display(), e);
                    warnings.push("Could not save favorite to user folder".to_string());
                }
            }
        }
        warnings
    }

    fn copy_favorite(&self, path: &Path, user: &str) -> io::Result<()> {
        let dir = self.favorites_dir(user);
        fs::create_dir_all(&dir)?;
        let name = base_name(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let target = dir.join(name);
        if !target.exists() {
            fs::copy(path, &target)?;
        }
        Ok(())
    }

    /// Find something displayable for `path`: the path itself, else the
    /// same file name in the user's folders, then the pool.
    pub fn resolve_display_path(&self, path: &Path, user: Option<&str>) -> Option<PathBuf> {
        let direct = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        if direct.is_file() {
            return Some(direct);
        }

        let name = base_name(path)?;
        let mut dirs = Vec::new();
        if let Some(user) = user {
            dirs.push(self.analysis_dir(user));
            dirs.push(self.favorites_dir(user));
        }
        let pool_dir = self
            .pool()
            .map(|p| p.dir)
            .unwrap_or_else(|| self.root.join(POOL_CANDIDATES[0]));
        dirs.push(pool_dir.clone());
        dirs.push(pool_dir.join("favourites"));

        dirs.into_iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Resolve a `/media` request. Only image files sitting directly in the
    /// pool, the shared captures folder or this user's own folders are served.
    pub fn media_path(&self, path: &Path, user: Option<&str>) -> Option<PathBuf> {
        let resolved = self.resolve_display_path(path, user)?;
        let name = base_name(&resolved)?.to_string_lossy().into_owned();
        if !is_pool_image(&name) {
            return None;
        }

        let mut allowed = vec![self.captures_dir()];
        if let Some(pool) = self.pool() {
            allowed.push(pool.dir.join("favourites"));
            allowed.push(pool.dir);
        }
        if let Some(user) = user {
            allowed.push(self.favorites_dir(user));
            allowed.push(self.analysis_dir(user));
        }

        let resolved = resolved.canonicalize().ok()?;
        let parent = resolved.parent()?;
        allowed
            .iter()
            .filter_map(|dir| dir.canonicalize().ok())
            .any(|dir| dir == parent)
            .then_some(resolved)
    }

    pub fn save_upload(
        &self,
        bytes: &[u8],
        original_name: &str,
        user: Option<&str>,
    ) -> io::Result<SavedImage> {
        let base = Path::new(original_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload".to_string());
        self.save_image(bytes, &format!("upload_{}_{}", timestamp(), base), user)
    }

    /// Camera shots are PNG when the browser says so, JPEG otherwise.
    pub fn save_capture(
        &self,
        bytes: &[u8],
        content_type: &str,
        user: Option<&str>,
    ) -> io::Result<SavedImage> {
        let ext = if content_type.contains("png") {
            "png"
        } else {
            "jpg"
        };
        self.save_image(bytes, &format!("capture_{}.{}", timestamp(), ext), user)
    }

    fn save_image(&self, bytes: &[u8], file_name: &str, user: Option<&str>) -> io::Result<SavedImage> {
        let dir = self.captures_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join(file_name);
        fs::write(&path, bytes)?;
        tracing::info!("Saved image to {}", path.display());

        let mut saved = SavedImage {
            path,
            user_copy: None,
            warnings: Vec::new(),
        };
        if let Some(user) = user {
            let target_dir = self.analysis_dir(user);
            let target = target_dir.join(file_name);
            match fs::create_dir_all(&target_dir).and_then(|_| fs::copy(&saved.path, &target)) {
                Ok(_) => saved.user_copy = Some(target),
                Err(e) => {
                    tracing::warn!("Could not copy {} to user folder: {}", file_name, e);
                    saved
                        .warnings
                        .push(format!("Could not copy to user folder: {}", e));
                }
            }
        }
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_pool() -> (tempfile::TempDir, ImageStore, Vec<PathBuf>) {
        let tmp = tempfile::tempdir().unwrap();
        let pool_dir = tmp.path().join("images_data/favourites_option");
        fs::create_dir_all(&pool_dir).unwrap();
        for name in ["green_apple.jpg", "red_apple.jpg", "tofu_bowl.png"] {
            fs::write(pool_dir.join(name), name.as_bytes()).unwrap();
        }
        let store = ImageStore::new(tmp.path());
        let images = store.pool_images();
        (tmp, store, images)
    }

    #[test]
    fn double_toggle_restores_favorites() {
        let (_tmp, store, pool) = store_with_pool();
        let mut favorites = vec![pool[0].clone()];
        let before = favorites.clone();

        let first = store.toggle_favorite(&mut favorites, &pool[1], Some("ada"));
        assert_eq!(first.toggle, Toggle::Added);
        assert!(store.favorites_dir("ada").join("red_apple.jpg").exists());

        let second = store.toggle_favorite(&mut favorites, &pool[1], Some("ada"));
        assert_eq!(second.toggle, Toggle::Removed);
        assert_eq!(favorites, before);
        assert!(!store.favorites_dir("ada").join("red_apple.jpg").exists());
    }

    #[test]
    fn anonymous_toggle_touches_no_files() {
        let (tmp, store, pool) = store_with_pool();
        let mut favorites = Vec::new();
        let outcome = store.toggle_favorite(&mut favorites, &pool[2], None);
        assert_eq!(outcome.toggle, Toggle::Added);
        assert_eq!(favorites, vec![pool[2].clone()]);
        assert!(!tmp.path().join("images_data/ada").exists());
    }

    #[test]
    fn copy_failure_warns_but_keeps_favorite() {
        let (_tmp, store, _pool) = store_with_pool();
        let missing = store.root().join("images_data/favourites_option/gone.jpg");
        let mut favorites = Vec::new();

        let outcome = store.toggle_favorite(&mut favorites, &missing, Some("ada"));
        assert_eq!(outcome.toggle, Toggle::Added);
        assert_eq!(outcome.warnings, vec!["Could not save favorite to user folder"]);
        assert_eq!(favorites, vec![missing]);
    }

    #[test]
    fn only_pool_or_favorite_paths_can_toggle() {
        let (_tmp, _store, pool) = store_with_pool();
        let outside = PathBuf::from("/etc/passwd");
        assert!(can_toggle(&pool[0], &pool, &[]));
        assert!(!can_toggle(&outside, &pool, &[]));
        assert!(can_toggle(&outside, &pool, &[outside.clone()]));
    }

    #[test]
    fn resolve_falls_back_to_user_folders_then_pool() {
        let (_tmp, store, pool) = store_with_pool();
        assert_eq!(
            store.resolve_display_path(Path::new("images_data/favourites_option/tofu_bowl.png"), None),
            Some(pool[2].clone())
        );
        assert_eq!(
            store.resolve_display_path(Path::new("/elsewhere/red_apple.jpg"), None),
            Some(pool[1].clone())
        );

        let analysis = store.analysis_dir("ada");
        fs::create_dir_all(&analysis).unwrap();
        fs::write(analysis.join("red_apple.jpg"), b"mine").unwrap();
        assert_eq!(
            store.resolve_display_path(Path::new("/elsewhere/red_apple.jpg"), Some("ada")),
            Some(analysis.join("red_apple.jpg"))
        );

        let nested = pool[0].parent().unwrap().join("favourites");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("kale.jpg"), b"kale").unwrap();
        assert_eq!(
            store.resolve_display_path(Path::new("kale.jpg"), None),
            Some(nested.join("kale.jpg"))
        );
        assert_eq!(store.resolve_display_path(Path::new("nothing.png"), Some("ada")), None);
    }

    #[test]
    fn uploads_land_in_captures_with_user_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path());

        let saved = store
            .save_upload(b"jpegdata", "../../dinner.jpg", Some("ada"))
            .unwrap();
        let name = saved.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("upload_"));
        assert!(name.ends_with("_dinner.jpg"));
        assert_eq!(saved.path.parent(), Some(store.captures_dir().as_path()));
        let copy = saved.user_copy.unwrap();
        assert_eq!(fs::read(copy).unwrap(), b"jpegdata");
        assert!(saved.warnings.is_empty());
    }

    #[test]
    fn capture_extension_follows_content_type() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ImageStore::new(tmp.path());
        let png = store.save_capture(b"png", "image/png", None).unwrap();
        let jpg = store.save_capture(b"jpg", "image/jpeg", None).unwrap();
        assert_eq!(png.path.extension().unwrap(), "png");
        assert_eq!(jpg.path.extension().unwrap(), "jpg");
        assert!(png.user_copy.is_none());
    }

    #[test]
    fn user_segment_is_a_single_distinct_component() {
        assert_eq!(user_segment("ada"), "ada");
        assert_ne!(user_segment("ada lee"), user_segment("ada_lee"));
        assert!(!user_segment("../root").contains('/'));
        assert!(!user_segment("../root").contains(".."));
        assert_eq!(user_segment(".."), "%2E%2E");
        assert_ne!(user_segment(""), user_segment("_"));
        assert!(!user_segment("").is_empty());
    }

    #[test]
    fn media_serves_pool_and_capture_images_only() {
        let (tmp, store, pool) = store_with_pool();
        fs::write(tmp.path().join("credentials.json"), b"{}").unwrap();
        fs::write(tmp.path().join("secret.png"), b"png").unwrap();

        assert_eq!(
            store.media_path(Path::new("credentials.json"), Some("ada")),
            None
        );
        assert_eq!(store.media_path(Path::new("secret.png"), Some("ada")), None);
        assert_eq!(
            store.media_path(&pool[0], None),
            Some(pool[0].canonicalize().unwrap())
        );

        let saved = store.save_capture(b"png", "image/png", None).unwrap();
        assert!(store.media_path(&saved.path, None).is_some());

        let outside = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        assert_eq!(store.media_path(outside.path(), None), None);
    }

    #[test]
    fn media_keeps_users_out_of_each_other_folders() {
        let (_tmp, store, _pool) = store_with_pool();
        let mine = store.analysis_dir("ada");
        fs::create_dir_all(&mine).unwrap();
        fs::write(mine.join("lunch.png"), b"png").unwrap();

        let path = mine.join("lunch.png");
        assert!(store.media_path(&path, Some("ada")).is_some());
        assert_eq!(store.media_path(&path, Some("bob")), None);
        assert_eq!(store.media_path(&path, None), None);
    }
}
