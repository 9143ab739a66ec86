use std::fs;
use std::path::{Path, PathBuf};

/// Where the sample pool may live, relative to the storage root, in priority order.
pub const POOL_CANDIDATES: &[&str] = &[
    "images_data/favourites_option",
    "image_data/favourites_option",
    "images/favourites_option",
    "favourites_option",
];

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "avif"];

/// Never offered, whichever directory it sits in.
const EXCLUDED: &str = "bunch-bananas-6175887.webp";

/// A resolved sample pool: its directory and sorted image listing.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePool {
    pub dir: PathBuf,
    pub images: Vec<PathBuf>,
}

pub fn is_pool_image(file_name: &str) -> bool {
    if file_name.eq_ignore_ascii_case(EXCLUDED) {
        return false;
    }
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn list_images(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| is_pool_image(name))
        .collect();
    names.sort();
    names.into_iter().map(|name| dir.join(name)).collect()
}

/// The first candidate directory that holds at least one image.
pub fn find_pool(root: &Path) -> Option<SamplePool> {
    POOL_CANDIDATES.iter().find_map(|candidate| {
        let dir = root.join(candidate);
        if !dir.is_dir() {
            return None;
        }
        let images = list_images(&dir);
        if images.is_empty() {
            None
        } else {
            Some(SamplePool { dir, images })
        }
    })
}
