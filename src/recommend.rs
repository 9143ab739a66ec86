//! Filename-token recommendations over the sample pool.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

const MAX_RECOMMENDATIONS: usize = 3;

/// Lowercase alphanumeric runs of `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokens of a file name with its extension stripped.
pub fn file_tokens(path: &Path) -> HashSet<String> {
    path.file_stem()
        .map(|stem| tokenize(&stem.to_string_lossy()))
        .unwrap_or_default()
}

pub fn favorite_tokens(favorites: &[PathBuf]) -> HashSet<String> {
    favorites.iter().flat_map(|p| file_tokens(p)).collect()
}

/// Rank pool images not already favorited by token overlap with the
/// favorites. Ties keep pool order. With no overlap at all, the first
/// three candidates are returned.
pub fn recommend(pool: &[PathBuf], favorites: &[PathBuf]) -> Vec<PathBuf> {
    let wanted = favorite_tokens(favorites);

    let mut scored: Vec<(usize, &PathBuf)> = pool
        .iter()
        .filter(|p| !favorites.contains(p))
        .map(|p| (file_tokens(p).intersection(&wanted).count(), p))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let matching: Vec<PathBuf> = scored
        .iter()
        .filter(|(score, _)| *score > 0)
        .map(|(_, p)| (*p).clone())
        .collect();

    let picked = if matching.is_empty() {
        scored.iter().map(|(_, p)| (*p).clone()).collect()
    } else {
        matching
    };
    picked.into_iter().take(MAX_RECOMMENDATIONS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("pool").join(n)).collect()
    }

    #[test]
    fn tokenize_splits_on_non_alphanumerics() {
        let tokens = file_tokens(Path::new("pool/Red_Apple-2024.final.jpg"));
        let expected: HashSet<String> = ["red", "apple", "2024", "final"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn shared_tokens_rank_first() {
        let pool = paths(&["car_tire.jpg", "green_apple.jpg", "red_apple.jpg"]);
        let favorites = vec![pool[2].clone()];

        let picks = recommend(&pool, &favorites);
        assert_eq!(picks, vec![pool[1].clone()]);
    }

    #[test]
    fn no_favorites_returns_first_three() {
        let pool = paths(&["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        assert_eq!(recommend(&pool, &[]), pool[..3].to_vec());
    }

    #[test]
    fn no_overlap_falls_back_to_first_candidates() {
        let pool = paths(&["salad.png", "soup.png", "toast.png", "tea.png"]);
        let favorites = vec![PathBuf::from("elsewhere/pizza.png")];
        assert_eq!(recommend(&pool, &favorites), pool[..3].to_vec());
    }

    #[test]
    fn ties_keep_pool_order_and_cap_at_three() {
        let pool = paths(&[
            "rice_bowl.jpg",
            "rice_salad.jpg",
            "fried_rice.jpg",
            "rice_cake.jpg",
            "bowl_rice_egg.jpg",
            "egg_rice.jpg",
        ]);
        let favorites = vec![PathBuf::from("pool/egg_fried_rice.jpg")];

        let picks = recommend(&pool, &favorites);
        assert_eq!(
            picks,
            vec![pool[2].clone(), pool[4].clone(), pool[5].clone()]
        );
    }
}
