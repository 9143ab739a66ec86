use std::collections::{BTreeSet, HashSet};

use super::{lookup_or_default, title_case, NutritionRecord, SummaryEntry};
use crate::detection::Detection;
use crate::recommend::tokenize;

const PROTEIN_LABELS: &[&str] = &[
    "tofu",
    "tempeh",
    "lentil",
    "lentils",
    "bean",
    "beans",
    "chickpea",
    "chickpeas",
    "egg",
    "eggs",
    "yogurt",
    "greek_yogurt",
    "cheese",
    "cottage_cheese",
    "paneer",
    "seitan",
    "quinoa",
    "edamame",
    "soy",
    "nuts",
    "almond",
    "walnut",
    "peanut",
];

const CARB_LABELS: &[&str] = &[
    "rice",
    "brown_rice",
    "bread",
    "wholegrain_bread",
    "pita",
    "pasta",
    "noodle",
    "noodles",
    "potato",
    "potatoes",
    "sweet_potato",
    "tortilla",
    "wrap",
    "oat",
    "oats",
    "cereal",
    "bagel",
];

const FAT_LABELS: &[&str] = &[
    "avocado",
    "butter",
    "oil",
    "olive_oil",
    "margarine",
    "cheese",
    "peanut_butter",
    "nuts",
    "almond",
    "walnut",
    "peanut",
    "seeds",
    "chia",
    "flax",
    "tahini",
];

const PROTEIN_HINTS: &[&str] = &[
    "tofu", "tempeh", "lentil", "bean", "chick", "egg", "yogurt", "cheese", "paneer", "quinoa",
    "edamame", "soy", "nut",
];
const CARB_HINTS: &[&str] = &["rice", "bread", "pasta", "potato", "oat", "noodle", "tortilla"];
const FAT_HINTS: &[&str] = &["avocado", "butter", "oil", "nut", "seed", "peanut_butter"];

const DEFAULT_OPTIONS: &[&str] = &["Tofu", "Rice", "Avocado", "Lentils", "Bread", "Cheese", "Egg"];

pub const BALANCED_MESSAGE: &str =
    "Your meal contains a good balance of protein, carbohydrates, and fats! Well done!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoodGroup {
    Protein,
    Carbohydrates,
    Fats,
}

impl FoodGroup {
    pub const ALL: [FoodGroup; 3] = [FoodGroup::Protein, FoodGroup::Carbohydrates, FoodGroup::Fats];

    pub fn name(&self) -> &'static str {
        match self {
            FoodGroup::Protein => "Protein",
            FoodGroup::Carbohydrates => "Carbohydrates",
            FoodGroup::Fats => "Fats",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            FoodGroup::Protein => "Add more vegetarian protein like",
            FoodGroup::Carbohydrates => "Add healthy carbohydrates like",
            FoodGroup::Fats => "Add healthy fats like",
        }
    }

    fn suggestions(&self) -> &'static [&'static str] {
        match self {
            FoodGroup::Protein => &[
                "tofu",
                "tempeh",
                "boiled egg",
                "lentils",
                "chickpeas",
                "beans",
                "Greek yogurt",
                "cottage cheese",
                "paneer",
                "quinoa",
                "nuts",
                "seeds",
            ],
            FoodGroup::Carbohydrates => &[
                "brown rice",
                "quinoa",
                "whole wheat bread",
                "oats",
                "pasta",
                "potatoes",
                "sweet potatoes",
            ],
            FoodGroup::Fats => &[
                "avocado",
                "olive oil",
                "nuts",
                "seeds",
                "peanut butter",
                "tahini",
                "butter",
            ],
        }
    }

    /// `item` is already lowercased.
    fn covers(&self, item: &str) -> bool {
        let (labels, hints) = match self {
            FoodGroup::Protein => (PROTEIN_LABELS, PROTEIN_HINTS),
            FoodGroup::Carbohydrates => (CARB_LABELS, CARB_HINTS),
            FoodGroup::Fats => (FAT_LABELS, FAT_HINTS),
        };
        labels.contains(&item) || hints.iter().any(|h| item.contains(h))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Highlighted {
    pub text: String,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub group: FoodGroup,
    pub items: Vec<Highlighted>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Guidance {
    pub items: Vec<String>,
    pub present: Vec<FoodGroup>,
    pub suggestions: Vec<Suggestion>,
    /// `None` when no items were given.
    pub totals: Option<NutritionRecord>,
}

impl Guidance {
    pub fn is_balanced(&self) -> bool {
        self.present.len() == FoodGroup::ALL.len()
    }

    pub fn present_message(&self) -> Option<String> {
        if self.present.is_empty() {
            return None;
        }
        let names: Vec<&str> = self.present.iter().map(FoodGroup::name).collect();
        Some(format!("Present: {}", names.join(", ")))
    }
}

/// Marks every entry sharing a token with `favorite_tokens`.
pub fn favorite_highlighter(
    favorite_tokens: &HashSet<String>,
) -> impl Fn(&[&str]) -> Vec<Highlighted> + '_ {
    move |items| {
        items
            .iter()
            .map(|item| Highlighted {
                text: item.to_string(),
                highlighted: !tokenize(item).is_disjoint(favorite_tokens),
            })
            .collect()
    }
}

/// Selected names plus comma-separated typed names, trimmed and lowercased.
pub fn parse_items(selected: &[String], typed: &str) -> Vec<String> {
    selected
        .iter()
        .map(String::as_str)
        .chain(typed.split(','))
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn manual_guidance(items: Vec<String>, favorite_tokens: &HashSet<String>) -> Guidance {
    let highlight = favorite_highlighter(favorite_tokens);

    let mut present = Vec::new();
    let mut suggestions = Vec::new();
    for group in FoodGroup::ALL {
        if items.iter().any(|item| group.covers(item)) {
            present.push(group);
        } else {
            suggestions.push(Suggestion {
                group,
                items: highlight(group.suggestions()),
            });
        }
    }

    let totals = if items.is_empty() {
        None
    } else {
        Some(
            items
                .iter()
                .fold(NutritionRecord::default(), |acc, item| {
                    acc + lookup_or_default(item)
                }),
        )
    };

    Guidance {
        items,
        present,
        suggestions,
        totals,
    }
}

/// Choices for the manual form: the last summary (or defaults) plus
/// whatever the detector last saw, de-duplicated and sorted.
pub fn option_pool(summary: &[SummaryEntry], detections: &[Detection]) -> Vec<String> {
    let mut pool: BTreeSet<String> = if summary.is_empty() {
        DEFAULT_OPTIONS.iter().map(|s| s.to_string()).collect()
    } else {
        summary.iter().map(|e| e.name.clone()).collect()
    };
    pool.extend(
        detections
            .iter()
            .map(|d| title_case(&d.label.replace('_', " "))),
    );
    pool.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_favorites() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn tofu_alone_needs_carbs_and_fats() {
        let guidance = manual_guidance(vec!["tofu".into()], &no_favorites());

        assert_eq!(guidance.present, vec![FoodGroup::Protein]);
        let missing: Vec<FoodGroup> = guidance.suggestions.iter().map(|s| s.group).collect();
        assert_eq!(missing, vec![FoodGroup::Carbohydrates, FoodGroup::Fats]);
        assert!(!guidance.is_balanced());
        assert_eq!(guidance.present_message().as_deref(), Some("Present: Protein"));
        assert_eq!(guidance.totals.map(|t| t.calories), Some(76.0));
    }

    #[test]
    fn full_plate_is_balanced() {
        let items = parse_items(&["Tofu".into()], "brown rice, avocado");
        let guidance = manual_guidance(items, &no_favorites());
        assert!(guidance.is_balanced());
        assert!(guidance.suggestions.is_empty());
        assert_eq!(guidance.totals.map(|t| t.whole_calories()), Some(76 + 216 + 250));
    }

    #[test]
    fn unknown_items_use_default_totals() {
        let guidance = manual_guidance(vec!["lentils".into(), "kale".into()], &no_favorites());
        assert_eq!(guidance.present, vec![FoodGroup::Protein]);
        assert_eq!(guidance.totals.map(|t| t.calories), Some(300.0));
    }

    #[test]
    fn empty_items_have_no_totals() {
        let guidance = manual_guidance(Vec::new(), &no_favorites());
        assert!(guidance.present_message().is_none());
        assert_eq!(guidance.suggestions.len(), 3);
        assert!(guidance.totals.is_none());
    }

    #[test]
    fn parse_items_trims_and_drops_empties() {
        let items = parse_items(&["Rice".into()], " Tofu , ,AVOCADO,");
        assert_eq!(items, vec!["rice", "tofu", "avocado"]);
    }

    #[test]
    fn suggestions_sharing_favorite_tokens_are_highlighted() {
        let favorites: HashSet<String> = ["sweet", "potato", "bowl"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let highlight = favorite_highlighter(&favorites);
        let marked = highlight(&["potatoes", "sweet potatoes", "Greek yogurt"]);
        let flags: Vec<bool> = marked.iter().map(|h| h.highlighted).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[test]
    fn option_pool_merges_detections() {
        let pool = option_pool(&[], &[Detection::new("hot_dog", 0.4), Detection::new("tofu", 0.6)]);
        assert_eq!(
            pool,
            vec!["Avocado", "Bread", "Cheese", "Egg", "Hot Dog", "Lentils", "Rice", "Tofu"]
        );

        let summary = vec![SummaryEntry {
            name: "Banana".into(),
            count: 2,
            top_conf: 0.8,
        }];
        assert_eq!(option_pool(&summary, &[]), vec!["Banana"]);
    }
}
