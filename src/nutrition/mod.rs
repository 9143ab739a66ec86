//! Turning detections into a meal summary with nutrition estimates.

mod guidance;

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul};

use crate::detection::Detection;

pub use self::guidance::{
    favorite_highlighter, manual_guidance, option_pool, parse_items, FoodGroup, Guidance,
    Highlighted, Suggestion, BALANCED_MESSAGE,
};

/// Shown when nothing in the picture looks like food.
pub const RECAPTURE_MESSAGE: &str = "Please re-capture image with food items";

const NON_FOOD: &[&str] = &["person", "car", "truck", "dog", "cat"];

const FRUIT_LABELS: &[&str] = &[
    "apple",
    "banana",
    "orange",
    "grape",
    "strawberry",
    "lemon",
    "lime",
    "pineapple",
    "mango",
    "pear",
    "peach",
    "watermelon",
    "kiwi",
    "blueberry",
];

const STAPLES: &[&str] = &[
    "rice", "bread", "pasta", "sandwich", "pizza", "avocado", "egg", "tofu", "cheese",
];

/// Labels that make a picture count as a food picture at all.
const FOOD_CANDIDATES: &[&str] = &[
    "apple", "banana", "orange", "sandwich", "pizza", "rice", "bread", "pasta", "avocado", "egg",
    "tofu", "cheese",
];

const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("apple", "Apple"),
    ("banana", "Banana"),
    ("orange", "Orange"),
    ("sandwich", "Sandwich"),
    ("pizza", "Pizza"),
    ("cup", "Cup"),
    ("bottle", "Bottle"),
    ("avocado", "Avocado"),
    ("rice", "Rice"),
    ("bread", "Bread"),
    ("pasta", "Pasta"),
    ("egg", "Egg"),
    ("tofu", "Tofu"),
    ("cheese", "Cheese"),
];

/// Per-item values. Lookup order matters for substring matches.
const NUTRITION_TABLE: &[(&str, NutritionRecord)] = &[
    ("apple", NutritionRecord::new(95.0, 0.5, 25.0, 0.3)),
    ("banana", NutritionRecord::new(105.0, 1.3, 27.0, 0.4)),
    ("orange", NutritionRecord::new(62.0, 1.2, 15.4, 0.2)),
    ("rice", NutritionRecord::new(205.0, 4.3, 45.0, 0.4)),
    ("brown rice", NutritionRecord::new(216.0, 5.0, 45.0, 1.8)),
    ("bread", NutritionRecord::new(79.0, 4.0, 14.0, 1.0)),
    ("whole wheat bread", NutritionRecord::new(70.0, 4.0, 12.0, 1.0)),
    ("pasta", NutritionRecord::new(131.0, 5.0, 25.0, 1.1)),
    ("avocado", NutritionRecord::new(250.0, 3.0, 12.0, 23.0)),
    ("egg", NutritionRecord::new(78.0, 6.0, 0.6, 5.0)),
    ("tofu", NutritionRecord::new(76.0, 8.0, 1.9, 4.8)),
    ("cheese", NutritionRecord::new(113.0, 7.0, 1.0, 9.0)),
    ("pizza", NutritionRecord::new(266.0, 11.0, 33.0, 10.0)),
    ("sandwich", NutritionRecord::new(250.0, 12.0, 30.0, 8.0)),
];

/// Used for anything the table cannot match.
pub const DEFAULT_NUTRITION: NutritionRecord = NutritionRecord::new(150.0, 5.0, 20.0, 7.0);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionRecord {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl NutritionRecord {
    pub const fn new(calories: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        Self {
            calories,
            protein_g,
            carbs_g,
            fat_g,
        }
    }

    /// Calories rounded down, as shown in tables.
    pub fn whole_calories(&self) -> i64 {
        self.calories as i64
    }
}

impl Add for NutritionRecord {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.calories + rhs.calories,
            self.protein_g + rhs.protein_g,
            self.carbs_g + rhs.carbs_g,
            self.fat_g + rhs.fat_g,
        )
    }
}

impl Mul<u32> for NutritionRecord {
    type Output = Self;

    fn mul(self, count: u32) -> Self {
        let n = f64::from(count);
        Self::new(
            self.calories * n,
            self.protein_g * n,
            self.carbs_g * n,
            self.fat_g * n,
        )
    }
}

/// One distinct food in a picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub name: String,
    pub count: u32,
    pub top_conf: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MealRow {
    pub entry: SummaryEntry,
    pub per_unit: NutritionRecord,
    /// No table entry matched; `per_unit` is the default estimate.
    pub estimated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MealReport {
    pub rows: Vec<MealRow>,
    pub totals: NutritionRecord,
}

impl MealReport {
    pub fn summary(&self) -> Vec<SummaryEntry> {
        self.rows.iter().map(|r| r.entry.clone()).collect()
    }

    pub fn item_names(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.entry.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MealAnalysis {
    /// Nothing recognisable as food; ask for another picture.
    Recapture,
    Meal(MealReport),
}

fn is_allowed(label: &str) -> bool {
    DISPLAY_NAMES.iter().any(|(raw, _)| *raw == label)
        || FRUIT_LABELS.contains(&label)
        || STAPLES.contains(&label)
}

fn is_food_candidate(label: &str) -> bool {
    FOOD_CANDIDATES.contains(&label) || FRUIT_LABELS.contains(&label)
}

/// Python-style title case: first letter of each alphabetic run upper, rest lower.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Friendly name for a lowercase detector label.
pub fn display_name(raw: &str) -> String {
    DISPLAY_NAMES
        .iter()
        .find(|(label, _)| *label == raw)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| title_case(&raw.replace('_', " ")))
}

/// Drop non-food labels and aggregate by display name, first-seen order.
pub fn summarize(detections: &[Detection]) -> Vec<SummaryEntry> {
    let mut summary: Vec<SummaryEntry> = Vec::new();
    for detection in detections {
        let raw = detection.label.to_lowercase();
        if NON_FOOD.contains(&raw.as_str()) || !is_allowed(&raw) {
            continue;
        }
        let name = display_name(&raw);
        match summary.iter_mut().find(|e| e.name == name) {
            Some(entry) => {
                entry.count += 1;
                entry.top_conf = entry.top_conf.max(detection.confidence);
            }
            None => summary.push(SummaryEntry {
                name,
                count: 1,
                top_conf: detection.confidence,
            }),
        }
    }
    summary
}

/// Exact lowercase match, then a substring match in either direction.
pub fn lookup(name: &str) -> Option<NutritionRecord> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    if let Some((_, record)) = NUTRITION_TABLE.iter().find(|(key, _)| *key == name) {
        return Some(*record);
    }
    let spaced = name.replace('_', " ");
    NUTRITION_TABLE
        .iter()
        .find(|(key, _)| spaced.contains(key) || key.contains(spaced.as_str()))
        .map(|(_, record)| *record)
}

pub fn lookup_or_default(name: &str) -> NutritionRecord {
    lookup(name).unwrap_or(DEFAULT_NUTRITION)
}

pub fn analyze_meal(detections: &[Detection]) -> MealAnalysis {
    let any_food = detections
        .iter()
        .any(|d| is_food_candidate(&d.label.to_lowercase()));
    if !any_food {
        return MealAnalysis::Recapture;
    }

    let summary = summarize(detections);
    if summary.is_empty() {
        return MealAnalysis::Recapture;
    }
    MealAnalysis::Meal(report(summary))
}

/// Per-unit rows and count-weighted totals for a summary.
pub fn report(summary: Vec<SummaryEntry>) -> MealReport {
    let rows: Vec<MealRow> = summary
        .into_iter()
        .map(|entry| {
            let found = lookup(&entry.name);
            if found.is_none() {
                tracing::warn!("No nutrition info for {}, using default estimate", entry.name);
            }
            MealRow {
                per_unit: found.unwrap_or(DEFAULT_NUTRITION),
                estimated: found.is_none(),
                entry,
            }
        })
        .collect();

    let totals = rows
        .iter()
        .fold(NutritionRecord::default(), |acc, row| {
            acc + row.per_unit * row.entry.count
        });

    MealReport { rows, totals }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f32) -> Detection {
        Detection::new(label, confidence)
    }

    fn meal(detections: &[Detection]) -> MealReport {
        match analyze_meal(detections) {
            MealAnalysis::Meal(report) => report,
            MealAnalysis::Recapture => panic!("expected a meal for {:?}", detections),
        }
    }

    #[test]
    fn apple_car_banana_totals_200_kcal() {
        let report = meal(&[det("apple", 0.9), det("car", 0.8), det("banana", 0.7)]);
        assert_eq!(report.item_names(), vec!["Apple", "Banana"]);
        assert_eq!(report.totals.whole_calories(), 200);
    }

    #[test]
    fn totals_multiply_per_unit_by_count() {
        let report = meal(&[
            det("apple", 0.5),
            det("apple", 0.9),
            det("pizza", 0.6),
            det("Apple", 0.4),
        ]);
        let expected = report
            .rows
            .iter()
            .fold(NutritionRecord::default(), |acc, r| acc + r.per_unit * r.entry.count);
        assert_eq!(report.totals, expected);

        let apple = &report.rows[0];
        assert_eq!(apple.entry.count, 3);
        assert_eq!(apple.entry.top_conf, 0.9);
        assert_eq!(apple.per_unit.calories, 95.0);
        assert_eq!(report.totals.calories, 95.0 * 3.0 + 266.0);
    }

    #[test]
    fn non_food_only_asks_for_recapture() {
        assert_eq!(analyze_meal(&[]), MealAnalysis::Recapture);
        assert_eq!(
            analyze_meal(&[det("person", 0.9), det("cup", 0.8)]),
            MealAnalysis::Recapture
        );
    }

    #[test]
    fn cup_counts_once_a_food_is_present() {
        let report = meal(&[det("cup", 0.8), det("banana", 0.6)]);
        assert_eq!(report.item_names(), vec!["Cup", "Banana"]);
        assert!(report.rows[0].estimated);
        assert_eq!(report.rows[0].per_unit, DEFAULT_NUTRITION);
    }

    #[test]
    fn summarize_drops_unknown_labels_and_keeps_first_seen_order() {
        let summary = summarize(&[
            det("laptop", 0.9),
            det("mango", 0.5),
            det("egg", 0.6),
            det("mango", 0.8),
        ]);
        let names: Vec<&str> = summary.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Mango", "Egg"]);
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].top_conf, 0.8);
    }

    #[test]
    fn lookup_matches_substrings_in_table_order() {
        assert_eq!(lookup("Brown Rice").map(|r| r.calories), Some(216.0));
        assert_eq!(lookup("fried_rice").map(|r| r.calories), Some(205.0));
        assert_eq!(lookup("egg").map(|r| r.calories), Some(78.0));
        assert_eq!(lookup("ban").map(|r| r.calories), Some(105.0));
        assert_eq!(lookup("lentils"), None);
        assert_eq!(lookup_or_default("lentils"), DEFAULT_NUTRITION);
    }

    #[test]
    fn display_names_title_case_unknown_labels() {
        assert_eq!(display_name("tofu"), "Tofu");
        assert_eq!(display_name("hot_dog"), "Hot Dog");
        assert_eq!(title_case("greek YOGURT"), "Greek Yogurt");
    }
}
