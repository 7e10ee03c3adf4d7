//! Text normalization shared by the similarity engine, the categorizer, and
//! the merge engine.
//!
//! All comparisons in the duplicate-detection path go through these helpers so
//! that the similarity hash, the pairwise Jaccard scores, and the merge
//! deduplication agree on what "the same ingredient" means.
use std::collections::HashSet;

/// Quantity unit words stripped from the front of an ingredient line.
const UNIT_WORDS: &[&str] = &[
    "cup", "cups", "tablespoon", "tablespoons", "tbsp", "teaspoon", "teaspoons", "tsp", "ounce",
    "ounces", "oz", "pound", "pounds", "lb", "lbs", "gram", "grams", "g", "kg", "kilogram",
    "kilograms", "ml", "milliliter", "milliliters", "l", "liter", "liters", "pinch", "pinches",
    "dash", "clove", "cloves", "slice", "slices", "can", "cans", "package", "packages", "stick",
    "sticks", "piece", "pieces", "bunch", "bunches", "head", "heads", "sprig", "sprigs",
];

/// Preparation descriptors dropped from ingredient text.
const DESCRIPTOR_WORDS: &[&str] = &[
    "fresh", "freshly", "chopped", "diced", "minced", "sliced", "grated", "shredded", "finely",
    "coarsely", "thinly", "roughly", "large", "small", "medium", "ripe", "frozen", "dried",
    "ground", "optional", "peeled", "crushed", "softened", "melted", "cooked", "raw", "whole",
    "boneless", "skinless", "extra", "virgin", "plain", "unsalted", "salted",
];

/// Stop words removed from step instructions before keyword comparison.
const STOP_WORDS: &[&str] = &[
    "the", "and", "with", "into", "then", "until", "over", "from", "about", "each", "them",
    "that", "this", "your", "when", "while", "have", "will", "been", "very", "more", "some",
    "together", "minutes", "minute", "hours", "hour",
];

/// Lower-case, strip punctuation, collapse whitespace.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '/' {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Word set of a normalized text, used for title similarity.
#[must_use]
pub fn word_set(text: &str) -> HashSet<String> {
    normalize(text)
        .split_whitespace()
        .map(ToString::to_string)
        .collect()
}

/// Normalize one ingredient line to its bare food tokens.
///
/// Drops everything after the first comma (prep notes), strips leading
/// quantity/unit tokens and a fixed descriptor list. `"2 cups finely chopped
/// onion, peeled"` reduces to `"onion"`.
#[must_use]
pub fn normalize_ingredient(ingredient: &str) -> String {
    let before_comma = ingredient.split(',').next().unwrap_or(ingredient);
    let normalized = normalize(before_comma);

    let mut tokens: Vec<&str> = normalized.split_whitespace().collect();

    // Leading amounts: integers, decimals, and fractions like "1/2".
    while let Some(first) = tokens.first() {
        if is_quantity_token(first) {
            tokens.remove(0);
        } else {
            break;
        }
    }
    // A unit word directly after the amount.
    while let Some(first) = tokens.first() {
        if UNIT_WORDS.contains(first) {
            tokens.remove(0);
        } else {
            break;
        }
    }

    tokens
        .into_iter()
        .filter(|token| !DESCRIPTOR_WORDS.contains(token) && !is_quantity_token(token))
        .map(singularize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fold trivial plurals so "onions" and "onion" compare equal.
fn singularize(token: &str) -> String {
    if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        token[..token.len() - 1].to_string()
    } else {
        token.to_string()
    }
}

/// Token set of a whole ingredient list, normalized and deduplicated.
#[must_use]
pub fn ingredient_token_set(ingredients: &[String]) -> HashSet<String> {
    ingredients
        .iter()
        .flat_map(|ingredient| {
            normalize_ingredient(ingredient)
                .split_whitespace()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Keyword set of step instructions: stop words removed, only words longer
/// than three characters kept.
#[must_use]
pub fn step_keyword_set(steps: &[String]) -> HashSet<String> {
    steps
        .iter()
        .flat_map(|step| {
            normalize(step)
                .split_whitespace()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        })
        .filter(|word| word.len() > 3 && !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

fn is_quantity_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|ch| ch.is_ascii_digit() || ch == '/' || ch == '.')
}
