//! Deterministic keyword-based category and tag assignment.
use std::collections::HashMap;

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use anyhow::{Context, Result};

use crate::pipeline::draft::RecipeDraft;
use crate::util::text;

const MAX_TAGS: usize = 3;
const DEFAULT_CATEGORY: &str = "main-course";

/// One phrase voting for a category with a weight.
#[derive(Debug, Clone)]
struct CategoryKeyword {
    category: &'static str,
    weight: u16,
    phrase: &'static str,
}

/// One phrase attaching a tag when present anywhere in the recipe text.
#[derive(Debug, Clone)]
struct TagKeyword {
    tag: &'static str,
    phrase: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub tags: Vec<String>,
}

/// Compiled matcher over a fixed taxonomy. Same draft in, same
/// classification out.
#[derive(Debug)]
pub struct KeywordCategorizer {
    category_matcher: AhoCorasick,
    category_entries: Vec<CategoryKeyword>,
    tag_matcher: AhoCorasick,
    tag_entries: Vec<TagKeyword>,
}

impl KeywordCategorizer {
    pub fn new() -> Result<Self> {
        let category_entries = category_keywords();
        let category_matcher = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .ascii_case_insensitive(true)
            .build(
                category_entries
                    .iter()
                    .map(|entry| entry.phrase)
                    .collect::<Vec<_>>(),
            )
            .context("failed to build category matcher")?;

        let tag_entries = tag_keywords();
        let tag_matcher = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .ascii_case_insensitive(true)
            .build(tag_entries.iter().map(|entry| entry.phrase).collect::<Vec<_>>())
            .context("failed to build tag matcher")?;

        Ok(Self {
            category_matcher,
            category_entries,
            tag_matcher,
            tag_entries,
        })
    }

    /// Classify a draft into one category and up to three tags.
    ///
    /// The title weighs double: category words in the title are a stronger
    /// signal than the same words buried in a step.
    #[must_use]
    pub fn classify(&self, draft: &RecipeDraft) -> Classification {
        let title = text::normalize(&draft.title);
        let body = self.body_text(draft);

        let mut votes: HashMap<&'static str, u32> = HashMap::new();
        for mat in self.category_matcher.find_iter(&title) {
            let entry = &self.category_entries[mat.pattern().as_usize()];
            *votes.entry(entry.category).or_default() += u32::from(entry.weight) * 2;
        }
        for mat in self.category_matcher.find_iter(&body) {
            let entry = &self.category_entries[mat.pattern().as_usize()];
            *votes.entry(entry.category).or_default() += u32::from(entry.weight);
        }

        // Ties break alphabetically so classification stays deterministic.
        let category = votes
            .into_iter()
            .max_by(|(a_cat, a_votes), (b_cat, b_votes)| {
                a_votes.cmp(b_votes).then(b_cat.cmp(a_cat))
            })
            .map_or_else(|| DEFAULT_CATEGORY.to_string(), |(cat, _)| cat.to_string());

        let combined = format!("{title} {body}");
        let mut tags: Vec<String> = Vec::new();
        for mat in self.tag_matcher.find_iter(&combined) {
            let tag = self.tag_entries[mat.pattern().as_usize()].tag;
            if !tags.iter().any(|existing| existing == tag) {
                tags.push(tag.to_string());
            }
            if tags.len() == MAX_TAGS {
                break;
            }
        }

        Classification { category, tags }
    }

    fn body_text(&self, draft: &RecipeDraft) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(draft.ingredients.len() + draft.steps.len());
        for ingredient in &draft.ingredients {
            parts.push(text::normalize(ingredient));
        }
        for step in &draft.steps {
            parts.push(text::normalize(&step.text));
        }
        parts.join(" ")
    }
}

fn category_keywords() -> Vec<CategoryKeyword> {
    macro_rules! kw {
        ($category:literal, $weight:literal, $phrase:literal) => {
            CategoryKeyword {
                category: $category,
                weight: $weight,
                phrase: $phrase,
            }
        };
    }
    vec![
        kw!("breakfast", 5, "pancake"),
        kw!("breakfast", 5, "omelette"),
        kw!("breakfast", 4, "breakfast"),
        kw!("breakfast", 3, "oatmeal"),
        kw!("breakfast", 3, "granola"),
        kw!("dessert", 5, "cake"),
        kw!("dessert", 5, "cookie"),
        kw!("dessert", 4, "dessert"),
        kw!("dessert", 4, "pudding"),
        kw!("dessert", 3, "chocolate"),
        kw!("dessert", 3, "ice cream"),
        kw!("salad", 5, "salad"),
        kw!("salad", 3, "vinaigrette"),
        kw!("soup", 5, "soup"),
        kw!("soup", 4, "broth"),
        kw!("soup", 4, "stew"),
        kw!("soup", 3, "chowder"),
        kw!("pasta", 5, "pasta"),
        kw!("pasta", 4, "spaghetti"),
        kw!("pasta", 4, "lasagna"),
        kw!("pasta", 3, "penne"),
        kw!("pizza", 5, "pizza"),
        kw!("sandwich", 5, "sandwich"),
        kw!("sandwich", 4, "burger"),
        kw!("sandwich", 3, "wrap"),
        kw!("seafood", 5, "salmon"),
        kw!("seafood", 4, "shrimp"),
        kw!("seafood", 4, "fish fillet"),
        kw!("seafood", 3, "seafood"),
        kw!("baking", 4, "bread"),
        kw!("baking", 3, "dough"),
        kw!("baking", 3, "muffin"),
        kw!("drink", 5, "smoothie"),
        kw!("drink", 4, "cocktail"),
        kw!("drink", 3, "lemonade"),
        kw!("main-course", 3, "roast"),
        kw!("main-course", 3, "curry"),
        kw!("main-course", 2, "chicken"),
        kw!("main-course", 2, "beef"),
    ]
}

fn tag_keywords() -> Vec<TagKeyword> {
    macro_rules! tag {
        ($tag:literal, $phrase:literal) => {
            TagKeyword {
                tag: $tag,
                phrase: $phrase,
            }
        };
    }
    vec![
        tag!("spicy", "chili"),
        tag!("spicy", "jalapeno"),
        tag!("spicy", "sriracha"),
        tag!("spicy", "cayenne"),
        tag!("vegetarian", "tofu"),
        tag!("vegetarian", "vegetarian"),
        tag!("vegan", "vegan"),
        tag!("grilled", "grill"),
        tag!("baked", "bake"),
        tag!("baked", "oven"),
        tag!("fried", "deep fry"),
        tag!("fried", "pan fry"),
        tag!("healthy", "low fat"),
        tag!("healthy", "whole grain"),
        tag!("healthy", "quinoa"),
        tag!("comfort-food", "creamy"),
        tag!("comfort-food", "cheesy"),
        tag!("quick", "minute meal"),
        tag!("quick", "one pan"),
        tag!("gluten-free", "gluten free"),
    ]
}
