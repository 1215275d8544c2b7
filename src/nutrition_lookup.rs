use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-100g macros for a food the user is allowed to log. `name` is the
/// canonical key: lowercase, accent-folded, straight apostrophes.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FoodRecord {
    pub name: String,
    pub kcal_per_100g: f32,
    pub protein_g_per_100g: f32,
    pub fat_g_per_100g: f32,
    pub carb_g_per_100g: f32,
}

/// Macros scaled to an actual quantity.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct MacroTotals {
    pub calories: f32,
    pub protein_g: f32,
    pub fat_g: f32,
    pub carb_g: f32,
}

// Generic-vegetable estimate used when nothing in the table matches. A wrong
// guess is preferred over refusing to log the meal.
const GENERIC_KCAL_PER_100G: f32 = 25.0;
const GENERIC_PROTEIN_PER_100G: f32 = 1.5;
const GENERIC_FAT_PER_100G: f32 = 0.3;
const GENERIC_CARB_PER_100G: f32 = 5.0;

// Alias -> canonical redirects, consulted after the exact tier. Accent
// variants are not listed here: normalization already folds them.
const FOOD_SYNONYMS: &[(&str, &[&str])] = &[
    ("blanc de poulet", &["escalope de poulet", "filet de poulet"]),
    ("boeuf", &["viande de boeuf"]),
    ("pates", &["pasta"]),
    ("pommes de terre", &["patates", "pomme de terre"]),
    ("tomates cerises", &["tomate cerise", "cherry tomatoes"]),
    ("salade verte", &["salade", "laitue", "mesclun"]),
    ("fromage blanc", &["faisselle"]),
    ("yaourt grec", &["yaourt a la grecque"]),
];

/// Lowercase, trim, fold French accents and ligatures, straighten curly
/// apostrophes. Both table keys and queries go through this.
pub fn normalize_food_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().to_lowercase().chars() {
        match c {
            'à' | 'â' | 'ä' => out.push('a'),
            'é' | 'è' | 'ê' | 'ë' => out.push('e'),
            'î' | 'ï' => out.push('i'),
            'ô' | 'ö' => out.push('o'),
            'ù' | 'û' | 'ü' => out.push('u'),
            'ç' => out.push('c'),
            'œ' => out.push_str("oe"),
            '’' => out.push('\''),
            _ => out.push(c),
        }
    }
    out
}

/// Read-only name -> macros index. Built once at startup, shared by every
/// request afterwards.
pub struct NutritionTable {
    records: Vec<FoodRecord>,
    by_name: HashMap<String, usize>,
    synonyms: HashMap<String, String>,
}

impl NutritionTable {
    /// `records` keep their load order: the substring and token tiers scan
    /// them in order and the first hit wins, so earlier rows shadow later
    /// ones for ambiguous queries.
    pub fn from_records(records: Vec<FoodRecord>) -> Self {
        let mut by_name = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            by_name.entry(record.name.clone()).or_insert(idx);
        }

        let mut synonyms = HashMap::new();
        for (canonical, aliases) in FOOD_SYNONYMS {
            for alias in *aliases {
                synonyms.insert(
                    normalize_food_name(alias),
                    normalize_food_name(canonical),
                );
            }
        }

        Self {
            records,
            by_name,
            synonyms,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn find(&self, query: &str) -> Option<&FoodRecord> {
        // Tier 1: exact canonical match. Must short-circuit the fuzzy tiers
        // so a stored food always resolves to its own values.
        if let Some(&idx) = self.by_name.get(query) {
            return Some(&self.records[idx]);
        }

        // Tier 2: synonym redirect.
        if let Some(canonical) = self.synonyms.get(query) {
            if let Some(&idx) = self.by_name.get(canonical) {
                return Some(&self.records[idx]);
            }
        }

        // Tier 3: substring either way, in table order.
        for record in &self.records {
            if record.name.contains(query) || query.contains(&record.name) {
                return Some(record);
            }
        }

        // Tier 4: any shared word, in table order. Catches compound names
        // like "salade de tomates anciennes".
        let query_words: Vec<&str> = query.split_whitespace().collect();
        for record in &self.records {
            if record
                .name
                .split_whitespace()
                .any(|word| query_words.contains(&word))
            {
                return Some(record);
            }
        }

        None
    }

    /// Macros for `grams` of `ingredient_name`. Never fails: an unknown name
    /// gets the generic-vegetable estimate and the miss goes to the debug
    /// sink only.
    pub fn resolve(
        &self,
        ingredient_name: &str,
        grams: f32,
        debug: &impl Fn(String),
    ) -> MacroTotals {
        let query = normalize_food_name(ingredient_name);
        let ratio = grams / 100.0;

        match self.find(&query) {
            Some(record) => MacroTotals {
                calories: record.kcal_per_100g * ratio,
                protein_g: record.protein_g_per_100g * ratio,
                fat_g: record.fat_g_per_100g * ratio,
                carb_g: record.carb_g_per_100g * ratio,
            },
            None => {
                debug(format!(
                    "No table entry for '{}', using generic vegetable values",
                    ingredient_name
                ));
                MacroTotals {
                    calories: GENERIC_KCAL_PER_100G * ratio,
                    protein_g: GENERIC_PROTEIN_PER_100G * ratio,
                    fat_g: GENERIC_FAT_PER_100G * ratio,
                    carb_g: GENERIC_CARB_PER_100G * ratio,
                }
            }
        }
    }
}
