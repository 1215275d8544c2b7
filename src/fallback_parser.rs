use regex::Regex;
use std::sync::LazyLock;

use crate::food_text_parser::ParsedFoodItem;

// Recovers items from a malformed structured response by picking the fields
// straight out of the broken JSON text.
static JSON_FRAGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)"name"\s*:\s*"([^"]+)"[^}]*"quantity"\s*:\s*(\d+)[^}]*"unit"\s*:\s*"([^"]+)"[^}]*"estimatedGrams"\s*:\s*(\d+)"#,
    )
    .expect("invalid json fragment pattern")
});

// "50g de poulet", "150 ml de lait", "80 grammes de riz".
static QUANTITY_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(g|ml|grammes?)\s+(?:de\s+)?([^\s,]+)").expect("invalid quantity pattern")
});

// Bare "3 biscuits" style, quantity taken as grams.
static BARE_QUANTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s+([^\s,]+)").expect("invalid bare quantity pattern"));

static CONNECTOR_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+(?:et|avec)\s+|\s*,\s*").expect("invalid connector pattern")
});

static LEADING_QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:g|ml|grammes?)?\s*(?:de\s+)?(.+)").expect("invalid segment pattern")
});

static CARDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(une?|deux|trois)\s+(.+)").expect("invalid cardinal pattern"));

fn capture_f32(text: &str) -> f32 {
    text.parse().unwrap_or(0.0)
}

fn positive_or_default(grams: f32) -> f32 {
    if grams > 0.0 {
        grams
    } else {
        100.0
    }
}

/// Regex extraction tier: scan the sanitized model output followed by the
/// original message. Patterns run in order and the first one that matches
/// anything wins. Returns `None` when nothing matched at all.
pub fn extract_with_patterns(llm_content: &str, original_text: &str) -> Option<Vec<ParsedFoodItem>> {
    let haystack = format!("{} {}", llm_content, original_text);

    let items: Vec<ParsedFoodItem> = JSON_FRAGMENT_RE
        .captures_iter(&haystack)
        .map(|cap| {
            let grams = capture_f32(&cap[4]);
            ParsedFoodItem {
                name: cap[1].to_string(),
                quantity: capture_f32(&cap[2]),
                unit: cap[3].to_string(),
                estimated_grams: positive_or_default(grams),
            }
        })
        .collect();
    if !items.is_empty() {
        return Some(items);
    }

    let items: Vec<ParsedFoodItem> = QUANTITY_UNIT_RE
        .captures_iter(&haystack)
        .map(|cap| {
            let quantity = capture_f32(&cap[1]);
            ParsedFoodItem {
                name: cap[3].to_string(),
                quantity,
                unit: cap[2].to_lowercase(),
                estimated_grams: positive_or_default(quantity),
            }
        })
        .collect();
    if !items.is_empty() {
        return Some(items);
    }

    let items: Vec<ParsedFoodItem> = BARE_QUANTITY_RE
        .captures_iter(&haystack)
        .map(|cap| {
            let quantity = capture_f32(&cap[1]);
            ParsedFoodItem {
                name: cap[2].to_string(),
                quantity,
                unit: "g".to_string(),
                estimated_grams: positive_or_default(quantity),
            }
        })
        .collect();
    if !items.is_empty() {
        return Some(items);
    }

    None
}

fn cardinal_value(word: &str) -> f32 {
    match word {
        "un" | "une" => 1.0,
        "deux" => 2.0,
        "trois" => 3.0,
        _ => 1.0,
    }
}

/// Typical weight of one piece of a food named by count rather than weight.
pub fn default_piece_weight(food: &str) -> f32 {
    match food {
        "amande" | "amandes" => 1.0,
        "noix" => 5.0,
        "oeuf" | "oeufs" | "œuf" | "œufs" => 60.0,
        "tranche" | "tranches" => 25.0, // pain
        "pomme" | "pommes" => 180.0,
        "banane" | "bananes" => 120.0,
        "orange" | "oranges" => 150.0,
        _ => 100.0,
    }
}

/// Heuristic tier: split on connector words, then per segment try a leading
/// number, then a cardinal word with a per-piece weight, then default the
/// segment to 100g. Returns `None` only when the text has no usable segment.
pub fn split_and_guess(text: &str) -> Option<Vec<ParsedFoodItem>> {
    let text = text.to_lowercase();
    let mut items = Vec::new();

    for part in CONNECTOR_SPLIT_RE.split(&text) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some(cap) = LEADING_QUANTITY_RE.captures(part) {
            let quantity = positive_or_default(capture_f32(&cap[1]));
            items.push(ParsedFoodItem {
                name: cap[2].trim().to_string(),
                quantity,
                unit: "g".to_string(),
                estimated_grams: quantity,
            });
        } else if let Some(cap) = CARDINAL_RE.captures(part) {
            let count = cardinal_value(&cap[1]);
            let name = cap[2].trim().to_string();
            let estimated_grams = default_piece_weight(&name) * count;
            items.push(ParsedFoodItem {
                name,
                quantity: count,
                unit: "pieces".to_string(),
                estimated_grams,
            });
        } else {
            items.push(ParsedFoodItem {
                name: part.to_string(),
                quantity: 100.0,
                unit: "g".to_string(),
                estimated_grams: 100.0,
            });
        }
    }

    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
