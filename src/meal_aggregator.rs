use serde::{Deserialize, Serialize};

use crate::food_text_parser::ParsedFoodItem;
use crate::nutrition_lookup::NutritionTable;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResolvedIngredient {
    pub name: String,
    pub grams: f32,
    pub calories: f32,
    pub protein_g: f32,
    pub fat_g: f32,
    pub carb_g: f32,
}

/// Nutrition summary for one logged message. Built fresh per message and
/// handed to the caller; any persistence or daily totalling happens there.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResolvedMeal {
    pub name: String,
    pub total_calories: f32,
    pub total_protein_g: f32,
    pub total_fat_g: f32,
    pub total_carb_g: f32,
    pub total_weight_g: f32,
    pub source: String,
    pub ingredients: Vec<ResolvedIngredient>,
}

fn meal_name(items: &[ParsedFoodItem]) -> String {
    if items.len() == 1 {
        let item = &items[0];
        format!("{} {} de {}", item.quantity, item.unit, item.name)
            .trim()
            .to_string()
    } else {
        let names: Vec<&str> = items.iter().take(3).map(|i| i.name.as_str()).collect();
        let ellipsis = if items.len() > 3 { "..." } else { "" };
        format!("Repas ({}{})", names.join(", "), ellipsis)
    }
}

/// Resolve each item against the table and sum the macros.
pub fn aggregate_meal(
    items: &[ParsedFoodItem],
    table: &NutritionTable,
    source: &str,
    debug: &impl Fn(String),
) -> ResolvedMeal {
    let mut ingredients = Vec::with_capacity(items.len());
    let mut total_calories = 0.0;
    let mut total_protein_g = 0.0;
    let mut total_fat_g = 0.0;
    let mut total_carb_g = 0.0;
    let mut total_weight_g = 0.0;

    for item in items {
        debug(format!(
            "  -> {}: {}g ({} {})",
            item.name, item.estimated_grams, item.quantity, item.unit
        ));

        let macros = table.resolve(&item.name, item.estimated_grams, debug);

        total_calories += macros.calories;
        total_protein_g += macros.protein_g;
        total_fat_g += macros.fat_g;
        total_carb_g += macros.carb_g;
        total_weight_g += item.estimated_grams;

        ingredients.push(ResolvedIngredient {
            name: item.name.clone(),
            grams: item.estimated_grams,
            calories: macros.calories,
            protein_g: macros.protein_g,
            fat_g: macros.fat_g,
            carb_g: macros.carb_g,
        });
    }

    ResolvedMeal {
        name: meal_name(items),
        total_calories,
        total_protein_g,
        total_fat_g,
        total_carb_g,
        total_weight_g,
        source: source.to_string(),
        ingredients,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition_lookup::FoodRecord;

    fn no_debug(_: String) {}

    fn record(name: &str, kcal: f32, protein: f32, fat: f32, carb: f32) -> FoodRecord {
        FoodRecord {
            name: name.to_string(),
            kcal_per_100g: kcal,
            protein_g_per_100g: protein,
            fat_g_per_100g: fat,
            carb_g_per_100g: carb,
        }
    }

    fn test_table() -> NutritionTable {
        NutritionTable::from_records(vec![
            record("fromage", 402.0, 25.0, 33.0, 1.3),
            record("jambon", 145.0, 21.0, 6.0, 1.0),
            record("poulet", 239.0, 27.0, 14.0, 0.0),
        ])
    }

    fn item(name: &str, quantity: f32, unit: &str, grams: f32) -> ParsedFoodItem {
        ParsedFoodItem {
            name: name.to_string(),
            quantity,
            unit: unit.to_string(),
            estimated_grams: grams,
        }
    }

    #[test]
    fn test_aggregate_sums_items_independently() {
        let table = test_table();
        let items = vec![
            item("fromage", 100.0, "g", 100.0),
            item("jambon", 50.0, "g", 50.0),
        ];

        let meal = aggregate_meal(&items, &table, "Analyse basique", &no_debug);

        assert_eq!(meal.total_weight_g, 150.0);
        assert_eq!(meal.total_calories, 402.0 + 72.5);
        assert_eq!(meal.total_protein_g, 25.0 + 10.5);
        assert_eq!(meal.ingredients.len(), 2);
        assert_eq!(meal.ingredients[1].calories, 72.5);
        assert_eq!(meal.source, "Analyse basique");
    }

    #[test]
    fn test_single_item_meal_name() {
        let table = test_table();
        let items = vec![item("poulet", 50.0, "g", 50.0)];
        let meal = aggregate_meal(&items, &table, "Extraction regex", &no_debug);

        assert_eq!(meal.name, "50 g de poulet");
        assert_eq!(meal.total_calories, 119.5);
    }

    #[test]
    fn test_multi_item_meal_name_lists_first_three() {
        let table = test_table();
        let items = vec![
            item("fromage", 1.0, "pieces", 30.0),
            item("jambon", 1.0, "pieces", 50.0),
            item("poulet", 1.0, "pieces", 100.0),
        ];
        let meal = aggregate_meal(&items, &table, "Analyse basique", &no_debug);
        assert_eq!(meal.name, "Repas (fromage, jambon, poulet)");

        let mut four = items.clone();
        four.push(item("jambon", 1.0, "pieces", 20.0));
        let meal = aggregate_meal(&four, &table, "Analyse basique", &no_debug);
        assert_eq!(meal.name, "Repas (fromage, jambon, poulet...)");
    }

    #[test]
    fn test_unknown_ingredient_contributes_default_macros() {
        let table = test_table();
        let items = vec![item("xkjqwrtz", 100.0, "g", 100.0)];
        let meal = aggregate_meal(&items, &table, "Défaut 100g", &no_debug);

        assert_eq!(meal.total_calories, 25.0);
        assert_eq!(meal.total_protein_g, 1.5);
        assert_eq!(meal.total_fat_g, 0.3);
        assert_eq!(meal.total_carb_g, 5.0);
    }
}
