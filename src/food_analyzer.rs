use crate::api_connection::connection::ApiConnectionError;
use crate::food_text_parser::resolve_food_text;
use crate::meal_aggregator::{aggregate_meal, ResolvedMeal};
use crate::nutrition_lookup::NutritionTable;
use crate::vision_parser::parse_food_image;

/// Text entry point. Cannot fail: every parse failure degrades to a cheaper
/// tier and the lookup itself always answers.
pub async fn analyze_text(
    text: &str,
    table: &NutritionTable,
    api_key_env_var: &str,
    debug: &impl Fn(String),
) -> ResolvedMeal {
    let (items, tier) = resolve_food_text(text, api_key_env_var, debug).await;
    debug(format!(
        "Parsed {} item(s) via {:?}",
        items.len(),
        tier
    ));
    aggregate_meal(&items, table, tier.source_label(), debug)
}

/// Photo entry point. The vision call has no local fallback, so its errors
/// reach the caller, which owns the user-facing reply.
pub async fn analyze_image(
    image_bytes: &[u8],
    table: &NutritionTable,
    api_key_env_var: &str,
    debug: &impl Fn(String),
) -> Result<ResolvedMeal, ApiConnectionError> {
    let items = parse_food_image(image_bytes, api_key_env_var, debug).await?;
    Ok(aggregate_meal(&items, table, "OpenAI Vision Pro", debug))
}
