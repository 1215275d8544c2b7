use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::api_connection::connection::ApiConnectionError;
use crate::api_connection::endpoints::{
    ChatCompletionRequest, ChatMessage, JsonSchema, JsonSchemaDefinition, JsonSchemaProperty,
    MessageContent, Provider, ResponseFormat, TEXT_PARSE_MODEL,
};
use crate::fallback_parser::{extract_with_patterns, split_and_guess};

const TEXT_PARSE_TIMEOUT: Duration = Duration::from_secs(15);

/// One food the user mentioned, with its estimated weight. `quantity` and
/// `unit` keep the user's phrasing for meal naming.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ParsedFoodItem {
    pub name: String,
    pub quantity: f32,
    pub unit: String,
    pub estimated_grams: f32,
}

/// Which fallback tier produced the parse. Reported on the resolved meal so
/// operators can see how often the model path degrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTier {
    Llm,
    RegexExtraction,
    HeuristicSplit,
    WholeTextDefault,
}

impl ParseTier {
    pub fn source_label(&self) -> &'static str {
        match self {
            ParseTier::Llm => "GPT-4o-mini + Base nutritionnelle",
            ParseTier::RegexExtraction => "Extraction regex",
            ParseTier::HeuristicSplit => "Analyse basique",
            ParseTier::WholeTextDefault => "Défaut 100g",
        }
    }
}

// Structured response shape the model is instructed (and schema-pinned) to
// return. Field defaults mirror the legacy normalization: a bare item without
// quantities is logged as 100g of one unit.
#[derive(Debug, Deserialize)]
struct LlmFoodItem {
    name: String,
    #[serde(default = "default_quantity")]
    quantity: f32,
    #[serde(default = "default_unit")]
    unit: String,
    #[serde(rename = "estimatedGrams", default = "default_grams")]
    estimated_grams: f32,
}

#[derive(Debug, Deserialize)]
struct LlmFoodList {
    items: Vec<LlmFoodItem>,
}

fn default_quantity() -> f32 {
    1.0
}

fn default_unit() -> String {
    "g".to_string()
}

fn default_grams() -> f32 {
    100.0
}

const TEXT_PARSE_SYSTEM_PROMPT: &str = "\
You are a nutrition assistant that parses food descriptions.
Always return a JSON object with the shape {\"items\": [...]}, even for a single food.

Each element of \"items\" must be an object with these properties:
- \"name\": the food name without quantities (e.g. 'poulet', 'banane').
- \"quantity\": the amount as a number.
- \"unit\": \"g\", \"ml\" or \"pieces\".
- \"estimatedGrams\": the estimated total weight in grams, as a number.

Examples:
- \"50g de poulet\" -> {\"items\": [{\"name\": \"poulet\", \"quantity\": 50, \"unit\": \"g\", \"estimatedGrams\": 50}]}
- \"une pomme et deux bananes\" -> {\"items\": [{\"name\": \"pomme\", \"quantity\": 1, \"unit\": \"pieces\", \"estimatedGrams\": 180}, {\"name\": \"banane\", \"quantity\": 2, \"unit\": \"pieces\", \"estimatedGrams\": 240}]}
- \"150ml de lait\" -> {\"items\": [{\"name\": \"lait\", \"quantity\": 150, \"unit\": \"ml\", \"estimatedGrams\": 150}]}

Conversions:
- 1 pomme = 180g, 1 banane = 120g, 1 orange = 150g, 1 oeuf = 60g
- 1 ml of liquid = 1g
- 1 cuillere a soupe = 15g, 1 cuillere a cafe = 5g

Use double quotes only, no apostrophes inside food names, and return ONLY the JSON object, with no explanatory text or markdown fences.";

fn get_food_list_json_schema() -> JsonSchemaDefinition {
    let mut item_properties = HashMap::new();
    item_properties.insert(
        "name".to_string(),
        JsonSchemaProperty {
            property_type: "string".to_string(),
            description: Some("The food name, without quantities.".to_string()),
            r#enum: None,
            items: None,
        },
    );
    item_properties.insert(
        "quantity".to_string(),
        JsonSchemaProperty {
            property_type: "number".to_string(),
            description: Some("The amount in the given unit.".to_string()),
            r#enum: None,
            items: None,
        },
    );
    item_properties.insert(
        "unit".to_string(),
        JsonSchemaProperty {
            property_type: "string".to_string(),
            description: Some("One of 'g', 'ml' or 'pieces'.".to_string()),
            r#enum: Some(vec![
                "g".to_string(),
                "ml".to_string(),
                "pieces".to_string(),
            ]),
            items: None,
        },
    );
    item_properties.insert(
        "estimatedGrams".to_string(),
        JsonSchemaProperty {
            property_type: "number".to_string(),
            description: Some("Estimated total weight in grams.".to_string()),
            r#enum: None,
            items: None,
        },
    );

    let item_schema = JsonSchema {
        schema_type: "object".to_string(),
        properties: Some(item_properties),
        required: Some(vec![
            "name".to_string(),
            "quantity".to_string(),
            "unit".to_string(),
            "estimatedGrams".to_string(),
        ]),
        additional_properties: Some(false),
    };

    let mut root_properties = HashMap::new();
    root_properties.insert(
        "items".to_string(),
        JsonSchemaProperty {
            property_type: "array".to_string(),
            description: Some("One entry per food mentioned in the message.".to_string()),
            r#enum: None,
            items: Some(Box::new(item_schema)),
        },
    );

    JsonSchemaDefinition {
        name: "parsed_food_list_schema".to_string(),
        strict: Some(true),
        schema: JsonSchema {
            schema_type: "object".to_string(),
            properties: Some(root_properties),
            required: Some(vec!["items".to_string()]),
            additional_properties: Some(false),
        },
    }
}

/// Strip markdown fences, straighten curly quotes and drop blank lines so a
/// slightly-sloppy model response still parses.
pub fn clean_json_content(content: &str) -> String {
    let mut content = content.trim().to_string();

    if content.starts_with("```json") {
        content = content
            .replace("```json", "")
            .replace("```", "")
            .trim()
            .to_string();
    } else if content.starts_with("```") {
        content = content.replace("```", "").trim().to_string();
    }

    let content = content
        .replace('\u{2018}', "'")
        .replace('\u{2019}', "'")
        .replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"");

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

async fn request_llm_parse(
    text: &str,
    api_key_env_var: &str,
) -> Result<String, ApiConnectionError> {
    let provider = Provider::openai(api_key_env_var);

    let request = ChatCompletionRequest {
        model: TEXT_PARSE_MODEL.to_string(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: MessageContent::Text(TEXT_PARSE_SYSTEM_PROMPT.to_string()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Text(format!("Parse: {}", text)),
            },
        ],
        response_format: Some(ResponseFormat {
            format_type: "json_schema".to_string(),
            json_schema: Some(get_food_list_json_schema()),
        }),
        // Pinned low to keep the parse stable across retries of the same
        // message.
        temperature: Some(0.1),
        max_tokens: Some(200),
    };

    let response = provider
        .call_chat_completion(request, TEXT_PARSE_TIMEOUT)
        .await?;

    match response.choices.first() {
        Some(choice) => Ok(choice.message.content.trim().to_string()),
        None => Err(ApiConnectionError::ApiError {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            error_body: "No response choices received from API".to_string(),
        }),
    }
}

fn parse_structured_items(cleaned: &str, debug: &impl Fn(String)) -> Option<Vec<LlmFoodItem>> {
    match serde_json::from_str::<LlmFoodList>(cleaned) {
        Ok(list) => Some(list.items),
        Err(list_err) => {
            // Older prompts returned a single bare item; normalize that shape
            // into the list form.
            if let Ok(single) = serde_json::from_str::<LlmFoodItem>(cleaned) {
                debug("Legacy single-item response normalized into list shape".to_string());
                return Some(vec![single]);
            }
            debug(format!("Structured parse failed: {}", list_err));
            None
        }
    }
}

fn sanitize_items(raw: Vec<LlmFoodItem>) -> Vec<ParsedFoodItem> {
    raw.into_iter()
        .filter(|item| !item.name.trim().is_empty())
        .map(|item| {
            let estimated_grams = if item.estimated_grams > 0.0 {
                item.estimated_grams
            } else {
                default_grams()
            };
            ParsedFoodItem {
                name: item.name.trim().to_string(),
                quantity: item.quantity,
                unit: item.unit,
                estimated_grams,
            }
        })
        .collect()
}

/// Convert one utterance into food items. Tiers, in order: model parse,
/// sanitized re-parse, regex extraction over model output + original text,
/// heuristic split, whole-text 100g default. Never returns an empty list.
pub async fn resolve_food_text(
    text: &str,
    api_key_env_var: &str,
    debug: &impl Fn(String),
) -> (Vec<ParsedFoodItem>, ParseTier) {
    let llm_content = match request_llm_parse(text, api_key_env_var).await {
        Ok(content) => {
            debug(format!("Raw model response: {}", content));
            Some(content)
        }
        Err(e) => {
            debug(format!("Model parse unavailable: {}", e));
            None
        }
    };

    let cleaned = llm_content
        .as_deref()
        .map(clean_json_content)
        .unwrap_or_default();

    if !cleaned.is_empty() {
        if let Some(raw_items) = parse_structured_items(&cleaned, debug) {
            let items = sanitize_items(raw_items);
            if !items.is_empty() {
                return (items, ParseTier::Llm);
            }
            debug("Model returned an empty item list".to_string());
        }
    }

    if let Some(items) = extract_with_patterns(&cleaned, text) {
        return (items, ParseTier::RegexExtraction);
    }

    if let Some(items) = split_and_guess(text) {
        return (items, ParseTier::HeuristicSplit);
    }

    // Last resort: log the whole message as one 100g food.
    let item = ParsedFoodItem {
        name: text.trim().to_string(),
        quantity: 100.0,
        unit: "g".to_string(),
        estimated_grams: 100.0,
    };
    (vec![item], ParseTier::WholeTextDefault)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_debug(_: String) {}

    #[test]
    fn test_clean_json_content_strips_fences() {
        let fenced = "```json\n{\"items\": []}\n```";
        assert_eq!(clean_json_content(fenced), "{\"items\": []}");

        let bare_fence = "```\n{\"items\": []}\n```";
        assert_eq!(clean_json_content(bare_fence), "{\"items\": []}");
    }

    #[test]
    fn test_clean_json_content_normalizes_quotes_and_blank_lines() {
        let messy = "{\u{201C}items\u{201D}: [\n\n  {\u{201C}name\u{201D}: \u{201C}pomme\u{201D}}\n\n]}";
        let cleaned = clean_json_content(messy);
        assert_eq!(cleaned, "{\"items\": [\n{\"name\": \"pomme\"}\n]}");
        assert!(serde_json::from_str::<serde_json::Value>(&cleaned).is_ok());
    }

    #[test]
    fn test_parse_structured_items_list_shape() {
        let content = r#"{"items": [{"name": "poulet", "quantity": 50, "unit": "g", "estimatedGrams": 50}]}"#;
        let items = parse_structured_items(content, &no_debug).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "poulet");
        assert_eq!(items[0].estimated_grams, 50.0);
    }

    #[test]
    fn test_parse_structured_items_legacy_single_shape() {
        let content = r#"{"name": "banane", "quantity": 2, "unit": "pieces", "estimatedGrams": 240}"#;
        let items = parse_structured_items(content, &no_debug).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "banane");
        assert_eq!(items[0].quantity, 2.0);
    }

    #[test]
    fn test_parse_structured_items_defaults_for_missing_fields() {
        let content = r#"{"items": [{"name": "riz"}]}"#;
        let items = parse_structured_items(content, &no_debug).unwrap();
        assert_eq!(items[0].quantity, 1.0);
        assert_eq!(items[0].unit, "g");
        assert_eq!(items[0].estimated_grams, 100.0);
    }

    #[test]
    fn test_parse_structured_items_rejects_garbage() {
        assert!(parse_structured_items("not json at all", &no_debug).is_none());
        assert!(parse_structured_items(r#"{"foods": []}"#, &no_debug).is_none());
    }

    #[test]
    fn test_sanitize_items_resets_non_positive_grams() {
        let raw = vec![
            LlmFoodItem {
                name: " poulet ".to_string(),
                quantity: 1.0,
                unit: "pieces".to_string(),
                estimated_grams: -20.0,
            },
            LlmFoodItem {
                name: "".to_string(),
                quantity: 1.0,
                unit: "g".to_string(),
                estimated_grams: 50.0,
            },
        ];
        let items = sanitize_items(raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "poulet");
        assert_eq!(items[0].estimated_grams, 100.0);
    }

    #[tokio::test]
    async fn test_resolve_food_text_falls_back_without_api_key() {
        // The env var does not exist, so the model tier fails before any
        // network traffic and the heuristic tier answers.
        let (items, tier) = resolve_food_text(
            "une pomme et deux bananes",
            "NUTRILOG_TEST_KEY_THAT_DOES_NOT_EXIST",
            &no_debug,
        )
        .await;

        assert_eq!(tier, ParseTier::HeuristicSplit);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "pomme");
        assert_eq!(items[0].estimated_grams, 180.0);
        assert_eq!(items[1].name, "bananes");
        assert_eq!(items[1].estimated_grams, 240.0);
    }

    #[tokio::test]
    async fn test_resolve_food_text_never_returns_empty() {
        let (items, tier) = resolve_food_text(
            "",
            "NUTRILOG_TEST_KEY_THAT_DOES_NOT_EXIST",
            &no_debug,
        )
        .await;

        assert_eq!(tier, ParseTier::WholeTextDefault);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].estimated_grams, 100.0);
    }
}
