use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::time::Duration;

use crate::api_connection::connection::ApiConnectionError;
use crate::api_connection::endpoints::{
    ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl, MessageContent, Provider,
    VISION_MODEL,
};
use crate::food_text_parser::{clean_json_content, ParsedFoodItem};

const VISION_TIMEOUT: Duration = Duration::from_secs(30);

// A photo carries no text to regex over, so unlike the text path this one has
// no fallback tiers: a failed call or unparsable body is the caller's error.
const VISION_PROMPT: &str = "\
IMPORTANT: analyze this image and return EXACTLY this JSON format:

{
  \"items\": [
    {\"name\": \"food_name\", \"grams\": number_in_grams, \"description\": \"short_description\"}
  ]
}

STRICT RULES:
1. Return ONLY the JSON, nothing else
2. Estimate realistic weights from the visible portions
3. For foods counted by piece, return the total weight

REFERENCE PORTIONS:
- Pomme/fruit moyen: 150-200g
- Salade/legumes verts: 30-50g per visible handful
- Tomates cerises: 15g per piece
- Avocat entier: 150g, demi: 75g
- Viande/poisson: 100-150g per portion
- Riz/pates cuits: 80-120g per portion
- Pain: 25g per slice
- Fromage: 30g per portion
- Amandes: 1g per piece
- Noix: 5g per piece

Examples:
- 3 tomates cerises -> {\"name\": \"tomates cerises\", \"grams\": 45, \"description\": \"3 pieces\"}
- a handful of salad -> {\"name\": \"salade verte\", \"grams\": 40, \"description\": \"poignee\"}
- 10 almonds -> {\"name\": \"amandes\", \"grams\": 10, \"description\": \"10 pieces\"}

Analyze this image:";

#[derive(Debug, Deserialize)]
struct VisionFoodItem {
    #[serde(default = "default_unknown_name")]
    name: String,
    #[serde(default = "default_vision_grams")]
    grams: f32,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct VisionFoodList {
    items: Vec<VisionFoodItem>,
}

fn default_unknown_name() -> String {
    "aliment inconnu".to_string()
}

fn default_vision_grams() -> f32 {
    50.0
}

/// One vision call on the photo bytes, expecting the items JSON shape. Same
/// sanitation pass as the text path; errors propagate.
pub async fn parse_food_image(
    image_bytes: &[u8],
    api_key_env_var: &str,
    debug: &impl Fn(String),
) -> Result<Vec<ParsedFoodItem>, ApiConnectionError> {
    let image_base64 = general_purpose::STANDARD.encode(image_bytes);

    let request = ChatCompletionRequest {
        model: VISION_MODEL.to_string(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: MessageContent::Text(
                    "You are an expert nutritionist who analyzes food photos with precision."
                        .to_string(),
                ),
            },
            ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: VISION_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{}", image_base64),
                        },
                    },
                ]),
            },
        ],
        response_format: None,
        temperature: None,
        max_tokens: Some(500),
    };

    let provider = Provider::openai(api_key_env_var);
    let response = provider.call_chat_completion(request, VISION_TIMEOUT).await?;

    let content = match response.choices.first() {
        Some(choice) => choice.message.content.trim().to_string(),
        None => {
            return Err(ApiConnectionError::ApiError {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                error_body: "No response choices received from API".to_string(),
            })
        }
    };
    debug(format!("Raw vision response: {}", content));

    let cleaned = clean_json_content(&content);
    let list: VisionFoodList = serde_json::from_str(&cleaned).map_err(|e| {
        debug(format!("Vision response did not parse: {}", e));
        ApiConnectionError::SerializationError(e)
    })?;

    if list.items.is_empty() {
        return Err(ApiConnectionError::ApiError {
            status: reqwest::StatusCode::NO_CONTENT,
            error_body: "No food detected in the image".to_string(),
        });
    }

    let items = list
        .items
        .into_iter()
        .map(|item| {
            debug(format!(
                "  -> {}: {}g ({})",
                item.name, item.grams, item.description
            ));
            let grams = if item.grams > 0.0 {
                item.grams
            } else {
                default_vision_grams()
            };
            ParsedFoodItem {
                name: item.name,
                quantity: grams,
                unit: "g".to_string(),
                estimated_grams: grams,
            }
        })
        .collect();

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_items_deserialize_with_defaults() {
        let content = r#"{"items": [{"name": "tomates cerises", "grams": 45, "description": "3 pieces"}, {"grams": 40}]}"#;
        let list: VisionFoodList = serde_json::from_str(content).unwrap();
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].name, "tomates cerises");
        assert_eq!(list.items[0].grams, 45.0);
        assert_eq!(list.items[1].name, "aliment inconnu");
        assert_eq!(list.items[1].description, "");
    }

    #[test]
    fn test_vision_item_missing_grams_defaults_to_50() {
        let content = r#"{"items": [{"name": "salade verte"}]}"#;
        let list: VisionFoodList = serde_json::from_str(content).unwrap();
        assert_eq!(list.items[0].grams, 50.0);
    }
}
