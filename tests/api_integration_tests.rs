use nutrilog::api_connection::{
    connection::ApiConnectionError,
    endpoints::{
        ChatCompletionRequest, ChatMessage, MessageContent, Provider, OPENAI_MODELS,
    },
};
use nutrilog::data_loader::load_builtin_table;
use nutrilog::food_analyzer::analyze_text;
use nutrilog::nutrition_lookup::NutritionTable;
use dotenv::dotenv;
use std::env;
use std::time::Duration;

const TEST_API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

fn get_text_model() -> String {
    OPENAI_MODELS
        .iter()
        .find(|m| m.model_purpose == "text")
        .map(|m| m.model_name.to_string())
        .expect("No text model found in OPENAI_MODELS for testing")
}

fn setup_test_environment() {
    dotenv().ok();
}

fn builtin_table() -> NutritionTable {
    NutritionTable::from_records(load_builtin_table().expect("built-in table must load"))
}

#[tokio::test]
async fn test_missing_api_key_error() {
    setup_test_environment();
    let provider = Provider::openai("THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ");
    let request = ChatCompletionRequest {
        model: get_text_model(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Text("Hello".to_string()),
        }],
        response_format: None,
        temperature: None,
        max_tokens: None,
    };
    let result = provider
        .call_chat_completion(request, Duration::from_secs(15))
        .await;
    assert!(matches!(result, Err(ApiConnectionError::MissingApiKey(_))));
    if let Err(ApiConnectionError::MissingApiKey(key_name)) = result {
        assert_eq!(key_name, "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ");
    }
}

// The whole pipeline must keep answering with the model tier dead: the regex
// tier reads the weights straight out of the message.
#[tokio::test]
async fn test_text_analysis_without_service_uses_regex_tier() {
    let table = builtin_table();

    let meal = analyze_text(
        "50g de poulet",
        &table,
        "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ",
        &|_| {},
    )
    .await;

    assert_eq!(meal.name, "50 g de poulet");
    assert_eq!(meal.total_weight_g, 50.0);
    assert!((meal.total_calories - 119.5).abs() < 0.01);
    assert_eq!(meal.ingredients.len(), 1);
    assert_eq!(meal.ingredients[0].name, "poulet");
}

// Piece-counted foods go through the heuristic tier when the service is down.
#[tokio::test]
async fn test_text_analysis_without_service_uses_heuristic_tier() {
    let table = builtin_table();

    let meal = analyze_text(
        "une pomme et deux bananes",
        &table,
        "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ",
        &|_| {},
    )
    .await;

    assert_eq!(meal.name, "Repas (pomme, bananes)");
    assert_eq!(meal.total_weight_g, 180.0 + 240.0);
    // pomme 52 kcal/100g at 180g, banane 89 kcal/100g at 240g.
    let expected = 52.0 * 1.8 + 89.0 * 2.4;
    assert!((meal.total_calories - expected).abs() < 0.01);
}

#[tokio::test]
async fn test_gibberish_still_resolves_to_a_meal() {
    let table = builtin_table();

    let meal = analyze_text(
        "xkjqwrtz",
        &table,
        "THIS_KEY_SHOULD_NOT_EXIST_IN_ENV_ABXYZ",
        &|_| {},
    )
    .await;

    assert_eq!(meal.ingredients.len(), 1);
    assert_eq!(meal.total_weight_g, 100.0);
    assert!((meal.total_calories - 25.0).abs() < 0.01);
    assert!((meal.total_protein_g - 1.5).abs() < 0.01);
}

#[tokio::test]
#[ignore]
async fn test_live_text_parse() {
    setup_test_environment();
    if env::var(TEST_API_KEY_ENV_VAR).is_err() {
        println!(
            "Skipping test_live_text_parse: {} not set.",
            TEST_API_KEY_ENV_VAR
        );
        return;
    }

    let table = builtin_table();
    let meal = analyze_text(
        "100g de riz et 150ml de lait",
        &table,
        TEST_API_KEY_ENV_VAR,
        &|message| println!("{}", message),
    )
    .await;

    assert_eq!(meal.ingredients.len(), 2);
    assert!(meal.total_weight_g > 0.0);
    assert!(meal.total_calories > 0.0);
}

#[tokio::test]
#[ignore]
async fn test_api_error_with_invalid_key() {
    setup_test_environment(); // Loads .env if present, but we'll override for this test

    const INVALID_KEY_ENV_NAME_FOR_THIS_TEST: &str = "ENV_VAR_WITH_BAD_KEY_VALUE";

    unsafe {
        std::env::set_var(
            INVALID_KEY_ENV_NAME_FOR_THIS_TEST,
            "this_is_a_deliberately_bad_api_key_string_for_testing",
        );
    }

    let provider = Provider::openai(INVALID_KEY_ENV_NAME_FOR_THIS_TEST);
    let request = ChatCompletionRequest {
        model: get_text_model(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Text("This call should fail due to invalid key.".to_string()),
        }],
        response_format: None,
        temperature: None,
        max_tokens: None,
    };

    let result = provider
        .call_chat_completion(request, Duration::from_secs(15))
        .await;
    assert!(
        matches!(result, Err(ApiConnectionError::ApiError { .. })),
        "Expected ApiError, got {:?}",
        result
    );
    if let Err(ApiConnectionError::ApiError { status, .. }) = result {
        assert_eq!(
            status,
            reqwest::StatusCode::UNAUTHORIZED,
            "Expected 401 Unauthorized, got {} with body if any",
            status
        );
    }

    unsafe {
        std::env::remove_var(INVALID_KEY_ENV_NAME_FOR_THIS_TEST);
    }
}
