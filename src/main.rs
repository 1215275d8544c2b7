use anyhow::{Context, Result};
use nutrilog::cli::parse_args;
use nutrilog::data_loader::{load_builtin_table, load_nutrition_table};
use nutrilog::food_analyzer::{analyze_image, analyze_text};
use nutrilog::nutrition_lookup::NutritionTable;
use std::path::Path;
use tokio::fs;

const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Load .env file for API keys

    let cli_args = parse_args();

    let records = match &cli_args.table_csv {
        Some(path) => load_nutrition_table(Path::new(path))
            .with_context(|| format!("Failed to load nutrition table from '{}'", path))?,
        None => load_builtin_table()?,
    };
    let table = NutritionTable::from_records(records);
    println!("Nutrition table loaded: {} foods.", table.len());

    let debug_sink = |message: String| {
        println!("{}", message);
    };

    let meal = match (&cli_args.image, &cli_args.message) {
        (Some(image_path), _) => {
            let image_bytes = fs::read(image_path)
                .await
                .with_context(|| format!("Failed to read image file '{}'", image_path))?;
            println!("Analyzing image ({} bytes)...", image_bytes.len());
            analyze_image(&image_bytes, &table, API_KEY_ENV_VAR, &debug_sink)
                .await
                .map_err(|e| anyhow::anyhow!("Image analysis failed: {}", e))?
        }
        (None, Some(message)) => {
            println!("Analyzing: {}", message);
            analyze_text(message, &table, API_KEY_ENV_VAR, &debug_sink).await
        }
        (None, None) => {
            anyhow::bail!("Provide a food description, or --image <path> for a photo")
        }
    };

    println!("\nResolved meal:");
    println!("{:#?}", meal);

    Ok(())
}
