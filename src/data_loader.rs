use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;

use crate::nutrition_lookup::{normalize_food_name, FoodRecord};

// Expected column headers.
const NAME_COL: &str = "Name";
const KCAL_COL: &str = "kcal/100g";
const PROTEIN_COL: &str = "Protein (g/100g)";
const FAT_COL: &str = "Fat (g/100g)";
const CARB_COL: &str = "Carbohydrate (g/100g)";

// Default table, transcribed from the production food database. Row order is
// load order, which the fuzzy lookup tiers use as their tie-break.
const BUILTIN_TABLE_CSV: &str = include_str!("../data/nutrition_table.csv");

fn parse_macro_value(s: &str) -> Option<f32> {
    s.trim().parse::<f32>().ok().filter(|v| *v >= 0.0)
}

pub fn load_builtin_table() -> Result<Vec<FoodRecord>> {
    load_from_reader(BUILTIN_TABLE_CSV.as_bytes()).context("Built-in nutrition table is invalid")
}

pub fn load_nutrition_table(csv_path: &Path) -> Result<Vec<FoodRecord>> {
    if !csv_path.exists() {
        return Err(anyhow::anyhow!(
            "Nutrition CSV file not found at: {:?}",
            csv_path
        ));
    }

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open nutrition CSV file at {:?}", csv_path))?;
    load_from_reader(file)
}

fn load_from_reader<R: Read>(reader: R) -> Result<Vec<FoodRecord>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = rdr.headers()?.clone();

    let name_idx = headers
        .iter()
        .position(|h| h == NAME_COL)
        .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", NAME_COL))?;
    let kcal_idx = headers
        .iter()
        .position(|h| h == KCAL_COL)
        .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", KCAL_COL))?;
    let protein_idx = headers
        .iter()
        .position(|h| h == PROTEIN_COL)
        .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", PROTEIN_COL))?;
    let fat_idx = headers
        .iter()
        .position(|h| h == FAT_COL)
        .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", FAT_COL))?;
    let carb_idx = headers
        .iter()
        .position(|h| h == CARB_COL)
        .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", CARB_COL))?;

    let mut records = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result
            .with_context(|| format!("Failed to read record at row index {}", row_index))?;

        let name = record
            .get(name_idx)
            .ok_or_else(|| anyhow::anyhow!("Missing name at row {}", row_index))?
            .trim();
        if name.is_empty() {
            continue;
        }

        // Rows with unparsable or negative macro cells are skipped rather
        // than loaded as zeros.
        let parsed = (
            record.get(kcal_idx).and_then(parse_macro_value),
            record.get(protein_idx).and_then(parse_macro_value),
            record.get(fat_idx).and_then(parse_macro_value),
            record.get(carb_idx).and_then(parse_macro_value),
        );
        let (Some(kcal), Some(protein), Some(fat), Some(carb)) = parsed else {
            continue;
        };

        records.push(FoodRecord {
            name: normalize_food_name(name),
            kcal_per_100g: kcal,
            protein_g_per_100g: protein,
            fat_g_per_100g: fat,
            carb_g_per_100g: carb,
        });
    }

    if records.is_empty() {
        return Err(anyhow::anyhow!("No valid nutrition data loaded"));
    }

    Ok(records)
}
