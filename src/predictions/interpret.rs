use serde_json::{Map, Value};

use super::extract::extract_numeric;
use crate::vision::NOT_FOOD_SENTINEL;

pub const UNKNOWN_FOOD: &str = "Unknown Food";

/// What the model's reply turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// A JSON object was found; fields are untouched.
    Parsed(Map<String, Value>),
    /// The model answered with the not-food sentinel.
    NotFood,
    /// No usable JSON object in the reply.
    Malformed,
}

/// Finds the JSON object embedded in `raw` (first `{` through last `}`).
pub fn interpret(raw: &str) -> Interpretation {
    let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
        return Interpretation::Malformed;
    };
    if end < start {
        return Interpretation::Malformed;
    }

    let Ok(object) = serde_json::from_str::<Map<String, Value>>(&raw[start..=end]) else {
        return Interpretation::Malformed;
    };

    match object.get("food_name") {
        None => Interpretation::Parsed(object),
        Some(Value::String(name)) if name.to_lowercase() == NOT_FOOD_SENTINEL => {
            Interpretation::NotFood
        }
        Some(Value::String(_)) => Interpretation::Parsed(object),
        Some(_) => Interpretation::Malformed,
    }
}

/// Normalized nutrition estimate, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodEstimate {
    pub food_name: String,
    pub calories: f64,
    pub fat: f64,
    pub energy: f64,
}

impl FoodEstimate {
    pub fn fallback() -> Self {
        Self {
            food_name: UNKNOWN_FOOD.to_string(),
            calories: 0.0,
            fat: 0.0,
            energy: 0.0,
        }
    }

    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let number = |key: &str| fields.get(key).map(extract_numeric).unwrap_or(0.0);
        Self {
            food_name: fields
                .get("food_name")
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_FOOD)
                .to_string(),
            calories: number("calories"),
            fat: number("fat"),
            energy: number("energy"),
        }
    }
}
