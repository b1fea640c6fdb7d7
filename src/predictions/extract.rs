use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref DECIMAL_RE: Regex = Regex::new(r"[0-9]+(?:\.[0-9]+)?").unwrap();
}

/// Best-effort coercion of a model-supplied value into a non-negative finite float.
///
/// Numbers pass through, numeric strings are parsed, and anything else is
/// scanned for the first unsigned decimal (`"about 52 kcal"` gives 52.0).
/// Falls back to 0.0 when no digits are present.
pub fn extract_numeric(value: &Value) -> f64 {
    let text = match value {
        Value::Null | Value::Bool(_) => return 0.0,
        Value::Number(n) => {
            if let Some(v) = n.as_f64().filter(|v| acceptable(*v)) {
                return v;
            }
            n.to_string()
        }
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) if acceptable(v) => return v,
            // overflow or NaN
            Ok(v) if !v.is_finite() => return 0.0,
            _ => s.clone(),
        },
        other => other.to_string(),
    };
    first_decimal(&text).unwrap_or(0.0)
}

fn acceptable(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

fn first_decimal(text: &str) -> Option<f64> {
    DECIMAL_RE
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
