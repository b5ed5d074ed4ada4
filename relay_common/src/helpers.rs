use std::time::Duration;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse a whole number of milliseconds into a `Duration`. Zero, negative and non-numeric values are rejected.
pub fn parse_millis(value: &str) -> Result<Duration, String> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err("a duration of 0 ms is not allowed".to_string()),
        Ok(ms) => Ok(Duration::from_millis(ms)),
        Err(e) => Err(format!("'{value}' is not a whole number of milliseconds. {e}")),
    }
}
