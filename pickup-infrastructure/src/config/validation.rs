use anyhow::{anyhow, Result};

pub fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{} is empty", field));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(anyhow!("{} must be an http(s) url", field));
    }
    Ok(())
}

pub fn validate_range(field: &str, value: i64, max: i64) -> Result<()> {
    if !(0..=max).contains(&value) {
        return Err(anyhow!("{} must be between 0 and {}, got {}", field, max, value));
    }
    Ok(())
}
