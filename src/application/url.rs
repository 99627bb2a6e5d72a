use crate::error::{PaymentError, Result};
use serde_json::{Map, Value};
use url::Url;

/// Callback and return URLs must be absolute http(s) URLs.
pub fn is_available_url(raw: &str) -> bool {
    Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Appends `params` to the query string of `base`. Null values are skipped,
/// non-string values are written in their JSON form.
pub fn append_url_query(base: &str, params: &Map<String, Value>) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|e| PaymentError::validation(format!("invalid url [{base}]: {e}")))?;

    if params.values().all(Value::is_null) {
        return Ok(url.into());
    }

    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            match value {
                Value::Null => {}
                Value::String(text) => {
                    pairs.append_pair(key, text);
                }
                other => {
                    pairs.append_pair(key, &other.to_string());
                }
            }
        }
    }

    Ok(url.into())
}
