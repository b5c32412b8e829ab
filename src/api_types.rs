/// RTVE API response types for deserialization.
///
/// Every JSON endpoint of api2.rtve.es wraps its payload in the same
/// paginated envelope; only the item list is used.
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// The top-level response of an api2.rtve.es JSON endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub page: ApiPage<T>,
}

/// The paginated envelope around the items.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// A video item of the `videos/<id>.json` endpoint.
///
/// The endpoint returns dozens of fields; only the ones persisted by this
/// crate are declared.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiVideo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub uri: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub html_url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub long_title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub publication_date: String,
}

/// A subtitle item of the `videos/<id>/subtitulos.json` endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiSubtitle {
    #[serde(default, deserialize_with = "lenient_string")]
    pub src: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub lang: String,
}

/// Reads a scalar as a string: numbers and booleans are rendered, null and
/// nested values become empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_fields() {
        let json = r#"{"page":{"items":[{"id":16492499,"uri":null,"longTitle":"T"}],"total":1}}"#;
        let response: ApiResponse<ApiVideo> = serde_json::from_str(json).unwrap();
        let item = &response.page.items[0];
        assert_eq!(item.id, "16492499");
        assert_eq!(item.uri, "");
        assert_eq!(item.long_title, "T");
        assert_eq!(item.publication_date, "");
    }

    #[test]
    fn test_missing_items_is_empty() {
        let response: ApiResponse<ApiSubtitle> = serde_json::from_str(r#"{"page":{}}"#).unwrap();
        assert!(response.page.items.is_empty());
    }
}
