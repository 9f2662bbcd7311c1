//! Parse boundary for structured model responses.
//!
//! Text that does not match the declared schema is rejected here with a
//! [`ResponseError`]; nothing unparsed travels further.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ResponseError;
use crate::models::item::ExtractedItem;

#[derive(Debug, Deserialize)]
struct ItemsEnvelope {
    #[serde(default)]
    items: Option<Vec<ExtractedItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClassificationAnswer {
    #[serde(default)]
    customer_name: Option<String>,
}

/// The first item of an `{ "items": [...] }` envelope.
pub fn parse_item(text: &str) -> Result<ExtractedItem, ResponseError> {
    let envelope: ItemsEnvelope = parse_json(text)?;
    envelope
        .items
        .ok_or_else(|| ResponseError::MissingField("items".to_string()))?
        .into_iter()
        .next()
        .ok_or(ResponseError::NoItems)
}

/// The `customerName` of a classification answer.
pub fn parse_answer(text: &str) -> Result<String, ResponseError> {
    let answer: ClassificationAnswer = parse_json(text)?;
    answer
        .customer_name
        .map(|name| name.trim().to_string())
        .ok_or_else(|| ResponseError::MissingField("customerName".to_string()))
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ResponseError> {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Err(ResponseError::Empty);
    }
    serde_json::from_str(body).map_err(|e| ResponseError::InvalidJson(e.to_string()))
}

/// Models occasionally wrap JSON in a markdown fence despite the JSON mime type.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_item_is_taken() {
        let item = parse_item(r#"{"items": [{"material": "S235"}, {"material": "RVS"}]}"#).unwrap();
        assert_eq!(item.material.as_deref(), Some("S235"));
    }

    #[test]
    fn test_fenced_json() {
        let item = parse_item("```json\n{\"items\": [{\"material\": \"S235\"}]}\n```").unwrap();
        assert_eq!(item.material.as_deref(), Some("S235"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_item("   ").unwrap_err(), ResponseError::Empty);
        assert_eq!(parse_item(r#"{"items": []}"#).unwrap_err(), ResponseError::NoItems);
        assert_eq!(
            parse_item(r#"{"detected": []}"#).unwrap_err(),
            ResponseError::MissingField("items".to_string())
        );
        assert!(matches!(
            parse_item("I could not read this drawing").unwrap_err(),
            ResponseError::InvalidJson(_)
        ));
        // schema violation inside an item
        assert!(matches!(
            parse_item(r#"{"items": [{"holes": [{"count": "four"}]}]}"#).unwrap_err(),
            ResponseError::InvalidJson(_)
        ));
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer(r#"{"customerName": " RADEMAKER "}"#).unwrap(), "RADEMAKER");
        assert_eq!(
            parse_answer("{}").unwrap_err(),
            ResponseError::MissingField("customerName".to_string())
        );
    }
}
