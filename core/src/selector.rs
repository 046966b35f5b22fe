//! Filter expressions for the store's secondary index.
//!
//! A selector is an equality conjunction over top-level record fields:
//!
//! ```text
//! {"selector": {"docType": "Screening", "slot": "2024-01-01 10:00am"}}
//! ```
//!
//! Ranges, sorts and joins are deliberately absent. Stores that index
//! documents evaluate selectors with [`Selector::matches`].

use crate::record_store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the record kind discriminator.
pub const DOC_TYPE_FIELD: &str = "docType";

/// Equality-conjunction filter expression.
///
/// # Examples
///
/// ```
/// use marquee_core::selector::Selector;
///
/// let selector = Selector::new("Screening").with("titleId", "T1");
/// let query = selector.to_query();
/// assert_eq!(Selector::parse(&query).unwrap(), selector);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    selector: Map<String, Value>,
}

impl Selector {
    /// Start a selector matching records of the given kind.
    #[must_use]
    pub fn new(doc_type: &str) -> Self {
        let mut selector = Map::new();
        selector.insert(DOC_TYPE_FIELD.to_string(), Value::String(doc_type.to_string()));
        Self { selector }
    }

    /// Add an equality constraint on `field`.
    #[must_use]
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.selector.insert(field.to_string(), value.into());
        self
    }

    /// The record kind this selector matches, if constrained.
    #[must_use]
    pub fn doc_type(&self) -> Option<&str> {
        self.selector.get(DOC_TYPE_FIELD).and_then(Value::as_str)
    }

    /// Constrained fields and their required values.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.selector.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render the query string handed to the store.
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut envelope = Map::new();
        envelope.insert("selector".to_string(), Value::Object(self.selector.clone()));
        Value::Object(envelope).to_string()
    }

    /// Parse a query string produced by [`Selector::to_query`] (or by hand).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidQuery`] when the text is not JSON, has no
    /// `selector` object, or constrains a field with a non-scalar value.
    pub fn parse(query: &str) -> Result<Self, StoreError> {
        let parsed: Self = serde_json::from_str(query)
            .map_err(|e| StoreError::InvalidQuery(format!("{e}: {query}")))?;

        if let Some((field, _)) = parsed
            .selector
            .iter()
            .find(|(_, v)| v.is_object() || v.is_array())
        {
            return Err(StoreError::InvalidQuery(format!(
                "field '{field}' must be compared with a scalar value"
            )));
        }

        Ok(parsed)
    }

    /// True when every constrained field of `document` equals the required value.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        self.selector
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn renders_selector_envelope() {
        let query = Selector::new("Screening").with("slot", "2024-01-01 10:00am").to_query();
        let value: Value = serde_json::from_str(&query).unwrap_or(Value::Null);
        assert_eq!(
            value,
            json!({"selector": {"docType": "Screening", "slot": "2024-01-01 10:00am"}})
        );
    }

    #[test]
    fn matches_equality_conjunction() {
        let selector = Selector::new("Screening").with("titleId", "T1").with("screenNumber", 2);
        assert!(selector.matches(&json!({"docType": "Screening", "titleId": "T1", "screenNumber": 2, "x": 1})));
        assert!(!selector.matches(&json!({"docType": "Screening", "titleId": "T1", "screenNumber": 3})));
        assert!(!selector.matches(&json!({"docType": "Title", "titleId": "T1", "screenNumber": 2})));
        assert!(!selector.matches(&json!({"docType": "Screening"})));
    }

    #[test]
    fn rejects_operators_and_garbage() {
        assert!(Selector::parse("not json").is_err());
        assert!(Selector::parse(r#"{"nope": {}}"#).is_err());
        assert!(Selector::parse(r#"{"selector": {"seats": {"$gt": 3}}}"#).is_err());
    }

    #[test]
    fn parses_hand_written_query() {
        let parsed = Selector::parse(r#"{"selector":{"docType":"Title","venueId":"V1"}}"#);
        assert!(matches!(parsed, Ok(ref s) if s.doc_type() == Some("Title")));
    }

    proptest! {
        #[test]
        fn extra_fields_never_affect_a_match(
            title in "[A-Z][0-9]{1,3}",
            screen in 1u32..20,
            extra in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..5),
        ) {
            let selector = Selector::new("Screening").with("titleId", title.as_str()).with("screenNumber", screen);
            let mut document = json!({"docType": "Screening", "titleId": title, "screenNumber": screen});
            for (field, value) in extra {
                if let Some(map) = document.as_object_mut() {
                    map.entry(field).or_insert(json!(value));
                }
            }
            prop_assert!(selector.matches(&document));

            let reparsed = Selector::parse(&selector.to_query());
            prop_assert!(matches!(reparsed, Ok(ref s) if s.matches(&document)));
        }
    }
}
