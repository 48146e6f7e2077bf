//! Attribute records attached to each geometry of a data source.

use chrono::NaiveDate;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::TextEncoding;

/// An attribute value as stored in the source table, before decoding.
///
/// Text is kept as raw bytes; the boundary set decides which encoding
/// applies.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Undecoded character data.
    Text(Vec<u8>),
    /// Whole number.
    Integer(i64),
    /// Floating-point number.
    Number(f64),
    /// Boolean flag.
    Logical(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Blank or unreadable value.
    Null,
}

/// A decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Decoded text.
    Text(String),
    /// Whole number.
    Integer(i64),
    /// Floating-point number.
    Number(f64),
    /// Boolean flag.
    Logical(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Blank value.
    Null,
}

impl AttributeValue {
    /// Render the value as the text seen by extraction strategies.
    ///
    /// Integral floats print without a fractional part and nulls render as
    /// the empty string.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Number(value) => value.to_string(),
            Self::Logical(value) => value.to_string(),
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
            Self::Null => String::new(),
        }
    }

    /// Convert into a JSON value for the boundary metadata map.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Integer(value) => Value::from(*value),
            Self::Number(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            Self::Logical(value) => Value::Bool(*value),
            Self::Date(date) => Value::String(date.format("%Y-%m-%d").to_string()),
            Self::Null => Value::Null,
        }
    }
}

/// Raised when a text attribute is not valid in the set's encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field {field:?} is not valid {encoding} text")]
pub struct DecodeError {
    /// Attribute name whose bytes failed to decode.
    pub field: String,
    /// Name of the encoding that was applied.
    pub encoding: &'static str,
}

/// One decoded feature: its position in the layer and its attributes in
/// table order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    index: usize,
    attributes: Vec<(String, AttributeValue)>,
}

impl Feature {
    /// Build a feature from already decoded attributes.
    #[must_use]
    pub const fn new(index: usize, attributes: Vec<(String, AttributeValue)>) -> Self {
        Self { index, attributes }
    }

    /// Decode raw attributes with `encoding`.
    ///
    /// # Examples
    ///
    /// ```
    /// use boundaries_core::{AttributeValue, Feature, RawValue, TextEncoding};
    ///
    /// let raw = vec![("NAME".to_owned(), RawValue::Text(b"Ward 1".to_vec()))];
    /// let feature = Feature::decode(0, raw, TextEncoding::Ascii).unwrap();
    /// assert_eq!(
    ///     feature.get("NAME"),
    ///     Some(&AttributeValue::Text("Ward 1".to_owned()))
    /// );
    /// ```
    pub fn decode(
        index: usize,
        raw: Vec<(String, RawValue)>,
        encoding: TextEncoding,
    ) -> Result<Self, DecodeError> {
        let attributes = raw
            .into_iter()
            .map(|(field, value)| {
                let decoded = match value {
                    RawValue::Text(bytes) => match encoding.decode(&bytes) {
                        Some(text) => AttributeValue::Text(text),
                        None => {
                            return Err(DecodeError {
                                field,
                                encoding: encoding.name(),
                            });
                        }
                    },
                    RawValue::Integer(value) => AttributeValue::Integer(value),
                    RawValue::Number(value) => AttributeValue::Number(value),
                    RawValue::Logical(value) => AttributeValue::Logical(value),
                    RawValue::Date(date) => AttributeValue::Date(date),
                    RawValue::Null => AttributeValue::Null,
                };
                Ok((field, decoded))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { index, attributes })
    }

    /// Zero-based position of the feature within its layer.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Look up an attribute by its exact field name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find_map(|(name, value)| (name == field).then_some(value))
    }

    /// Field names in table order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|(name, _)| name.as_str())
    }

    /// Attributes as a JSON object, keyed by field name.
    #[must_use]
    pub fn metadata(&self) -> Map<String, Value> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn raw_attributes() -> Vec<(String, RawValue)> {
        vec![
            ("NAME".to_owned(), RawValue::Text(b"Qu\xe9bec".to_vec())),
            ("POP".to_owned(), RawValue::Integer(42)),
            ("AREA".to_owned(), RawValue::Number(12.5)),
            ("ACTIVE".to_owned(), RawValue::Logical(true)),
            (
                "UPDATED".to_owned(),
                RawValue::Date(NaiveDate::from_ymd_opt(2011, 1, 1).expect("valid date")),
            ),
            ("NOTE".to_owned(), RawValue::Null),
        ]
    }

    #[rstest]
    fn decoding_with_wrong_encoding_names_the_field(raw_attributes: Vec<(String, RawValue)>) {
        let err = Feature::decode(3, raw_attributes, TextEncoding::Ascii).expect_err("not ascii");
        assert_eq!(err.field, "NAME");
        assert_eq!(err.encoding, "ascii");
    }

    #[rstest]
    fn metadata_keeps_json_types(raw_attributes: Vec<(String, RawValue)>) {
        let encoding = TextEncoding::from_label("latin1").expect("known label");
        let feature = Feature::decode(0, raw_attributes, encoding).expect("decodes");
        let metadata = feature.metadata();
        assert_eq!(metadata.get("NAME"), Some(&Value::from("Québec")));
        assert_eq!(metadata.get("POP"), Some(&Value::from(42)));
        assert_eq!(metadata.get("AREA"), Some(&Value::from(12.5)));
        assert_eq!(metadata.get("ACTIVE"), Some(&Value::Bool(true)));
        assert_eq!(metadata.get("UPDATED"), Some(&Value::from("2011-01-01")));
        assert_eq!(metadata.get("NOTE"), Some(&Value::Null));
        assert_eq!(
            feature.field_names().collect::<Vec<_>>(),
            ["NAME", "POP", "AREA", "ACTIVE", "UPDATED", "NOTE"]
        );
    }

    #[rstest]
    #[case(AttributeValue::Number(3.0), "3")]
    #[case(AttributeValue::Number(3.25), "3.25")]
    #[case(AttributeValue::Integer(-7), "-7")]
    #[case(AttributeValue::Null, "")]
    fn renders_text(#[case] value: AttributeValue, #[case] expected: &str) {
        assert_eq!(value.to_text(), expected);
    }
}
