use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of one extracted field
///
/// `Absent` means the selector matched nothing on the page. A selector that
/// matched a node with no text yields `Text("")` instead, so consumers can
/// tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Absent,
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// One structured record produced from a detail page
///
/// Records are immutable once built; the sink takes ownership on emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    url: String,
    fields: BTreeMap<String, FieldValue>,
}

impl ExtractedRecord {
    pub fn new(url: impl Into<String>, fields: BTreeMap<String, FieldValue>) -> Self {
        Self {
            url: url.into(),
            fields,
        }
    }

    /// URL of the detail page the record was extracted from
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Returns the field value, treating unknown names as absent
    pub fn get(&self, name: &str) -> &FieldValue {
        static ABSENT: FieldValue = FieldValue::Absent;
        self.fields.get(name).unwrap_or(&ABSENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_serializes_as_null() {
        let mut fields = BTreeMap::new();
        fields.insert("price".to_string(), FieldValue::Absent);
        fields.insert("name".to_string(), FieldValue::from("Trattoria"));
        fields.insert(
            "type".to_string(),
            FieldValue::from(vec!["Italian".to_string()]),
        );
        let record = ExtractedRecord::new("https://example.com/r1", fields);

        let json = serde_json::to_value(&record).unwrap();
        assert!(json["fields"]["price"].is_null());
        assert_eq!(json["fields"]["name"], "Trattoria");
        assert_eq!(json["fields"]["type"][0], "Italian");
    }

    #[test]
    fn test_deserialize_record() {
        let json = r#"{"url":"https://example.com/r1","fields":{"a":null,"b":"","c":["x","y"]}}"#;
        let record: ExtractedRecord = serde_json::from_str(json).unwrap();
        assert!(record.get("a").is_absent());
        assert_eq!(record.get("b").as_text(), Some(""));
        assert_eq!(record.get("c").as_list().map(|l| l.len()), Some(2));
    }

    #[test]
    fn test_get_unknown_field_is_absent() {
        let record = ExtractedRecord::new("https://example.com", BTreeMap::new());
        assert!(record.get("missing").is_absent());
    }
}
