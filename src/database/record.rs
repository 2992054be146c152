use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// Errors that can occur while building records from raw data
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
}

/// Ordered set of field and relation names exposed for one record.
///
/// Every record starts with an empty mask; the request builder enables names
/// one by one once they pass the whitelist and authorization checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMask {
    visible: Vec<String>,
}

impl FieldMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.visible.iter().any(|v| v == name)
    }

    /// Enable `name`; returns false when it was already visible
    pub fn show(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.is_visible(&name) {
            return false;
        }
        self.visible.push(name);
        true
    }

    pub fn clear(&mut self) {
        self.visible.clear();
    }

    pub fn names(&self) -> &[String] {
        &self.visible
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Reorder visible names to follow `layout`; names missing from the
    /// layout keep their relative order at the end.
    pub fn arrange(&mut self, layout: &[String]) {
        let position = |name: &String| layout.iter().position(|l| l == name).unwrap_or(usize::MAX);
        self.visible.sort_by_key(position);
    }
}

/// A fetched row: raw fields, eagerly loaded relation sub-collections and the
/// mask deciding what serialization exposes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
    relations: Vec<(String, Vec<Record>)>,
    mask: FieldMask,
}

impl Record {
    /// Create a new empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create record from a row map; nothing is visible yet
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields, relations: Vec::new(), mask: FieldMask::new() }
    }

    /// Create record from a JSON object
    pub fn from_json(json: Value) -> Result<Self, RecordError> {
        match json {
            Value::Object(map) => Ok(Self::from_map(map)),
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }

    /// Get field value, regardless of visibility
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set field value (enrichment hooks use this to attach computed data)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Remove field and return its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn id(&self) -> Option<&Value> {
        self.get("id")
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    // ========================================
    // Relations
    // ========================================

    pub fn relation(&self, name: &str) -> Option<&[Record]> {
        self.relations.iter().find(|(n, _)| n == name).map(|(_, records)| records.as_slice())
    }

    pub fn relation_mut(&mut self, name: &str) -> Option<&mut Vec<Record>> {
        self.relations.iter_mut().find(|(n, _)| n == name).map(|(_, records)| records)
    }

    /// Attach (or replace) a relation sub-collection
    pub fn attach_relation(&mut self, name: impl Into<String>, records: Vec<Record>) -> &mut Self {
        let name = name.into();
        match self.relation_mut(&name) {
            Some(existing) => *existing = records,
            None => self.relations.push((name, records)),
        }
        self
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.iter().map(|(n, _)| n.as_str())
    }

    // ========================================
    // Visibility
    // ========================================

    pub fn mask(&self) -> &FieldMask {
        &self.mask
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.mask.is_visible(name)
    }

    pub fn make_visible(&mut self, name: impl Into<String>) -> &mut Self {
        self.mask.show(name);
        self
    }

    /// Hide everything on this record and on its loaded relations
    pub fn reset_visibility(&mut self) -> &mut Self {
        self.mask.clear();
        for (_, records) in &mut self.relations {
            for record in records {
                record.reset_visibility();
            }
        }
        self
    }

    pub fn arrange(&mut self, layout: &[String]) -> &mut Self {
        self.mask.arrange(layout);
        self
    }

    // ========================================
    // Serialization
    // ========================================

    /// Convert to JSON, exposing only visible names.
    ///
    /// A visible relation wins over a field with the same name. Visible names
    /// with neither a field nor a loaded relation are skipped.
    pub fn to_json(&self) -> Value {
        let mut output = Map::new();
        for name in self.mask.names() {
            if let Some(records) = self.relation(name) {
                output.insert(name.clone(), Record::to_json_array(records));
            } else if let Some(value) = self.fields.get(name) {
                output.insert(name.clone(), value.clone());
            }
        }
        Value::Object(output)
    }

    /// Convert to JSON with every stored field, ignoring the mask
    pub fn to_raw_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn to_json_array(records: &[Record]) -> Value {
        Value::Array(records.iter().map(Record::to_json).collect())
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let exposed: Vec<&String> = self
            .mask
            .names()
            .iter()
            .filter(|name| self.relation(name).is_some() || self.fields.contains_key(name.as_str()))
            .collect();

        let mut map = serializer.serialize_map(Some(exposed.len()))?;
        for name in exposed {
            match self.relation(name) {
                Some(records) => map.serialize_entry(name, records)?,
                None => map.serialize_entry(name, &self.fields[name.as_str()])?,
            }
        }
        map.end()
    }
}

/// Extension trait for Vec<Record> to add convenient JSON conversion methods
pub trait RecordVecExt {
    /// Convert to JSON array value honoring each record's mask
    fn to_json_array(&self) -> Value;

    /// Convert to JSON string
    fn to_json_string(&self) -> Result<String, serde_json::Error>;
}

impl RecordVecExt for Vec<Record> {
    fn to_json_array(&self) -> Value {
        Record::to_json_array(self)
    }

    fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ========================================
// Display
// ========================================

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record(id: {:?}, fields: {}, visible: {})",
            self.id(),
            self.fields.len(),
            self.mask.names().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_json(value).unwrap()
    }

    #[test]
    fn nothing_is_visible_by_default() {
        let r = record(json!({"id": 1, "title": "a"}));
        assert_eq!(r.to_json(), json!({}));
        assert_eq!(serde_json::to_value(&r).unwrap(), json!({}));
    }

    #[test]
    fn exposes_only_visible_fields_in_mask_order() {
        let mut r = record(json!({"id": 1, "title": "a", "secret": "s"}));
        r.make_visible("title").make_visible("id");

        let out = serde_json::to_string(&r).unwrap();
        assert_eq!(out, r#"{"title":"a","id":1}"#);

        r.arrange(&["id".to_string(), "title".to_string()]);
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"id":1,"title":"a"}"#);
        assert_eq!(r.to_json().to_string(), r#"{"id":1,"title":"a"}"#);
    }

    #[test]
    fn relation_shadows_field_with_same_name() {
        let mut child = record(json!({"id": 7, "name": "n"}));
        child.make_visible("name");

        let mut r = record(json!({"id": 1, "author": 7}));
        r.attach_relation("author", vec![child]).make_visible("author");

        assert_eq!(r.to_json(), json!({"author": [{"name": "n"}]}));
        assert_eq!(serde_json::to_value(&r).unwrap(), json!({"author": [{"name": "n"}]}));
    }

    #[test]
    fn reset_visibility_reaches_relations() {
        let mut child = record(json!({"id": 7}));
        child.make_visible("id");
        let mut r = record(json!({"id": 1}));
        r.attach_relation("kids", vec![child]).make_visible("id");

        r.reset_visibility();
        assert!(r.mask().is_empty());
        assert!(r.relation("kids").unwrap()[0].mask().is_empty());
    }

    #[test]
    fn from_json_requires_object() {
        assert!(Record::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn mask_show_is_idempotent() {
        let mut mask = FieldMask::new();
        assert!(mask.show("a"));
        assert!(!mask.show("a"));
        assert_eq!(mask.names(), &["a".to_string()]);
    }
}
