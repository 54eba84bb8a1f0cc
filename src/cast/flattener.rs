use crate::cast::types::{ArrayGroup, FlatRecord};
use serde_json::{Map, Value};

/// The core flattener that turns nested JSON objects into flat records
/// and pulls out array-valued fields as row groups.
///
/// Pure computation - never fails on a well-formed JSON tree, never
/// suspends, holds no state beyond the path separator.
pub struct JsonFlattener {
    separator: String,
}

impl Default for JsonFlattener {
    fn default() -> Self {
        JsonFlattener::new("_")
    }
}

impl JsonFlattener {
    pub fn new(separator: impl Into<String>) -> Self {
        JsonFlattener {
            separator: separator.into(),
        }
    }

    /// Fully flatten nested objects using the path separator.
    ///
    /// Example: `{"a":{"b":1}}` -> `{"a_b":1}`. Arrays and scalars pass
    /// through unchanged; arrays are left in place for group extraction.
    /// If two distinct paths collide into the same flattened key, the
    /// later-encountered value wins.
    pub fn flatten(&self, obj: &Map<String, Value>) -> FlatRecord {
        let mut flattened = Map::new();
        self.flatten_into(obj, "", &mut flattened);
        flattened
    }

    fn flatten_into(&self, obj: &Map<String, Value>, parent_key: &str, out: &mut FlatRecord) {
        for (key, value) in obj {
            let joined = if parent_key.is_empty() {
                key.clone()
            } else {
                format!("{}{}{}", parent_key, self.separator, key)
            };

            match value {
                Value::Object(nested) => self.flatten_into(nested, &joined, out),
                other => {
                    out.insert(joined, other.clone());
                }
            }
        }
    }

    /// All non-array, non-object fields from a flattened view of the object.
    pub fn scalar_fields(&self, obj: &Map<String, Value>) -> FlatRecord {
        self.flatten(obj)
            .into_iter()
            .filter(|(_, value)| !matches!(value, Value::Array(_) | Value::Object(_)))
            .collect()
    }

    /// Recursively find array-valued fields and flatten each element into
    /// a row record.
    ///
    /// Group names are the underscore-joined path from the root to the
    /// array. Object elements are flattened; scalar elements become a
    /// single-key `{"value": elem}` record. Elements are not searched for
    /// further nested arrays. Empty arrays still produce a (empty) group;
    /// an object with no arrays anywhere produces an empty Vec.
    pub fn array_groups(&self, obj: &Map<String, Value>) -> Vec<ArrayGroup> {
        let mut groups = Vec::new();
        self.collect_groups(obj, "", &mut groups);
        groups
    }

    fn collect_groups(&self, obj: &Map<String, Value>, parent_key: &str, groups: &mut Vec<ArrayGroup>) {
        for (key, value) in obj {
            let joined = if parent_key.is_empty() {
                key.clone()
            } else {
                format!("{}{}{}", parent_key, self.separator, key)
            };

            match value {
                Value::Array(elements) => {
                    let items = elements.iter().map(|elem| self.element_record(elem)).collect();

                    // Colliding group names keep the first position, last items win
                    match groups.iter_mut().find(|g| g.name == joined) {
                        Some(existing) => existing.items = items,
                        None => groups.push(ArrayGroup::new(joined, items)),
                    }
                }
                Value::Object(nested) => self.collect_groups(nested, &joined, groups),
                _ => {}
            }
        }
    }

    fn element_record(&self, elem: &Value) -> FlatRecord {
        match elem {
            Value::Object(obj) => self.flatten(obj),
            scalar => {
                let mut record = Map::new();
                record.insert("value".to_string(), scalar.clone());
                record
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    #[test]
    fn test_flatten_nested_objects() {
        let input = obj(json!({"a": {"b": {"c": 1}}}));

        let flattener = JsonFlattener::default();
        let flat = flattener.flatten(&input);

        assert_eq!(flat.len(), 1);
        assert_eq!(flat.get("a_b_c").unwrap(), &json!(1));
    }

    #[test]
    fn test_flatten_is_idempotent_on_flat_objects() {
        let input = obj(json!({"name": "Alice", "age": 30, "active": true}));

        let flattener = JsonFlattener::default();
        let once = flattener.flatten(&input);
        let twice = flattener.flatten(&once);

        assert_eq!(once, twice);
        assert_eq!(once, input);
    }

    #[test]
    fn test_flatten_preserves_key_order() {
        let input = obj(json!({"z": 1, "m": {"b": 2, "a": 3}, "a": 4}));

        let flattener = JsonFlattener::default();
        let flat = flattener.flatten(&input);

        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "m_b", "m_a", "a"]);
    }

    #[test]
    fn test_flatten_leaves_arrays_in_place() {
        let input = obj(json!({"a": {"tags": [1, 2]}, "b": 3}));

        let flattener = JsonFlattener::default();
        let flat = flattener.flatten(&input);

        assert_eq!(flat.get("a_tags").unwrap(), &json!([1, 2]));
        assert_eq!(flat.get("b").unwrap(), &json!(3));
    }

    #[test]
    fn test_flatten_colliding_paths_last_write_wins() {
        // "a_b" exists both as a literal key and as the a.b path
        let input = obj(json!({"a_b": "first", "a": {"b": "second"}}));

        let flattener = JsonFlattener::default();
        let flat = flattener.flatten(&input);

        assert_eq!(flat.len(), 1);
        assert_eq!(flat.get("a_b").unwrap(), &json!("second"));
    }

    #[test]
    fn test_scalar_fields_drop_arrays() {
        let input = obj(json!({
            "name": "John",
            "meta": {"age": 30},
            "employees": [{"id": 1}],
            "tags": ["x"]
        }));

        let flattener = JsonFlattener::default();
        let scalars = flattener.scalar_fields(&input);

        let keys: Vec<&str> = scalars.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "meta_age"]);
    }

    #[test]
    fn test_array_groups_object_elements_are_flattened() {
        let input = obj(json!({
            "employees": [
                {"id": 101, "address": {"city": "Oslo"}},
                {"id": 102, "address": {"city": "Bergen"}}
            ]
        }));

        let flattener = JsonFlattener::default();
        let groups = flattener.array_groups(&input);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "employees");
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[0].items[0].get("address_city").unwrap(), &json!("Oslo"));
    }

    #[test]
    fn test_array_groups_nested_path_naming() {
        let input = obj(json!({
            "company": {
                "departments": [{"name": "Engineering"}]
            }
        }));

        let flattener = JsonFlattener::default();
        let groups = flattener.array_groups(&input);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "company_departments");
    }

    #[test]
    fn test_array_groups_scalar_elements_wrapped_as_value() {
        let input = obj(json!({"tags": ["rust", "json"]}));

        let flattener = JsonFlattener::default();
        let groups = flattener.array_groups(&input);

        assert_eq!(groups[0].items[0].get("value").unwrap(), &json!("rust"));
        assert_eq!(groups[0].items[1].get("value").unwrap(), &json!("json"));
    }

    #[test]
    fn test_array_groups_no_recursion_into_elements() {
        // The inner "phones" array stays embedded in its element record
        let input = obj(json!({
            "contacts": [{"name": "Ann", "phones": ["1", "2"]}]
        }));

        let flattener = JsonFlattener::default();
        let groups = flattener.array_groups(&input);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "contacts");
        assert_eq!(groups[0].items[0].get("phones").unwrap(), &json!(["1", "2"]));
    }

    #[test]
    fn test_array_groups_empty_array_still_listed() {
        let input = obj(json!({"items": []}));

        let flattener = JsonFlattener::default();
        let groups = flattener.array_groups(&input);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "items");
        assert!(groups[0].items.is_empty());
    }

    #[test]
    fn test_array_groups_none_found() {
        let input = obj(json!({"a": {"b": 1}, "c": "text"}));

        let flattener = JsonFlattener::default();
        assert!(flattener.array_groups(&input).is_empty());
    }

    #[test]
    fn test_array_groups_multiple_preserve_order() {
        let input = obj(json!({
            "employees": [{"id": 1}],
            "projects": [{"id": 2}]
        }));

        let flattener = JsonFlattener::default();
        let groups = flattener.array_groups(&input);

        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["employees", "projects"]);
    }
}
