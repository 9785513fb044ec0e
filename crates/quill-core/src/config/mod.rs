use crate::image::{AVATAR_QUALITY, DEFAULT_AVATAR, DEFAULT_QUALITY, STORAGE_PUBLIC_MARKER};
use crate::{Error, Result};
use serde_json::{Map, Value, json};

/// Site configuration, stored as a JSON object and read through dotted paths
/// (`"images.defaultQuality"`).
///
/// Typed settings (`SanitizeProfile`, `UrlPolicy`, `ImageSettings`) are derived from it once
/// and then used as immutable values.
#[derive(Debug, Clone, PartialEq)]
pub struct QuillConfig(Value);

impl Default for QuillConfig {
    fn default() -> Self {
        Self::empty_object()
    }
}

impl QuillConfig {
    pub fn empty_object() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// The built-in settings as a document, for user files to be merged over.
    ///
    /// Sanitize profiles are absent: their `sanitize.*` options are layered over the built-in
    /// allow-lists rather than replacing them.
    pub fn defaults() -> Self {
        Self(json!({
            "url": { "policy": "denylist" },
            "images": {
                "storageMarker": STORAGE_PUBLIC_MARKER,
                "defaultQuality": DEFAULT_QUALITY,
                "avatarQuality": AVATAR_QUALITY,
                "avatarMode": "optimize",
                "defaultAvatar": DEFAULT_AVATAR,
            }
        }))
    }

    /// [`QuillConfig::defaults`] with `overrides` deep-merged on top.
    pub fn with_defaults(overrides: &QuillConfig) -> Self {
        let mut config = Self::defaults();
        config.deep_merge(overrides.as_value());
        config
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Parses a JSON document. The root must be an object.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::InvalidConfigJson {
            message: e.to_string(),
        })?;
        if !value.is_object() {
            return Err(Error::ConfigNotObject);
        }
        Ok(Self(value))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn get(&self, dotted_path: &str) -> Option<&Value> {
        let mut cur = &self.0;
        for segment in dotted_path.split('.') {
            cur = cur.as_object()?.get(segment)?;
        }
        Some(cur)
    }

    pub fn get_str(&self, dotted_path: &str) -> Option<&str> {
        self.get(dotted_path)?.as_str()
    }

    pub fn get_bool(&self, dotted_path: &str) -> Option<bool> {
        self.get(dotted_path)?.as_bool()
    }

    /// Reads a list of strings, lowercased. Non-string entries are skipped.
    pub fn get_str_list(&self, dotted_path: &str) -> Option<Vec<String>> {
        let arr = self.get(dotted_path)?.as_array()?;
        Some(
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        )
    }

    /// Reads an unsigned integer; a present key with any other value is an error.
    pub fn require_u64(&self, dotted_path: &str) -> Result<Option<u64>> {
        match self.get(dotted_path) {
            None => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| Error::ConfigType {
                key: dotted_path.to_string(),
                expected: "unsigned integer",
            }),
        }
    }

    /// Like `get_str`, but a present key with a non-string value is an error.
    pub fn require_str(&self, dotted_path: &str) -> Result<Option<&str>> {
        match self.get(dotted_path) {
            None => Ok(None),
            Some(v) => v.as_str().map(Some).ok_or_else(|| Error::ConfigType {
                key: dotted_path.to_string(),
                expected: "string",
            }),
        }
    }

    pub fn set_value(&mut self, dotted_path: &str, value: Value) {
        // `from_value` accepts any JSON value; coerce to an object so this never panics.
        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }

        let Value::Object(ref mut root) = self.0 else {
            return;
        };
        let mut cur: &mut Map<String, Value> = root;
        let mut segments = dotted_path.split('.').peekable();
        while let Some(seg) = segments.next() {
            if segments.peek().is_none() {
                cur.insert(seg.to_string(), value);
                return;
            }
            let slot = cur.entry(seg).or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Some(next) = slot.as_object_mut() else {
                return;
            };
            cur = next;
        }
    }

    pub fn deep_merge(&mut self, other: &Value) {
        deep_merge_value(&mut self.0, other);
    }
}

fn deep_merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge_value(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dotted_paths_read_nested_values() {
        let cfg = QuillConfig::from_value(json!({
            "images": { "defaultQuality": 60, "avatarMode": "original" },
            "sanitize": { "strict": { "ADD_TAGS": ["IMG", 3, "hr"] } }
        }));
        assert_eq!(cfg.require_u64("images.defaultQuality").unwrap(), Some(60));
        assert_eq!(cfg.get_str("images.avatarMode"), Some("original"));
        assert_eq!(
            cfg.get_str_list("sanitize.strict.ADD_TAGS"),
            Some(vec!["img".to_string(), "hr".to_string()])
        );
        assert_eq!(cfg.get_str("images.missing"), None);
    }

    #[test]
    fn require_reports_type_mismatch() {
        let cfg = QuillConfig::from_value(json!({ "images": { "defaultQuality": "high" } }));
        let err = cfg.require_u64("images.defaultQuality").unwrap_err();
        assert!(err.to_string().contains("images.defaultQuality"));
        assert_eq!(cfg.require_u64("images.avatarQuality").unwrap(), None);
    }

    #[test]
    fn set_value_creates_intermediate_objects() {
        let mut cfg = QuillConfig::from_value(json!("not an object"));
        cfg.set_value("url.policy", json!("allowlist"));
        assert_eq!(cfg.get_str("url.policy"), Some("allowlist"));
    }

    #[test]
    fn deep_merge_overrides_leaves_and_keeps_siblings() {
        let mut cfg = QuillConfig::from_value(json!({
            "images": { "defaultQuality": 75, "avatarQuality": 80 }
        }));
        cfg.deep_merge(&json!({ "images": { "defaultQuality": 50 } }));
        assert_eq!(cfg.require_u64("images.defaultQuality").unwrap(), Some(50));
        assert_eq!(cfg.require_u64("images.avatarQuality").unwrap(), Some(80));
    }

    #[test]
    fn user_file_is_merged_over_defaults() {
        let user = QuillConfig::from_value(json!({
            "images": { "avatarMode": "original" },
            "sanitize": { "minimal": { "ADD_TAGS": ["u"] } }
        }));
        let cfg = QuillConfig::with_defaults(&user);
        assert_eq!(cfg.get_str("images.avatarMode"), Some("original"));
        assert_eq!(cfg.require_u64("images.defaultQuality").unwrap(), Some(75));
        assert_eq!(cfg.get_str("url.policy"), Some("denylist"));
        assert_eq!(
            cfg.get_str_list("sanitize.minimal.ADD_TAGS"),
            Some(vec!["u".to_string()])
        );
    }

    #[test]
    fn from_json_str_rejects_non_objects() {
        assert!(matches!(
            QuillConfig::from_json_str("[1, 2]"),
            Err(Error::ConfigNotObject)
        ));
        assert!(matches!(
            QuillConfig::from_json_str("{ nope"),
            Err(Error::InvalidConfigJson { .. })
        ));
        assert!(QuillConfig::from_json_str(r#"{"url":{"policy":"denylist"}}"#).is_ok());
    }
}
