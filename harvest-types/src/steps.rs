use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered guidebook steps.
///
/// Always exposed as a list of strings. Backends that keep steps in a text column go through
/// [`Steps::to_storage_text`] / [`Steps::from_storage_text`]; backends that hand back either a
/// native array or JSON-encoded text are both accepted by the `Deserialize` impl.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Steps(Vec<String>);

impl Steps {
    pub fn new(steps: Vec<String>) -> Self {
        Self(steps)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }

    /// JSON array text, the on-disk form in text columns.
    pub fn to_storage_text(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    /// Decode stored text. JSON arrays decode as-is; anything else is treated as one step per
    /// non-empty line.
    pub fn from_storage_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return Self(list);
        }
        Self(
            trimmed
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl From<Vec<String>> for Steps {
    fn from(steps: Vec<String>) -> Self {
        Self(steps)
    }
}

impl From<Vec<&str>> for Steps {
    fn from(steps: Vec<&str>) -> Self {
        Self(steps.into_iter().map(str::to_string).collect())
    }
}

impl fmt::Display for Steps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

impl Serialize for Steps {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StepsRepr {
    List(Vec<String>),
    Text(String),
    Null(()),
}

impl<'de> Deserialize<'de> for Steps {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match StepsRepr::deserialize(deserializer)? {
            StepsRepr::List(list) => Self(list),
            StepsRepr::Text(text) => Self::from_storage_text(&text),
            StepsRepr::Null(()) => Self::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_text_keeps_order() {
        let steps = Steps::from(vec!["Audit current waste levels", "Train staff and volunteers"]);
        let text = steps.to_storage_text();
        assert_eq!(text, r#"["Audit current waste levels","Train staff and volunteers"]"#);
        assert_eq!(Steps::from_storage_text(&text), steps);
    }

    #[test]
    fn decodes_json_encoded_string() {
        let steps: Steps = serde_json::from_str(r#""[\"one\",\"two\",\"three\"]""#).unwrap();
        assert_eq!(steps.as_slice(), ["one", "two", "three"]);
    }

    #[test]
    fn decodes_native_array_and_null() {
        let steps: Steps = serde_json::from_str(r#"["b","a"]"#).unwrap();
        assert_eq!(steps.as_slice(), ["b", "a"]);
        let empty: Steps = serde_json::from_str("null").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn plain_text_is_split_by_line() {
        let steps = Steps::from_storage_text("first\n\n  second  \n");
        assert_eq!(steps.as_slice(), ["first", "second"]);
    }

    #[test]
    fn serializes_as_list() {
        let json = serde_json::to_string(&Steps::from(vec!["x"])).unwrap();
        assert_eq!(json, r#"["x"]"#);
    }
}
