//! Class label tables.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::ModelError;

/// Ordered class labels, indexed by output position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Wrap an existing list.
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Parse a JSON array of strings.
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let labels: Vec<String> =
            serde_json::from_str(json).map_err(|e| ModelError::Labels(e.to_string()))?;
        Ok(Self { labels })
    }

    /// Load a JSON label file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ModelError::Labels(format!("{}: {}", path.display(), e)))?;
        let table = Self::from_json_str(&content)?;
        debug!("Loaded {} labels from {}", table.len(), path.display());
        Ok(table)
    }

    /// Build a table from a `synset.txt` listing.
    ///
    /// Each non-empty line looks like `n01440764 tench, Tinca tinca`; the
    /// leading WordNet id is dropped.
    pub fn from_synset(text: &str) -> Self {
        let labels = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once(' ') {
                Some((id, name)) if is_synset_id(id) => name.trim().to_string(),
                _ => line.to_string(),
            })
            .collect();
        Self { labels }
    }

    /// Label for an output index, or `class_<index>` when the table is short.
    pub fn label(&self, index: usize) -> Cow<'_, str> {
        match self.labels.get(index) {
            Some(label) => Cow::Borrowed(label.as_str()),
            None => Cow::Owned(format!("class_{}", index)),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Serialize back to a pretty JSON array.
    pub fn to_json(&self) -> Result<String, ModelError> {
        serde_json::to_string_pretty(&self.labels).map_err(|e| ModelError::Labels(e.to_string()))
    }
}

fn is_synset_id(token: &str) -> bool {
    token.len() > 1
        && token.starts_with('n')
        && token[1..].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_placeholder_label() {
        let table = LabelTable::new(vec!["tench".into(), "goldfish".into()]);
        assert_eq!(table.label(1), "goldfish");
        assert_eq!(table.label(7), "class_7");
    }

    #[test]
    fn test_from_json() {
        let table = LabelTable::from_json_str(r#"["cat", "dog"]"#).unwrap();
        assert_eq!(table.len(), 2);
        assert!(matches!(
            LabelTable::from_json_str(r#"{"0": "cat"}"#),
            Err(ModelError::Labels(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["a", "b", "c"]"#).unwrap();

        let table = LabelTable::from_file(file.path()).unwrap();
        assert_eq!(table.label(2), "c");
        assert!(LabelTable::from_file("/nonexistent/labels.json").is_err());
    }

    #[test]
    fn test_from_synset() {
        let text = "n01440764 tench, Tinca tinca\n\nn01443537 goldfish, Carassius auratus\nplain label\n";
        let table = LabelTable::from_synset(text);
        assert_eq!(
            table,
            LabelTable::new(vec![
                "tench, Tinca tinca".into(),
                "goldfish, Carassius auratus".into(),
                "plain label".into(),
            ])
        );
    }
}
