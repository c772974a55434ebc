//! Auxiliary free-text documents, referenced by fixed identifiers.
//!
//! Documents are never parsed into structure; a text-lookup question returns
//! the trimmed body verbatim. Identifiers are the folded file stems of the
//! files found in the docs directory.

use crate::normalize;

#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: Vec<(String, String)>,
}

impl DocumentSet {
    pub fn from_named_texts(texts: Vec<(String, String)>) -> DocumentSet {
        let documents = texts
            .into_iter()
            .map(|(name, body)| (normalize::fold(&name), body.trim().to_string()))
            .filter(|(name, body)| !name.is_empty() && !body.is_empty())
            .collect();
        DocumentSet { documents }
    }

    pub fn names(&self) -> Vec<String> {
        self.documents.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        let wanted = normalize::fold(identifier);
        self.documents
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, body)| body.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_folded_file_stems() {
        let docs = DocumentSet::from_named_texts(vec![(
            "Misión".to_string(),
            "  Formar estudiantes íntegros.  ".to_string(),
        )]);
        assert_eq!(docs.names(), vec!["mision"]);
        assert_eq!(docs.get("MISIÓN"), Some("Formar estudiantes íntegros."));
        assert_eq!(docs.get("vision"), None);
    }

    #[test]
    fn empty_bodies_are_dropped() {
        let docs = DocumentSet::from_named_texts(vec![("notes".to_string(), "  ".to_string())]);
        assert!(docs.is_empty());
    }
}
