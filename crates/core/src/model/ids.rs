use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unique identifier for an uploaded document in the catalog
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Creates a new `DocumentId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for parsing an id from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for DocumentId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(DocumentId::new)
            .map_err(|_| ParseIdError {
                kind: "DocumentId".to_string(),
            })
    }
}

//
// ─── TOPICS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    #[error("topic name cannot be empty")]
    EmptyName,
    #[error("unrecognized topic key: {0}")]
    InvalidKey(String),
}

/// Free-form topic label used by the local progress backend.
///
/// Stored trimmed; never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicName(String);

impl TopicName {
    /// # Errors
    ///
    /// Returns `TopicError::EmptyName` if the name is blank.
    pub fn new(name: impl AsRef<str>) -> Result<Self, TopicError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TopicError::EmptyName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TopicName {
    type Error = TopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TopicName> for String {
    fn from(value: TopicName) -> Self {
        value.0
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable key that progress is aggregated under across sessions.
///
/// The local backend keys by topic name; the authenticated backend keys by
/// document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TopicIdentity {
    Topic(TopicName),
    Document(DocumentId),
}

const TOPIC_PREFIX: &str = "topic:";
const DOCUMENT_PREFIX: &str = "document:";

impl TopicIdentity {
    /// # Errors
    ///
    /// Returns `TopicError::EmptyName` if the name is blank.
    pub fn topic(name: impl AsRef<str>) -> Result<Self, TopicError> {
        Ok(Self::Topic(TopicName::new(name)?))
    }

    #[must_use]
    pub fn document(id: DocumentId) -> Self {
        Self::Document(id)
    }

    #[must_use]
    pub fn document_id(&self) -> Option<DocumentId> {
        match self {
            Self::Document(id) => Some(*id),
            Self::Topic(_) => None,
        }
    }

    /// String form used as a map key in serialized progress tables.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::Topic(name) => format!("{TOPIC_PREFIX}{name}"),
            Self::Document(id) => format!("{DOCUMENT_PREFIX}{id}"),
        }
    }

    /// Inverse of [`TopicIdentity::storage_key`].
    ///
    /// # Errors
    ///
    /// Returns `TopicError::InvalidKey` for unknown prefixes or bad ids.
    pub fn from_storage_key(key: &str) -> Result<Self, TopicError> {
        if let Some(name) = key.strip_prefix(TOPIC_PREFIX) {
            return Self::topic(name);
        }
        if let Some(raw) = key.strip_prefix(DOCUMENT_PREFIX) {
            return raw
                .parse::<DocumentId>()
                .map(Self::Document)
                .map_err(|_| TopicError::InvalidKey(key.to_owned()));
        }
        Err(TopicError::InvalidKey(key.to_owned()))
    }
}

impl fmt::Display for TopicIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic(name) => write!(f, "{name}"),
            Self::Document(id) => write!(f, "document #{id}"),
        }
    }
}

impl Serialize for TopicIdentity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.storage_key())
    }
}

impl<'de> Deserialize<'de> for TopicIdentity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_storage_key(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_are_trimmed_and_non_empty() {
        let name = TopicName::new("  Cardiology ").unwrap();
        assert_eq!(name.as_str(), "Cardiology");
        assert_eq!(TopicName::new("   "), Err(TopicError::EmptyName));
    }

    #[test]
    fn storage_key_parses_back() {
        let topic = TopicIdentity::topic("Renal: acid-base").unwrap();
        let doc = TopicIdentity::document(DocumentId::new(42));

        assert_eq!(
            TopicIdentity::from_storage_key(&topic.storage_key()).unwrap(),
            topic
        );
        assert_eq!(doc.storage_key(), "document:42");
        assert_eq!(TopicIdentity::from_storage_key("document:42").unwrap(), doc);
    }

    #[test]
    fn unknown_storage_keys_are_rejected() {
        assert!(matches!(
            TopicIdentity::from_storage_key("deck:1"),
            Err(TopicError::InvalidKey(_))
        ));
        assert!(matches!(
            TopicIdentity::from_storage_key("document:abc"),
            Err(TopicError::InvalidKey(_))
        ));
    }

    #[test]
    fn document_id_parses_from_str() {
        assert_eq!("7".parse::<DocumentId>().unwrap(), DocumentId::new(7));
        assert!("x".parse::<DocumentId>().is_err());
    }
}
