use serde::{Deserialize, Serialize};

/// One quote. Field order is the serialized key order: `text`, `author`, `tags`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Record {
    pub text: String,
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A fetched page. Discarded once extracted.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub html: String,
}
