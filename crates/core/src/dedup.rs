use crate::models::Chunk;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    #[default]
    Content,
    Document,
}

impl FromStr for IdPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "content" => Ok(IdPolicy::Content),
            "document" => Ok(IdPolicy::Document),
            other => Err(format!("unknown id policy {other:?}, expected content or document")),
        }
    }
}

impl fmt::Display for IdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdPolicy::Content => f.write_str("content"),
            IdPolicy::Document => f.write_str("document"),
        }
    }
}

pub fn content_id(text: &str) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    digest_to_uuid(&hasher.finalize())
}

fn document_scoped_id(collection: &str, index: usize, text: &str) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update((collection.len() as u64).to_le_bytes());
    hasher.update(collection.as_bytes());
    hasher.update((index as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    digest_to_uuid(&hasher.finalize())
}

fn digest_to_uuid(digest: &[u8]) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

impl IdPolicy {
    pub fn chunk_id(self, collection: &str, index: usize, text: &str) -> Uuid {
        match self {
            IdPolicy::Content => content_id(text),
            IdPolicy::Document => document_scoped_id(collection, index, text),
        }
    }
}

pub fn identify_chunks(texts: Vec<String>, collection: &str, policy: IdPolicy) -> Vec<Chunk> {
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            id: policy.chunk_id(collection, index, &text),
            index,
            text,
        })
        .collect()
}
