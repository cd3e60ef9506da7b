use crate::error::RagError;

pub const MAX_CHUNK_SIZE: usize = 512;
pub const CHUNK_OVERLAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_words: usize,
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words: MAX_CHUNK_SIZE,
            overlap_words: CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn new(max_words: usize, overlap_words: usize) -> Result<Self, RagError> {
        let config = Self {
            max_words,
            overlap_words,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.max_words == 0 {
            return Err(RagError::InvalidChunkConfig(
                "max chunk size must be at least one word".to_string(),
            ));
        }
        if self.overlap_words >= self.max_words {
            return Err(RagError::InvalidChunkConfig(format!(
                "overlap of {} words must be smaller than the chunk size of {} words",
                self.overlap_words, self.max_words
            )));
        }
        Ok(())
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn chunk_sentences<S: AsRef<str>>(sentences: &[S], config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for sentence in sentences {
        let words = sentence.as_ref().split_whitespace().collect::<Vec<_>>();
        if words.is_empty() {
            continue;
        }

        if !current.is_empty() && current.len() + words.len() > config.max_words {
            let overlap_start = current.len().saturating_sub(config.overlap_words);
            let carried = current[overlap_start..].to_vec();
            chunks.push(current.join(" "));
            current = carried;
        }
        current.extend(words);
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
