use crate::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Only the newest posts are shown to the model.
pub const MAX_SUMMARY_POSTS: usize = 20;
pub const MAX_INTRODUCTION_CHARS: usize = 60;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "about", "into", "this", "that", "are", "was", "how",
    "why", "what", "your", "our", "my", "new", "part",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostExcerpt {
    pub title: String,
    pub content: String,
}

/// Writes a one-line introduction of an author from their posts, newest first.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, posts: &[PostExcerpt]) -> Result<String, LlmError>;
}

/// Strips wrapping quotes and caps the line at `MAX_INTRODUCTION_CHARS` characters.
pub fn clean_introduction(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_INTRODUCTION_CHARS).collect())
}

/// Offline summarizer built around the most frequent title keyword.
#[derive(Debug, Default, Clone)]
pub struct KeywordSummarizer;

impl KeywordSummarizer {
    pub fn new() -> Self {
        Self
    }

    fn top_keyword(posts: &[PostExcerpt]) -> Option<String> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut order = 0usize;

        for post in posts {
            for word in post
                .title
                .split(|c: char| !c.is_alphanumeric())
                .map(str::to_lowercase)
                .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
            {
                let entry = counts.entry(word).or_insert((0, order));
                entry.0 += 1;
                order += 1;
            }
        }

        // Highest count wins, earliest first appearance breaks ties.
        counts
            .into_iter()
            .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
                count_a.cmp(count_b).then(first_b.cmp(first_a))
            })
            .map(|(word, _)| word)
    }
}

#[async_trait]
impl Summarizer for KeywordSummarizer {
    async fn summarize(&self, posts: &[PostExcerpt]) -> Result<String, LlmError> {
        let sample = &posts[..posts.len().min(MAX_SUMMARY_POSTS)];
        let keyword = Self::top_keyword(sample).ok_or(LlmError::EmptyResponse)?;
        clean_introduction(&format!(
            "Writer who keeps circling back to {keyword}, {} posts deep",
            sample.len()
        ))
        .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excerpt(title: &str) -> PostExcerpt {
        PostExcerpt {
            title: title.to_string(),
            content: String::new(),
        }
    }

    #[test]
    fn clean_introduction_strips_quotes_and_caps_length() {
        assert_eq!(
            clean_introduction("  \"Night-owl debugger\"  ").as_deref(),
            Some("Night-owl debugger")
        );
        let long = "x".repeat(100);
        assert_eq!(
            clean_introduction(&long).unwrap().chars().count(),
            MAX_INTRODUCTION_CHARS
        );
        assert_eq!(clean_introduction(" \"\" "), None);
    }

    #[test]
    fn top_keyword_prefers_frequency_then_first_seen() {
        let posts = vec![
            excerpt("Coffee and Rust"),
            excerpt("Rust lifetimes"),
            excerpt("Coffee brewing"),
            excerpt("Rust macros"),
        ];
        assert_eq!(KeywordSummarizer::top_keyword(&posts).as_deref(), Some("rust"));

        let tied = vec![excerpt("Coffee notes"), excerpt("Notes coffee")];
        assert_eq!(KeywordSummarizer::top_keyword(&tied).as_deref(), Some("coffee"));
    }

    #[tokio::test]
    async fn summarize_without_keywords_is_empty_response() {
        let result = KeywordSummarizer::new()
            .summarize(&[excerpt("a b"), excerpt("the and")])
            .await;
        assert_eq!(result, Err(LlmError::EmptyResponse));
    }
}
