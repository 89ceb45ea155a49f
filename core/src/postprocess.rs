/// Phrases the agent uses when a question is outside its knowledge.
/// Matched against the lowercased response.
pub const OFF_TOPIC_MARKERS: &[&str] = &[
    "i don't have the information",
    "i don't have enough information",
    "i cannot answer questions about",
    "i couldn't find information about",
    "looking for about",
];

pub const DEFAULT_REDIRECT_SUFFIX: &str =
    ". If you have a question about our products or services, please feel free to ask.";

/// Appends a redirection notice to responses that did not answer the
/// question.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    suffix: String,
}

impl PostProcessor {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn is_off_topic(text: &str) -> bool {
        let lowered = text.to_lowercase();
        OFF_TOPIC_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    }

    pub fn process(&self, text: String) -> String {
        if self.suffix.is_empty() || !Self::is_off_topic(&text) || text.ends_with(&self.suffix) {
            return text;
        }
        tracing::debug!("off-topic response, appending redirect notice");
        let mut text = text;
        text.push_str(&self.suffix);
        text
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_REDIRECT_SUFFIX)
    }
}
