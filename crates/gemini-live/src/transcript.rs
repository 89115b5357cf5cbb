//! Folds streaming transcript fragments into whole utterances.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptBuffer {
    pub accumulated: String,
    pub finalized: bool,
}

/// Accumulates deltas and hands back the text only once the utterance is final.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    buffer: TranscriptBuffer,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment. Returns the full utterance when `finished` is set.
    pub fn on_delta(&mut self, text: &str, finished: bool) -> Option<String> {
        self.buffer.accumulated.push_str(text);
        if finished {
            self.buffer.finalized = true;
            self.take()
        } else {
            None
        }
    }

    /// An out-of-band finality signal (turn complete, interruption). Returns the
    /// pending text if any.
    pub fn finalize(&mut self) -> Option<String> {
        self.buffer.finalized = true;
        self.take()
    }

    pub fn pending(&self) -> &str {
        &self.buffer.accumulated
    }

    fn take(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.buffer).accumulated;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivers_once_on_finished() {
        let mut aggregator = TranscriptAggregator::new();
        let mut delivered = Vec::new();
        for (text, finished) in [("Hel", false), ("lo", true)] {
            delivered.extend(aggregator.on_delta(text, finished));
        }
        assert_eq!(delivered, vec!["Hello".to_string()]);
        assert_eq!(aggregator.pending(), "");
    }

    #[test]
    fn test_partials_are_not_surfaced() {
        let mut aggregator = TranscriptAggregator::new();
        assert_eq!(aggregator.on_delta("Once upon", false), None);
        assert_eq!(aggregator.on_delta(" a time", false), None);
        assert_eq!(aggregator.pending(), "Once upon a time");
    }

    #[test]
    fn test_finalize_flushes_and_resets() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.on_delta("The end", false);
        assert_eq!(aggregator.finalize(), Some("The end".to_string()));
        assert_eq!(aggregator.finalize(), None);

        assert_eq!(aggregator.on_delta("Next", true), Some("Next".to_string()));
    }

    #[test]
    fn test_whitespace_only_is_not_delivered() {
        let mut aggregator = TranscriptAggregator::new();
        assert_eq!(aggregator.on_delta("  ", true), None);
    }
}
