//! Streaming side of answer generation.
//!
//! Fragments arrive with arbitrary boundaries, so a tag like `<think>` may
//! be split across two of them. [`ReasoningFilter`] keeps any tail that
//! could still become a tag until the next fragment decides it.

const BLOCKS: &[(&str, &str)] = &[("<think>", "</think>"), ("<thinking>", "</thinking>")];
const OPEN_TAGS: &[&str] = &["<think>", "<thinking>"];

/// Incremental counterpart of [`strip_reasoning`](crate::parser::strip_reasoning).
///
/// Matched reasoning blocks are dropped. A block still open when the
/// stream ends is released as plain text, as the batch version leaves an
/// unterminated `<think>` alone.
#[derive(Debug, Default)]
pub struct ReasoningFilter {
    pending: String,
    /// Close tag and the text swallowed so far (open tag included).
    hidden: Option<(&'static str, String)>,
}

impl ReasoningFilter {
    /// Feed one fragment, returning the text now known to be visible.
    pub fn push(&mut self, fragment: &str) -> String {
        self.pending.push_str(fragment);
        let mut visible = String::new();
        loop {
            if let Some(close) = self.hidden.as_ref().map(|(close, _)| *close) {
                if let Some(idx) = self.pending.find(close) {
                    self.pending.drain(..idx + close.len());
                    self.hidden = None;
                    continue;
                }
                let cut = self.pending.len() - partial_tag_len(&self.pending, &[close]);
                if let Some((_, swallowed)) = &mut self.hidden {
                    swallowed.push_str(&self.pending[..cut]);
                }
                self.pending.drain(..cut);
                return visible;
            }

            let next_block = BLOCKS
                .iter()
                .filter_map(|(open, close)| self.pending.find(open).map(|idx| (idx, *open, *close)))
                .min_by_key(|(idx, ..)| *idx);
            match next_block {
                Some((idx, open, close)) => {
                    visible.push_str(&self.pending[..idx]);
                    self.pending.drain(..idx + open.len());
                    self.hidden = Some((close, open.to_string()));
                }
                None => {
                    let cut = self.pending.len() - partial_tag_len(&self.pending, OPEN_TAGS);
                    visible.push_str(&self.pending[..cut]);
                    self.pending.drain(..cut);
                    return visible;
                }
            }
        }
    }

    /// End of stream: release whatever is still held back.
    pub fn finish(&mut self) -> String {
        let mut rest = self.hidden.take().map(|(_, swallowed)| swallowed).unwrap_or_default();
        rest.push_str(&std::mem::take(&mut self.pending));
        rest
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of one of `tags`.
///
/// Tags are ASCII, so the cut point is always a char boundary.
fn partial_tag_len(text: &str, tags: &[&str]) -> usize {
    tags.iter()
        .filter_map(|tag| (1..tag.len()).rev().find(|&n| text.ends_with(&tag[..n])))
        .max()
        .unwrap_or(0)
}

/// Forwards a streamed answer to the caller's sink.
///
/// Reasoning is filtered out and leading whitespace dropped. Nothing is
/// forwarded until the visible text holds at least `min_chars` characters,
/// so an attempt that is going to be rejected as too short never reaches
/// the caller.
pub(crate) struct AnswerStream<'a> {
    sink: &'a (dyn Fn(&str) + Send + Sync),
    filter: ReasoningFilter,
    held: String,
    min_chars: usize,
    open: bool,
}

impl<'a> AnswerStream<'a> {
    pub(crate) fn new(sink: &'a (dyn Fn(&str) + Send + Sync), min_chars: usize) -> Self {
        Self {
            sink,
            filter: ReasoningFilter::default(),
            held: String::new(),
            min_chars,
            open: false,
        }
    }

    pub(crate) fn push(&mut self, fragment: &str) {
        let visible = self.filter.push(fragment);
        self.forward(&visible);
    }

    /// Flush the tail of the stream. Returns whether anything was forwarded.
    pub(crate) fn finish(mut self) -> bool {
        let rest = self.filter.finish();
        self.forward(&rest);
        self.open
    }

    fn forward(&mut self, visible: &str) {
        if self.open {
            if !visible.is_empty() {
                (self.sink)(visible);
            }
            return;
        }
        self.held.push_str(visible);
        let shown = self.held.trim_start();
        if !shown.is_empty() && shown.trim_end().chars().count() >= self.min_chars {
            (self.sink)(shown);
            self.held.clear();
            self.open = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::strip_reasoning;
    use std::sync::{Arc, Mutex};

    fn filter_all(fragments: &[&str]) -> String {
        let mut filter = ReasoningFilter::default();
        let mut out: String = fragments.iter().map(|f| filter.push(f)).collect();
        out.push_str(&filter.finish());
        out
    }

    #[test]
    fn drops_reasoning_split_across_fragments() {
        assert_eq!(filter_all(&["<thi", "nk>plan it</th", "ink> The answer."]), " The answer.");
        assert_eq!(filter_all(&["A <thinking>x", "</thinking>", "B"]), "A B");
    }

    #[test]
    fn releases_lone_angle_brackets() {
        assert_eq!(filter_all(&["2 <", " 3 and 4 >", " 1"]), "2 < 3 and 4 > 1");
        assert_eq!(filter_all(&["ends with <th"]), "ends with <th");
    }

    #[test]
    fn unterminated_block_is_kept() {
        let text = "<think>never closed";
        assert_eq!(filter_all(&["<think>", "never", " closed"]), strip_reasoning(text));
    }

    #[test]
    fn matches_batch_stripping() {
        let text = "<think>a</think>Hi <think><think>b</think></think> there é";
        let fragments: Vec<String> = text.chars().map(String::from).collect();
        let fragments: Vec<&str> = fragments.iter().map(String::as_str).collect();
        assert_eq!(filter_all(&fragments), strip_reasoning(text));
    }

    fn capture() -> (Arc<Mutex<Vec<String>>>, Arc<dyn Fn(&str) + Send + Sync>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        (seen, Arc::new(move |s: &str| sink_seen.lock().unwrap().push(s.to_string())))
    }

    #[test]
    fn short_answer_is_never_forwarded() {
        let (seen, sink) = capture();
        let mut stream = AnswerStream::new(sink.as_ref(), 10);
        for fragment in ["<think>long thought</think>", " ok"] {
            stream.push(fragment);
        }
        assert!(!stream.finish());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn forwards_once_threshold_is_reached() {
        let (seen, sink) = capture();
        let mut stream = AnswerStream::new(sink.as_ref(), 10);
        for fragment in ["\n\nA proper ", "answer ", "this time."] {
            stream.push(fragment);
        }
        assert!(stream.finish());
        assert_eq!(*seen.lock().unwrap(), vec!["A proper answer ", "this time."]);
    }
}
