//! Thinking Extractor
//!
//! Splits streamed text into reasoning ("thinking") and answer ("content").
//!
//! Per frame, in priority order:
//!
//! 1. An explicit reasoning field is appended verbatim to `thinking`.
//! 2. Otherwise the answer text is scanned for in-band delimiter blocks
//!    (`<think>...</think>`, `[reasoning]...[/reasoning]`, ...). Captured text
//!    goes to `thinking`, the markers and captured span are removed.
//! 3. If nothing fired on the first content-bearing frame and more than a
//!    second has passed, a placeholder note stands in for reasoning until real
//!    reasoning shows up.
//!
//! [`extract`] is a pure function of its inputs.

use std::time::Duration;

use super::frame::Frame;

/// A pair of in-band markers that enclose reasoning text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delimiter {
    /// Opening marker (lowercase)
    pub open: &'static str,
    /// Closing marker (lowercase)
    pub close: &'static str,
}

impl Delimiter {
    const fn new(open: &'static str, close: &'static str) -> Self {
        Self { open, close }
    }
}

/// Recognized in-band delimiters, highest priority first
///
/// Matching is ASCII case-insensitive. Add new styles here.
pub const DELIMITERS: &[Delimiter] = &[
    Delimiter::new("<think>", "</think>"),
    Delimiter::new("<thinking>", "</thinking>"),
    Delimiter::new("<reasoning>", "</reasoning>"),
    Delimiter::new("<thought>", "</thought>"),
    Delimiter::new("[think]", "[/think]"),
    Delimiter::new("[thinking]", "[/thinking]"),
    Delimiter::new("[reasoning]", "[/reasoning]"),
    Delimiter::new("[thought]", "[/thought]"),
];

/// Elapsed time after which a silent first frame gets a placeholder note
const PLACEHOLDER_AFTER: Duration = Duration::from_secs(1);

/// Placeholder reasoning shown when the model thought silently
#[must_use]
pub fn placeholder_note(seconds: u64) -> String {
    let unit = if seconds == 1 { "second" } else { "seconds" };
    format!("Processed for {seconds} {unit} before responding.")
}

/// Reasoning and answer buffers of one assistant reply
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplyBuffers {
    /// Answer text
    pub content: String,
    /// Reasoning text, if any was seen
    pub thinking: Option<String>,
    /// Whole seconds from session start to the latest reasoning
    pub thinking_duration_seconds: Option<u64>,
    /// `thinking` holds the synthesized note, not model output
    pub thinking_is_placeholder: bool,
    /// Index into [`DELIMITERS`] of a block opened but not yet closed
    pub open_block: Option<usize>,
}

impl ReplyBuffers {
    /// Reasoning text worth persisting (the placeholder is included)
    ///
    /// Whitespace-only reasoning, such as an empty `<think>` block, is `None`.
    #[must_use]
    pub fn thinking(&self) -> Option<&str> {
        self.thinking.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// A reasoning block was seen, even an empty one
    fn saw_reasoning(&self) -> bool {
        !self.thinking_is_placeholder && self.thinking.is_some()
    }

    /// Drop the placeholder so real reasoning replaces it
    fn clear_placeholder(&mut self) {
        if self.thinking_is_placeholder {
            self.thinking = None;
            self.thinking_duration_seconds = None;
            self.thinking_is_placeholder = false;
        }
    }

    /// Returns whether `text` carried anything but whitespace
    fn append_thinking(&mut self, text: &str, new_block: bool, elapsed: Duration) -> bool {
        let substantive = !text.trim().is_empty();
        if self.thinking_is_placeholder {
            if !substantive {
                return false;
            }
            self.clear_placeholder();
        }
        let thinking = self.thinking.get_or_insert_with(String::new);
        if new_block && !thinking.is_empty() && !thinking.ends_with('\n') {
            thinking.push('\n');
        }
        thinking.push_str(text);
        if substantive {
            self.thinking_duration_seconds = Some(elapsed.as_secs());
        }
        substantive
    }
}

/// Apply one frame to the reply buffers
///
/// `elapsed` is the time since the session started; `is_first_content_frame`
/// is true only for the first frame that carries reasoning or answer text.
#[must_use]
pub fn extract(
    mut buffers: ReplyBuffers,
    frame: &Frame,
    elapsed: Duration,
    is_first_content_frame: bool,
) -> ReplyBuffers {
    let explicit = frame.reasoning.as_deref().filter(|r| !r.is_empty());
    let mut reasoning_fired = false;

    if let Some(reasoning) = explicit {
        reasoning_fired = buffers.append_thinking(reasoning, false, elapsed);
    }

    let answer = frame.answer.as_deref().unwrap_or_default();

    if explicit.is_some() {
        buffers.content.push_str(answer);
    } else if !answer.is_empty() {
        let split = split_in_band(answer, buffers.open_block);
        buffers.open_block = split.open_block;
        let touched_block = !split.reasoning.is_empty();

        for (new_block, piece) in &split.reasoning {
            if !piece.is_empty() || *new_block {
                reasoning_fired |= buffers.append_thinking(piece, *new_block, elapsed);
            }
        }

        let mut visible = split.answer.as_str();
        if buffers.content.is_empty() && (touched_block || buffers.saw_reasoning()) {
            visible = visible.trim_start();
        }
        buffers.content.push_str(visible);
    }

    if is_first_content_frame
        && !reasoning_fired
        && elapsed > PLACEHOLDER_AFTER
        && buffers.thinking().is_none()
    {
        let seconds = elapsed.as_secs();
        buffers.thinking = Some(placeholder_note(seconds));
        buffers.thinking_duration_seconds = Some(seconds);
        buffers.thinking_is_placeholder = true;
    }

    buffers
}

/// Result of scanning one chunk of answer text
#[derive(Debug, Default)]
struct InBandSplit {
    answer: String,
    /// Captured pieces; the flag marks the start of a new block
    reasoning: Vec<(bool, String)>,
    open_block: Option<usize>,
}

/// Scan `text` for delimiter blocks, continuing an already open block first
fn split_in_band(text: &str, open_block: Option<usize>) -> InBandSplit {
    let mut split = InBandSplit {
        open_block,
        ..InBandSplit::default()
    };
    let mut rest = text;
    let mut new_block = false;

    while !rest.is_empty() {
        if let Some(index) = split.open_block {
            let close = DELIMITERS[index].close;
            match find_ignore_case(rest, close) {
                Some(pos) => {
                    split.reasoning.push((new_block, rest[..pos].to_string()));
                    rest = &rest[pos + close.len()..];
                    split.open_block = None;
                }
                None => {
                    split.reasoning.push((new_block, rest.to_string()));
                    rest = "";
                }
            }
            new_block = false;
        } else {
            match earliest_open(rest) {
                Some((index, pos)) => {
                    split.answer.push_str(&rest[..pos]);
                    rest = &rest[pos + DELIMITERS[index].open.len()..];
                    split.open_block = Some(index);
                    new_block = true;
                }
                None => {
                    split.answer.push_str(rest);
                    rest = "";
                }
            }
        }
    }

    // An open marker at the very end of the chunk still starts a block
    if new_block {
        split.reasoning.push((true, String::new()));
    }

    split
}

/// Earliest opening marker in `text`; table order breaks ties
fn earliest_open(text: &str) -> Option<(usize, usize)> {
    let lowered = text.to_ascii_lowercase();
    DELIMITERS
        .iter()
        .enumerate()
        .filter_map(|(index, d)| lowered.find(d.open).map(|pos| (index, pos)))
        .min_by_key(|&(index, pos)| (pos, index))
}

/// ASCII case-insensitive `find`; byte offsets refer to `haystack`
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::frame::parse_frame;
    use pretty_assertions::assert_eq;

    fn answer(text: &str) -> Frame {
        Frame {
            answer: Some(text.to_string()),
            ..Frame::default()
        }
    }

    fn reasoning(text: &str) -> Frame {
        Frame {
            reasoning: Some(text.to_string()),
            answer: Some(String::new()),
            ..Frame::default()
        }
    }

    /// Fold frames the way the session loop does
    fn run(frames: &[Frame], elapsed: Duration) -> ReplyBuffers {
        let mut buffers = ReplyBuffers::default();
        let mut seen_content = false;
        for frame in frames {
            let first = frame.has_content() && !seen_content;
            seen_content |= frame.has_content();
            buffers = extract(buffers, frame, elapsed, first);
        }
        buffers
    }

    #[test]
    fn test_plain_answer() {
        let b = run(&[answer("Hel"), answer("lo")], Duration::ZERO);
        assert_eq!(b.content, "Hello");
        assert_eq!(b.thinking, None);
        assert_eq!(b.thinking_duration_seconds, None);
    }

    #[test]
    fn test_explicit_reasoning_field() {
        let b = run(
            &[reasoning("Let me "), reasoning("think."), answer("42")],
            Duration::from_millis(3_700),
        );
        assert_eq!(b.thinking.as_deref(), Some("Let me think."));
        assert_eq!(b.thinking_duration_seconds, Some(3));
        assert_eq!(b.content, "42");
        assert!(!b.thinking_is_placeholder);
    }

    #[test]
    fn test_explicit_field_takes_priority_over_tags() {
        let frame = Frame {
            reasoning: Some("field".to_string()),
            answer: Some("<think>x</think>".to_string()),
            ..Frame::default()
        };
        let b = extract(ReplyBuffers::default(), &frame, Duration::ZERO, true);
        assert_eq!(b.thinking.as_deref(), Some("field"));
        assert_eq!(b.content, "<think>x</think>");
    }

    #[test]
    fn test_single_frame_tag_block() {
        let b = run(
            &[answer("<think>plan it</think>\n\nThe answer.")],
            Duration::from_secs(2),
        );
        assert_eq!(b.thinking.as_deref(), Some("plan it"));
        assert_eq!(b.content, "The answer.");
        assert_eq!(b.thinking_duration_seconds, Some(2));
        assert_eq!(b.open_block, None);
    }

    #[test]
    fn test_every_delimiter_style() {
        for d in DELIMITERS {
            let text = format!("a{}inner{}b", d.open, d.close);
            let b = run(&[answer(&text)], Duration::ZERO);
            assert_eq!(b.thinking.as_deref(), Some("inner"), "{}", d.open);
            assert_eq!(b.content, "ab", "{}", d.open);
        }
    }

    #[test]
    fn test_case_insensitive_markers() {
        let b = run(&[answer("<THINK>Upper</Think>done")], Duration::ZERO);
        assert_eq!(b.thinking.as_deref(), Some("Upper"));
        assert_eq!(b.content, "done");
    }

    #[test]
    fn test_multiple_blocks_get_separator() {
        let b = run(
            &[answer("<think>one</think>mid[reasoning]two[/reasoning]end")],
            Duration::ZERO,
        );
        assert_eq!(b.thinking.as_deref(), Some("one\ntwo"));
        assert_eq!(b.content, "midend");
    }

    #[test]
    fn test_block_streamed_across_frames() {
        let b = run(
            &[
                answer("<think>"),
                answer("step "),
                answer("one"),
                answer("</think>"),
                answer("Result"),
            ],
            Duration::ZERO,
        );
        assert_eq!(b.thinking.as_deref(), Some("step one"));
        assert_eq!(b.content, "Result");
        assert_eq!(b.open_block, None);
    }

    #[test]
    fn test_unclosed_block_never_leaks_into_content() {
        let b = run(&[answer("ok <thought>still going"), answer(" and on")], Duration::ZERO);
        assert_eq!(b.content, "ok ");
        assert_eq!(b.thinking.as_deref(), Some("still going and on"));
        assert_eq!(b.open_block, Some(3));
    }

    #[test]
    fn test_reasoning_and_content_are_disjoint() {
        let inputs = [
            "<think>alpha</think>beta",
            "gamma<thinking>delta</thinking>",
            "[thought]xray[/thought]yank<reasoning>quill</reasoning>plum",
            "<think>iota",
        ];
        for input in inputs {
            let b = run(&[answer(input)], Duration::ZERO);
            let thinking = b.thinking.clone().unwrap_or_default();
            for word in thinking.split_whitespace() {
                assert!(!b.content.contains(word), "{input}: {word} in both");
            }
            for d in DELIMITERS {
                assert!(!b.content.contains(d.open) && !b.content.contains(d.close));
            }
        }
    }

    #[test]
    fn test_placeholder_after_slow_first_frame() {
        let b = run(&[answer("Hi")], Duration::from_millis(2_500));
        assert_eq!(b.thinking.as_deref(), Some("Processed for 2 seconds before responding."));
        assert_eq!(b.thinking_duration_seconds, Some(2));
        assert!(b.thinking_is_placeholder);
        assert_eq!(b.content, "Hi");
    }

    #[test]
    fn test_no_placeholder_when_fast() {
        let b = run(&[answer("Hi")], Duration::from_secs(1));
        assert_eq!(b.thinking, None);
    }

    #[test]
    fn test_no_placeholder_when_first_frame_reasons() {
        let b = run(&[reasoning("real")], Duration::from_secs(5));
        assert_eq!(b.thinking.as_deref(), Some("real"));
        assert!(!b.thinking_is_placeholder);
    }

    #[test]
    fn test_real_reasoning_replaces_placeholder() {
        let slow = Duration::from_secs(3);
        let b = extract(ReplyBuffers::default(), &answer("Hi"), slow, true);
        assert!(b.thinking_is_placeholder);

        let b = extract(b, &reasoning("actual"), Duration::from_secs(4), false);
        assert_eq!(b.thinking.as_deref(), Some("actual"));
        assert_eq!(b.thinking_duration_seconds, Some(4));
        assert!(!b.thinking_is_placeholder);
        assert_eq!(b.content, "Hi");
    }

    #[test]
    fn test_placeholder_only_on_first_content_frame() {
        let b = extract(ReplyBuffers::default(), &answer("x"), Duration::from_secs(9), false);
        assert_eq!(b.thinking, None);
    }

    #[test]
    fn test_malformed_lines_do_not_change_result() {
        let valid = [
            r#"{"message":{"content":"<think>a"}}"#,
            r#"{"message":{"content":"b</think>"}}"#,
            r#"{"message":{"content":"Answer"}}"#,
            r#"{"done":true}"#,
        ];
        let noisy = [
            "garbage",
            valid[0],
            "{\"message\":",
            "",
            valid[1],
            "}}}",
            valid[2],
            "[not an object]",
            valid[3],
        ];

        let fold = |lines: &[&str]| {
            let frames: Vec<Frame> = lines.iter().filter_map(|l| parse_frame(l)).collect();
            run(&frames, Duration::from_secs(2))
        };

        assert_eq!(fold(&noisy), fold(&valid));
        assert_eq!(fold(&valid).content, "Answer");
        assert_eq!(fold(&valid).thinking.as_deref(), Some("ab"));
    }

    #[test]
    fn test_empty_block_is_not_reasoning() {
        let b = run(&[answer("<think>\n\n</think>\n\nHello")], Duration::ZERO);
        assert_eq!(b.thinking(), None);
        assert_eq!(b.thinking_duration_seconds, None);
        assert_eq!(b.content, "Hello");
    }

    #[test]
    fn test_empty_block_still_gets_placeholder() {
        let b = run(
            &[answer("<think>\n"), answer("\n</think>\n\nHello")],
            Duration::from_secs(3),
        );
        assert!(b.thinking_is_placeholder);
        assert_eq!(b.thinking(), Some("Processed for 3 seconds before responding."));
        assert_eq!(b.thinking_duration_seconds, Some(3));
        assert_eq!(b.content, "Hello");
    }

    #[test]
    fn test_placeholder_note_wording() {
        assert_eq!(placeholder_note(1), "Processed for 1 second before responding.");
        assert_eq!(placeholder_note(7), "Processed for 7 seconds before responding.");
    }
}
