//! Post-processing for raw model output.
//!
//! Reasoning models served through Ollama (deepseek-r1, qwen3) may emit their
//! chain of thought wrapped in `<think>...</think>` even when told not to.
//! None of it may reach the user. The markup passes run in a fixed order; each
//! one assumes the previous ones already ran. Deleting a tag can splice its
//! neighbours into a new one (`<</think>think>`), so the markup passes repeat
//! until they change nothing.

use std::sync::LazyLock;

use regex::Regex;

/// Sent when nothing usable is left after cleanup.
pub const EMPTY_ANSWER_FALLBACK: &str = "我这次没有整理出有效的回答，换个说法再问一次吧。";

static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\s*think\s*>.*?<\s*/\s*think\s*>").expect("valid think block regex")
});

static THINK_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*think\s*>").expect("valid think open regex"));

static THINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*/?\s*think\s*/?\s*>").expect("valid think tag regex"));

static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

/// Strips reasoning markup from `raw` and tidies whitespace.
///
/// Never returns an empty string: if nothing survives, the result is
/// [`EMPTY_ANSWER_FALLBACK`].
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.to_string();
    loop {
        let next = strip_markup(&text);
        if next == text {
            break;
        }
        text = next;
    }

    let text = BLANK_RUN.replace_all(&text, "\n\n");
    let text = text.trim();

    if text.is_empty() {
        tracing::debug!("model output empty after sanitizing, using fallback");
        return EMPTY_ANSWER_FALLBACK.to_string();
    }
    text.to_string()
}

/// One round of block removal, truncation and stray-tag stripping.
/// Every change shortens the text, so repeating it terminates.
fn strip_markup(raw: &str) -> String {
    let text = THINK_BLOCK.replace_all(raw, "");

    // Generation stopped inside a reasoning block; everything after the
    // opening tag is reasoning.
    let text = match THINK_OPEN.find(&text) {
        Some(m) => &text[..m.start()],
        None => &text[..],
    };

    THINK_TAG.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_complete_block() {
        assert_eq!(sanitize("<think>reasoning</think>Hello there"), "Hello there");
    }

    #[test]
    fn removes_multiline_block_case_insensitively() {
        let raw = "<THINK>\nstep 1\nstep 2\n</Think>\n\n答案是 42。";
        assert_eq!(sanitize(raw), "答案是 42。");
    }

    #[test]
    fn removes_every_block_non_greedily() {
        let raw = "<think>a</think>first <think>b</think>second";
        assert_eq!(sanitize(raw), "first second");
    }

    #[test]
    fn tolerates_whitespace_inside_tags() {
        assert_eq!(sanitize("< think >x</ think >ok"), "ok");
    }

    #[test]
    fn unclosed_block_truncates_at_marker() {
        assert_eq!(
            sanitize("Here is the answer.<think>but wait, maybe"),
            "Here is the answer."
        );
    }

    #[test]
    fn unclosed_block_after_complete_block() {
        let raw = "<think>plan</think>Answer.\n<think>second thoughts";
        assert_eq!(sanitize(raw), "Answer.");
    }

    #[test]
    fn stray_closing_tag_is_dropped() {
        assert_eq!(sanitize("leftover</think> answer"), "leftover answer");
    }

    #[test]
    fn self_closing_tag_is_dropped() {
        assert_eq!(sanitize("answer<think/>"), "answer");
        assert_eq!(sanitize("a< THINK / >b"), "ab");
    }

    #[test]
    fn tag_spliced_by_stray_removal_still_truncates() {
        assert_eq!(sanitize("answer <</think>think>secret reasoning"), "answer");
        assert_eq!(sanitize("answer <</think>/think> rest"), "answer  rest");
    }

    #[test]
    fn collapses_blank_runs() {
        assert_eq!(sanitize("one\n\n\n\n\ntwo\n\n\nthree"), "one\n\ntwo\n\nthree");
    }

    #[test]
    fn keeps_double_newlines() {
        assert_eq!(sanitize("one\n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn only_reasoning_falls_back() {
        assert_eq!(sanitize("<think>all thinking</think>"), EMPTY_ANSWER_FALLBACK);
        assert_eq!(sanitize("<think>never closed"), EMPTY_ANSWER_FALLBACK);
        assert_eq!(sanitize("   \n\n  "), EMPTY_ANSWER_FALLBACK);
        assert_eq!(sanitize(""), EMPTY_ANSWER_FALLBACK);
    }

    #[test]
    fn clean_text_is_unchanged() {
        let clean = "第一步：打开设置。\n\n第二步：点击保存。";
        assert_eq!(sanitize(clean), clean);
        assert_eq!(sanitize(&sanitize(clean)), clean);
    }

    #[test]
    fn clean_text_is_only_trimmed() {
        assert_eq!(sanitize("  padded answer \n"), "padded answer");
    }

    #[test]
    fn output_never_contains_markers() {
        let inputs = [
            "<think>a</think>b",
            "a<think>b",
            "a</think>b<think>",
            "<think><think>nested</think>tail</think>after",
            "x</THINK></think>y",
            "answer <</think>think>secret reasoning",
            "answer<think/>",
            "<<<</think>/think>think>think>deep",
        ];
        for raw in inputs {
            let out = sanitize(raw).to_lowercase();
            assert!(!out.contains("<think>"), "{raw:?} -> {out:?}");
            assert!(!out.contains("</think>"), "{raw:?} -> {out:?}");
            assert!(!out.contains("<think/>"), "{raw:?} -> {out:?}");
            assert!(!out.is_empty());
        }
    }
}
