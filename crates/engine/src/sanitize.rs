//! Post-generation text cleanup.
//!
//! Raw model output may echo the prompt, continue into a hallucinated
//! next turn, or drift into a script the deployment disallows. The
//! sanitizer strips the echoed prompt prefix, cuts at the first turn
//! marker, removes configured character ranges, and normalizes
//! whitespace.

use crate::template::ChatTemplate;

/// A Unicode script whose characters can be stripped from replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Cyrillic,
    Han,
}

impl Script {
    /// Parse a config label. Unknown labels yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cyrillic" => Some(Self::Cyrillic),
            "han" => Some(Self::Han),
            _ => None,
        }
    }

    fn contains(&self, c: char) -> bool {
        match self {
            Self::Cyrillic => matches!(c, '\u{0400}'..='\u{04FF}' | '\u{0500}'..='\u{052F}'),
            Self::Han => matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}'),
        }
    }
}

/// Which character ranges to remove from sanitized output.
#[derive(Debug, Clone, Default)]
pub struct ScriptFilter {
    scripts: Vec<Script>,
}

impl ScriptFilter {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self { scripts }
    }

    /// Build from config labels, ignoring anything unrecognized
    /// (validation happens at config load).
    pub fn from_labels(labels: &[String]) -> Self {
        Self {
            scripts: labels.iter().filter_map(|l| Script::parse(l)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    fn allows(&self, c: char) -> bool {
        !self.scripts.iter().any(|s| s.contains(c))
    }
}

/// Sanitize raw model output into the final reply text.
///
/// Steps, in order: strip the echoed prompt prefix (the prompt is the
/// exact boundary to cut at), truncate at the first stop marker of the
/// template, drop disallowed characters, collapse whitespace runs to
/// single spaces, trim.
pub fn sanitize(raw: &str, prompt: &str, template: ChatTemplate, filter: &ScriptFilter) -> String {
    let mut text = raw.strip_prefix(prompt).unwrap_or(raw);

    if let Some(cut) = first_marker_index(text, template.stop_markers()) {
        text = &text[..cut];
    }

    let filtered: String = if filter.is_empty() {
        text.to_string()
    } else {
        text.chars().filter(|c| filter.allows(*c)).collect()
    };

    let words: Vec<&str> = filtered.split_whitespace().collect();
    words.join(" ")
}

/// Byte index of the earliest occurrence of any marker, if present.
fn first_marker_index(text: &str, markers: &[&str]) -> Option<usize> {
    markers.iter().filter_map(|m| text.find(m)).min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_echoed_prompt() {
        let prompt = "Instruct: sys\n\nUser: Hi\nAssistant:";
        let raw = format!("{prompt} Hello there");
        let out = sanitize(&raw, prompt, ChatTemplate::PlainRole, &ScriptFilter::default());
        assert_eq!(out, "Hello there");
    }

    #[test]
    fn cuts_at_hallucinated_turn() {
        let out = sanitize(
            "Hello! <User: foo",
            "",
            ChatTemplate::PlainRole,
            &ScriptFilter::default(),
        );
        assert_eq!(out, "Hello!");
    }

    #[test]
    fn cuts_at_earliest_marker() {
        let out = sanitize(
            "Sure.\nAssistant: and then User: asked",
            "",
            ChatTemplate::PlainRole,
            &ScriptFilter::default(),
        );
        assert_eq!(out, "Sure.");
    }

    #[test]
    fn chatml_markers_cut() {
        let out = sanitize(
            "The answer is 4.<|im_end|>\n<|im_start|>user\nmore",
            "",
            ChatTemplate::ChatML,
            &ScriptFilter::default(),
        );
        assert_eq!(out, "The answer is 4.");
    }

    #[test]
    fn strips_disallowed_scripts() {
        let filter = ScriptFilter::new(vec![Script::Cyrillic]);
        let out = sanitize("Hello привет world", "", ChatTemplate::PlainRole, &filter);
        assert_eq!(out, "Hello world");
    }

    #[test]
    fn han_filter() {
        let filter = ScriptFilter::new(vec![Script::Han]);
        let out = sanitize("ok 你好 done", "", ChatTemplate::PlainRole, &filter);
        assert_eq!(out, "ok done");
    }

    #[test]
    fn collapses_whitespace() {
        let out = sanitize(
            "  spaced\n\nout\t reply  ",
            "",
            ChatTemplate::PlainRole,
            &ScriptFilter::default(),
        );
        assert_eq!(out, "spaced out reply");
    }

    #[test]
    fn unknown_script_label_ignored() {
        let filter = ScriptFilter::from_labels(&["cyrillic".into(), "bogus".into()]);
        let out = sanitize("а b", "", ChatTemplate::PlainRole, &filter);
        assert_eq!(out, "b");
    }

    #[test]
    fn reply_never_contains_prompt_material() {
        let prompt = ChatTemplate::PlainRole.render(
            crate::template::DEFAULT_SYSTEM_PROMPT,
            &[neurochat_core::Utterance::user("Hi")],
            "What now?",
        );
        let raw = format!("{prompt} A short answer. User: echo");
        let out = sanitize(&raw, &prompt, ChatTemplate::PlainRole, &ScriptFilter::default());
        assert!(!out.contains("Instruct:"));
        assert!(!out.contains("User:"));
        assert_eq!(out, "A short answer.");
    }
}
