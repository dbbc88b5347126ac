//! Conversation-context assembly.
//!
//! Converts a raw, possibly-long message history into a bounded,
//! role-ordered window suitable for prompting. Assembly is a pure
//! function of its input: identical histories always produce identical
//! contexts, with no random or time-dependent logic.

use neurochat_core::message::{Role, Utterance};

/// Limits applied while assembling a context window.
#[derive(Debug, Clone)]
pub struct ContextLimits {
    /// How many prior turns to retain.
    pub window: usize,
    /// Per-message truncation limit, in characters.
    pub max_content_length: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            window: 5,
            max_content_length: 300,
        }
    }
}

impl From<&neurochat_config::ContextConfig> for ContextLimits {
    fn from(cfg: &neurochat_config::ContextConfig) -> Self {
        Self {
            window: cfg.window,
            max_content_length: cfg.max_content_length,
        }
    }
}

/// Assemble a bounded conversation context from stored history.
///
/// Takes the last `window` valid utterances in stored order. Elements
/// with blank content are dropped before windowing, as are system
/// turns — the persona block is owned by the prompt template, not the
/// history. Each surviving content is truncated to
/// `max_content_length` characters on a char boundary.
///
/// Guarantees: result length ≤ `window`; every element has a
/// conversational role and non-empty content; relative order preserved
/// (oldest first). Empty or entirely-invalid history yields an empty
/// context.
pub fn assemble(history: &[Utterance], limits: &ContextLimits) -> Vec<Utterance> {
    let valid: Vec<&Utterance> = history
        .iter()
        .filter(|u| u.role != Role::System && !u.content.trim().is_empty())
        .collect();

    let start = valid.len().saturating_sub(limits.window);
    valid[start..]
        .iter()
        .map(|u| Utterance {
            role: u.role,
            content: truncate_chars(&u.content, limits.max_content_length),
            timestamp: u.timestamp,
        })
        .collect()
}

/// Truncate to at most `max` characters, respecting char boundaries.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(n: usize) -> Vec<Utterance> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Utterance::user(format!("question {i}"))
                } else {
                    Utterance::assistant(format!("answer {i}"))
                }
            })
            .collect()
    }

    #[test]
    fn window_invariant() {
        let limits = ContextLimits::default();
        for k in 0..12 {
            let history = turns(k);
            let context = assemble(&history, &limits);
            assert_eq!(context.len(), k.min(limits.window));
        }
    }

    #[test]
    fn keeps_last_window_in_order() {
        let history = turns(8);
        let context = assemble(&history, &ContextLimits::default());
        assert_eq!(context.len(), 5);
        // Last five of eight: indexes 3..8, oldest first
        assert_eq!(context[0].content, "answer 3");
        assert_eq!(context[4].content, "answer 7");
    }

    #[test]
    fn truncation_invariant() {
        let limits = ContextLimits {
            window: 5,
            max_content_length: 10,
        };
        let history = vec![Utterance::user("a".repeat(50)), Utterance::assistant("short")];
        let context = assemble(&history, &limits);
        for u in &context {
            assert!(u.content.chars().count() <= limits.max_content_length);
        }
        assert_eq!(context[0].content.len(), 10);
        assert_eq!(context[1].content, "short");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let limits = ContextLimits {
            window: 5,
            max_content_length: 3,
        };
        let history = vec![Utterance::user("привет мир")];
        let context = assemble(&history, &limits);
        assert_eq!(context[0].content, "при");
    }

    #[test]
    fn blank_content_dropped_before_windowing() {
        let limits = ContextLimits {
            window: 2,
            max_content_length: 300,
        };
        let history = vec![
            Utterance::user("first"),
            Utterance::assistant("   "),
            Utterance::user("second"),
            Utterance::assistant(""),
        ];
        let context = assemble(&history, &limits);
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].content, "first");
        assert_eq!(context[1].content, "second");
    }

    #[test]
    fn system_turns_excluded() {
        let history = vec![
            Utterance::system("persona block"),
            Utterance::user("hello"),
        ];
        let context = assemble(&history, &ContextLimits::default());
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].role, Role::User);
    }

    #[test]
    fn empty_history_yields_empty_context() {
        assert!(assemble(&[], &ContextLimits::default()).is_empty());
        let all_blank = vec![Utterance::user(""), Utterance::assistant("  ")];
        assert!(assemble(&all_blank, &ContextLimits::default()).is_empty());
    }

    #[test]
    fn assembly_is_deterministic() {
        let history = turns(7);
        let limits = ContextLimits::default();
        assert_eq!(assemble(&history, &limits), assemble(&history, &limits));
    }
}
