//! Chat-template strategy.
//!
//! Different model families expect different turn markers, so the
//! prompt format is a pluggable capability rather than a hard-coded
//! string: `render` builds the prompt (always ending with an open
//! assistant turn) and `stop_markers` tells the sanitizer where a
//! hallucinated next turn begins.
//!
//! Rendering is byte-deterministic: identical inputs produce identical
//! prompts. Sampling randomness lives entirely in the generation step.

use neurochat_core::message::{Role, Utterance};

/// Default persona block used when the configuration does not override it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. \
Reply in the same language the user writes in. Keep answers short and \
to the point, and use plain text without markup.";

/// Chat template format used to structure a prompt for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTemplate {
    /// `Instruct: {system}` header, then `User:` / `Assistant:` lines
    PlainRole,
    /// `<|im_start|>role\n{content}<|im_end|>` blocks
    ChatML,
    /// `<|user|>\n{content}</s>` blocks
    TinyLlama,
}

impl ChatTemplate {
    /// Pick the template for a model identifier.
    ///
    /// Preset aliases map to their family's expected format; explicit
    /// GGUF paths default to ChatML, everything else to plain role
    /// prefixes.
    pub fn for_model(model_id: &str) -> Self {
        let id = model_id.to_lowercase();
        if id.ends_with(".gguf") {
            return Self::ChatML;
        }
        if id.starts_with("phi") {
            Self::PlainRole
        } else if id.contains("tinyllama") || id.contains("tiny-llama") {
            Self::TinyLlama
        } else if id.starts_with("smollm") || id.starts_with("qwen") {
            Self::ChatML
        } else {
            Self::PlainRole
        }
    }

    /// Format the prompt: system block, context turns, the current
    /// user utterance, and an open assistant marker with no trailing
    /// content.
    pub fn render(&self, system: &str, context: &[Utterance], current_user: &str) -> String {
        match self {
            Self::PlainRole => Self::render_plain(system, context, current_user),
            Self::ChatML => Self::render_chatml(system, context, current_user),
            Self::TinyLlama => Self::render_tinyllama(system, context, current_user),
        }
    }

    /// Markers at which a reply is cut: anything past the first of
    /// these is the model hallucinating the next turn.
    pub fn stop_markers(&self) -> &'static [&'static str] {
        match self {
            Self::PlainRole => &["<User:", "User:", "<Assistant:", "\nAssistant:", "Instruct:"],
            Self::ChatML => &["<|im_start|>", "<|im_end|>", "<|endoftext|>"],
            Self::TinyLlama => &["<|user|>", "<|system|>", "<|assistant|>", "</s>"],
        }
    }

    /// The open assistant marker every rendered prompt ends with.
    pub fn assistant_open(&self) -> &'static str {
        match self {
            Self::PlainRole => "Assistant:",
            Self::ChatML => "<|im_start|>assistant\n",
            Self::TinyLlama => "<|assistant|>\n",
        }
    }

    fn role_label(role: Role) -> &'static str {
        match role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }

    fn render_plain(system: &str, context: &[Utterance], current_user: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str("Instruct: ");
        prompt.push_str(system);
        prompt.push_str("\n\n");
        for turn in context {
            prompt.push_str(Self::role_label(turn.role));
            prompt.push_str(": ");
            prompt.push_str(&turn.content);
            prompt.push('\n');
        }
        prompt.push_str("User: ");
        prompt.push_str(current_user);
        prompt.push('\n');
        prompt.push_str("Assistant:");
        prompt
    }

    fn render_chatml(system: &str, context: &[Utterance], current_user: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str("<|im_start|>system\n");
        prompt.push_str(system);
        prompt.push_str("<|im_end|>\n");
        for turn in context {
            prompt.push_str("<|im_start|>");
            prompt.push_str(turn.role.as_str());
            prompt.push('\n');
            prompt.push_str(&turn.content);
            prompt.push_str("<|im_end|>\n");
        }
        prompt.push_str("<|im_start|>user\n");
        prompt.push_str(current_user);
        prompt.push_str("<|im_end|>\n");
        prompt.push_str("<|im_start|>assistant\n");
        prompt
    }

    fn render_tinyllama(system: &str, context: &[Utterance], current_user: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str("<|system|>\n");
        prompt.push_str(system);
        prompt.push_str("</s>\n");
        for turn in context {
            match turn.role {
                Role::User | Role::System => prompt.push_str("<|user|>\n"),
                Role::Assistant => prompt.push_str("<|assistant|>\n"),
            }
            prompt.push_str(&turn.content);
            prompt.push_str("</s>\n");
        }
        prompt.push_str("<|user|>\n");
        prompt.push_str(current_user);
        prompt.push_str("</s>\n");
        prompt.push_str("<|assistant|>\n");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> Vec<Utterance> {
        vec![
            Utterance::user("What is Rust?"),
            Utterance::assistant("A systems programming language."),
        ]
    }

    #[test]
    fn model_resolution() {
        assert_eq!(ChatTemplate::for_model("phi2"), ChatTemplate::PlainRole);
        assert_eq!(ChatTemplate::for_model("tinyllama"), ChatTemplate::TinyLlama);
        assert_eq!(ChatTemplate::for_model("smollm:135m"), ChatTemplate::ChatML);
        assert_eq!(ChatTemplate::for_model("qwen:0.5b"), ChatTemplate::ChatML);
        assert_eq!(
            ChatTemplate::for_model("/models/custom.gguf"),
            ChatTemplate::ChatML
        );
        assert_eq!(ChatTemplate::for_model("unknown"), ChatTemplate::PlainRole);
    }

    #[test]
    fn plain_role_shape() {
        let prompt =
            ChatTemplate::PlainRole.render(DEFAULT_SYSTEM_PROMPT, &sample_context(), "Tell me more");
        assert!(prompt.starts_with("Instruct: "));
        assert!(prompt.contains("User: What is Rust?\n"));
        assert!(prompt.contains("Assistant: A systems programming language.\n"));
        assert!(prompt.contains("User: Tell me more\n"));
        assert!(prompt.ends_with("Assistant:"));
    }

    #[test]
    fn chatml_shape() {
        let prompt = ChatTemplate::ChatML.render("Be helpful.", &sample_context(), "Hi");
        assert!(prompt.starts_with("<|im_start|>system\n"));
        assert!(prompt.contains("<|im_start|>user\nWhat is Rust?<|im_end|>\n"));
        assert!(prompt.contains("<|im_start|>assistant\nA systems programming language.<|im_end|>\n"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn tinyllama_shape() {
        let prompt = ChatTemplate::TinyLlama.render("Be helpful.", &sample_context(), "Hi");
        assert!(prompt.starts_with("<|system|>\nBe helpful.</s>\n"));
        assert!(prompt.contains("<|user|>\nWhat is Rust?</s>\n"));
        assert!(prompt.ends_with("<|assistant|>\n"));
    }

    #[test]
    fn rendering_is_byte_deterministic() {
        let context = sample_context();
        for template in [
            ChatTemplate::PlainRole,
            ChatTemplate::ChatML,
            ChatTemplate::TinyLlama,
        ] {
            let a = template.render(DEFAULT_SYSTEM_PROMPT, &context, "again");
            let b = template.render(DEFAULT_SYSTEM_PROMPT, &context, "again");
            assert_eq!(a, b);
            assert!(a.ends_with(template.assistant_open()));
        }
    }

    #[test]
    fn empty_context_still_renders_current_turn() {
        let prompt = ChatTemplate::PlainRole.render(DEFAULT_SYSTEM_PROMPT, &[], "Hi");
        assert!(prompt.contains("User: Hi\n"));
        assert!(prompt.ends_with("Assistant:"));
    }
}
