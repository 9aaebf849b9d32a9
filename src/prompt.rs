//! Upstream context shaping.
//!
//! The token-streaming provider receives a bounded list of turns; the
//! whole-response provider receives one flattened text block. Both start with
//! a persona preamble that keeps the assistant on programming topics.

use crate::conversation::{Role, Turn};

pub const CHATGPT_PERSONA: &str = "\
You are an expert coding assistant with deep knowledge of software development. You can:
1. Answer code-related questions and help with debugging
2. Write code examples with clear explanations
3. Explain programming concepts and best practices
4. Advise on software architecture and design patterns
5. Walk through development workflows and tooling

Format all code as markdown code blocks with the appropriate language tag.
Keep responses focused on programming and development topics only.";

pub const GEMINI_PERSONA: &str = "\
You are a specialized coding assistant focused on practical software development. Your expertise includes:
1. Writing efficient, maintainable code
2. Debugging complex issues
3. Applying modern development practices
4. Explaining technical concepts clearly
5. Giving actionable solutions

Include code examples when relevant, using markdown formatting.
Stay on technical and development-related topics only.";

pub const TRUNCATION_MARKER: &str = "... Earlier conversation history ...";

pub const DEFAULT_HISTORY_WINDOW: usize = 6;

/// Build `[persona, ...history, message]`, collapsing it to
/// `[persona, marker, ...last window]` once it exceeds `window` entries.
///
/// The result never holds more than `window + 2` turns.
pub fn bounded_context(persona: &str, history: &[Turn], message: &str, window: usize) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(Turn::new(Role::System, persona));
    turns.extend(history.iter().cloned());
    turns.push(Turn::new(Role::User, message));

    if turns.len() <= window {
        return turns;
    }

    let tail = turns.split_off(turns.len() - window);
    let mut out = Vec::with_capacity(window + 2);
    out.push(turns.swap_remove(0));
    out.push(Turn::new(Role::System, TRUNCATION_MARKER));
    out.extend(tail);
    out
}

pub fn flatten_prompt(persona: &str, history: &[Turn], message: &str) -> String {
    let formatted = history
        .iter()
        .map(|t| format!("{}: {}", t.role, t.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{persona}\n\nConversation history:\n{formatted}\n\nUser question: {message}")
}
