//! Prompt templates for question condensation and grounded answering.

use lexcase_core::{Document, History};

use crate::llm::PromptMessage;

pub const CONTEXTUALIZE_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question which might reference \
context in the chat history, formulate a standalone question which can be \
understood without the chat history. Do NOT answer the question, just \
reformulate it if needed.";

const CONTEXT_PLACEHOLDER: &str = "{context}";

pub const QA_SYSTEM_PROMPT: &str = "You are a Senior Legal Research Assistant with forensic precision.

CRITICAL INSTRUCTIONS:
1. Zero External Knowledge: Answer ONLY based on provided Context
2. No Hallucination: If not in context, state clearly
3. Evidence-Based: Support every claim with specific references
4. Formal Tone: Maintain professional, objective language

OUTPUT FORMAT:

Executive Summary:
[2-3 sentence direct answer]

Relevant Precedents & Analysis:
• [Case/Section]: [Key holding]
• [Case/Section]: [Key holding]

Conclusion:
[Final summary based on context]

CONTEXT:
{context}";

const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Concatenate document contents, in order, separated by a blank line.
pub fn stuff_documents(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| d.page_content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

fn with_history(system: String, history: &History, input: &str) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.turns.len() + 2);
    messages.push(PromptMessage::system(system));
    messages.extend(history.turns.iter().map(PromptMessage::from));
    messages.push(PromptMessage::user(input));
    messages
}

/// System, prior turns, then the latest question.
pub fn condense_messages(history: &History, input: &str) -> Vec<PromptMessage> {
    with_history(CONTEXTUALIZE_SYSTEM_PROMPT.to_string(), history, input)
}

pub fn qa_messages(docs: &[Document], history: &History, input: &str) -> Vec<PromptMessage> {
    let system = QA_SYSTEM_PROMPT.replace(CONTEXT_PLACEHOLDER, &stuff_documents(docs));
    with_history(system, history, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use lexcase_core::ChatMessage;

    fn history() -> History {
        History::from_messages(&[
            ChatMessage {
                role: "user".into(),
                content: "What is consideration?".into(),
            },
            ChatMessage {
                role: "assistant".into(),
                content: "Something of value exchanged.".into(),
            },
        ])
    }

    #[test]
    fn stuffing_joins_with_blank_lines() {
        let docs = [Document::new("one"), Document::new("two"), Document::new("three")];
        assert_eq!(stuff_documents(&docs), "one\n\ntwo\n\nthree");
        assert_eq!(stuff_documents(&[]), "");
    }

    #[test]
    fn condense_wraps_history() {
        let msgs = condense_messages(&history(), "Is it required for a deed?");
        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            [Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(msgs[0].content, CONTEXTUALIZE_SYSTEM_PROMPT);
        assert_eq!(msgs[3].content, "Is it required for a deed?");
    }

    #[test]
    fn qa_prompt_embeds_context() {
        let docs = [Document::new("Deeds need no consideration."), Document::new("Simple contracts do.")];
        let msgs = qa_messages(&docs, &History::default(), "Is consideration needed?");
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].content.ends_with("CONTEXT:\nDeeds need no consideration.\n\nSimple contracts do."));
        assert!(!msgs[0].content.contains(CONTEXT_PLACEHOLDER));
        assert_eq!(msgs[1], PromptMessage::user("Is consideration needed?"));
    }
}
