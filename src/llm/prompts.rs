//! Prompt text for each collaborator.
//!
//! Every prompt asks for a single JSON object whose keys match the
//! collaborator's reply type, so replies parse straight into the wire types.

use crate::services::{
    AgentRequest, FeedbackRequest, GrammarRequest, SuggestionRequest, TranslationRequest,
};

/// A system + user message pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn agent(request: &AgentRequest) -> Prompt {
    Prompt {
        system: format!(
            "You are a conversation partner helping someone practise {language}. \
             Stay in character for the scenario \"{scenario}\". Reply only in {language}, \
             naturally and briefly, as a real person in that situation would. \
             Respond with a JSON object: {{\"agentResponse\": \"<your reply>\"}}.",
            language = request.language,
            scenario = request.scenario,
        ),
        user: format!(
            "Conversation so far:\n{history}\n\nLatest user message: {input}",
            history = history_or_placeholder(&request.conversation_history),
            input = request.user_input,
        ),
    }
}

pub fn suggestion(request: &SuggestionRequest) -> Prompt {
    Prompt {
        system: format!(
            "You help a learner keep an open-ended {language} conversation going. \
             Offer one short, realistic thing the learner could say next, written in {language}. \
             Respond with a JSON object: {{\"suggestion\": \"<one sentence>\"}}.",
            language = request.language,
        ),
        user: format!(
            "Conversation so far:\n{}",
            history_or_placeholder(&request.conversation_history)
        ),
    }
}

pub fn translation(request: &TranslationRequest) -> Prompt {
    Prompt {
        system: format!(
            "Translate text from {source} into {target}. Keep the meaning and tone; \
             do not add commentary. Respond with a JSON object: \
             {{\"translatedText\": \"<translation>\"}}.",
            source = request.source_language,
            target = request.target_language,
        ),
        user: request.text_to_translate.clone(),
    }
}

pub fn grammar(request: &GrammarRequest) -> Prompt {
    Prompt {
        system: format!(
            "You are a {language} tutor. Review the learner's text for grammar, spelling \
             and word choice. Point out each mistake with a short explanation and a \
             correction; if the text is correct, say so and encourage the learner. \
             Respond with a JSON object: {{\"feedback\": \"<feedback>\"}}.",
            language = request.language,
        ),
        user: request.text_to_check.clone(),
    }
}

pub fn feedback(request: &FeedbackRequest) -> Prompt {
    let history = request
        .conversation_history
        .iter()
        .map(|entry| format!("{}: {}", entry.speaker.history_label(), entry.text))
        .collect::<Vec<_>>()
        .join("\n");
    Prompt {
        system: format!(
            "You are a {language} tutor reviewing a practice conversation set in the \
             scenario \"{scenario}\". Give the learner feedback on grammar, pronunciation \
             (as far as it shows in writing) and vocabulary, then an encouraging overall \
             summary. Respond with a JSON object with string fields \
             \"grammar\", \"pronunciation\", \"vocabulary\" and \"overall\".",
            language = request.language,
            scenario = request.scenario,
        ),
        user: format!("Conversation:\n{}", history_or_placeholder(&history)),
    }
}

fn history_or_placeholder(history: &str) -> &str {
    if history.trim().is_empty() {
        "(no messages yet)"
    } else {
        history
    }
}
