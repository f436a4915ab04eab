//! Plain-text rendering of transcript entries for the terminal.

use coachsim_core::{FeedbackCategory, ParsedAssistantTurn, Role, Turn, parse_assistant_turn};

fn feedback_tag(category: FeedbackCategory) -> &'static str {
    match category {
        FeedbackCategory::GoodCoaching => "[+]",
        FeedbackCategory::PoorCoaching => "[-]",
        FeedbackCategory::NeedsImprovement => "[~]",
    }
}

pub fn persona_reply(persona_name: &str, parsed: &ParsedAssistantTurn) -> String {
    let mut out = format!("{}: {}", persona_name, parsed.persona_reply);
    if let Some(feedback) = &parsed.feedback {
        out.push_str(&format!(
            "\n  {} Feedback: {}",
            feedback_tag(feedback.category),
            feedback.text
        ));
    }
    out
}

pub fn turn(persona_name: &str, turn: &Turn) -> String {
    match turn.role() {
        Role::User => format!("You: {}", turn.text().trim()),
        Role::Assistant => persona_reply(persona_name, &parse_assistant_turn(turn.text())),
    }
}

pub fn banner(title: &str) -> String {
    let rule = "=".repeat(title.chars().count());
    format!("{rule}\n{title}\n{rule}")
}
