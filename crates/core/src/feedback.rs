//! Feedback Classification
//!
//! The persona is instructed to end every reply with a `Feedback:` segment grading the
//! manager's last message. This module splits an assistant turn at that marker and maps
//! the feedback text onto a fixed taxonomy. It only inspects formatting, so anything the
//! model phrases differently degrades to [`FeedbackCategory::NeedsImprovement`] or to
//! no feedback at all, never to an error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Delimiter between the persona's reply and the coaching feedback.
pub const FEEDBACK_MARKER: &str = "Feedback:";

const GOOD_COACHING: &str = "Good Coaching";
const POOR_COACHING: &str = "Poor Coaching";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackCategory {
    GoodCoaching,
    PoorCoaching,
    NeedsImprovement,
}

impl FeedbackCategory {
    /// Classifies a feedback segment. First match wins: good, then poor, else needs improvement.
    pub fn classify(feedback_text: &str) -> Self {
        if feedback_text.contains(GOOD_COACHING) {
            FeedbackCategory::GoodCoaching
        } else if feedback_text.contains(POOR_COACHING) {
            FeedbackCategory::PoorCoaching
        } else {
            FeedbackCategory::NeedsImprovement
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeedbackCategory::GoodCoaching => "Good Coaching",
            FeedbackCategory::PoorCoaching => "Poor Coaching",
            FeedbackCategory::NeedsImprovement => "Needs Improvement",
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The classified feedback segment of an assistant turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub category: FeedbackCategory,
    /// Trimmed text following the marker.
    pub text: String,
}

/// An assistant turn split into what the persona said and the feedback it gave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAssistantTurn {
    pub persona_reply: String,
    pub feedback: Option<Feedback>,
}

impl ParsedAssistantTurn {
    pub fn category(&self) -> Option<FeedbackCategory> {
        self.feedback.as_ref().map(|f| f.category)
    }
}

/// Splits raw assistant text at the first feedback marker and classifies the remainder.
pub fn parse_assistant_turn(text: &str) -> ParsedAssistantTurn {
    match text.split_once(FEEDBACK_MARKER) {
        Some((reply, feedback)) => {
            let feedback = feedback.trim();
            ParsedAssistantTurn {
                persona_reply: reply.trim().to_string(),
                feedback: Some(Feedback {
                    category: FeedbackCategory::classify(feedback),
                    text: feedback.to_string(),
                }),
            }
        }
        None => ParsedAssistantTurn {
            persona_reply: text.trim().to_string(),
            feedback: None,
        },
    }
}
