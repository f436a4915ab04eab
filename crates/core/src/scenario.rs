//! Training Scenario Content
//!
//! A scenario bundles everything fixed about one training module: the briefing shown
//! before the dialogue, the persona's instructions and opening line, the few-shot
//! exemplars that teach the reply format, the action-plan instruction and the
//! termination policy. The default is the PAR90 collections-coaching module.

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::Path};
use tracing::info;

/// Lowercase phrase that, when present in the persona's latest reply, ends the dialogue.
pub const DEFAULT_CLOSING_PHRASE: &str = "great, thanks for the help.";

/// Transcript length (seed turn included) at which the dialogue ends: the opener plus
/// at most four manager/persona exchanges, with the fourth reply landing past the limit.
pub const DEFAULT_TRANSCRIPT_LIMIT: usize = 8;

/// Prompt file stem overriding [`Scenario::persona_prompt`].
pub const PERSONA_PROMPT_KEY: &str = "persona_system";
/// Prompt file stem overriding [`Scenario::action_plan_prompt`].
pub const ACTION_PLAN_PROMPT_KEY: &str = "action_plan_system";

const TITLE: &str = "PAR Reduction Training Module";

const INTRO: &str = "Welcome, Branch Manager! This module will help you understand PAR90 and practice coaching your CSRs.

What is PAR90 and why does it matter?

PAR90 stands for \"Portfolio at Risk 90 days.\" It measures the percentage of your loan portfolio that is 1-90 days past due. It's a key metric for financial health.

Why it matters: a low PAR90 indicates strong loan performance, which directly impacts your branch's profitability and reputation. High PAR90 suggests CSRs may need better coaching on collection techniques.

The connection to performance: improving PAR90 requires coaching CSRs on daily behaviors like making timely, empathetic, and effective collection calls. A CSR who masters these skills contributes directly to your branch's success.";

const PERSONA_NAME: &str = "Alex";

const PERSONA_PROMPT: &str = "You are an AI simulating a professional CSR named Alex. Your goal is to respond to your manager's coaching and provide real-time feedback on their responses. End every reply with 'Feedback:' followed by a single sentence that explains why the response was 'Good Coaching', 'Poor Coaching', or 'Needs Improvement'. Once your manager has given you a clear, workable plan, close the conversation by saying 'Great, thanks for the help.'";

const OPENING_LINE: &str = "Hey, thanks for meeting with me. I'm a little worried about our collections. It's tough because a lot of customers get upset and it feels like I'm just bothering them.";

const ACTION_PLAN_PROMPT: &str = "You are a professional HR coach. Based on the following conversation transcript, generate a concise, simple action plan for the branch manager. The plan should be a bulleted list of 3-5 concrete, actionable steps.";

const EXEMPLARS: [(&str, &str); 3] = [
    (
        "I think my team is a little burnt out with the constant collections push.",
        "You're right, that's a valid concern. How can we make the task feel more manageable and less like a burden? Feedback: Good Coaching. You've validated their feelings and opened a collaborative discussion.",
    ),
    (
        "Just tell me what to do to make the customer pay.",
        "While that's a direct approach, it might not lead to a lasting solution. Let's focus on strategies that address the customer's situation, not just the debt. Feedback: Needs Improvement. This response is too direct and doesn't address the CSR's underlying issue.",
    ),
    (
        "You just need to be tougher with customers. It's your job.",
        "I hear your frustration, but aggressive tactics often backfire. Let's focus on empathy and problem-solving, which builds trust and improves long-term outcomes. Feedback: Poor Coaching. This response is critical and does not offer a solution or encourage a positive behavior change.",
    ),
];

/// A fixed manager message paired with the persona reply it should elicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exemplar {
    pub manager: String,
    pub persona: String,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub title: String,
    pub intro: String,
    pub persona_name: String,
    pub persona_prompt: String,
    pub opening_line: String,
    pub exemplars: Vec<Exemplar>,
    pub action_plan_prompt: String,
    pub closing_phrase: String,
    pub transcript_limit: usize,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::par90()
    }
}

impl Scenario {
    /// The PAR90 collections-coaching module with the persona Alex.
    pub fn par90() -> Self {
        Self {
            title: TITLE.to_string(),
            intro: INTRO.to_string(),
            persona_name: PERSONA_NAME.to_string(),
            persona_prompt: PERSONA_PROMPT.to_string(),
            opening_line: OPENING_LINE.to_string(),
            exemplars: EXEMPLARS
                .iter()
                .map(|(manager, persona)| Exemplar {
                    manager: manager.to_string(),
                    persona: persona.to_string(),
                })
                .collect(),
            action_plan_prompt: ACTION_PLAN_PROMPT.to_string(),
            closing_phrase: DEFAULT_CLOSING_PHRASE.to_string(),
            transcript_limit: DEFAULT_TRANSCRIPT_LIMIT,
        }
    }

    /// Replaces system prompts with any `persona_system.md` / `action_plan_system.md`
    /// found in `prompts_path`. Missing files keep the built-in text.
    pub fn with_prompt_overrides(mut self, prompts_path: &Path) -> Result<Self> {
        let mut prompts = load_prompts(prompts_path)?;
        if let Some(prompt) = prompts.remove(PERSONA_PROMPT_KEY) {
            info!(path = %prompts_path.display(), "Using persona prompt override");
            self.persona_prompt = prompt;
        }
        if let Some(prompt) = prompts.remove(ACTION_PLAN_PROMPT_KEY) {
            info!(path = %prompts_path.display(), "Using action plan prompt override");
            self.action_plan_prompt = prompt;
        }
        Ok(self)
    }

    /// Whether a raw persona reply contains the closing phrase.
    pub fn is_closing_reply(&self, raw_reply: &str) -> bool {
        raw_reply.to_lowercase().contains(&self.closing_phrase)
    }
}

/// Loads every `*.md` file in a directory, keyed by file stem.
pub fn load_prompts(prompts_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Could not read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Could not read prompt {}", path.display()))?;
            prompts.insert(prompt_key, content.trim().to_string());
        }
    }
    Ok(prompts)
}
