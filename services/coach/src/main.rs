//! Terminal client for the coaching simulation.
//!
//! Shows the scenario briefing, runs the dialogue on stdin/stdout and prints the action
//! plan once the persona wraps up. Type `/retry` after a failed reply, `/reset` to start
//! over or `/quit` to leave.

mod render;

use anyhow::{Context, Result};
use clap::Parser;
use coachsim_core::{
    CoachingSession, ModelGateway, ParsedAssistantTurn, Phase, SimulationError,
    config::GatewayConfig,
};
use std::{fmt::Display, io::Write, path::PathBuf, sync::Arc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Practice coaching a simulated employee from the terminal")]
struct Cli {
    /// Chat model to use (overrides CHAT_MODEL).
    #[arg(long)]
    model: Option<String>,
    /// OpenAI-compatible base URL (overrides MODEL_BASE_URL).
    #[arg(long)]
    base_url: Option<String>,
    /// Directory with persona_system.md / action_plan_system.md overrides.
    #[arg(long)]
    prompts: Option<PathBuf>,
    /// Skip the scenario briefing.
    #[arg(long)]
    skip_intro: bool,
}

enum Input {
    Text(String),
    Retry,
    Reset,
    Quit,
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "/quit" | "/exit" => Input::Quit,
        "/retry" => Input::Retry,
        "/reset" => Input::Reset,
        text => Input::Text(text.to_string()),
    }
}

/// Line-based prompt over any input and output.
struct Terminal<R, W> {
    lines: Lines<R>,
    out: W,
}

impl<R: AsyncBufRead + Unpin, W: Write> Terminal<R, W> {
    fn new(input: R, out: W) -> Self {
        Self {
            lines: input.lines(),
            out,
        }
    }

    /// Prints `prompt` and reads one line. End of input reads as `/quit`.
    async fn ask(&mut self, prompt: &str) -> Result<Input> {
        write!(self.out, "{}", prompt)?;
        self.out.flush()?;
        let line = self.lines.next_line().await.context("Failed to read input")?;
        Ok(line.as_deref().map(parse_input).unwrap_or(Input::Quit))
    }

    fn say(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.out, "{}", text)?;
        Ok(())
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = GatewayConfig::from_env().context("Failed to load configuration")?;
    if let Some(model) = cli.model {
        config.chat_model = model;
    }
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if cli.prompts.is_some() {
        config.prompts_path = cli.prompts;
    }

    let scenario = Arc::new(config.load_scenario()?);
    let gateway = config.build_gateway();
    info!(model = %config.chat_model, base_url = %config.base_url, "Model gateway ready");

    let mut session = CoachingSession::new(scenario);
    let mut terminal = Terminal::new(BufReader::new(tokio::io::stdin()), std::io::stdout());
    run_simulation(&mut session, &gateway, &mut terminal, !cli.skip_intro).await
}

/// Drives the session through its phases until the manager quits or declines to start over.
async fn run_simulation<R, W>(
    session: &mut CoachingSession,
    gateway: &dyn ModelGateway,
    terminal: &mut Terminal<R, W>,
    mut show_intro: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        match session.phase() {
            Phase::Intro => {
                let scenario = session.scenario();
                terminal.say(format!("\n{}\n", render::banner(&scenario.title)))?;
                if show_intro {
                    terminal.say(format!("{}\n", scenario.intro))?;
                    show_intro = false;
                }
                let answer = terminal
                    .ask("Press Enter to start the coaching simulation (/quit to leave) ")
                    .await?;
                if let Input::Quit = answer {
                    break;
                }
                session.start()?;
                let persona = session.scenario().persona_name.clone();
                terminal.say(format!("\nCoaching simulation: \"{}\"\n", persona))?;
                for turn in session.transcript() {
                    terminal.say(format!("{}\n", render::turn(&persona, turn)))?;
                }
            }
            Phase::InProgress => match terminal.ask("You: ").await? {
                Input::Quit => break,
                Input::Reset => session.reset(),
                Input::Text(text) if text.is_empty() => {}
                Input::Text(text) => {
                    let outcome = session.submit_manager_turn(gateway, text).await;
                    report_turn(session, terminal, outcome)?;
                }
                Input::Retry => {
                    let outcome = session.retry_manager_turn(gateway).await;
                    report_turn(session, terminal, outcome)?;
                }
            },
            Phase::ActionPlanReady => {
                terminal.say("\nYour Action Plan\n\nGenerating action plan...\n")?;
                match session.generate_action_plan(gateway).await {
                    Ok(plan) => terminal.say(format!("{}\n", plan.trim()))?,
                    Err(SimulationError::ModelInvocation(e)) => {
                        warn!(error = %e, "Action plan generation failed");
                        terminal.say(format!("Could not generate the action plan: {}\n", e))?;
                        match terminal.ask("Press Enter to try again (/reset, /quit) ").await? {
                            Input::Quit => break,
                            Input::Reset => session.reset(),
                            Input::Text(_) | Input::Retry => {}
                        }
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
                match terminal.ask("Start over? [y/N] ").await? {
                    Input::Text(answer) if answer.eq_ignore_ascii_case("y") => session.reset(),
                    Input::Reset => session.reset(),
                    _ => break,
                }
            }
        }
    }

    terminal.say("Goodbye!")
}

/// Prints the persona's reply, or what went wrong with it.
fn report_turn<R, W: Write>(
    session: &CoachingSession,
    terminal: &mut Terminal<R, W>,
    outcome: Result<ParsedAssistantTurn, SimulationError>,
) -> Result<()> {
    match outcome {
        Ok(parsed) => {
            let persona = &session.scenario().persona_name;
            writeln!(terminal.out, "\n{}\n", render::persona_reply(persona, &parsed))?;
        }
        Err(SimulationError::ModelInvocation(e)) => {
            warn!(error = %e, "Persona reply failed");
            writeln!(terminal.out, "\nThe persona could not reply: {}", e)?;
            writeln!(
                terminal.out,
                "Type /retry to ask again, or /reset to start over.\n"
            )?;
        }
        Err(SimulationError::NothingToRetry) => {
            writeln!(terminal.out, "There is no unanswered message to retry.\n")?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}
