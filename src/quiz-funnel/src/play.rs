//! Interactive terminal run of the funnel.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use funnel_core::event_bus::{self, EventSink};
use funnel_core::{
    AnswerMap, AnswerValue, AppConfig, SessionContext, StepCatalog, StepDefinition, StepType,
};
use funnel_journey::store::{self, LocalStore};
use funnel_journey::{Advance, FunnelSequencer};
use funnel_reporting::strip_tags;
use funnel_web_sdk::StepTracker;
use tracing::{info, warn};

const PROGRESS_WIDTH: usize = 20;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Back,
    Quit,
    Continue,
    Select(Vec<usize>),
}

pub async fn run(
    config: &AppConfig,
    catalog: &StepCatalog,
    store: &dyn LocalStore,
    session: Arc<SessionContext>,
    fresh: bool,
) -> anyhow::Result<()> {
    let tracker = match StepTracker::spawn(&config.tracking, Arc::clone(&session)) {
        Ok(tracker) => Some(Arc::new(tracker)),
        Err(e) => {
            warn!(error = %e, "Tracking disabled");
            None
        }
    };
    let sink: Arc<dyn EventSink> = match &tracker {
        Some(tracker) => Arc::clone(tracker) as Arc<dyn EventSink>,
        None => event_bus::noop_sink(),
    };

    let persisted = store::load_order(store);
    let mut sequencer = FunnelSequencer::new(catalog, persisted.as_deref(), Arc::clone(&session))
        .with_event_sink(sink);

    if !fresh {
        if let Some(saved) = store::load_progress(store) {
            if sequencer.resume(saved) {
                println!("Resuming where you left off. Use --fresh to start over.");
            }
        }
    }
    sequencer.start();
    info!(session_id = %session.session_id(), "Quiz started");

    loop {
        let Some(step) = sequencer.current_step().cloned() else {
            break;
        };
        render_step(&sequencer, &step);

        if step.step_type == StepType::Sales {
            println!("  Thank you for completing the quiz!");
            break;
        }

        let multi = step.multi_select;
        let prompt = prompt_for(&step, sequencer.can_go_back());
        let Some(line) = read_line(prompt).await? else {
            break;
        };

        let mut ended = false;
        match parse_command(&line, step.options.len(), multi) {
            Ok(Command::Quit) => break,
            Ok(Command::Back) => {
                if !sequencer.go_back() {
                    println!("  Already at the first step.");
                }
            }
            Ok(Command::Continue) if step.options.is_empty() => {
                let patch = if step.step_type == StepType::Lead {
                    lead_patch(&step.id, &line)
                } else {
                    AnswerMap::new()
                };
                ended = advance(&mut sequencer, patch);
            }
            Ok(Command::Continue) => println!("  Please pick an option."),
            Ok(Command::Select(picked)) => {
                let values: Vec<String> = picked
                    .iter()
                    .map(|&i| step.options[i].value().to_string())
                    .collect();
                let answer = if multi {
                    let labels: Vec<&str> =
                        picked.iter().map(|&i| step.options[i].label()).collect();
                    println!("  Selected: {}", labels.join(", "));
                    match read_line("  Confirm? [Y/n] ".to_string()).await? {
                        Some(reply) if is_confirmation(&reply) => AnswerValue::Multi(values),
                        Some(_) => continue,
                        None => break,
                    }
                } else {
                    AnswerValue::Single(values[0].clone())
                };
                let mut patch = AnswerMap::new();
                patch.insert(step.id.clone(), answer);
                ended = advance(&mut sequencer, patch);
            }
            Err(msg) => println!("  {msg}"),
        }

        mirror_progress(store, &sequencer, ended);
        if ended {
            break;
        }
    }

    if let Some(tracker) = tracker {
        tracker.drain(DRAIN_TIMEOUT).await;
    }
    Ok(())
}

/// Returns true once the funnel has no further step.
fn advance(sequencer: &mut FunnelSequencer, patch: AnswerMap) -> bool {
    match sequencer.advance(patch) {
        Advance::Entered { .. } => false,
        Advance::EndOfFunnel => {
            println!("  End of the funnel.");
            true
        }
    }
}

/// Saves the run after a navigation, or forgets it once the run reached its
/// terminal step so the next `play` starts over.
fn mirror_progress(store: &dyn LocalStore, sequencer: &FunnelSequencer, ended: bool) {
    let at_sales = sequencer
        .current_step()
        .is_some_and(|s| s.step_type == StepType::Sales);
    if ended || at_sales {
        if let Err(e) = store::clear_progress(store) {
            warn!(error = %e, "Failed to clear quiz progress");
        }
        return;
    }
    if let Some(snapshot) = sequencer.progress_snapshot() {
        if let Err(e) = store::save_progress(store, &snapshot) {
            warn!(error = %e, "Failed to save quiz progress");
        }
    }
}

fn render_step(sequencer: &FunnelSequencer, step: &StepDefinition) {
    println!();
    if sequencer.shows_progress() {
        let fraction = sequencer.progress_fraction();
        let filled = (fraction * PROGRESS_WIDTH as f64).round() as usize;
        let counter = sequencer
            .question_position()
            .map(|(pos, total)| format!("  {pos} / {total}"))
            .unwrap_or_default();
        println!(
            "[{}{}] {:>3.0}%{}",
            "#".repeat(filled.min(PROGRESS_WIDTH)),
            ".".repeat(PROGRESS_WIDTH.saturating_sub(filled)),
            fraction * 100.0,
            counter
        );
    }
    if let Some(section) = &step.section {
        println!("{}", section);
    }
    if let Some(title) = &step.title {
        println!("{}", strip_tags(title));
    }
    if let Some(question) = &step.question {
        println!("{}", strip_tags(question));
    }
    for (key, value) in &step.extra {
        let shown = matches!(key.as_str(), "text" | "subtitle" | "copy" | "completeCopy");
        if let Some(text) = value.as_str().filter(|_| shown) {
            println!("{}", strip_tags(text));
        }
    }
    for (i, option) in step.options.iter().enumerate() {
        println!("  {:>2}) {}", i + 1, option.label());
    }
}

fn prompt_for(step: &StepDefinition, can_go_back: bool) -> String {
    let back = if can_go_back { ", b = back" } else { "" };
    if step.options.is_empty() {
        if step.step_type == StepType::Lead {
            format!("Your email (q = quit{back}): ")
        } else {
            format!("Press Enter to continue (q = quit{back}): ")
        }
    } else if step.multi_select {
        format!("Pick one or more, comma separated (q = quit{back}): ")
    } else {
        format!("Pick one (q = quit{back}): ")
    }
}

fn parse_command(input: &str, option_count: usize, multi: bool) -> Result<Command, String> {
    let input = input.trim();
    match input.to_lowercase().as_str() {
        "q" | "quit" => return Ok(Command::Quit),
        "b" | "back" => return Ok(Command::Back),
        _ => {}
    }
    if option_count == 0 {
        return Ok(Command::Continue);
    }
    if input.is_empty() {
        return Ok(Command::Continue);
    }

    let mut picked = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let n: usize = part
            .parse()
            .map_err(|_| format!("'{part}' is not an option number"))?;
        if n == 0 || n > option_count {
            return Err(format!("Option {n} does not exist (1-{option_count})"));
        }
        if !picked.contains(&(n - 1)) {
            picked.push(n - 1);
        }
    }
    if picked.is_empty() {
        return Ok(Command::Continue);
    }
    if !multi && picked.len() > 1 {
        return Err("Pick a single option".to_string());
    }
    Ok(Command::Select(picked))
}

fn is_confirmation(reply: &str) -> bool {
    matches!(reply.trim().to_lowercase().as_str(), "" | "y" | "yes" | "s" | "sim")
}

fn lead_patch(step_id: &str, line: &str) -> AnswerMap {
    let mut patch = AnswerMap::new();
    let value = line.trim();
    if !value.is_empty() {
        patch.insert(step_id, value);
    }
    patch
}

async fn read_line(prompt: String) -> anyhow::Result<Option<String>> {
    let line = tokio::task::spawn_blocking(move || -> io::Result<Option<String>> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line)?;
        Ok((read > 0).then_some(line))
    })
    .await??;
    Ok(line)
}
