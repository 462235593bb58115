use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use assess_core::AssessmentSettings;
use assess_core::model::{LessonResult, ModuleId, Question};
use services::{
    AssessmentEngine, AssessmentError, AssessmentSession, RepositorySink, SessionPrompt,
    SessionStep, TokioTimer,
};
use storage::{QuestionBank, Storage};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::Instant;
use tracing::warn;

type Input = Lines<BufReader<Stdin>>;

/// Slack after the time limit so the session's own timer wins the race.
const EXPIRY_GRACE: Duration = Duration::from_millis(250);

pub async fn list_modules(storage: &Storage) -> Result<()> {
    let modules = storage.bank.list_modules().await?;
    if modules.is_empty() {
        println!("No modules in the catalog.");
    }
    for module in modules {
        let lessons = storage.bank.get_lessons(module.id()).await?;
        println!(
            "{:>4}  {} ({} lessons)",
            module.id(),
            module.title(),
            lessons.len()
        );
    }
    Ok(())
}

pub async fn run(storage: Storage, module: Option<u64>, time_limit: u32) -> Result<()> {
    let settings = AssessmentSettings::default().with_time_limit(time_limit)?;
    let engine = AssessmentEngine::new(
        Arc::clone(&storage.bank),
        Arc::new(TokioTimer::new()),
        Arc::new(RepositorySink::new(Arc::clone(&storage.outcomes))),
    )
    .with_settings(settings);

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let module_id = match module {
        Some(id) => ModuleId::new(id),
        None => choose_module(&storage, &mut input).await?,
    };

    let (session, step) = engine.start_session(module_id).await?;
    let result = drive(&session, step, &mut input).await;
    if result.is_err() {
        // leaving early must not leave a timer running against the session
        session.abort().await.ok();
    }
    result
}

async fn choose_module(storage: &Storage, input: &mut Input) -> Result<ModuleId> {
    list_modules(storage).await?;
    loop {
        println!("Select a module id:");
        let line = next_line(input).await?;
        match line.trim().parse::<u64>() {
            Ok(id) => return Ok(ModuleId::new(id)),
            Err(_) => println!("Not a module id: {}", line.trim()),
        }
    }
}

async fn drive(session: &AssessmentSession, step: SessionStep, input: &mut Input) -> Result<()> {
    let mut prompt = step.prompt;
    let mut pending = None;

    loop {
        match prompt.clone() {
            SessionPrompt::Confidence {
                lesson,
                position,
                total,
            } => {
                println!();
                println!("[{position}/{total}] {}", lesson.name());
                println!("Are you confident in this topic? [y/n]");
                let line = next_line(input).await?;
                let Some(confident) = parse_yes_no(&line) else {
                    println!("Please answer y or n.");
                    continue;
                };
                prompt = after(session, session.submit_confidence(confident).await).await?;
            }
            SessionPrompt::Question {
                lesson,
                question,
                ticket,
                number,
                time_limit_secs,
            } => {
                // set once per question so re-prompts keep the original deadline
                let (until, finished) = match pending {
                    Some(pending) => pending,
                    None => {
                        show_question(&lesson, &question, number, time_limit_secs);
                        let limit = Duration::from_secs(u64::from(time_limit_secs));
                        let issued = (
                            Instant::now() + limit + EXPIRY_GRACE,
                            session.progress().await.completed_lessons,
                        );
                        pending = Some(issued);
                        issued
                    }
                };

                tokio::select! {
                    line = input.next_line() => {
                        let line = line?.context("input closed")?;
                        let label = line.trim();
                        if !label.is_empty() && !question.options().contains_key(&label.to_uppercase()) {
                            println!("Choose one of {}.", labels(&question));
                            continue;
                        }
                        let label = (!label.is_empty()).then_some(label);
                        match session.submit_answer(&ticket, label).await {
                            Err(AssessmentError::DoubleSubmission(_)) => {
                                prompt = timed_out(session, finished).await?;
                            }
                            outcome => prompt = after(session, outcome).await?,
                        }
                    }
                    () = tokio::time::sleep_until(until) => {
                        prompt = timed_out(session, finished).await?;
                    }
                }
                pending = None;
            }
            SessionPrompt::Completed { .. } => break,
        }
    }

    let outcome = match session.outcome().await {
        Some(outcome) if session.is_published().await => outcome,
        _ => session.finalize().await?,
    };
    println!();
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Print the classification of a finished lesson and pick the next prompt.
async fn after(
    session: &AssessmentSession,
    step: Result<SessionStep, AssessmentError>,
) -> Result<SessionPrompt> {
    match step {
        Ok(step) => {
            if let Some(result) = &step.classified {
                show_result(result);
            }
            Ok(step.prompt)
        }
        Err(AssessmentError::Sink(err)) => {
            warn!(error = %err, "outcome not stored yet; retrying after the last lesson");
            current(session).await
        }
        Err(err) => Err(err.into()),
    }
}

/// The session's timer recorded the answer. Print the lesson's classification
/// if that finished it.
async fn timed_out(session: &AssessmentSession, finished_before: usize) -> Result<SessionPrompt> {
    println!("Time's up! The question was recorded as unanswered.");
    if session.progress().await.completed_lessons > finished_before {
        if let Some(result) = session.last_result().await {
            show_result(&result);
        }
    }
    current(session).await
}

async fn current(session: &AssessmentSession) -> Result<SessionPrompt> {
    match session.current_prompt().await {
        Some(prompt) => Ok(prompt),
        None => bail!("session is no longer active"),
    }
}

async fn next_line(input: &mut Input) -> Result<String> {
    input.next_line().await?.context("input closed")
}

fn parse_yes_no(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

fn labels(question: &Question) -> String {
    question
        .options()
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn show_question(lesson: &str, question: &Question, number: usize, time_limit_secs: u32) {
    println!();
    println!(
        "{lesson} - question {number} ({}, {time_limit_secs}s)",
        question.difficulty()
    );
    println!("{}", question.prompt());
    for (label, text) in question.options() {
        println!("  {label}) {text}");
    }
    println!("Answer with a label, or press enter to skip:");
}

fn show_result(result: &LessonResult) {
    println!(
        "{}: {} ({:.0}% correct). {}",
        result.lesson_name(),
        result.category().as_str(),
        result.accuracy(),
        result.recommendation()
    );
}
