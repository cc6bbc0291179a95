use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use study_buddy::analysis::{AnalysisResult, ImageInput, ProblemInput, Subject};
use study_buddy::audio::{write_wav, PlaybackOutcome};
use study_buddy::diary::{DiaryEntry, DiaryKind, DiaryStore};
use study_buddy::integration::{FailurePolicy, TaskOrchestrator, TutorConfig};
use study_buddy::server;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "study-buddy", version, about = "Exam-question tutor backed by a generative-AI model")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Solve one problem and print every view
    Solve {
        /// math, physics, chemistry or diary
        #[arg(long, default_value = "math")]
        subject: Subject,

        /// Problem text
        #[arg(long)]
        text: Option<String>,

        /// Photo of the problem
        #[arg(long)]
        image: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Read the audio summary aloud
        #[arg(long)]
        speak: bool,
    },

    /// Summarize a text and read it aloud
    Speak {
        text: String,

        /// Also write the synthesized speech to a WAV file
        #[arg(long)]
        save_wav: Option<PathBuf>,
    },

    /// List past problems
    Diary {
        /// Remove every entry
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "study_buddy=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port } => run_server(port).await,
        Command::Solve {
            subject,
            text,
            image,
            json,
            speak,
        } => run_solve(subject, text, image, json, speak).await,
        Command::Speak { text, save_wav } => run_speak(&text, save_wav.as_deref()).await,
        Command::Diary { clear } => run_diary(clear),
    }
}

async fn run_server(port: Option<u16>) -> Result<()> {
    let mut config = TutorConfig::from_env()?
        .with_failure_policy(FailurePolicy::Strict)
        .without_audio_output();
    if let Some(port) = port {
        config = config.with_port(port);
    }

    info!("Starting Study Buddy service");
    let orchestrator = Arc::new(TaskOrchestrator::from_config(&config)?);
    server::serve(&config.server, orchestrator, shutdown_signal()).await
}

async fn run_solve(
    subject: Subject,
    text: Option<String>,
    image: Option<PathBuf>,
    json: bool,
    speak: bool,
) -> Result<()> {
    let config = TutorConfig::from_env()?;
    let orchestrator = TaskOrchestrator::from_config(&config)?;

    let mut input = ProblemInput {
        text,
        image: None,
    };
    if let Some(path) = &image {
        input = input.with_image(load_image(path)?);
    }

    let result = orchestrator.solve(subject, &input).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if !result.is_fallback() {
        record_diary(subject, image.as_deref(), input.text_or_empty());
    }

    if speak && !result.audio_summary.trim().is_empty() {
        match orchestrator.gateway().fetch_audio(&result.audio_summary).await? {
            Some(payload) => {
                let handle = orchestrator.playback().play(&payload)?;
                let _ = handle.finished().await;
            }
            None => warn!("No audio returned for the summary"),
        }
    }

    Ok(())
}

async fn run_speak(text: &str, save_wav: Option<&Path>) -> Result<()> {
    let config = TutorConfig::from_env()?;
    let orchestrator = TaskOrchestrator::from_config(&config)?;

    let Some(payload) = orchestrator.summarize_and_speak(text).await? else {
        println!("Nothing to say.");
        return Ok(());
    };

    if let Some(path) = save_wav {
        let samples = payload.decode()?;
        write_wav(path, &samples, orchestrator.playback().sample_rate())?;
        println!("Saved speech to {}", path.display());
    }

    let handle = orchestrator.playback().play(&payload)?;
    tokio::select! {
        outcome = handle.finished() => {
            if outcome == PlaybackOutcome::Completed {
                info!("Playback finished");
            }
        }
        _ = signal::ctrl_c() => {
            orchestrator.stop_speaking();
        }
    }

    Ok(())
}

fn run_diary(clear: bool) -> Result<()> {
    let store = DiaryStore::open_default()?;

    if clear {
        store.clear();
        store.save()?;
        println!("Diary cleared.");
        return Ok(());
    }

    if store.is_empty() {
        println!("Diary is empty.");
        return Ok(());
    }

    for entry in store.get_all() {
        let kind = match entry.kind {
            DiaryKind::Image => "image",
            DiaryKind::Voice => "voice",
        };
        println!(
            "{}  {:<10} {:<6} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            entry.subject.display_name(),
            kind,
            entry.preview(60)
        );
    }

    Ok(())
}

fn load_image(path: &Path) -> Result<ImageInput> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    let mime = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };
    Ok(ImageInput::from_bytes(&bytes, mime))
}

fn record_diary(subject: Subject, image: Option<&Path>, text: &str) {
    let entry = match image {
        Some(path) => DiaryEntry::new(subject, DiaryKind::Image, path.display().to_string()),
        None => DiaryEntry::new(subject, DiaryKind::Voice, text),
    };

    let saved = DiaryStore::open_default().and_then(|store| {
        store.add(entry);
        store.save()
    });
    if let Err(e) = saved {
        warn!("Could not update diary: {}", e);
    }
}

fn print_result(result: &AnalysisResult) {
    if let study_buddy::analysis::ResultSource::Fallback { reason } = &result.source {
        println!("Live results unavailable ({reason}); showing an offline example.\n");
    }

    println!("== Quick answer ==\n{}\n", result.quick_answer);
    println!("== Calculator ==\n{}\n", result.calculator_steps);
    println!("== Detailed guide ==\n{}\n", result.detailed_guide);

    println!("== Practice ==");
    for (i, question) in result.practice_questions.iter().enumerate() {
        println!("{}. {}", i + 1, question.prompt);
        for option in &question.options {
            println!("   {option}");
        }
        if let Some(answer) = question.correct_option() {
            println!("   Answer: {answer}");
        }
        if !question.explanation.is_empty() {
            println!("   {}", question.explanation);
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
