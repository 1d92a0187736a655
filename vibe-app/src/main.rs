//! VibeCheck terminal entry point.
//!
//! A thin front end over `vibe-core`: a stdin command loop drives the mood
//! state, text chat, recommendations, and the live voice session, while a
//! background task prints the session's broadcast events as they arrive.

mod settings;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use vibe_core::{
    recommend, ChatThread, GeminiClient, Mood, Recommendation, Speaker, VibeState, VoiceSession,
    VoiceSessionConfig,
};

use store::VibeStore;

#[derive(Parser)]
#[command(name = "vibecheck", about = "AI mood companion — terminal client")]
struct Cli {
    /// Path to the settings file (default: <config dir>/vibecheck/settings.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// API key override (takes precedence over GEMINI_API_KEY and settings)
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vibe_core=info,vibecheck=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let settings_path = cli.config.unwrap_or_else(settings::default_settings_path);
    let app_settings = settings::load_settings(&settings_path);
    info!(settings_path = ?settings_path, "settings loaded");

    let env_key = std::env::var("GEMINI_API_KEY").ok();
    let Some(api_key) =
        settings::resolve_api_key(cli.api_key.as_deref(), env_key.as_deref(), &app_settings)
    else {
        anyhow::bail!(
            "no API key configured — pass --api-key, set GEMINI_API_KEY, or edit {}",
            settings_path.display()
        );
    };

    let store = if app_settings.history_enabled {
        Some(VibeStore::open(&settings::default_db_path())?)
    } else {
        None
    };

    // ── Engine setup ──────────────────────────────────────────────────────
    let gemini = app_settings.to_gemini_config(api_key);
    let client = GeminiClient::new(gemini.clone());

    let mut session_config = VoiceSessionConfig::new(gemini);
    session_config.preferred_input_device = app_settings.preferred_input_device.clone();
    session_config.debug_capture_wav = app_settings.debug_capture_wav.clone();
    let session = Arc::new(VoiceSession::new(session_config));

    spawn_event_printer(&session);

    let mut vibe = VibeState::new();
    let mut thread = ChatThread::new();

    println!("VibeCheck — your AI mood sanctuary.");
    println!("Current vibe: {} ({})", vibe.current_mood, vibe.vibe_score);
    print_help();

    // ── Command loop ──────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "mood" => {
                handle_mood(rest, &mut vibe, store.as_ref());
                match recommend::fetch_for_mood(&client, vibe.current_mood).await {
                    Ok(recs) => print_recommendations(&recs),
                    Err(e) => eprintln!("recommendations unavailable: {e}"),
                }
            }

            "recs" => match recommend::fetch_for_mood(&client, vibe.current_mood).await {
                Ok(recs) => print_recommendations(&recs),
                Err(e) => eprintln!("recommendations unavailable: {e}"),
            },

            "chat" => {
                if rest.is_empty() {
                    println!("usage: chat <message>");
                    continue;
                }
                match thread
                    .send(&client, rest, vibe.current_mood, &app_settings.language)
                    .await
                {
                    Ok(reply) => println!("vibe> {reply}"),
                    Err(e) => eprintln!("chat failed: {e}"),
                }
            }

            "talk" => match session.start().await {
                Ok(()) => println!("(voice session live — say something; `stop` to end)"),
                Err(e) => eprintln!("could not start voice session: {e}"),
            },

            "stop" => session.stop().await,

            "status" => println!("session: {:?}", session.status()),

            "history" => {
                let limit = rest.parse().unwrap_or(10);
                match store.as_ref() {
                    Some(store) => match store.recent(limit) {
                        Ok(points) => {
                            for p in points {
                                let note = p.note.map(|n| format!(" — {n}")).unwrap_or_default();
                                println!(
                                    "{}  {:>3}  {}{}",
                                    p.recorded_at.format("%Y-%m-%d %H:%M"),
                                    p.score,
                                    p.mood,
                                    note
                                );
                            }
                        }
                        Err(e) => eprintln!("history unavailable: {e}"),
                    },
                    None => println!("history is disabled in settings"),
                }
            }

            "stats" => match store.as_ref() {
                Some(store) => match store.daily_stats(7) {
                    Ok(stats) => {
                        for day in stats {
                            println!(
                                "{}  avg {:>5.1}  ({} samples)",
                                day.date, day.avg_score, day.samples
                            );
                        }
                    }
                    Err(e) => eprintln!("stats unavailable: {e}"),
                },
                None => println!("history is disabled in settings"),
            },

            "help" => print_help(),

            "quit" | "exit" => {
                session.stop().await;
                break;
            }

            other => println!("unknown command: {other} (try `help`)"),
        }
    }

    Ok(())
}

fn handle_mood(rest: &str, vibe: &mut VibeState, store: Option<&VibeStore>) {
    let mut parts = rest.split_whitespace();
    let Some(mood) = parts.next().and_then(Mood::parse) else {
        println!(
            "usage: mood <{}> [score 0-100]",
            Mood::ALL.map(|m| m.to_string().to_lowercase()).join("|")
        );
        return;
    };
    let score = parts
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(VibeState::BASELINE_SCORE);

    vibe.record(mood, score);
    println!("vibe updated: {} ({})", vibe.current_mood, vibe.vibe_score);

    if let Some(store) = store {
        if let Some(point) = vibe.history.last() {
            if let Err(e) = store.record_point(point, None) {
                eprintln!("could not persist vibe point: {e}");
            }
        }
    }
}

fn print_recommendations(recs: &[Recommendation]) {
    if recs.is_empty() {
        println!("(no recommendations right now)");
        return;
    }
    for rec in recs {
        println!("[{:?}/{:?}] {} — {}", rec.kind, rec.intensity, rec.title, rec.content);
    }
}

fn print_help() {
    println!(
        "commands:\n  \
         mood <name> [score]   record how you feel (fetches fresh recommendations)\n  \
         recs                  recommendations for the current mood\n  \
         chat <message>        text chat with the companion\n  \
         talk                  start the live voice session\n  \
         stop                  end the live voice session\n  \
         status                session state\n  \
         history [n]           recent vibe points\n  \
         stats                 daily vibe averages\n  \
         quit                  exit"
    );
}

/// Print session broadcast events until the session handle is dropped.
fn spawn_event_printer(session: &Arc<VoiceSession>) {
    let mut transcripts = session.subscribe_transcripts();
    let mut status = session.subscribe_status();
    let mut activity = session.subscribe_activity();
    let mut errors = session.subscribe_errors();

    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            tokio::select! {
                event = transcripts.recv() => match event {
                    Ok(t) => {
                        let tag = match t.speaker {
                            Speaker::User => "you",
                            Speaker::Model => "vibe",
                        };
                        println!("[{tag}] {}", t.text);
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                event = status.recv() => match event {
                    Ok(s) => {
                        let detail = s.detail.map(|d| format!(" ({d})")).unwrap_or_default();
                        println!("[session] {:?}{detail}", s.status);
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                event = activity.recv() => match event {
                    Ok(a) => {
                        if a.model_speaking {
                            println!("[session] companion speaking…");
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                event = errors.recv() => match event {
                    Ok(e) => {
                        let level = if e.fatal { "error" } else { "notice" };
                        eprintln!("[{level}] {}", e.message);
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
}
