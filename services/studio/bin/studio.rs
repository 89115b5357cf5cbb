//! Main Entrypoint for the Live Studio
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and the command line.
//! 2. Optionally probing the model before connecting.
//! 3. Opening a live session with the mode's instruction, tools and tool handler.
//! 4. Streaming a WAV file (and optional stills) up, recording the spoken reply to disk.
//! 5. Shutting down cleanly on Ctrl+C, at the run deadline, or when the session closes.

use anyhow::{Context, bail};
use clap::Parser;
use gemini_live::{
    LiveEvent, LiveSession, MediaPacer, SessionState, StaticAuth, TranscriptSource,
    model::{Availability, check_model_availability},
};
use secrecy::ExposeSecret;
use std::{path::PathBuf, sync::Arc, time::Duration};
use studio_core::{HighlightLifetime, Mode, StudioState, StudioToolHandler};
use studio_service::{capture::WavCapture, config::StudioConfig, recorder::WavRecorder};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Talk to a Gemini Live model from files")]
struct Args {
    /// WAV file streamed as microphone input. Any rate or channel count.
    #[arg(long)]
    input: PathBuf,
    /// Directory of JPEG stills streamed as the camera feed.
    #[arg(long)]
    frames: Option<PathBuf>,
    /// Where the model's spoken reply is recorded.
    #[arg(long, default_value = "studio-output.wav")]
    output: PathBuf,
    /// Overrides STUDIO_MODE.
    #[arg(long)]
    mode: Option<Mode>,
    /// Hard limit on the whole run, in seconds.
    #[arg(long, default_value_t = 120)]
    duration_secs: u64,
    /// How long to keep listening after the input file has been sent, in seconds.
    #[arg(long, default_value_t = 10)]
    linger_secs: u64,
    /// Probe the model before connecting and stop if it is unavailable.
    #[arg(long)]
    check_model: bool,
}

async fn ensure_model_available(config: &StudioConfig) -> anyhow::Result<()> {
    let Some(key) = config.gemini_api_key.as_ref() else {
        warn!("No API key configured; skipping model availability check");
        return Ok(());
    };
    let client = reqwest::Client::new();
    match check_model_availability(&client, &config.model, key.expose_secret()).await {
        Availability::Available => Ok(()),
        Availability::Unavailable(kind) => {
            bail!("Model {} is unavailable: {}", config.model, kind.description())
        }
    }
}

/// Logs one session event and folds transcripts into the studio state. Returns `false`
/// once the session has closed for good.
async fn handle_event(event: LiveEvent, state: &tokio::sync::Mutex<StudioState>) -> bool {
    match event {
        LiveEvent::AudioReady(chunk) => {
            debug!(samples = chunk.samples().len(), "Audio scheduled");
        }
        LiveEvent::ToolInvoked(call) => {
            info!(tool = %call.name, id = %call.id, "Tool invoked");
        }
        LiveEvent::TranscriptDelta { source, text, .. } => match source {
            TranscriptSource::Output => {
                info!(transcript = %text, "Model said");
                state.lock().await.push_transcript(&text, chrono::Utc::now());
            }
            TranscriptSource::Input => info!(transcript = %text, "User said"),
        },
        LiveEvent::Interrupted => info!("Model interrupted"),
        LiveEvent::StateChanged(SessionState::Closed) => {
            info!("Session closed");
            return false;
        }
        LiveEvent::StateChanged(new_state) => info!(state = ?new_state, "Session state changed"),
        LiveEvent::Error { kind, message } => error!(?kind, %message, "Session error"),
    }
    true
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // --- 1. Load Configuration ---
    let mut config = StudioConfig::from_env().context("Failed to load configuration")?;
    if let Some(mode) = args.mode {
        config.mode = mode;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(mode = %config.mode, model = %config.model, "Configuration loaded.");

    if args.check_model {
        ensure_model_available(&config).await?;
    }

    // --- 3. Build the Session ---
    let state = Arc::new(tokio::sync::Mutex::new(StudioState::new(
        config.mode,
        HighlightLifetime::default(),
    )));
    let (state_tx, mut state_rx) = mpsc::channel::<StudioState>(32);
    let handler = Arc::new(StudioToolHandler::new(state.clone(), Some(state_tx)));

    let session_config = config.session_config();
    let recorder = WavRecorder::new(&args.output, session_config.output_sample_rate);
    let (session, mut events) = LiveSession::builder(session_config)
        .auth(StaticAuth(config.credentials()))
        .output(recorder)
        .tools(config.mode.tool_names().iter().copied(), handler)
        .build();

    tokio::spawn(async move {
        while let Some(snapshot) = state_rx.recv().await {
            debug!(
                highlights = snapshot.highlights.active().len(),
                nodes = snapshot.diagram.nodes().len(),
                edges = snapshot.diagram.edges().len(),
                story_items = snapshot.story.items().len(),
                "Studio state updated"
            );
        }
    });

    // --- 4. Connect and Stream ---
    if !session.connect().await.context("Failed to open live session")? {
        warn!("Initial connection failed; a retry is scheduled");
    }

    let mut capture = WavCapture::open(&args.input)
        .with_context(|| format!("Failed to load input {}", args.input.display()))?
        .paced();
    if let Some(frames) = &args.frames {
        capture = capture
            .with_frames(frames)
            .with_context(|| format!("Failed to load frames from {}", frames.display()))?;
    }
    info!(seconds = capture.duration().as_secs_f64(), "Streaming input");
    let mut pacer = MediaPacer::spawn(capture, session.outbound(), config.mode.video_cadence());
    let mut pacer_done = false;

    let deadline = tokio::time::sleep(Duration::from_secs(args.duration_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal. Shutting down gracefully...");
                break;
            }
            _ = &mut deadline => {
                info!("Run finished.");
                break;
            }
            stats = &mut pacer, if !pacer_done => {
                pacer_done = true;
                match stats {
                    Ok(stats) => info!(?stats, "Input fully sent"),
                    Err(e) => warn!(error = %e, "Media pacer stopped unexpectedly"),
                }
                let linger_end = Instant::now() + Duration::from_secs(args.linger_secs);
                if linger_end < deadline.deadline() {
                    deadline.as_mut().reset(linger_end);
                }
            }
            event = events.recv() => match event {
                Some(event) => {
                    if !handle_event(event, &state).await {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    // --- 5. Shut Down ---
    if !pacer_done {
        pacer.abort();
    }
    session
        .disconnect()
        .await
        .context("Failed to close live session")?;

    let state = state.lock().await;
    info!(
        highlights = state.highlights.active().len(),
        nodes = state.diagram.nodes().len(),
        edges = state.diagram.edges().len(),
        story_items = state.story.items().len(),
        output = %args.output.display(),
        "Session complete."
    );
    match serde_json::to_string_pretty(&*state) {
        Ok(json) => debug!(state = %json, "Final studio state"),
        Err(e) => warn!(error = %e, "Failed to serialize studio state"),
    }
    Ok(())
}
