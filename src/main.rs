use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use career_strategist::{
    create_router, interview_system_prompt, AppState, AudioSink, AudioSource, Config,
    LiveSessionController, NewPosition, PositionStore, Role, Turn,
};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "career-strategist")]
#[command(about = "Live mock interviews against a generative voice model")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/career-strategist")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP control API
    Serve,
    /// Run a live interview in the terminal until Ctrl-C
    Interview {
        /// Position to interview for
        position_id: String,
        /// Replay this WAV file instead of the microphone
        #[arg(long)]
        input_wav: Option<String>,
        /// Render interviewer audio into this WAV file instead of the speaker
        #[arg(long)]
        output_wav: Option<String>,
    },
    /// Manage stored positions
    Positions {
        #[command(subcommand)]
        action: PositionsAction,
    },
}

#[derive(Subcommand)]
enum PositionsAction {
    /// List stored positions
    List,
    /// Add a position
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        company: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Core requirement (repeatable)
        #[arg(short, long = "requirement")]
        requirements: Vec<String>,
        #[arg(long)]
        interview_date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve => serve(cfg).await,
        Commands::Interview {
            position_id,
            input_wav,
            output_wav,
        } => interview(cfg, position_id, input_wav, output_wav).await,
        Commands::Positions { action } => positions(cfg, action),
    }
}

async fn serve(cfg: Config) -> Result<()> {
    info!("{} starting", cfg.service.name);

    let store = PositionStore::open(&cfg.store.path)?;
    let gateway = cfg.gateway.connect().await?;
    let controller =
        LiveSessionController::new(gateway, Arc::new(cfg.devices()), cfg.session_config());

    let state = AppState::new(controller, store);
    let app = create_router(state.clone());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // Release the microphone and save whatever was said
    if let Some(report) = state.controller.stop().await {
        if let Err(e) = state.persist_report(report).await {
            warn!("Failed to save interview on shutdown: {}", e);
        }
    }

    info!("{} stopped", cfg.service.name);
    Ok(())
}

async fn interview(
    mut cfg: Config,
    position_id: String,
    input_wav: Option<String>,
    output_wav: Option<String>,
) -> Result<()> {
    let mut store = PositionStore::open(&cfg.store.path)?;
    let position = store
        .get(&position_id)
        .cloned()
        .with_context(|| format!("Position {} not found", position_id))?;

    if let Some(path) = input_wav {
        cfg.audio.input = path;
    }
    if let Some(path) = output_wav {
        cfg.audio.output = path;
    }

    let devices = cfg.devices();
    if !cfg!(feature = "cpal")
        && (devices.source == AudioSource::Microphone || devices.sink == AudioSink::Speaker)
    {
        warn!("Built without the `cpal` feature; pass --input-wav and --output-wav");
    }

    let gateway = cfg.gateway.connect().await?;
    let controller = LiveSessionController::new(gateway, Arc::new(devices), cfg.session_config());

    println!("Interview: {} @ {}", position.title, position.company);

    if let Err(e) = controller.start(interview_system_prompt(&position)).await {
        let message = controller
            .error_message()
            .await
            .unwrap_or_else(|| e.to_string());
        bail!(message);
    }

    println!("Connected. Speak when ready, Ctrl-C to finish.\n");

    let mut printed = 0;
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = controller.wait_idle() => break,
            _ = ticker.tick() => {
                // Print turns once the next one has started
                let turns = controller.transcript().await;
                if turns.len() > printed + 1 {
                    print_turns(&turns[printed..turns.len() - 1]);
                    printed = turns.len() - 1;
                }
            }
        }
    }

    let report = controller.stop().await;
    let turns = match &report {
        Some(report) => report.turns.clone(),
        None => controller.transcript().await,
    };
    if turns.len() > printed {
        print_turns(&turns[printed..]);
    }

    if let Some(message) = controller.error_message().await {
        eprintln!("\n{}", message);
    }

    if turns.is_empty() {
        println!("\nNo transcript recorded.");
    } else {
        let record = store.append_interview(&position.id, turns)?;
        println!("\nSaved interview {} ({} turns)", record.id, record.turns.len());
    }

    Ok(())
}

fn print_turns(turns: &[Turn]) {
    for turn in turns {
        let speaker = match turn.role {
            Role::Interviewer => "Interviewer",
            Role::Candidate => "You",
        };
        println!("{}: {}", speaker, turn.text);
    }
}

fn positions(cfg: Config, action: PositionsAction) -> Result<()> {
    let mut store = PositionStore::open(&cfg.store.path)?;

    match action {
        PositionsAction::List => {
            if store.list().is_empty() {
                println!("No positions yet.");
            }
            for position in store.list() {
                println!(
                    "{}  {} @ {}  ({} interviews, {} analyses)",
                    position.id,
                    position.title,
                    position.company,
                    position.interview_history.len(),
                    position.analysis_history.len()
                );
            }
        }
        PositionsAction::Add {
            title,
            company,
            description,
            requirements,
            interview_date,
        } => {
            let position = store.add(NewPosition {
                title,
                company,
                description,
                requirements,
                interview_date,
            })?;
            println!("Added position {}", position.id);
        }
    }

    Ok(())
}
