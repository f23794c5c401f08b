use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gamemaster::collaborators::{CommandAdjudicator, GpgCipher, ProcessSandbox};
use gamemaster::config::{CommandSpec, GameConfig, Settings};
use gamemaster::domain::{GameId, KeyRef, Participant, ParticipantId, Roster};
use gamemaster::event_log::read_snapshot;
use gamemaster::mailbox::{MailboxStore, MessageQuery};
use gamemaster::services::{Collaborators, NewGame, RunOutcome, StatusView, Storage, TurnFlow};
use gamemaster::{AppError, GameDir};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod telemetry;

const DEFAULT_PARTICIPANTS: &str = "Austria,England,France,Germany,Italy,Russia,Turkey";

#[derive(Parser)]
#[command(name = "gamemaster")]
#[command(about = "Turn orchestrator and encrypted mailbox for agent-played negotiation games")]
struct Cli {
    /// Directory holding one sub-directory per game [env: GM_GAME_ROOT]
    #[arg(long, global = true)]
    game_root: Option<PathBuf>,

    /// Agent command, run as `<cmd> <participant>` [env: GM_AGENT_CMD]
    #[arg(long, global = true)]
    agent_cmd: Option<String>,

    /// Adjudicator command [env: GM_ADJUDICATOR_CMD]
    #[arg(long, global = true)]
    adjudicator_cmd: Option<String>,

    /// Key participants encrypt orders to [env: GM_AUTHORITY_KEY]
    #[arg(long, global = true)]
    authority_key: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a game and log its opening phase
    New {
        #[arg(long)]
        game: String,
        /// Comma-separated participant ids
        #[arg(long, default_value = DEFAULT_PARTICIPANTS)]
        participants: String,
        /// Game config JSON file; defaults apply to missing fields
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Resume a game from its log and drive it forward
    Run {
        #[arg(long)]
        game: String,
        /// Stop after this many completed turns
        #[arg(long)]
        turns: Option<u32>,
    },
    /// Show the last logged position
    Status {
        #[arg(long)]
        game: String,
    },
    /// List messages visible to a participant in the current phase
    Inbox {
        #[arg(long)]
        game: String,
        #[arg(long)]
        participant: String,
        #[arg(long)]
        round: Option<u32>,
        /// List what the participant sent instead of what it received
        #[arg(long)]
        outbox: bool,
    },
    /// List a participant's private notes, latest per phase
    Notes {
        #[arg(long)]
        game: String,
        #[arg(long)]
        participant: String,
    },
    /// Print the event log as JSON lines
    Log {
        #[arg(long)]
        game: String,
        /// Only events of this kind, e.g. `dispatch_result`
        #[arg(long)]
        kind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gamemaster: [{}] {e}", e.code());
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<(), AppError> {
    let settings = settings_with_overrides(&cli)?;
    match cli.command {
        Command::New {
            game,
            participants,
            config,
        } => new_game(&settings, &game, &participants, config).await,
        Command::Run { game, turns } => run_game(&settings, &game, turns).await,
        Command::Status { game } => {
            let dir = existing_game(&settings, &game)?;
            print!("{}", StatusView::from_events(&read_snapshot(&dir.log_path())?)?);
            Ok(())
        }
        Command::Inbox {
            game,
            participant,
            round,
            outbox,
        } => inbox(&settings, &game, &participant, round, outbox),
        Command::Notes { game, participant } => {
            let dir = existing_game(&settings, &game)?;
            let participant = ParticipantId::new(&participant)?;
            for handle in dir.open_mailbox()?.notes(&participant)? {
                println!("{}\t{}", handle.name, handle.size);
            }
            Ok(())
        }
        Command::Log { game, kind } => {
            let dir = existing_game(&settings, &game)?;
            for event in read_snapshot(&dir.log_path())? {
                if kind.as_deref().is_some_and(|k| k != event.kind()) {
                    continue;
                }
                println!("{}", serde_json::to_string(&event)?);
            }
            Ok(())
        }
    }
}

fn settings_with_overrides(cli: &Cli) -> Result<Settings, AppError> {
    let mut settings = Settings::from_env()?;
    if let Some(root) = &cli.game_root {
        settings.game_root = root.clone();
    }
    if let Some(raw) = &cli.agent_cmd {
        settings.agent_cmd = Some(CommandSpec::parse(raw)?);
    }
    if let Some(raw) = &cli.adjudicator_cmd {
        settings.adjudicator_cmd = Some(CommandSpec::parse(raw)?);
    }
    if let Some(key) = &cli.authority_key {
        settings.authority_key = Some(key.clone());
    }
    Ok(settings)
}

fn existing_game(settings: &Settings, game: &str) -> Result<GameDir, AppError> {
    let dir = GameDir::new(&settings.game_root, &GameId::new(game)?);
    if !dir.exists() {
        return Err(AppError::config(format!(
            "no game at {}",
            dir.root().display()
        )));
    }
    Ok(dir)
}

fn collaborators(settings: &Settings, dir: &GameDir, config: &GameConfig) -> Result<Collaborators, AppError> {
    let authority_home = settings
        .authority_home
        .clone()
        .unwrap_or_else(|| dir.root().join("authority"));
    Ok(Collaborators {
        sandbox: Arc::new(ProcessSandbox::new(settings.require_agent_cmd()?.clone())),
        adjudicator: Arc::new(CommandAdjudicator::new(
            settings.require_adjudicator_cmd()?.clone(),
            config.adjudicator_timeout(),
        )),
        cipher: Arc::new(GpgCipher::new(settings.gpg_program.clone(), None)),
        authority_secret: KeyRef::new(authority_home.to_string_lossy()),
    })
}

async fn new_game(
    settings: &Settings,
    game: &str,
    participants: &str,
    config_path: Option<PathBuf>,
) -> Result<(), AppError> {
    let id = GameId::new(game)?;
    let dir = GameDir::new(&settings.game_root, &id);
    if dir.exists() {
        return Err(AppError::config(format!(
            "game {id} already exists at {}",
            dir.root().display()
        )));
    }

    let config = match config_path {
        Some(path) => {
            let raw = std::fs::read(&path)?;
            let json: serde_json::Value = serde_json::from_slice(&raw)?;
            GameConfig::from_json(Some(&json))?
        }
        None => GameConfig::default(),
    };
    let roster = Roster::new(
        participants
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| -> Result<Participant, AppError> {
                let id = ParticipantId::new(p)?;
                Ok(Participant::new(id, KeyRef::new(p)))
            })
            .collect::<Result<Vec<_>, _>>()?,
    )?;

    let _lock = dir.lock()?;
    let flow = TurnFlow::create(
        NewGame {
            id,
            roster,
            authority_key: KeyRef::new(settings.require_authority_key()?),
            config: config.clone(),
            board: None,
        },
        Storage::on_disk(&dir)?,
        collaborators(settings, &dir, &config)?,
    )
    .await?;
    println!("created {} at {}", flow.game().id, flow.position());
    Ok(())
}

async fn run_game(settings: &Settings, game: &str, turns: Option<u32>) -> Result<(), AppError> {
    let dir = existing_game(settings, game)?;
    let _lock = dir.lock()?;
    let storage = Storage::on_disk(&dir)?;
    let config = gamemaster::event_log::replay(&storage.log.events()?)?.game.config;
    let mut flow = TurnFlow::resume(storage, collaborators(settings, &dir, &config)?)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping at the next phase boundary");
            on_signal.cancel();
        }
    });

    let outcome = flow.run(turns, &cancel).await?;
    info!(game_id = %flow.game().id, position = %flow.position(), outcome = ?outcome, "Run finished");
    match outcome {
        RunOutcome::Terminated(reason) => println!("game over: {reason}"),
        RunOutcome::TurnLimit => println!("paused at {}", flow.position()),
        RunOutcome::Cancelled => println!("cancelled at {}", flow.position()),
    }
    Ok(())
}

fn inbox(
    settings: &Settings,
    game: &str,
    participant: &str,
    round: Option<u32>,
    outbox: bool,
) -> Result<(), AppError> {
    let dir = existing_game(settings, game)?;
    let participant = ParticipantId::new(participant)?;
    let status = StatusView::from_events(&read_snapshot(&dir.log_path())?)?;
    let label = status.position.label().ok_or_else(|| {
        AppError::config(format!("no mailbox phase at {}", status.position))
    })?;
    let round = round.or(status.position.round()).unwrap_or(1);
    let mailbox = dir.open_mailbox()?;
    let query = if outbox {
        MessageQuery::sent_by(&participant, label, round)
    } else {
        MessageQuery::addressed_to(&participant, label, round)
    };
    for handle in mailbox.query(&query)? {
        if !handle.name.is_note() {
            println!("{}\t{}", handle.name, handle.size);
        }
    }
    Ok(())
}
