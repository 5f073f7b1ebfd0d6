//! Strictly Chess - Unified CLI
//!
//! Create, join, play, and watch chess sessions stored in SQLite.

#![warn(missing_docs)]

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command};
use strictly_chess::{
    MoveAttempt, MoveDescriptor, Participant, Promotion, RulesEngine, SessionManager,
    SessionStore, Side, SqliteStore, StandardChess, StateSynchronizer, SyncConfig, SyncEvent,
    derive_status,
};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = SyncConfig::load(&cli.config)?;
    if let Some(db_path) = cli.db_path {
        config = config.with_db_path(db_path);
    }

    let sqlite = SqliteStore::from_config(&config)?;
    info!(db_path = sqlite.db_path(), "Session store ready");
    let store: Arc<dyn SessionStore> = Arc::new(sqlite);
    let rules: Arc<dyn RulesEngine> = Arc::new(StandardChess::new());
    let manager = SessionManager::new(Arc::clone(&store), Arc::clone(&rules), &config);
    let me = Participant::new(cli.identity.user_id, cli.identity.name);

    match cli.command {
        Command::Create => run_create(&manager, &me).await,
        Command::Join { target } => run_join(&manager, &me, &target).await,
        Command::Move {
            session_id,
            from,
            to,
            promotion,
        } => run_move(&manager, &me, &session_id, &from, &to, promotion).await,
        Command::Status { session_id } => run_status(&manager, rules.as_ref(), &session_id).await,
        Command::Watch { session_id } => {
            run_watch(StateSynchronizer::new(store, rules), &me, &session_id).await
        }
        Command::Replay { session_id } => run_replay(&manager, rules.as_ref(), &session_id).await,
    }
}

/// Create a session and print its share link
#[instrument(skip(manager, me))]
async fn run_create(manager: &SessionManager, me: &Participant) -> Result<()> {
    let created = manager.create_session(me).await?;
    println!("Session: {}", created.session().id());
    println!("Share link: {}", created.link());
    Ok(())
}

/// Join a session by id or link
#[instrument(skip(manager, me))]
async fn run_join(manager: &SessionManager, me: &Participant, target: &str) -> Result<()> {
    let joined = manager.join_link(target, me).await?;
    println!("Joined {} as {}", joined.session().id(), joined.role());
    if !joined.role().is_player() {
        println!("Both seats are taken, you are watching this game");
    }
    Ok(())
}

/// Submit one move
#[instrument(skip(manager, me))]
async fn run_move(
    manager: &SessionManager,
    me: &Participant,
    session_id: &str,
    from: &str,
    to: &str,
    promotion: Option<char>,
) -> Result<()> {
    let promotion = match promotion {
        Some(c) => Some(Promotion::from_char(c).with_context(|| format!("Unknown promotion piece '{}'", c))?),
        None => None,
    };
    let descriptor = MoveDescriptor::new(from, to, promotion)?;

    match manager.submit_move(session_id, me.id(), &descriptor).await? {
        MoveAttempt::Accepted(session) => {
            let last = session.move_history().last().cloned().unwrap_or_default();
            println!("Played {} (status: {})", last, session.status());
        }
        MoveAttempt::NotPermitted => {
            warn!("Move not permitted");
            println!("It is not your turn");
        }
        MoveAttempt::Rejected => {
            warn!("Move rejected");
            println!("Illegal move");
        }
    }
    Ok(())
}

/// Print the status of a session
#[instrument(skip(manager, rules))]
async fn run_status(manager: &SessionManager, rules: &dyn RulesEngine, session_id: &str) -> Result<()> {
    let session = manager.load_session(session_id).await?;
    let report = derive_status(rules, session.position(), session.move_history())?;

    println!("{}", report);
    println!("Status: {}", session.status());
    for side in [Side::White, Side::Black] {
        match session.player(side) {
            Some(player) => println!("{}: {}", side, player.display_name()),
            None => println!("{}: waiting for opponent", side),
        }
    }
    println!("Share link: {}", manager.link_for(session.id()));
    println!("Moves: {}", session.move_history().join(" "));
    println!("Position: {}", session.position());
    Ok(())
}

/// Follow a session until Ctrl-C
#[instrument(skip(synchronizer, me))]
async fn run_watch(synchronizer: StateSynchronizer, me: &Participant, session_id: &str) -> Result<()> {
    let handle = synchronizer
        .subscribe(session_id, Some(me.id().clone()), |event| match event {
            SyncEvent::Updated(view) => {
                let moves = view.session().move_history();
                match moves.last() {
                    Some(last) => println!("[{}] {} - {}", moves.len(), last, view.report()),
                    None => println!("{}", view.report()),
                }
            }
            SyncEvent::Halted(err) => println!("Stopped following the game: {}", err.user_message()),
        })
        .await?;

    info!("Watching session, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    handle.unsubscribe();
    Ok(())
}

/// Verify the history replays to the stored position
#[instrument(skip(manager, rules))]
async fn run_replay(manager: &SessionManager, rules: &dyn RulesEngine, session_id: &str) -> Result<()> {
    let session = manager.load_session(session_id).await?;
    let replayed = rules.replay(session.move_history())?;

    if replayed != *session.position() {
        bail!(
            "History replays to {} but the stored position is {}",
            replayed,
            session.position()
        );
    }

    println!(
        "History of {} plies replays to the stored position",
        session.move_history().len()
    );
    Ok(())
}
