//! Shape Duel binary entrypoint wiring the transport, controller, and console.

use std::{env, sync::Arc};

use anyhow::{Context, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shape_duel::config::AppConfig;
use shape_duel::net::local_ipv4;
use shape_duel::services::{LogNotifier, SessionHandle, Timings, UserAction, host_session, join_session};
use shape_duel::state::Move;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut config = AppConfig::load();
    if let Some(port) = env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config.port = port;
    }

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("host") => {
            let session = host_session(
                &config,
                "Red".into(),
                Arc::new(LogNotifier),
                Timings::default(),
            )
            .context("hosting match")?;
            info!(
                code = session.match_code(),
                addr = %local_ipv4(),
                port = session.local_addr().port(),
                "share this code and address with the joining player"
            );
            drive_console(session).await
        }
        Some("join") => {
            let host = args.next().unwrap_or_else(|| "localhost".into());
            let code = args
                .next()
                .context("usage: shape-duel join <host> <code>")?;
            let session = join_session(
                &config,
                &host,
                &code,
                "Blue".into(),
                Arc::new(LogNotifier),
                Timings::default(),
            )
            .await
            .context("could not connect; check the address and try again")?;
            drive_console(session).await
        }
        _ => bail!("usage: shape-duel host | shape-duel join <host> <code>"),
    }
}

/// Feed console input into the session until quit or Ctrl-C.
///
/// Accepts `rock`/`paper`/`scissors` (any case) as moves, `again` to start
/// a new game keeping scores, and `quit` to leave.
async fn drive_console(session: SessionHandle) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.submit(UserAction::Quit);
                break;
            }
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    session.submit(UserAction::Quit);
                    break;
                };
                match parse_command(&line) {
                    Some(action @ UserAction::Quit) => {
                        session.submit(action);
                        break;
                    }
                    Some(action) => {
                        if !session.submit(action) {
                            break;
                        }
                    }
                    None => warn!(input = %line.trim(), "unrecognized command"),
                }
            }
        }
    }

    session.finished().await;
    Ok(())
}

fn parse_command(input: &str) -> Option<UserAction> {
    match input.trim().to_ascii_lowercase().as_str() {
        "rock" | "r" => Some(UserAction::SubmitMove(Move::Rock)),
        "paper" | "p" => Some(UserAction::SubmitMove(Move::Paper)),
        "scissors" | "s" => Some(UserAction::SubmitMove(Move::Scissors)),
        "again" => Some(UserAction::PlayAgain),
        "quit" | "q" => Some(UserAction::Quit),
        _ => None,
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
