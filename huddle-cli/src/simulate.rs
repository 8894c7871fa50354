use anyhow::{Result, bail};
use colored::*;
use futures::future::{join_all, try_join_all};
use huddle_core::{MemberId, RoomId};
use huddle_session::memory::{InMemoryDirectory, InMemoryPresence, InMemoryRelay};
use huddle_session::{
    PeerState, RoomSessionController, SessionError, SessionServices,
    SyntheticMediaSource, WebRtcConnectionFactory,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

const MAX_MEMBERS: usize = 16;

#[derive(clap::Args)]
pub struct SimulateArgs {
    #[arg(short, long, default_value_t = 3)]
    members: usize,

    #[arg(short, long, default_value = "huddle-demo")]
    room: String,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    no_stun: bool,

    /// Capture audio only.
    #[arg(long)]
    audio_only: bool,

    /// Give up waiting for the full mesh after this many seconds.
    #[arg(long, default_value_t = 10)]
    settle_secs: u64,

    /// Stay in the room until Ctrl-C once the mesh is reported.
    #[arg(long)]
    hold: bool,
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    if !(2..=MAX_MEMBERS).contains(&args.members) {
        bail!("--members must be between 2 and {}", MAX_MEMBERS);
    }

    let config = crate::load_config(args.config.as_deref(), args.no_stun)?;
    let room_id = RoomId::from(args.room.as_str());
    let presence = InMemoryPresence::new();
    let relay = InMemoryRelay::new();
    let directory = InMemoryDirectory::new();
    let connections = Arc::new(WebRtcConnectionFactory::new(&config));

    let controllers: Vec<RoomSessionController> = (1..=args.members)
        .map(|n| {
            let member_id = MemberId::from(format!("member-{n:02}"));
            let media = SyntheticMediaSource {
                video: !args.audio_only,
                stream_id: format!("{member_id}-stream"),
                ..SyntheticMediaSource::default()
            };
            let services = SessionServices {
                presence: Arc::new(presence.clone()),
                relay: Arc::new(relay.clone()),
                directory: Arc::new(directory.clone()),
                media: Arc::new(media),
                connections: connections.clone(),
            };
            RoomSessionController::new(
                room_id.clone(),
                member_id,
                format!("Guest {n}"),
                services,
                config.clone(),
            )
        })
        .collect();

    for controller in &controllers {
        tokio::spawn(print_notifications(
            controller.member_id().clone(),
            controller.notifications(),
        ));
    }

    println!(
        "{}",
        format!("Joining {} members to room {}", args.members, room_id)
            .green()
            .bold()
    );
    try_join_all(controllers.iter().map(|c| c.join())).await?;

    let settle = Duration::from_secs(args.settle_secs);
    tokio::select! {
        _ = wait_for_mesh(&controllers) => {
            println!("{}", "Mesh complete".green().bold());
        }
        _ = tokio::time::sleep(settle) => {
            println!("{}", format!("Mesh incomplete after {}s", args.settle_secs).yellow().bold());
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted while waiting for the mesh");
        }
    }

    print_mesh(&controllers);
    println!("   Participants counter: {}", directory.participants(&room_id));

    if args.hold {
        println!("{}", "Holding the room open, Ctrl-C to leave".cyan());
        tokio::signal::ctrl_c().await?;
    }

    join_all(controllers.iter().map(|c| c.leave())).await;
    info!("All members left {}", room_id);
    println!(
        "{} (participants counter {})",
        "Left room".green().bold(),
        directory.participants(&room_id)
    );

    Ok(())
}

async fn wait_for_mesh(controllers: &[RoomSessionController]) {
    let expected = controllers.len() - 1;
    let waits = controllers.iter().map(|controller| {
        let mut view = controller.subscribe_view();
        async move {
            let _ = view
                .wait_for(|v| {
                    v.peers.len() == expected
                        && v.peers.iter().all(|p| p.state == PeerState::Connected)
                })
                .await;
        }
    });
    join_all(waits).await;
}

async fn print_notifications(member_id: MemberId, mut rx: broadcast::Receiver<SessionError>) {
    loop {
        match rx.recv().await {
            Ok(err) => println!("   {} {}: {}", "!".yellow().bold(), member_id, err),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("{} dropped {} notifications", member_id, skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_mesh(controllers: &[RoomSessionController]) {
    for controller in controllers {
        let view = controller.view();
        println!(
            "{} {} ({} participants, {} pending signals)",
            "▸".cyan(),
            controller.member_id().to_string().bold(),
            view.participants.len(),
            view.pending_signals
        );
        for peer in &view.peers {
            let state = match peer.state {
                PeerState::Connected => format!("{:?}", peer.state).green(),
                PeerState::Closed => format!("{:?}", peer.state).red(),
                _ => format!("{:?}", peer.state).yellow(),
            };
            println!(
                "     {:<12} {:<10} {:<20} {} remote tracks",
                peer.member_id.to_string(),
                format!("{:?}", peer.role),
                state,
                peer.remote_media.snapshot().tracks.len()
            );
        }
    }
}
