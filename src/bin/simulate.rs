//! Run a full bot-only room locally: initial placement, then dice and
//! auto-ended turns until somebody wins or the turn limit runs out.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use archipelago::game::Game;
use archipelago::store::MemoryStore;
use archipelago::types::{GameMode, GameSettings};

#[derive(Parser, Debug)]
#[command(about = "Simulate a room full of bots")]
struct Args {
    /// Map name from the built-in catalog.
    #[arg(long, default_value = "Base")]
    map: String,

    /// 1 = Base, 2 = Cities & Knights, 3 = Seafarers.
    #[arg(long, default_value_t = 1)]
    mode: u16,

    #[arg(long, default_value_t = 3)]
    players: usize,

    #[arg(long, default_value = "60s")]
    speed: String,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 500)]
    max_turns: u32,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let mode = match args.mode {
        2 => GameMode::CitiesAndKnights,
        3 => GameMode::Seafarers,
        _ => GameMode::Base,
    };
    let settings = GameSettings {
        mode,
        map_name: args.map.clone(),
        speed: args.speed.clone(),
        ..GameSettings::default()
    };

    let room_id = uuid::Uuid::new_v4().to_string();
    let mut game = Game::new(&room_id, settings, Arc::new(MemoryStore::default()));
    if let Err(err) = game.initialize(args.players, args.seed) {
        eprintln!("initialize failed: {err}");
        std::process::exit(1);
    }
    for p in &game.players {
        p.set_is_bot(true);
    }

    game.run_init_phase().await;
    info!(map = %args.map, players = args.players, "initial placement complete");

    while !game.game_over && game.turn < args.max_turns {
        let current = game.current_player;
        let rolled = game.roll_dice(current, None).await;
        if game.game_over {
            break;
        }
        let ended = game.end_turn(current);
        if rolled.is_err() && ended.is_err() {
            info!("turn could not advance, stopping the simulation");
            break;
        }
    }

    println!("--- after {} turns ---", game.turn);
    for idx in 0..game.players.len() {
        let p = &game.players[idx];
        println!(
            "{:<10} seat {}  vp {:>2}  cards {:>2}  longest road {}",
            p.username,
            p.order,
            game.victory_points(idx, false),
            p.hand.card_count(),
            p.longest_road,
        );
    }
    if game.game_over {
        println!("game over");
    }
}
