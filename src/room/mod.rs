//! One room: a single async mutex around the game, a per-second ticker and
//! the command dispatcher. Everything that mutates the game serializes on
//! the lock; action responses bypass it through per-player channels so a
//! suspended prompt can be answered while the lock is held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use itertools::Itertools;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, MutexGuard, Notify, watch};
use tokio::time;
use tracing::{info, warn};

use crate::errors::EngineError;
use crate::game::{ActionResponse, Game, PlayerActionData};
use crate::messages::Message;
use crate::store::Store;
use crate::types::{BuildableKind, GameSettings, TileKind};

pub mod commands;

pub use commands::{BuildTarget, ClientCommand, InfoRequest, TradeOp};

const MAX_INACTIVE_ROOM_SEC: i32 = 300;
const MAX_INACTIVE_ROOM_NOHUMAN_SEC: i32 = 60;
const MAX_INACTIVE_PLAYER_SEC: i32 = 120;

pub struct Room {
    pub id: String,
    game: Mutex<Game>,
    responders: StdMutex<HashMap<u16, UnboundedSender<ActionResponse>>>,
    cancels: StdMutex<HashMap<u16, Arc<Notify>>>,
    terminating: AtomicBool,
    activity: AtomicBool,
    inactive_seconds: AtomicI32,
}

impl Room {
    pub fn new(id: &str, settings: GameSettings, store: Arc<dyn Store>) -> Arc<Room> {
        Arc::new(Room {
            id: id.to_string(),
            game: Mutex::new(Game::new(id, settings, store)),
            responders: StdMutex::new(HashMap::new()),
            cancels: StdMutex::new(HashMap::new()),
            terminating: AtomicBool::new(false),
            activity: AtomicBool::new(false),
            inactive_seconds: AtomicI32::new(0),
        })
    }

    /// Initialize the game, then launch the ticker and the init-phase
    /// driver. A failed initialize leaves the room dormant: no ticker, no
    /// driver.
    pub async fn start(self: &Arc<Self>, num_players: usize, seed: u64) -> Result<(), EngineError> {
        {
            let mut game = self.game.lock().await;
            game.initialize(num_players, seed)?;

            let mut responders = self.responders.lock().expect("responders poisoned");
            let mut cancels = self.cancels.lock().expect("cancels poisoned");
            for p in &game.players {
                responders.insert(p.order, p.response_sender());
                cancels.insert(p.order, p.cancel.clone());
            }

            let (stop_tx, stop_rx) = watch::channel(false);
            game.ticker_stop = Some(stop_tx);
            let room = Arc::clone(self);
            tokio::spawn(async move {
                room.run_ticker(stop_rx).await;
            });
        }

        let room = Arc::clone(self);
        tokio::spawn(async move {
            let Some(mut game) = room.lock_game().await else {
                return;
            };
            game.run_init_phase().await;
        });
        Ok(())
    }

    async fn run_ticker(&self, mut stop: watch::Receiver<bool>) {
        let mut interval = time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !self.tick().await {
                        return;
                    }
                }
                _ = stop.changed() => return,
            }
        }
    }

    /// One second: advance the game clock, age the players, and retire the
    /// room when nobody has talked to it for too long.
    async fn tick(&self) -> bool {
        if self.terminating.load(Ordering::SeqCst) {
            return false;
        }
        let has_human = {
            let mut game = self.game.lock().await;
            game.tick();
            let mut has_human = false;
            for p in &mut game.players {
                p.inactive_seconds += 1;
                if !p.is_bot() {
                    if p.inactive_seconds > MAX_INACTIVE_PLAYER_SEC {
                        info!(room = %self.id, order = p.order, "inactive player becomes a bot");
                        p.set_is_bot(true);
                    } else if p.has_outbox() {
                        has_human = true;
                    }
                }
            }
            has_human
        };

        if self.activity.swap(false, Ordering::SeqCst) {
            self.inactive_seconds.store(0, Ordering::SeqCst);
            return true;
        }
        let idle = self.inactive_seconds.fetch_add(1, Ordering::SeqCst) + 1;
        let limit = if has_human {
            MAX_INACTIVE_ROOM_SEC
        } else {
            MAX_INACTIVE_ROOM_NOHUMAN_SEC
        };
        if idle >= limit {
            info!(room = %self.id, idle, "room idle too long, terminating");
            self.terminate().await;
            return false;
        }
        true
    }

    async fn lock_game(&self) -> Option<MutexGuard<'_, Game>> {
        if self.terminating.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.game.lock().await)
    }

    /// Test and tooling access to the game under the lock.
    pub async fn with_game<R>(&self, f: impl FnOnce(&mut Game) -> R) -> R {
        let mut game = self.game.lock().await;
        f(&mut game)
    }

    /// Attach a client transport for a seat; returns the outbound queue.
    pub async fn connect(&self, order: u16) -> Option<UnboundedReceiver<Message>> {
        let mut game = self.game.lock().await;
        let idx = game.player_by_order(order)?;
        let (tx, rx) = mpsc::unbounded_channel();
        game.players[idx].attach_outbox(tx);
        game.players[idx].inactive_seconds = 0;
        Some(rx)
    }

    /// Spectators receive broadcasts but never hold prompts.
    pub async fn connect_spectator(
        &self,
        id: &str,
        username: &str,
    ) -> UnboundedReceiver<Message> {
        let mut game = self.game.lock().await;
        let idx = game.add_spectator(id, username);
        let (tx, rx) = mpsc::unbounded_channel();
        game.spectators[idx].attach_outbox(tx);
        rx
    }

    pub async fn disconnect_spectator(&self, id: &str) {
        let mut game = self.game.lock().await;
        game.remove_spectator(id);
    }

    /// Drop the transport and cancel any prompt waiting on this player.
    pub async fn disconnect(&self, order: u16) {
        if let Some(cancel) = self
            .cancels
            .lock()
            .expect("cancels poisoned")
            .get(&order)
            .cloned()
        {
            cancel.notify_waiters();
        }
        let mut game = self.game.lock().await;
        if let Some(idx) = game.player_by_order(order) {
            game.players[idx].detach_outbox();
        }
    }

    pub async fn terminate(&self) {
        if self.terminating.swap(true, Ordering::SeqCst) {
            return;
        }
        for cancel in self.cancels.lock().expect("cancels poisoned").values() {
            cancel.notify_waiters();
        }
        let mut game = self.game.lock().await;
        game.terminate();
        if !game.initialized {
            if let Err(err) = game.store.terminate_game(&self.id) {
                warn!(room = %self.id, %err, "store terminate failed");
            }
        }
    }

    /// Answer a pending prompt. Deliberately lock-free: the rule code that
    /// asked is suspended inside the lock and reads from this channel.
    pub fn deliver_action_response(&self, order: u16, response: ActionResponse) {
        if let Some(tx) = self
            .responders
            .lock()
            .expect("responders poisoned")
            .get(&order)
        {
            let _ = tx.send(response);
        }
    }

    /// Route one inbound command. Commands are processed in arrival order
    /// per room; a command that opens a prompt keeps the lock until the
    /// prompt resolves.
    pub async fn handle_command(&self, order: u16, command: ClientCommand) {
        self.activity.store(true, Ordering::SeqCst);

        if let ClientCommand::ActionResponse { ar_data } = &command {
            self.deliver_action_response(order, ar_data.clone());
            return;
        }

        let Some(mut game) = self.lock_game().await else {
            return;
        };
        let Some(idx) = game.player_by_order(order) else {
            return;
        };
        game.players[idx].inactive_seconds = 0;

        match command {
            ClientCommand::Init => self.send_bootstrap(&game, idx),
            ClientCommand::Build { o, dct, ct } => {
                if game.ensure_current_player(order).is_err() {
                    return;
                }
                self.handle_build(&mut game, idx, o, dct, ct).await;
            }
            ClientCommand::Dice => {
                let result = game.roll_dice(idx, None).await;
                game.surface(result, idx);
            }
            ClientCommand::EndTurn => {
                let result = game.end_turn(idx);
                game.surface(result, idx);
            }
            ClientCommand::SpecialBuild => {
                let result = game.request_special_build(order);
                game.surface(result, idx);
            }
            ClientCommand::Trade { op } => {
                let result = match op {
                    TradeOp::CreateOffer { offer } => game.create_offer(order, offer).map(|_| ()),
                    TradeOp::AcceptOffer { oid } => game.accept_offer(oid, order),
                    TradeOp::RejectOffer { oid } => game.reject_offer(oid, order),
                    TradeOp::CloseOffer {
                        oid,
                        accepting_player,
                    } => game.close_offer(oid, order, accepting_player),
                };
                game.surface(result, idx);
            }
            ClientCommand::Request { rt } => match rt {
                InfoRequest::GameState => {
                    game.players[idx].send_message(&Message::GameState(game.game_state()));
                }
                InfoRequest::PlayerHand => game.send_player_secret(idx),
            },
            ClientCommand::ActionResponse { .. } => unreachable!("handled before the lock"),
        }
    }

    async fn handle_build(
        &self,
        game: &mut Game,
        idx: usize,
        target: BuildTarget,
        dct: Option<crate::types::DevCardKind>,
        ct: Option<crate::types::CardKind>,
    ) {
        match target {
            BuildTarget::Settlement => {
                self.prompt_and_build(game, idx, BuildableKind::Settlement).await;
            }
            BuildTarget::City => {
                self.prompt_and_build(game, idx, BuildableKind::City).await;
            }
            BuildTarget::Road => {
                self.prompt_and_build(game, idx, BuildableKind::Road).await;
            }
            BuildTarget::Ship => {
                self.prompt_and_build(game, idx, BuildableKind::Ship).await;
            }
            BuildTarget::DevelopmentCard => {
                let result = game.buy_development_card(idx);
                game.surface(result, idx);
            }
            BuildTarget::UseDevelopmentCard => {
                let Some(kind) = dct else {
                    game.send_error(&EngineError::Protocol("missing dev card kind"), idx);
                    return;
                };
                let result = game.use_development_card(idx, kind).await;
                game.surface(result, idx);
            }
            BuildTarget::Knight => {
                self.prompt_and_build(game, idx, BuildableKind::Knight).await;
            }
            BuildTarget::KnightActivate => {
                let locations = game.activate_locations_knight(idx);
                if locations.is_empty() {
                    game.send_error(&EngineError::NowhereToBuild, idx);
                    return;
                }
                let Some(vc) = Self::prompt_vertex(game, idx, "Choose warrior to activate", locations).await
                else {
                    return;
                };
                let result = game.activate_knight(idx, vc);
                game.surface(result, idx);
            }
            BuildTarget::KnightRobber => {
                let result = game.knight_chase_robber(idx, false).await;
                game.surface(result, idx);
            }
            BuildTarget::KnightMove => {
                let result = game.knight_move(idx, false).await;
                game.surface(result, idx);
            }
            BuildTarget::CityImprovement => {
                let Some(track) = ct else {
                    game.send_error(&EngineError::Protocol("missing improvement track"), idx);
                    return;
                };
                let result = game.build_city_improvement(idx, track);
                game.surface(result, idx);
            }
            BuildTarget::Wall => {
                self.prompt_and_build(game, idx, BuildableKind::Wall).await;
            }
            BuildTarget::MoveShip => {
                let result = game.move_ship_interactive(idx).await;
                game.surface(result, idx);
            }
        }
    }

    /// The shared build flow: enumerate legal sites, prompt, then build.
    async fn prompt_and_build(&self, game: &mut Game, idx: usize, kind: BuildableKind) {
        if let Err(err) = game.ensure_can_build(idx, kind) {
            game.send_error(&err, idx);
            return;
        }
        match kind {
            BuildableKind::Settlement | BuildableKind::City | BuildableKind::Knight
            | BuildableKind::Wall => {
                let (message, locations) = match kind {
                    BuildableKind::Settlement => (
                        "Choose location for settlement",
                        game.build_locations_settlement(idx, false),
                    ),
                    BuildableKind::City => {
                        ("Choose location for city", game.build_locations_city(idx))
                    }
                    BuildableKind::Knight => (
                        "Choose location for warrior",
                        game.build_locations_knight(idx, true),
                    ),
                    _ => ("Choose city to fortify", game.build_locations_wall(idx)),
                };
                if locations.is_empty() {
                    game.send_error(&EngineError::NowhereToBuild, idx);
                    return;
                }
                let Some(vc) = Self::prompt_vertex(game, idx, message, locations).await else {
                    return;
                };
                let result = match kind {
                    BuildableKind::Settlement => game.build_settlement(idx, vc),
                    BuildableKind::City => game.build_city(idx, vc),
                    BuildableKind::Knight => game.build_knight(idx, vc),
                    _ => game.build_wall(idx, vc),
                };
                game.surface(result, idx);
            }
            BuildableKind::Road | BuildableKind::Ship => {
                let (message, locations) = if kind == BuildableKind::Road {
                    (
                        "Choose location for road",
                        game.build_locations_road(idx, false),
                    )
                } else {
                    ("Choose location for ship", game.build_locations_ship(idx))
                };
                if locations.is_empty() {
                    game.send_error(&EngineError::NowhereToBuild, idx);
                    return;
                }
                let response = game
                    .block_for_action(
                        idx,
                        0,
                        crate::game::PlayerAction {
                            message: message.to_string(),
                            can_cancel: true,
                            data: PlayerActionData::ChooseEdge {
                                allowed: locations.clone(),
                            },
                        },
                    )
                    .await;
                let Some(ec) = response.ok().and_then(|r| r.into_edge()) else {
                    return;
                };
                if !locations.contains(&ec) {
                    game.send_error(&EngineError::Protocol("edge outside the allowed set"), idx);
                    return;
                }
                let result = if kind == BuildableKind::Road {
                    game.build_road(idx, ec)
                } else {
                    game.build_ship(idx, ec)
                };
                game.surface(result, idx);
            }
        }
    }

    async fn prompt_vertex(
        game: &mut Game,
        idx: usize,
        message: &str,
        locations: Vec<crate::coords::VertexCoordinate>,
    ) -> Option<crate::coords::VertexCoordinate> {
        let response = game
            .block_for_action(
                idx,
                0,
                crate::game::PlayerAction {
                    message: message.to_string(),
                    can_cancel: true,
                    data: PlayerActionData::ChooseVertex {
                        allowed: locations.clone(),
                    },
                },
            )
            .await;
        response
            .ok()
            .and_then(|r| r.into_vertex())
            .filter(|vc| locations.contains(vc))
    }

    /// The ordered bootstrap a (re)connecting client needs to draw the room.
    fn send_bootstrap(&self, game: &Game, idx: usize) {
        let player = &game.players[idx];
        player.send_message(&Message::Settings(game.settings.clone()));

        let (keys, values) = game.graph.display_map();
        player.send_message(&Message::CoordMap { keys, values });

        let tiles = game
            .graph
            .tiles
            .values()
            .sorted_by_key(|t| (t.center.y, t.center.x));
        for tile in tiles {
            let visible = if tile.fog {
                // Hidden tiles travel as fog with no number.
                crate::board::Tile {
                    center: tile.center,
                    kind: TileKind::Fog,
                    number: 0,
                    fog: true,
                }
            } else {
                tile.clone()
            };
            player.send_message(&Message::TileInfo(visible));
        }
        for vertex in game.graph.vertices.values().sorted_by_key(|v| v.coord) {
            player.send_message(&Message::VertexInfo(vertex.clone()));
        }
        for edge in game.graph.edges.values().sorted_by_key(|e| e.coord) {
            player.send_message(&Message::EdgeInfo(edge.clone()));
        }
        for port in &game.graph.ports {
            player.send_message(&Message::PortInfo(port.clone()));
        }
        for (vc, placement) in &game.vertex_placements {
            player.send_message(&Message::VertexPlacementBuilt {
                vertex: *vc,
                placement: *placement,
            });
        }
        for (ec, placement) in &game.edge_placements {
            player.send_message(&Message::EdgePlacementBuilt {
                edge: *ec,
                placement: *placement,
            });
        }
        player.send_message(&Message::InitComplete);

        player.send_message(&Message::DiceRoll {
            red: game.last_roll.red,
            white: game.last_roll.white,
            event: game.last_roll.event,
            init: true,
        });
        player.send_message(&Message::GameState(game.game_state()));
        player.send_message(&Message::PlayerSecretState(game.player_secret_state(idx)));
        player.send_message(&Message::SpectatorList(
            game.spectators.iter().map(|s| s.username.clone()).collect(),
        ));
        for offer in &game.offers {
            player.send_message(&Message::TradeOffer(offer.clone()));
        }
        if let Some(action) = &player.pending_action {
            player.send_message(&Message::PlayerActionPrompt(action.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::maps;
    use crate::game::DiceState;
    use crate::store::MemoryStore;

    async fn started_room(map: &str, mode: crate::types::GameMode) -> Arc<Room> {
        let settings = GameSettings {
            mode,
            map_name: map.to_string(),
            ..GameSettings::default()
        };
        let room = Room::new("room-1", settings, Arc::new(MemoryStore::default()));
        room.start(2, 42).await.expect("room starts");
        room
    }

    async fn drain_until<F: Fn(&Message) -> bool>(
        rx: &mut UnboundedReceiver<Message>,
        pred: F,
    ) -> Option<Message> {
        while let Ok(msg) = rx.try_recv() {
            if pred(&msg) {
                return Some(msg);
            }
        }
        None
    }

    #[tokio::test(start_paused = true)]
    async fn init_phase_driver_runs_to_completion_with_bots() {
        let room = started_room(maps::BASE_MAP, crate::types::GameMode::Base).await;
        room.with_game(|g| {
            for p in &g.players {
                p.set_is_bot(true);
            }
        })
        .await;
        // Let the spawned driver take the lock and run.
        time::sleep(Duration::from_secs(2)).await;

        room.with_game(|g| {
            assert!(!g.init_phase);
            for p in &g.players {
                assert_eq!(p.vertex_placements.len(), 2);
                assert_eq!(p.edge_placements.len(), 2);
            }
            assert_eq!(g.players[0].time_left, g.timer_vals.dice);
        })
        .await;
        room.terminate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dice_from_the_wrong_seat_is_surfaced_as_an_error() {
        let room = started_room(maps::BASE_MAP, crate::types::GameMode::Base).await;
        room.with_game(|g| {
            for p in &g.players {
                p.set_is_bot(true);
            }
        })
        .await;
        time::sleep(Duration::from_secs(2)).await;

        let mut rx = room.connect(1).await.expect("seat 1 connects");
        room.handle_command(1, ClientCommand::Dice).await;
        let err = drain_until(&mut rx, |m| matches!(m, Message::Error { .. })).await;
        assert!(err.is_some(), "non-current roller must get an error back");
        room.terminate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn action_response_bypasses_the_held_room_lock() {
        let room = started_room(maps::BASE_MAP, crate::types::GameMode::Base).await;
        room.with_game(|g| {
            for p in &g.players {
                p.set_is_bot(true);
            }
        })
        .await;
        time::sleep(Duration::from_secs(2)).await;

        let mut rx = room.connect(0).await.expect("seat 0 connects");
        let target = room
            .with_game(|g| {
                g.players[0].set_is_bot(false);
                g.dice_state = DiceState::Rolled;
                g.current_player = 0;
                g.players[0].hand.set_resources(5, 5, 5, 5, 5);
                g.build_locations_settlement(0, false)
            })
            .await;
        let Some(vc) = target.first().copied() else {
            // Board layouts without an open connected spot end the test early.
            room.terminate().await;
            return;
        };

        let worker = Arc::clone(&room);
        let build = tokio::spawn(async move {
            worker
                .handle_command(
                    0,
                    ClientCommand::Build {
                        o: BuildTarget::Settlement,
                        dct: None,
                        ct: None,
                    },
                )
                .await;
        });
        // Wait for the prompt to arrive, then answer it while the build
        // command still holds the room lock.
        let mut prompted = false;
        for _ in 0..50 {
            time::sleep(Duration::from_millis(100)).await;
            if drain_until(&mut rx, |m| matches!(m, Message::PlayerActionPrompt(_)))
                .await
                .is_some()
            {
                prompted = true;
                break;
            }
        }
        assert!(prompted, "build command must prompt for the vertex");

        room.handle_command(
            0,
            ClientCommand::ActionResponse {
                ar_data: ActionResponse::Vertex { vertex: vc },
            },
        )
        .await;
        build.await.unwrap();

        room.with_game(|g| {
            assert!(g.vertex_placement(vc).is_some(), "settlement must be built");
        })
        .await;
        room.terminate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_sequence_is_ordered_and_masks_fog() {
        let room = started_room(
            maps::SEAFARERS_FOG_ISLANDS,
            crate::types::GameMode::Seafarers,
        )
        .await;
        room.with_game(|g| {
            for p in &g.players {
                p.set_is_bot(true);
            }
        })
        .await;
        time::sleep(Duration::from_secs(2)).await;

        let mut rx = room.connect(0).await.expect("seat 0 connects");
        room.handle_command(0, ClientCommand::Init).await;

        let mut seen = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            match &msg {
                Message::Settings(_) => seen.push("settings"),
                Message::InitComplete => seen.push("complete"),
                Message::GameState(_) => seen.push("state"),
                Message::TileInfo(tile) => {
                    if tile.fog {
                        assert_eq!(tile.kind, TileKind::Fog);
                        assert_eq!(tile.number, 0);
                    }
                }
                _ => {}
            }
        }
        let settings_at = seen.iter().position(|s| *s == "settings");
        let complete_at = seen.iter().position(|s| *s == "complete");
        let state_at = seen.iter().position(|s| *s == "state");
        assert_eq!(settings_at, Some(0), "settings must come first");
        assert!(complete_at.is_some() && state_at.is_some());
        assert!(complete_at < state_at, "i-c precedes the state snapshot");
        room.terminate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn long_inactive_player_is_promoted_to_bot() {
        let room = started_room(maps::BASE_MAP, crate::types::GameMode::Base).await;
        room.with_game(|g| {
            for p in &g.players {
                p.set_is_bot(true);
            }
            g.players[1].set_is_bot(false);
            g.players[1].inactive_seconds = MAX_INACTIVE_PLAYER_SEC;
        })
        .await;
        time::sleep(Duration::from_secs(2)).await;

        room.tick().await;
        room.with_game(|g| assert!(g.players[1].is_bot())).await;
        room.terminate().await;
    }

    #[tokio::test(start_paused = true)]
    async fn idle_room_without_humans_terminates_itself() {
        let room = started_room(maps::BASE_MAP, crate::types::GameMode::Base).await;
        room.with_game(|g| {
            for p in &g.players {
                p.set_is_bot(true);
            }
        })
        .await;
        time::sleep(Duration::from_secs(2)).await;

        let mut alive = true;
        for _ in 0..=MAX_INACTIVE_ROOM_NOHUMAN_SEC {
            alive = room.tick().await;
            if !alive {
                break;
            }
        }
        assert!(!alive, "bot-only room must retire after the short threshold");
    }

    #[tokio::test(start_paused = true)]
    async fn terminated_room_refuses_new_commands() {
        let room = started_room(maps::BASE_MAP, crate::types::GameMode::Base).await;
        room.with_game(|g| {
            for p in &g.players {
                p.set_is_bot(true);
            }
        })
        .await;
        time::sleep(Duration::from_secs(2)).await;
        room.terminate().await;

        // Dispatch becomes a no-op once the room is going away.
        room.handle_command(0, ClientCommand::Dice).await;
        room.with_game(|g| assert_eq!(g.dice_state, DiceState::Unrolled))
            .await;
    }
}
