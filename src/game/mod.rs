use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

use crate::board::maps::MapDefinition;
use crate::board::{Graph, build_graph};
use crate::coords::{Coordinate, EdgeCoordinate, VertexCoordinate};
use crate::errors::EngineError;
use crate::journal::Journal;
use crate::messages::Message;
use crate::scenario::ScenarioState;
use crate::store::Store;
use crate::types::{BuildableKind, GameMode, GameSettings};

pub mod bank;
pub mod cnk;
pub mod dev_cards;
pub mod hand;
pub mod init_phase;
pub mod longest_road;
pub mod move_cards;
pub mod placements;
pub mod player;
pub mod prompt;
pub mod state;
pub mod timers;
pub mod trade;
pub mod turn;

pub use bank::Bank;
pub use hand::Hand;
pub use player::Player;
pub use prompt::{ActionResponse, PlayerAction, PlayerActionData};
pub use timers::TimerValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiceState {
    Unrolled,
    Rolled,
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct DieRollState {
    pub red: u8,
    pub white: u8,
    pub event: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Merchant {
    pub tile: Coordinate,
    pub owner: u16,
}

/// Occupant of a vertex. Knights carry a level and an activation flag;
/// cities may additionally be walled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VertexPlacement {
    pub owner: u16,
    pub kind: BuildableKind,
    pub knight_level: u8,
    pub knight_active: bool,
    pub walled: bool,
}

impl VertexPlacement {
    pub fn building(owner: u16, kind: BuildableKind) -> Self {
        Self {
            owner,
            kind,
            knight_level: 0,
            knight_active: false,
            walled: false,
        }
    }

    pub fn is_building(&self) -> bool {
        matches!(self.kind, BuildableKind::Settlement | BuildableKind::City)
    }
}

/// Occupant of an edge: a road or a ship.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EdgePlacement {
    pub owner: u16,
    pub kind: BuildableKind,
}

#[derive(Debug, Default, Clone)]
pub struct ExtraVictoryPoints {
    pub longest_road_holder: Option<usize>,
    pub largest_army_holder: Option<usize>,
    pub largest_army_count: i16,
    /// Metropolis holder per commodity track.
    pub metropolis: HashMap<crate::types::CardKind, usize>,
    pub constitution_holder: Option<usize>,
    pub printer_holder: Option<usize>,
}

/// One room's authoritative game. All mutable state lives here; the room
/// wraps it in an async mutex and everything inside runs single-threaded.
pub struct Game {
    pub id: String,
    pub mode: GameMode,
    pub settings: GameSettings,
    pub map_defn: Option<MapDefinition>,
    pub graph: Graph,
    pub players: Vec<Player>,
    pub spectators: Vec<Player>,
    pub current_player: usize,
    pub turn_owner: usize,
    pub bank: Bank,
    pub robber: Coordinate,
    pub pirate: Option<Coordinate>,
    pub merchant: Option<Merchant>,
    pub last_roll: DieRollState,
    pub dice_state: DiceState,
    pub init_phase: bool,
    pub special_build_phase: bool,
    pub special_build_starter: Option<usize>,
    pub paused: bool,
    pub game_over: bool,
    pub initialized: bool,
    pub turn: u32,
    pub timer_phase_id: u32,
    pub state_seq: u64,
    pub timer_vals: TimerValues,
    pub extra_vp: ExtraVictoryPoints,
    pub scenario: ScenarioState,
    pub barbarian_position: i16,
    /// Free roads remaining from a Road Building card this turn.
    pub road_building_free: u8,
    pub offers: Vec<trade::TradeOffer>,
    pub(crate) next_offer_id: i32,
    pub vertex_placements: HashMap<VertexCoordinate, VertexPlacement>,
    pub edge_placements: HashMap<EdgeCoordinate, EdgePlacement>,
    pub(crate) rng: StdRng,
    pub store: Arc<dyn Store>,
    pub journal: Journal,
    pub ticker_stop: Option<watch::Sender<bool>>,
}

/// Seat profiles used until a human claims the seat.
const DEFAULT_PROFILES: [(&str, &str); 4] = [
    ("profile-ayla", "Ayla"),
    ("profile-brennos", "Brennos"),
    ("profile-cormac", "Cormac"),
    ("profile-delia", "Delia"),
];

impl Game {
    pub fn new(id: &str, settings: GameSettings, store: Arc<dyn Store>) -> Self {
        let mode = settings.mode;
        let mut rng = StdRng::seed_from_u64(0);
        Self {
            id: id.to_string(),
            mode,
            settings,
            map_defn: None,
            graph: Graph::default(),
            players: Vec::new(),
            spectators: Vec::new(),
            current_player: 0,
            turn_owner: 0,
            bank: Bank::new(mode, &mut rng),
            robber: Coordinate::default(),
            pirate: None,
            merchant: None,
            last_roll: DieRollState::default(),
            dice_state: DiceState::Unrolled,
            init_phase: false,
            special_build_phase: false,
            special_build_starter: None,
            paused: false,
            game_over: false,
            initialized: false,
            turn: 0,
            timer_phase_id: 0,
            state_seq: 0,
            timer_vals: TimerValues::default(),
            extra_vp: ExtraVictoryPoints::default(),
            scenario: ScenarioState::default(),
            barbarian_position: 0,
            road_building_free: 0,
            offers: Vec::new(),
            next_offer_id: 1,
            vertex_placements: HashMap::new(),
            edge_placements: HashMap::new(),
            rng,
            store,
            journal: Journal::new(),
            ticker_stop: None,
        }
    }

    /// Build the board, seat the players and arm the timers. On failure the
    /// room stays uninitialized and no ticker may be started.
    pub fn initialize(&mut self, num_players: usize, seed: u64) -> Result<(), EngineError> {
        if self.initialized {
            return Ok(());
        }
        if num_players < 2 || num_players > self.settings.max_players.max(2) {
            return Err(EngineError::InvalidMap("unsupported player count"));
        }

        let defn = match &self.map_defn {
            Some(defn) => defn.clone(),
            None => crate::board::maps::by_name(&self.settings.map_name)
                .ok_or(EngineError::InvalidMap("unknown map name"))?,
        };

        // Scenario metadata wins over room settings when both define a target.
        if let Some(meta) = defn.scenario.as_ref() {
            if meta.victory_points > 0 {
                self.settings.victory_points = meta.victory_points;
            }
        }

        self.rng = StdRng::seed_from_u64(seed);
        let board = build_graph(&defn, self.mode, &mut self.rng)?;
        self.graph = board.graph;
        self.robber = board.robber;
        self.pirate = board.pirate;

        self.players = (0..num_players)
            .map(|order| {
                let (id, username) = DEFAULT_PROFILES[order % DEFAULT_PROFILES.len()];
                Player::new(self.mode, id, username, order as u16)
            })
            .collect();
        self.bank = Bank::new(self.mode, &mut self.rng);
        self.timer_vals = timers::timer_values_for_speed(&self.settings.speed);
        self.scenario = ScenarioState::for_map(&defn);
        self.map_defn = Some(defn);

        self.current_player = 0;
        self.turn_owner = 0;
        self.init_phase = true;
        self.dice_state = DiceState::Unrolled;
        self.initialized = true;

        self.scenario_finalize_setup();

        if let Err(err) = self.store.create_game_if_not_exists(&self.id) {
            warn!(room = %self.id, %err, "store create failed");
        }
        if let Err(err) = self.store.write_game_started(&self.id) {
            warn!(room = %self.id, %err, "store write_game_started failed");
        }
        if let Err(err) = self.store.write_game_players(&self.id, num_players as i32) {
            warn!(room = %self.id, %err, "store write_game_players failed");
        }

        Ok(())
    }

    pub fn player_by_order(&self, order: u16) -> Option<usize> {
        self.players.iter().position(|p| p.order == order)
    }

    pub fn ensure_current_player(&self, order: u16) -> Result<usize, EngineError> {
        let idx = self
            .player_by_order(order)
            .ok_or(EngineError::NotAParticipant)?;
        if idx != self.current_player {
            return Err(EngineError::NotYourTurn);
        }
        Ok(idx)
    }

    pub fn is_init_phase(&self) -> bool {
        self.init_phase
    }

    // ---- broadcast discipline ----

    pub fn broadcast_message(&self, message: &Message) {
        for p in self.players.iter().chain(self.spectators.iter()) {
            p.send_message(message);
        }
    }

    /// Journal an event and fan it out to clients; the journal writer is the
    /// delta sink for both.
    pub fn emit_delta(&mut self, message: Message) {
        self.journal.record(&message);
        self.broadcast_message(&message);
    }

    /// Bump the state sequence and send the public snapshot to everyone.
    pub fn broadcast_state(&mut self) {
        self.state_seq += 1;
        let message = Message::GameState(self.game_state());
        self.broadcast_message(&message);
        if let Err(err) = self.journal.flush(self.store.as_ref(), &self.id) {
            warn!(room = %self.id, %err, "journal flush failed");
        }
    }

    pub fn send_player_secret(&self, idx: usize) {
        if let Some(p) = self.players.get(idx) {
            p.send_message(&Message::PlayerSecretState(self.player_secret_state(idx)));
        }
    }

    pub fn send_error(&self, err: &EngineError, idx: usize) {
        if err.is_prompt_exit() {
            return;
        }
        if let Some(p) = self.players.get(idx) {
            p.send_message(&Message::Error {
                message: err.to_string(),
            });
        }
    }

    /// Report a result to the player, swallowing prompt exits.
    pub fn surface(&self, result: Result<(), EngineError>, idx: usize) {
        if let Err(err) = result {
            self.send_error(&err, idx);
        }
    }

    pub(crate) fn roll_die(&mut self) -> u8 {
        self.rng.gen_range(1..=6)
    }

    // ---- spectators ----

    pub fn add_spectator(&mut self, id: &str, username: &str) -> usize {
        let spectator = Player::spectator(self.mode, id, username);
        self.spectators.push(spectator);
        let list = self.spectator_list();
        self.broadcast_message(&Message::SpectatorList(list));
        self.spectators.len() - 1
    }

    pub fn remove_spectator(&mut self, id: &str) {
        self.spectators.retain(|s| s.id != id);
        let list = self.spectator_list();
        self.broadcast_message(&Message::SpectatorList(list));
    }

    pub fn spectator_list(&self) -> Vec<String> {
        self.spectators.iter().map(|s| s.username.clone()).collect()
    }

    /// Drain prompts and stop the ticker; the room is going away.
    pub fn terminate(&mut self) {
        for p in &self.players {
            p.cancel.notify_waiters();
        }
        if let Some(stop) = &self.ticker_stop {
            let _ = stop.send(true);
        }
        if self.initialized && !self.game_over {
            if let Err(err) = self.journal.flush(self.store.as_ref(), &self.id) {
                warn!(room = %self.id, %err, "journal flush on terminate failed");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::board::maps;
    use crate::store::MemoryStore;

    pub(crate) fn game_on_map(map: &str, mode: GameMode, players: usize, seed: u64) -> Game {
        let settings = GameSettings {
            mode,
            map_name: map.to_string(),
            ..GameSettings::default()
        };
        let mut game = Game::new("test-room", settings, Arc::new(MemoryStore::default()));
        game.initialize(players, seed).expect("game initializes");
        game
    }

    pub(crate) fn two_player_base_game() -> Game {
        game_on_map(maps::BASE_MAP, GameMode::Base, 2, 42)
    }

    pub(crate) fn two_player_seafarers_game() -> Game {
        game_on_map(maps::SEAFARERS_NEW_SHORES, GameMode::Seafarers, 2, 42)
    }

    #[test]
    fn initialize_seats_players_and_builds_the_board() {
        let game = two_player_base_game();
        assert!(game.initialized);
        assert!(game.init_phase);
        assert_eq!(game.players.len(), 2);
        assert_eq!(game.current_player, 0);
        assert!(!game.graph.tiles.is_empty());
    }

    #[test]
    fn initialize_with_malformed_map_leaves_room_uninitialized() {
        let settings = GameSettings::default();
        let mut game = Game::new("bad-room", settings, Arc::new(MemoryStore::default()));
        game.map_defn = Some(MapDefinition {
            name: "invalid".to_string(),
            order: vec![false],
            ports: vec![],
            numbers: vec![],
            random_tiles: vec![],
            map: vec![vec![crate::types::TileKind::Wood as i32]],
            scenario: None,
        });
        assert!(game.initialize(2, 1).is_err());
        assert!(!game.initialized);
        assert!(game.ticker_stop.is_none());
    }

    #[test]
    fn scenario_metadata_overrides_settings_victory_target() {
        let game = game_on_map(maps::SEAFARERS_THROUGH_DESERT, GameMode::Seafarers, 2, 3);
        assert_eq!(game.settings.victory_points, 14);
    }

    #[test]
    fn current_player_always_points_into_players() {
        let game = two_player_base_game();
        assert!(game.current_player < game.players.len());
        assert!(game.ensure_current_player(0).is_ok());
        assert!(matches!(
            game.ensure_current_player(1),
            Err(EngineError::NotYourTurn)
        ));
        assert!(matches!(
            game.ensure_current_player(9),
            Err(EngineError::NotAParticipant)
        ));
    }
}
