use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::coords::Coordinate;
use crate::game::player::BuildablesLeft;
use crate::game::trade::OFFER_SLOTS;
use crate::game::{DiceState, Game, Merchant};
use crate::messages::Message;
use crate::types::{CardKind, Color, DevCardKind, GameMode};

const CAN_USE_BIT: i32 = 1 << 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStateView {
    pub id: String,
    pub username: String,
    pub order: u16,
    pub color: Color,
    pub num_cards: i16,
    pub num_dev_cards: i16,
    pub current: bool,
    pub has_pending_action: bool,
    pub victory_points: i32,
    pub longest_road: usize,
    pub knights: i16,
    pub time_left: i32,
    pub discard_limit: i16,
    pub is_bot: bool,
    pub has_longest_road: bool,
    pub has_largest_army: bool,
    pub defender_points: i32,
    pub dev_card_vp: Option<i16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateView {
    pub current_player_order: u16,
    pub need_dice: bool,
    pub timer_phase_id: u32,
    pub timer_ends_at_ms: i64,
    pub server_now_ms: i64,
    pub robber: Coordinate,
    pub pirate: Option<Coordinate>,
    pub merchant: Option<Merchant>,
    pub player_states: Vec<PlayerStateView>,
    pub bank_wood: i16,
    pub bank_brick: i16,
    pub bank_wool: i16,
    pub bank_wheat: i16,
    pub bank_ore: i16,
    pub bank_dev_remaining: i16,
    pub barbarian_position: i16,
    pub state_seq: u64,
}

/// Everything the client UI may enable right now for one player.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AllowedActions {
    pub build_settlement: bool,
    pub build_city: bool,
    pub build_road: bool,
    pub build_ship: bool,
    pub move_ship: bool,
    pub buy_development_card: bool,
    pub trade: bool,
    pub end_turn: bool,
    pub build_knight: bool,
    pub activate_knight: bool,
    pub robber_knight: bool,
    pub move_knight: bool,
    pub build_wall: bool,
    pub improve_paper: bool,
    pub improve_cloth: bool,
    pub improve_coin: bool,
    pub special_build: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSecretStateView {
    pub cards: BTreeMap<CardKind, i16>,
    /// Wire-packed card ids; the high bit flags a usable card.
    pub development_cards: Vec<i32>,
    pub buildables_left: BuildablesLeft,
    pub victory_points: i32,
    pub allowed_actions: AllowedActions,
    pub trade_ratios: [i16; OFFER_SLOTS],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOverView {
    pub winner: u16,
    pub players: Vec<PlayerStateView>,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl Game {
    /// The public snapshot every client renders from.
    pub fn game_state(&self) -> GameStateView {
        let server_now_ms = now_ms();
        let need_dice = !self.is_init_phase()
            && self.dice_state == DiceState::Unrolled
            && !self.has_player_pending_action()
            && !self.game_over;

        let current = self.players.get(self.current_player);
        let current_time_left = current.map(|p| p.time_left.max(0)).unwrap_or(0);
        let should_advance_timer =
            !self.paused || current.is_some_and(|p| p.pending_action.is_some());
        let timer_ends_at_ms = if should_advance_timer {
            server_now_ms + current_time_left as i64 * 1000
        } else {
            0
        };

        GameStateView {
            current_player_order: current.map(|p| p.order).unwrap_or(0),
            need_dice,
            timer_phase_id: self.timer_phase_id,
            timer_ends_at_ms,
            server_now_ms,
            robber: self.robber,
            pirate: self.pirate,
            merchant: self.merchant,
            player_states: (0..self.players.len())
                .map(|i| self.player_state(i))
                .collect(),
            bank_wood: self.bank.available(CardKind::Wood),
            bank_brick: self.bank.available(CardKind::Brick),
            bank_wool: self.bank.available(CardKind::Wool),
            bank_wheat: self.bank.available(CardKind::Wheat),
            bank_ore: self.bank.available(CardKind::Ore),
            bank_dev_remaining: self.bank.development_remaining() as i16,
            barbarian_position: self.barbarian_position,
            state_seq: self.state_seq,
        }
    }

    pub fn player_state(&self, idx: usize) -> PlayerStateView {
        let p = &self.players[idx];
        let knights = match self.mode {
            GameMode::Base | GameMode::Seafarers => {
                p.hand.dev_card_deck(DevCardKind::Knight).num_used
            }
            GameMode::CitiesAndKnights => self.activated_knight_strength(idx) as i16,
        };
        PlayerStateView {
            id: p.id.clone(),
            username: p.username.clone(),
            order: p.order,
            color: p.color,
            num_cards: p.hand.card_count(),
            num_dev_cards: p.hand.dev_card_count(),
            current: idx == self.current_player,
            has_pending_action: p.pending_action.is_some(),
            victory_points: self.victory_points(idx, true),
            longest_road: p.longest_road,
            knights,
            time_left: p.time_left,
            discard_limit: self.discard_limit(idx),
            is_bot: p.is_bot(),
            has_longest_road: self.extra_vp.longest_road_holder == Some(idx),
            has_largest_army: self.extra_vp.largest_army_holder == Some(idx),
            defender_points: p.defender_points,
            dev_card_vp: None,
        }
    }

    /// The private view: exact cards, card identities and the action matrix.
    pub fn player_secret_state(&self, idx: usize) -> PlayerSecretStateView {
        let p = &self.players[idx];
        let cards: BTreeMap<CardKind, i16> = p.hand.card_kinds().collect();
        let mut development_cards = Vec::new();
        for (kind, deck) in p.hand.dev_card_kinds() {
            if deck.quantity <= 0 {
                continue;
            }
            let mut packed = kind as i32;
            if deck.can_use {
                packed |= CAN_USE_BIT;
            }
            for _ in 0..deck.quantity {
                development_cards.push(packed);
            }
        }
        PlayerSecretStateView {
            cards,
            development_cards,
            buildables_left: p.buildables_left,
            victory_points: self.victory_points(idx, false),
            allowed_actions: self.allowed_actions(idx),
            trade_ratios: self.trade_ratios_for_player(idx),
        }
    }

    pub fn allowed_actions(&self, idx: usize) -> AllowedActions {
        let p = &self.players[idx];
        let common_busy = self.has_player_pending_action()
            || self.current_player != idx
            || self.game_over
            || p.is_spectator
            || self.is_init_phase();
        let busy = common_busy || self.dice_state == DiceState::Unrolled;
        let cnk = self.mode == GameMode::CitiesAndKnights;

        AllowedActions {
            build_settlement: !busy
                && self.ensure_can_build(idx, crate::types::BuildableKind::Settlement).is_ok()
                && !self.build_locations_settlement(idx, false).is_empty(),
            build_city: !cnk
                && !busy
                && self.ensure_can_build(idx, crate::types::BuildableKind::City).is_ok()
                && !self.build_locations_city(idx).is_empty(),
            build_road: !busy
                && self.ensure_can_build(idx, crate::types::BuildableKind::Road).is_ok()
                && !self.build_locations_road(idx, false).is_empty(),
            build_ship: self.mode == GameMode::Seafarers
                && !busy
                && self.ensure_can_build(idx, crate::types::BuildableKind::Ship).is_ok()
                && !self.build_locations_ship(idx).is_empty(),
            move_ship: self.mode == GameMode::Seafarers
                && !common_busy
                && self.dice_state == DiceState::Rolled
                && !p.ship_moved
                && !self.movable_ships(idx).is_empty(),
            buy_development_card: !busy && self.can_buy_development_card(idx),
            trade: !busy && !self.special_build_phase,
            end_turn: !busy && self.can_end_turn().is_ok(),
            build_knight: cnk
                && !busy
                && self.ensure_can_build(idx, crate::types::BuildableKind::Knight).is_ok()
                && !self.build_locations_knight(idx, true).is_empty(),
            activate_knight: cnk
                && !busy
                && p.hand.quantity(CardKind::Wheat) >= 1
                && !self.activate_locations_knight(idx).is_empty(),
            robber_knight: cnk && !busy && !self.special_build_phase,
            move_knight: cnk && !busy && !self.special_build_phase,
            build_wall: cnk
                && !busy
                && self.ensure_can_build(idx, crate::types::BuildableKind::Wall).is_ok()
                && !self.build_locations_wall(idx).is_empty(),
            improve_paper: cnk && !busy && self.can_build_improvement(idx, CardKind::Paper).is_ok(),
            improve_cloth: cnk && !busy && self.can_build_improvement(idx, CardKind::Cloth).is_ok(),
            improve_coin: cnk && !busy && self.can_build_improvement(idx, CardKind::Coin).is_ok(),
            special_build: self.settings.special_build
                && self.current_player != idx
                && !p.special_build
                && !p.is_spectator,
        }
    }

    // ---- victory points ----

    /// Full score with `public == false`; the broadcastable part otherwise.
    pub fn victory_points(&self, idx: usize, public: bool) -> i32 {
        let p = &self.players[idx];
        let mut vp = 0;
        if self.extra_vp.longest_road_holder == Some(idx) {
            vp += 2;
        }
        if self.extra_vp.largest_army_holder == Some(idx) {
            vp += 2;
        }
        for vc in &p.vertex_placements {
            match self.vertex_placements.get(vc).map(|pl| pl.kind) {
                Some(crate::types::BuildableKind::City) => vp += 2,
                Some(crate::types::BuildableKind::Settlement) => vp += 1,
                _ => {}
            }
        }
        vp += self.scenario.bonus_for(p.order);

        if self.mode == GameMode::CitiesAndKnights {
            vp += p.defender_points;
            vp += 2 * self
                .extra_vp
                .metropolis
                .values()
                .filter(|holder| **holder == idx)
                .count() as i32;
            if self.extra_vp.constitution_holder == Some(idx) {
                vp += 1;
            }
            if self.extra_vp.printer_holder == Some(idx) {
                vp += 1;
            }
            if self.merchant.is_some_and(|m| {
                self.player_by_order(m.owner) == Some(idx)
            }) {
                vp += 1;
            }
        }

        if public {
            return vp;
        }
        vp + p.hand.dev_card_deck(DevCardKind::VictoryPoint).quantity as i32
    }

    /// Recompute the longest-road and largest-army holders. Ties at the top
    /// leave the card with its current holder.
    pub fn set_extra_victory_points(&mut self) {
        let old_holder = self.extra_vp.longest_road_holder;
        let mut longest = 0usize;
        let mut leaders: Vec<usize> = Vec::new();
        for idx in 0..self.players.len() {
            let len = self.longest_road_length(idx);
            self.players[idx].longest_road = len;
            if len > longest {
                longest = len;
                leaders = vec![idx];
            } else if len == longest {
                leaders.push(idx);
            }
        }
        let new_holder = if longest >= 5 {
            if leaders.len() == 1 {
                Some(leaders[0])
            } else if old_holder.is_some_and(|h| self.players[h].longest_road == longest) {
                old_holder
            } else {
                None
            }
        } else {
            None
        };
        self.extra_vp.longest_road_holder = new_holder;
        if let Some(holder) = new_holder {
            if new_holder != old_holder {
                let order = self.players[holder].order;
                self.emit_delta(Message::VpHolderChange {
                    award: "longest-road".to_string(),
                    order,
                });
            }
        }

        if matches!(self.mode, GameMode::Base | GameMode::Seafarers) {
            for idx in 0..self.players.len() {
                let used = self.players[idx]
                    .hand
                    .dev_card_deck(DevCardKind::Knight)
                    .num_used;
                if used >= 3 && used > self.extra_vp.largest_army_count {
                    self.extra_vp.largest_army_count = used;
                    self.extra_vp.largest_army_holder = Some(idx);
                    let order = self.players[idx].order;
                    self.emit_delta(Message::VpHolderChange {
                        award: "largest-army".to_string(),
                        order,
                    });
                }
            }
        }
    }

    /// Consult the scenario evaluator; on a win, freeze the room, publish
    /// the final standings and persist the terminal snapshot.
    pub fn check_for_victory(&mut self) {
        if self.special_build_phase || self.game_over || !self.initialized {
            return;
        }
        let Some(winner_idx) = self.scenario_victory_winner() else {
            return;
        };

        self.game_over = true;
        self.set_extra_victory_points();
        for idx in 0..self.players.len() {
            self.send_player_secret(idx);
        }
        self.broadcast_state();

        let winner = self.players[winner_idx].order;
        let mut players: Vec<PlayerStateView> = (0..self.players.len())
            .map(|idx| {
                let mut view = self.player_state(idx);
                view.victory_points = self.victory_points(idx, false);
                view.dev_card_vp = Some(
                    self.players[idx]
                        .hand
                        .dev_card_deck(DevCardKind::VictoryPoint)
                        .quantity,
                );
                view
            })
            .collect();
        players.sort_by(|a, b| b.victory_points.cmp(&a.victory_points));
        self.broadcast_message(&Message::GameOver(GameOverView { winner, players }));

        if let Err(err) = self.store.write_game_finished(&self.id) {
            warn!(room = %self.id, %err, "store write_game_finished failed");
        }
        if let Err(err) = self.journal.flush(self.store.as_ref(), &self.id) {
            warn!(room = %self.id, %err, "journal flush before snapshot failed");
        }
        self.write_terminal_snapshot(winner);
    }

    fn write_terminal_snapshot(&self, winner: u16) {
        let snapshot = self.terminal_snapshot(winner);
        let bytes = match rmp_serde::to_vec(&snapshot) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(room = %self.id, %err, "snapshot serialization failed");
                return;
            }
        };
        if self.store.write_game_state(&self.id, bytes.clone()).is_err() {
            // Terminal state is the one write worth retrying.
            if let Err(err) = self.store.write_game_state(&self.id, bytes) {
                warn!(room = %self.id, %err, "terminal snapshot write failed twice");
            }
        }
    }

    fn terminal_snapshot(&self, winner: u16) -> TerminalSnapshot {
        TerminalSnapshot {
            id: self.id.clone(),
            mode: self.mode,
            winner,
            turn: self.turn,
            robber: self.robber,
            pirate: self.pirate,
            tiles: self.graph.tiles.values().cloned().collect(),
            vertex_placements: self
                .vertex_placements
                .iter()
                .map(|(vc, p)| (*vc, *p))
                .collect(),
            edge_placements: self
                .edge_placements
                .iter()
                .map(|(ec, p)| (*ec, *p))
                .collect(),
            players: (0..self.players.len())
                .map(|idx| {
                    let p = &self.players[idx];
                    SnapshotPlayer {
                        order: p.order,
                        username: p.username.clone(),
                        color: p.color,
                        victory_points: self.victory_points(idx, false),
                        longest_road: p.longest_road,
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSnapshot {
    pub id: String,
    pub mode: GameMode,
    pub winner: u16,
    pub turn: u32,
    pub robber: Coordinate,
    pub pirate: Option<Coordinate>,
    pub tiles: Vec<crate::board::Tile>,
    pub vertex_placements: Vec<(crate::coords::VertexCoordinate, crate::game::VertexPlacement)>,
    pub edge_placements: Vec<(crate::coords::EdgeCoordinate, crate::game::EdgePlacement)>,
    pub players: Vec<SnapshotPlayer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPlayer {
    pub order: u16,
    pub username: String,
    pub color: Color,
    pub victory_points: i32,
    pub longest_road: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::{game_on_map, two_player_base_game};
    use crate::game::{PlayerAction, PlayerActionData};

    #[test]
    fn state_seq_increments_on_every_broadcast() {
        let mut game = two_player_base_game();
        let before = game.state_seq;
        game.broadcast_state();
        game.broadcast_state();
        assert_eq!(game.state_seq, before + 2);
        assert_eq!(game.game_state().state_seq, game.state_seq);
    }

    #[test]
    fn paused_room_reports_no_deadline() {
        let mut game = two_player_base_game();
        game.players[0].time_left = 42;
        game.paused = true;
        let view = game.game_state();
        assert!(view.server_now_ms > 0);
        assert_eq!(view.timer_ends_at_ms, 0);
    }

    #[test]
    fn paused_room_with_pending_action_still_counts_down() {
        let mut game = two_player_base_game();
        game.players[0].time_left = 42;
        game.paused = true;
        game.players[0].pending_action = Some(PlayerAction {
            message: String::new(),
            can_cancel: false,
            data: PlayerActionData::ChooseTile { allowed: vec![] },
        });
        let view = game.game_state();
        assert!(view.timer_ends_at_ms >= view.server_now_ms + 42_000);
        assert!(view.timer_ends_at_ms <= view.server_now_ms + 43_000);
    }

    #[test]
    fn running_room_projects_the_deadline_from_time_left() {
        let mut game = two_player_base_game();
        game.players[0].time_left = 42;
        let view = game.game_state();
        assert!(view.timer_ends_at_ms >= view.server_now_ms + 42_000);
    }

    #[test]
    fn largest_army_is_counted_from_used_knights_in_seafarers() {
        let mut game = game_on_map(
            crate::board::maps::SEAFARERS_NEW_SHORES,
            crate::types::GameMode::Seafarers,
            2,
            4,
        );
        game.players[0]
            .hand
            .dev_card_deck_mut(DevCardKind::Knight)
            .num_used = 3;
        game.players[1]
            .hand
            .dev_card_deck_mut(DevCardKind::Knight)
            .num_used = 2;

        game.set_extra_victory_points();
        assert_eq!(game.extra_vp.largest_army_holder, Some(0));
        assert_eq!(game.extra_vp.largest_army_count, 3);
        assert_eq!(game.victory_points(0, true), 2);

        let view = game.player_state(0);
        assert_eq!(view.knights, 3);
        assert!(view.has_largest_army);
    }

    #[test]
    fn longest_road_holder_clears_when_nobody_qualifies() {
        let mut game = two_player_base_game();
        game.extra_vp.longest_road_holder = Some(1);
        game.players[1].longest_road = 5;

        // Recomputation with no placements finds nobody at five.
        game.set_extra_victory_points();
        assert_eq!(game.extra_vp.longest_road_holder, None);
    }

    #[test]
    fn secret_state_packs_dev_cards_with_usability_bit() {
        let mut game = two_player_base_game();
        let deck = game.players[0].hand.dev_card_deck_mut(DevCardKind::Knight);
        deck.quantity = 2;
        deck.can_use = true;
        let secret = game.player_secret_state(0);
        assert_eq!(secret.development_cards.len(), 2);
        for packed in secret.development_cards {
            assert_eq!(packed & !CAN_USE_BIT, DevCardKind::Knight as i32);
            assert!(packed & CAN_USE_BIT != 0);
        }
    }

    #[test]
    fn allowed_actions_are_all_false_for_non_current_player() {
        let mut game = two_player_base_game();
        game.init_phase = false;
        game.dice_state = DiceState::Rolled;
        let actions = game.allowed_actions(1);
        assert!(!actions.build_settlement);
        assert!(!actions.build_road);
        assert!(!actions.end_turn);
        assert!(!actions.trade);
    }

    #[test]
    fn victory_freezes_the_room_and_persists_a_snapshot() {
        let mut game = two_player_base_game();
        game.init_phase = false;
        game.scenario.bonus_vp.insert(0, 10);
        game.check_for_victory();
        assert!(game.game_over);

        let store = game.store.clone();
        let stored = store.as_any().downcast_ref::<crate::store::MemoryStore>();
        let stored = stored.expect("tests run on the memory store");
        assert!(stored.game_state_bytes("test-room").is_some());
        assert!(stored.finished("test-room"));
    }
}
