use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, mpsc};

use crate::coords::{EdgeCoordinate, VertexCoordinate};
use crate::game::hand::Hand;
use crate::game::prompt::{ActionResponse, PlayerAction};
use crate::messages::Message;
use crate::types::{CardKind, Color, GameMode};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BuildablesLeft {
    pub settlements: i16,
    pub cities: i16,
    pub roads: i16,
    pub ships: i16,
    pub knights: i16,
    pub walls: i16,
}

impl BuildablesLeft {
    pub fn standard(mode: GameMode) -> Self {
        Self {
            settlements: 5,
            cities: 4,
            roads: 15,
            ships: if mode == GameMode::Seafarers { 15 } else { 0 },
            knights: if mode == GameMode::CitiesAndKnights { 6 } else { 0 },
            walls: if mode == GameMode::CitiesAndKnights { 3 } else { 0 },
        }
    }
}

/// A seated participant (or spectator). The response channel feeds
/// `block_for_action`; the outbox is the per-client outbound queue, attached
/// when a transport connects and absent for headless tests and bots.
#[derive(Debug)]
pub struct Player {
    pub id: String,
    pub username: String,
    pub order: u16,
    pub color: Color,
    pub hand: Hand,
    pub buildables_left: BuildablesLeft,
    pub vertex_placements: Vec<VertexCoordinate>,
    pub edge_placements: Vec<EdgeCoordinate>,
    /// Ships laid this turn; they may not move until the next turn starts.
    pub ships_built_this_turn: Vec<EdgeCoordinate>,
    pub time_left: i32,
    pub pending_action: Option<PlayerAction>,
    pub is_spectator: bool,
    pub ship_moved: bool,
    pub special_build: bool,
    pub longest_road: usize,
    pub inactive_seconds: i32,
    pub played_dev_card_this_turn: bool,
    /// City improvement level per commodity track (Cities & Knights).
    pub improvements: BTreeMap<CardKind, u8>,
    pub crane_discount: bool,
    pub defender_points: i32,
    is_bot: AtomicBool,
    outbox: Option<mpsc::UnboundedSender<Message>>,
    response_tx: mpsc::UnboundedSender<ActionResponse>,
    response_rx: Option<mpsc::UnboundedReceiver<ActionResponse>>,
    pub cancel: Arc<Notify>,
}

impl Player {
    pub fn new(mode: GameMode, id: &str, username: &str, order: u16) -> Self {
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        Self {
            id: id.to_string(),
            username: username.to_string(),
            order,
            color: Color::for_order(order as usize),
            hand: Hand::new(mode),
            buildables_left: BuildablesLeft::standard(mode),
            vertex_placements: Vec::new(),
            edge_placements: Vec::new(),
            ships_built_this_turn: Vec::new(),
            time_left: 0,
            pending_action: None,
            is_spectator: false,
            ship_moved: false,
            special_build: false,
            longest_road: 0,
            inactive_seconds: 0,
            played_dev_card_this_turn: false,
            improvements: BTreeMap::new(),
            crane_discount: false,
            defender_points: 0,
            is_bot: AtomicBool::new(false),
            outbox: None,
            response_tx,
            response_rx: Some(response_rx),
            cancel: Arc::new(Notify::new()),
        }
    }

    pub fn spectator(mode: GameMode, id: &str, username: &str) -> Self {
        let mut p = Self::new(mode, id, username, u16::MAX);
        p.is_spectator = true;
        p
    }

    pub fn is_bot(&self) -> bool {
        self.is_bot.load(Ordering::Relaxed)
    }

    pub fn set_is_bot(&self, value: bool) {
        self.is_bot.store(value, Ordering::Relaxed);
    }

    /// Empty usernames are allowed and say nothing about bot status.
    pub fn set_username(&mut self, username: &str) {
        self.username = username.to_string();
    }

    pub fn attach_outbox(&mut self, tx: mpsc::UnboundedSender<Message>) {
        self.outbox = Some(tx);
    }

    pub fn detach_outbox(&mut self) {
        self.outbox = None;
    }

    pub fn has_outbox(&self) -> bool {
        self.outbox.is_some()
    }

    pub fn send_message(&self, message: &Message) {
        if let Some(outbox) = &self.outbox {
            // A lagging or gone client must never block the room.
            let _ = outbox.send(message.clone());
        }
    }

    /// Handle for the network layer to answer a prompt without the room lock.
    pub fn response_sender(&self) -> mpsc::UnboundedSender<ActionResponse> {
        self.response_tx.clone()
    }

    pub(crate) fn take_response_rx(&mut self) -> Option<mpsc::UnboundedReceiver<ActionResponse>> {
        self.response_rx.take()
    }

    pub(crate) fn put_response_rx(&mut self, rx: mpsc::UnboundedReceiver<ActionResponse>) {
        self.response_rx = Some(rx);
    }

    pub fn improvement_level(&self, track: CardKind) -> u8 {
        self.improvements.get(&track).copied().unwrap_or(0)
    }

    pub fn reset_turn_state(&mut self) {
        self.ship_moved = false;
        self.special_build = false;
        self.played_dev_card_this_turn = false;
        self.ships_built_this_turn.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_username_is_stored_and_does_not_flip_bot() {
        let mut p = Player::new(GameMode::Base, "p0", "p0", 0);
        p.set_username("");
        assert_eq!(p.username, "");
        assert!(!p.is_bot());
    }

    #[test]
    fn reset_turn_state_clears_ship_move_and_dev_card_flags() {
        let mut p = Player::new(GameMode::Seafarers, "p0", "p0", 0);
        p.ship_moved = true;
        p.played_dev_card_this_turn = true;
        p.special_build = true;
        p.reset_turn_state();
        assert!(!p.ship_moved);
        assert!(!p.played_dev_card_this_turn);
        assert!(!p.special_build);
    }
}
