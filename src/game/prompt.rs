use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{self, MissedTickBehavior};

use crate::coords::{Coordinate, EdgeCoordinate, VertexCoordinate};
use crate::errors::EngineError;
use crate::game::Game;
use crate::messages::Message;
use crate::types::{BuildableKind, CardKind};

/// A prompt attached to a player while rule code is suspended on the answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerAction {
    pub message: String,
    pub can_cancel: bool,
    pub data: PlayerActionData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerActionData {
    ChooseVertex {
        allowed: Vec<VertexCoordinate>,
    },
    ChooseEdge {
        allowed: Vec<EdgeCoordinate>,
    },
    ChooseTile {
        allowed: Vec<Coordinate>,
    },
    SelectCards {
        allowed_kinds: Vec<CardKind>,
        quantity: u16,
        not_self_hand: bool,
    },
    ChoosePlayer {
        allowed: Vec<u16>,
    },
    ChooseBuildable {
        allow_road: bool,
        allow_ship: bool,
    },
}

/// Payload delivered on the player's expect channel by an `ar` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionResponse {
    Vertex { vertex: VertexCoordinate },
    Edge { edge: EdgeCoordinate },
    Tile { tile: Coordinate },
    Cards { cards: Vec<CardKind> },
    Player { order: u16 },
    Buildable { buildable: BuildableKind },
    Cancel,
}

impl ActionResponse {
    pub fn into_vertex(self) -> Option<VertexCoordinate> {
        match self {
            ActionResponse::Vertex { vertex } => Some(vertex),
            _ => None,
        }
    }

    pub fn into_edge(self) -> Option<EdgeCoordinate> {
        match self {
            ActionResponse::Edge { edge } => Some(edge),
            _ => None,
        }
    }

    pub fn into_tile(self) -> Option<Coordinate> {
        match self {
            ActionResponse::Tile { tile } => Some(tile),
            _ => None,
        }
    }

    pub fn into_cards(self) -> Option<Vec<CardKind>> {
        match self {
            ActionResponse::Cards { cards } => Some(cards),
            _ => None,
        }
    }

    pub fn into_player(self) -> Option<u16> {
        match self {
            ActionResponse::Player { order } => Some(order),
            _ => None,
        }
    }

    pub fn into_buildable(self) -> Option<BuildableKind> {
        match self {
            ActionResponse::Buildable { buildable } => Some(buildable),
            _ => None,
        }
    }
}

impl Game {
    /// Suspend the calling rule code until the player answers, the per-action
    /// countdown runs out, or the prompt is cancelled. The room lock stays
    /// held for the whole suspension; the answer arrives through the player's
    /// dedicated channel, which the network layer feeds without the lock.
    ///
    /// `timeout_secs == 0` keeps whatever is left on the player's clock, so
    /// mid-turn prompts spend turn time.
    ///
    /// Only one prompt per player may be outstanding; a second one is a bug
    /// in the calling rule code.
    pub async fn block_for_action(
        &mut self,
        idx: usize,
        timeout_secs: i32,
        action: PlayerAction,
    ) -> Result<ActionResponse, EngineError> {
        {
            let player = &mut self.players[idx];
            if player.pending_action.is_some() {
                // Rule code must never stack prompts on one player.
                return Err(EngineError::PromptBusy);
            }
            if player.is_bot() {
                // Bots answer through the AI fallback in the caller.
                return Err(EngineError::Timeout);
            }
            if timeout_secs > 0 {
                player.time_left = timeout_secs;
            }
            player.pending_action = Some(action.clone());
        }
        self.bump_timer_phase();
        self.players[idx].send_message(&Message::PlayerActionPrompt(action));

        let mut rx = self.players[idx]
            .take_response_rx()
            .ok_or(EngineError::PromptBusy)?;
        while rx.try_recv().is_ok() {
            // Stale answers from an earlier prompt.
        }
        let cancel = self.players[idx].cancel.clone();
        // Register the waiter once so a cancellation fired between loop
        // iterations is never lost.
        let mut cancelled = std::pin::pin!(cancel.notified());
        let mut countdown = time::interval(Duration::from_secs(1));
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);
        countdown.tick().await;

        let outcome = loop {
            tokio::select! {
                resp = rx.recv() => match resp {
                    Some(ActionResponse::Cancel) => break Err(EngineError::Cancelled),
                    Some(resp) => break Ok(resp),
                    None => break Err(EngineError::Cancelled),
                },
                _ = &mut cancelled => break Err(EngineError::Cancelled),
                _ = countdown.tick() => {
                    let player = &mut self.players[idx];
                    player.time_left -= 1;
                    if player.time_left <= 0 {
                        break Err(EngineError::Timeout);
                    }
                }
            }
        };

        let player = &mut self.players[idx];
        player.put_response_rx(rx);
        player.pending_action = None;
        self.bump_timer_phase();
        outcome
    }

    pub fn has_player_pending_action(&self) -> bool {
        self.players.iter().any(|p| p.pending_action.is_some())
    }
}
