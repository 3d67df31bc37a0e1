//! Outbound message types. One enum covers the bootstrap sequence, delta
//! events and state snapshots; every variant is journaled and broadcast
//! through the same sink.

use serde::{Deserialize, Serialize};

use crate::board::{Edge, Port, Tile, Vertex};
use crate::coords::{Coordinate, EdgeCoordinate, FloatCoordinate, VertexCoordinate};
use crate::game::state::{GameOverView, GameStateView, PlayerSecretStateView};
use crate::game::trade::TradeOffer;
use crate::game::{EdgePlacement, PlayerAction, VertexPlacement};
use crate::types::{CardKind, DevCardKind, GameSettings};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "kebab-case")]
pub enum Message {
    // Bootstrap sequence, in the order the client must receive it.
    #[serde(rename = "i-st")]
    Settings(GameSettings),
    #[serde(rename = "i-m")]
    CoordMap {
        keys: Vec<Coordinate>,
        values: Vec<FloatCoordinate>,
    },
    #[serde(rename = "i-t")]
    TileInfo(Tile),
    #[serde(rename = "i-v")]
    VertexInfo(Vertex),
    #[serde(rename = "i-e")]
    EdgeInfo(Edge),
    #[serde(rename = "i-p")]
    PortInfo(Port),
    #[serde(rename = "i-c")]
    InitComplete,

    // Deltas, emitted as they happen.
    #[serde(rename = "d")]
    DiceRoll {
        red: u8,
        white: u8,
        event: u8,
        init: bool,
    },
    VertexPlacementBuilt {
        vertex: VertexCoordinate,
        placement: VertexPlacement,
    },
    VertexPlacementRemoved {
        vertex: VertexCoordinate,
    },
    EdgePlacementBuilt {
        edge: EdgeCoordinate,
        placement: EdgePlacement,
    },
    EdgePlacementRemoved {
        edge: EdgeCoordinate,
    },
    CardMove {
        from: i32,
        to: i32,
        kind: CardKind,
        qty: i16,
        discard: bool,
    },
    RobberMoved {
        tile: Coordinate,
    },
    PirateMoved {
        tile: Coordinate,
    },
    MerchantMoved {
        tile: Coordinate,
        owner: u16,
    },
    TileRevealed {
        tile: Tile,
    },
    DevCardBought {
        order: u16,
    },
    DevCardUsed {
        order: u16,
        card: DevCardKind,
    },
    CityImprovement {
        order: u16,
        track: CardKind,
        level: u8,
    },
    BarbarianAttack {
        strength: i32,
        defense: i32,
    },
    VpHolderChange {
        award: String,
        order: u16,
    },
    InitPhase {
        active: bool,
    },
    SpectatorList(Vec<String>),

    // Snapshots and room-level traffic.
    GameState(GameStateView),
    PlayerSecretState(PlayerSecretStateView),
    #[serde(rename = "player-action")]
    PlayerActionPrompt(PlayerAction),
    TradeOffer(TradeOffer),
    Error {
        message: String,
    },
    GameOver(GameOverView),
}

pub fn to_bytes(message: &Message) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(message)
}

pub fn from_bytes(data: &[u8]) -> Result<Message, rmp_serde::decode::Error> {
    rmp_serde::from_slice(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_messages_round_trip_through_msgpack() {
        let original = Message::DiceRoll {
            red: 3,
            white: 4,
            event: 0,
            init: false,
        };
        let bytes = to_bytes(&original).unwrap();
        match from_bytes(&bytes).unwrap() {
            Message::DiceRoll { red, white, .. } => {
                assert_eq!((red, white), (3, 4));
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }

    #[test]
    fn error_messages_carry_their_text() {
        let bytes = to_bytes(&Message::Error {
            message: "not your turn".to_string(),
        })
        .unwrap();
        match from_bytes(&bytes).unwrap() {
            Message::Error { message } => assert_eq!(message, "not your turn"),
            other => panic!("unexpected decode: {other:?}"),
        }
    }
}
