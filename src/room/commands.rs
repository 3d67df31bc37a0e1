//! The msgpack client command envelope: a map with a top-level tag `t`,
//! sub-tags for build targets (`o`), trade operations (`tt`) and info
//! requests (`rt`).

use serde::{Deserialize, Serialize};

use crate::game::ActionResponse;
use crate::game::trade::TradeOfferDetails;
use crate::types::{CardKind, DevCardKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ClientCommand {
    #[serde(rename = "i")]
    Init,
    #[serde(rename = "b")]
    Build {
        o: BuildTarget,
        #[serde(default)]
        dct: Option<DevCardKind>,
        #[serde(default)]
        ct: Option<CardKind>,
    },
    #[serde(rename = "d")]
    Dice,
    #[serde(rename = "et")]
    EndTurn,
    #[serde(rename = "sb")]
    SpecialBuild,
    #[serde(rename = "tr")]
    Trade {
        #[serde(flatten)]
        op: TradeOp,
    },
    #[serde(rename = "ar")]
    ActionResponse { ar_data: ActionResponse },
    #[serde(rename = "r")]
    Request {
        #[serde(flatten)]
        rt: InfoRequest,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildTarget {
    #[serde(rename = "s")]
    Settlement,
    #[serde(rename = "c")]
    City,
    #[serde(rename = "r")]
    Road,
    #[serde(rename = "sh")]
    Ship,
    #[serde(rename = "dc")]
    DevelopmentCard,
    #[serde(rename = "udc")]
    UseDevelopmentCard,
    #[serde(rename = "k")]
    Knight,
    #[serde(rename = "ka")]
    KnightActivate,
    #[serde(rename = "kr")]
    KnightRobber,
    #[serde(rename = "km")]
    KnightMove,
    #[serde(rename = "i")]
    CityImprovement,
    #[serde(rename = "w")]
    Wall,
    #[serde(rename = "ms")]
    MoveShip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tt")]
pub enum TradeOp {
    #[serde(rename = "co")]
    CreateOffer { offer: TradeOfferDetails },
    #[serde(rename = "ao")]
    AcceptOffer { oid: i32 },
    #[serde(rename = "ro")]
    RejectOffer { oid: i32 },
    #[serde(rename = "close")]
    CloseOffer {
        oid: i32,
        #[serde(rename = "acceptingPlayer")]
        accepting_player: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rt")]
pub enum InfoRequest {
    #[serde(rename = "gs")]
    GameState,
    #[serde(rename = "ph")]
    PlayerHand,
}

pub fn decode(data: &[u8]) -> Result<ClientCommand, rmp_serde::decode::Error> {
    rmp_serde::from_slice(data)
}

pub fn encode(command: &ClientCommand) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_tags_round_trip() {
        let commands = [
            ClientCommand::Init,
            ClientCommand::Dice,
            ClientCommand::EndTurn,
            ClientCommand::SpecialBuild,
            ClientCommand::Build {
                o: BuildTarget::Ship,
                dct: None,
                ct: None,
            },
            ClientCommand::Trade {
                op: TradeOp::AcceptOffer { oid: 3 },
            },
            ClientCommand::Request {
                rt: InfoRequest::PlayerHand,
            },
        ];
        for command in commands {
            let bytes = encode(&command).unwrap();
            let decoded = decode(&bytes).unwrap();
            assert_eq!(
                format!("{command:?}"),
                format!("{decoded:?}"),
                "command must survive the wire"
            );
        }
    }

    #[test]
    fn unknown_tag_is_a_protocol_error() {
        let bytes = rmp_serde::to_vec_named(&serde_json::json!({ "t": "zz" })).unwrap();
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn use_dev_card_carries_its_kind() {
        let bytes = encode(&ClientCommand::Build {
            o: BuildTarget::UseDevelopmentCard,
            dct: Some(DevCardKind::Monopoly),
            ct: None,
        })
        .unwrap();
        match decode(&bytes).unwrap() {
            ClientCommand::Build { o, dct, .. } => {
                assert_eq!(o, BuildTarget::UseDevelopmentCard);
                assert_eq!(dct, Some(DevCardKind::Monopoly));
            }
            other => panic!("unexpected decode: {other:?}"),
        }
    }
}
