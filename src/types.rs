use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Resource and commodity card kinds. Discriminants are wire values and match
/// the tile kinds that produce them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum CardKind {
    Wood = 1,
    Brick = 2,
    Wool = 3,
    Wheat = 4,
    Ore = 5,
    Paper = 6,
    Cloth = 7,
    Coin = 8,
}

impl CardKind {
    pub const RESOURCES: [CardKind; 5] = [
        CardKind::Wood,
        CardKind::Brick,
        CardKind::Wool,
        CardKind::Wheat,
        CardKind::Ore,
    ];

    pub const COMMODITIES: [CardKind; 3] = [CardKind::Paper, CardKind::Cloth, CardKind::Coin];

    pub fn is_commodity(self) -> bool {
        matches!(self, CardKind::Paper | CardKind::Cloth | CardKind::Coin)
    }

    /// Commodity yielded alongside the resource by a city in Cities & Knights.
    pub fn commodity(self) -> Option<CardKind> {
        match self {
            CardKind::Wood => Some(CardKind::Paper),
            CardKind::Wool => Some(CardKind::Cloth),
            CardKind::Ore => Some(CardKind::Coin),
            _ => None,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum DevCardKind {
    Knight = 1,
    VictoryPoint = 2,
    RoadBuilding = 3,
    YearOfPlenty = 4,
    Monopoly = 5,
    // Progress cards, drawn from the commodity decks in Cities & Knights.
    Crane = 6,
    Engineer = 7,
    Irrigation = 8,
    Mining = 9,
    Merchant = 10,
    Bishop = 11,
    Constitution = 12,
    Printer = 13,
}

impl DevCardKind {
    pub const BASE: [DevCardKind; 5] = [
        DevCardKind::Knight,
        DevCardKind::VictoryPoint,
        DevCardKind::RoadBuilding,
        DevCardKind::YearOfPlenty,
        DevCardKind::Monopoly,
    ];

    pub fn is_progress(self) -> bool {
        !DevCardKind::BASE.contains(&self)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TileKind {
    None = 0,
    Wood = 1,
    Brick = 2,
    Wool = 3,
    Wheat = 4,
    Ore = 5,
    Desert = 6,
    Sea = 7,
    Gold = 8,
    Fog = 9,
    Random = 10,
}

impl TileKind {
    /// The card produced by this tile, if any. Gold prompts a choice instead.
    pub fn resource(self) -> Option<CardKind> {
        match self {
            TileKind::Wood => Some(CardKind::Wood),
            TileKind::Brick => Some(CardKind::Brick),
            TileKind::Wool => Some(CardKind::Wool),
            TileKind::Wheat => Some(CardKind::Wheat),
            TileKind::Ore => Some(CardKind::Ore),
            _ => None,
        }
    }

    pub fn is_land(self) -> bool {
        !matches!(self, TileKind::None | TileKind::Sea)
    }

    /// Tiles eligible for a number disc during board construction.
    pub fn takes_number(self) -> bool {
        self.is_land() && !matches!(self, TileKind::Desert)
    }

    pub fn from_code(code: i32) -> TileKind {
        match code {
            1 => TileKind::Wood,
            2 => TileKind::Brick,
            3 => TileKind::Wool,
            4 => TileKind::Wheat,
            5 => TileKind::Ore,
            6 => TileKind::Desert,
            7 => TileKind::Sea,
            8 => TileKind::Gold,
            9 => TileKind::Fog,
            10 => TileKind::Random,
            _ => TileKind::None,
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildableKind {
    Settlement,
    City,
    Road,
    Ship,
    Knight,
    Wall,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortKind {
    Any,
    Wood,
    Brick,
    Wool,
    Wheat,
    Ore,
}

impl PortKind {
    pub fn resource(self) -> Option<CardKind> {
        match self {
            PortKind::Any => None,
            PortKind::Wood => Some(CardKind::Wood),
            PortKind::Brick => Some(CardKind::Brick),
            PortKind::Wool => Some(CardKind::Wool),
            PortKind::Wheat => Some(CardKind::Wheat),
            PortKind::Ore => Some(CardKind::Ore),
        }
    }

    pub fn ratio(self) -> i16 {
        match self {
            PortKind::Any => 3,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum GameMode {
    Base = 1,
    CitiesAndKnights = 2,
    Seafarers = 3,
}

impl Default for GameMode {
    fn default() -> Self {
        GameMode::Base
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Red,
    Blue,
    Orange,
    White,
    Green,
    Purple,
}

impl Color {
    pub const ORDERED: [Color; 6] = [
        Color::Red,
        Color::Blue,
        Color::Orange,
        Color::White,
        Color::Green,
        Color::Purple,
    ];

    pub fn for_order(order: usize) -> Color {
        Color::ORDERED[order % Color::ORDERED.len()]
    }
}

// Per-mode inventory constants.
pub const BANK_RESOURCE_COUNT: i16 = 19;
pub const BANK_COMMODITY_COUNT: i16 = 12;
pub const DECK_KNIGHTS: usize = 14;
pub const DECK_VICTORY_POINTS: usize = 5;
pub const DECK_ROAD_BUILDING: usize = 2;
pub const DECK_YEAR_OF_PLENTY: usize = 2;
pub const DECK_MONOPOLY: usize = 2;

// Recognized speed keys; anything else falls back to the 60s tier.
pub const SPEED_15S: &str = "15s";
pub const SPEED_30S: &str = "30s";
pub const SPEED_60S: &str = "60s";
pub const SPEED_120S: &str = "120s";
pub const SPEED_200M: &str = "200m";
pub const SPEED_240S: &str = "240s";
pub const SPEED_SLOW: &str = "slow";
pub const SPEED_NORMAL: &str = "normal";
pub const SPEED_FAST: &str = "fast";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSettings {
    pub mode: GameMode,
    pub private: bool,
    pub map_name: String,
    pub discard_limit: i16,
    pub victory_points: i32,
    pub special_build: bool,
    pub max_players: usize,
    pub speed: String,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            mode: GameMode::Base,
            private: false,
            map_name: "Base".to_string(),
            discard_limit: 7,
            victory_points: 10,
            special_build: false,
            max_players: 4,
            speed: SPEED_60S.to_string(),
        }
    }
}
