//! The passive map catalog: rectangular grids of tile codes plus the
//! randomized pools and scenario metadata the builder consumes.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::types::{PortKind, TileKind};

pub const BASE_MAP: &str = "Base";
pub const SEAFARERS_NEW_SHORES: &str = "Seafarers - Heading for New Shores";
pub const SEAFARERS_FOUR_ISLANDS: &str = "Seafarers - The Four Islands";
pub const SEAFARERS_FOG_ISLANDS: &str = "Seafarers - The Fog Islands";
pub const SEAFARERS_THROUGH_DESERT: &str = "Seafarers - Through the Desert";

pub const SCENARIO_NEW_SHORES: &str = "seafarers_heading_for_new_shores";
pub const SCENARIO_FOUR_ISLANDS: &str = "seafarers_four_islands";
pub const SCENARIO_FOG_ISLANDS: &str = "seafarers_fog_islands";
pub const SCENARIO_THROUGH_DESERT: &str = "seafarers_through_the_desert";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioMetadata {
    pub expansion: String,
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub victory_points: i32,
    #[serde(default)]
    pub victory_rule_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDefinition {
    pub name: String,
    /// Per-row offset flags: a `true` row is shifted half a tile to the east.
    pub order: Vec<bool>,
    pub ports: Vec<PortKind>,
    pub numbers: Vec<u16>,
    pub random_tiles: Vec<TileKind>,
    pub map: Vec<Vec<i32>>,
    pub scenario: Option<ScenarioMetadata>,
}

pub fn official_map_names() -> Vec<&'static str> {
    vec![
        BASE_MAP,
        SEAFARERS_NEW_SHORES,
        SEAFARERS_FOUR_ISLANDS,
        SEAFARERS_FOG_ISLANDS,
        SEAFARERS_THROUGH_DESERT,
    ]
}

pub fn by_name(name: &str) -> Option<MapDefinition> {
    match name {
        BASE_MAP => Some(base_map()),
        SEAFARERS_NEW_SHORES => NEW_SHORES.clone(),
        SEAFARERS_FOUR_ISLANDS => Some(four_islands_map()),
        SEAFARERS_FOG_ISLANDS => Some(fog_islands_map()),
        SEAFARERS_THROUGH_DESERT => Some(through_desert_map()),
        _ => None,
    }
}

const N: i32 = TileKind::None as i32;
const S: i32 = TileKind::Sea as i32;
const R: i32 = TileKind::Random as i32;
const F: i32 = TileKind::Fog as i32;
const D: i32 = TileKind::Desert as i32;

pub fn base_map() -> MapDefinition {
    MapDefinition {
        name: BASE_MAP.to_string(),
        order: vec![true, false, true, false, true, false, true],
        ports: vec![
            PortKind::Any,
            PortKind::Wood,
            PortKind::Any,
            PortKind::Brick,
            PortKind::Any,
            PortKind::Wool,
            PortKind::Any,
            PortKind::Wheat,
            PortKind::Ore,
        ],
        numbers: vec![2, 3, 3, 4, 4, 5, 5, 6, 6, 8, 8, 9, 9, 10, 10, 11, 11, 12],
        random_tiles: vec![
            TileKind::Wood,
            TileKind::Wood,
            TileKind::Wood,
            TileKind::Wood,
            TileKind::Brick,
            TileKind::Brick,
            TileKind::Brick,
            TileKind::Wool,
            TileKind::Wool,
            TileKind::Wool,
            TileKind::Wool,
            TileKind::Wheat,
            TileKind::Wheat,
            TileKind::Wheat,
            TileKind::Wheat,
            TileKind::Ore,
            TileKind::Ore,
            TileKind::Ore,
            TileKind::Desert,
        ],
        map: vec![
            vec![N, S, S, S, S, N, N],
            vec![N, S, R, R, R, S, N],
            vec![S, R, R, R, R, S, N],
            vec![S, R, R, R, R, R, S],
            vec![S, R, R, R, R, S, N],
            vec![N, S, R, R, R, S, N],
            vec![N, S, S, S, S, N, N],
        ],
        scenario: None,
    }
}

/// The original ships this layout as JSON; kept that way so user-authored
/// maps and the built-in one go through the same deserialization path.
static NEW_SHORES_JSON: &str = r#"{
  "name": "Seafarers - Heading for New Shores",
  "order": [false, true, false, true, false],
  "ports": ["ANY", "ANY", "ANY", "WOOD", "WOOL", "ORE"],
  "numbers": [2, 3, 3, 4, 4, 5, 5, 6, 6, 8, 8, 9, 10, 11, 12],
  "random_tiles": [
    "WOOD", "WOOD", "WOOD", "BRICK", "BRICK", "WOOL", "WOOL", "WOOL",
    "WHEAT", "WHEAT", "WHEAT", "ORE", "ORE", "GOLD", "GOLD"
  ],
  "map": [
    [10, 7, 10, 7, 10, 0],
    [7, 7, 7, 7, 7, 0],
    [10, 10, 10, 10, 10, 0],
    [10, 10, 10, 10, 7, 0],
    [7, 10, 10, 10, 0, 0]
  ],
  "scenario": {
    "expansion": "Seafarers",
    "key": "seafarers_heading_for_new_shores",
    "title": "Seafarers - Heading for New Shores",
    "victory_points": 14,
    "victory_rule_text": "If you have 14 or more VPs at any point during your turn, you win."
  }
}"#;

pub fn new_shores_map() -> Option<MapDefinition> {
    serde_json::from_str(NEW_SHORES_JSON).ok()
}

static NEW_SHORES: Lazy<Option<MapDefinition>> = Lazy::new(new_shores_map);

pub fn four_islands_map() -> MapDefinition {
    MapDefinition {
        name: SEAFARERS_FOUR_ISLANDS.to_string(),
        order: vec![false, true, false, true, false],
        ports: vec![
            PortKind::Any,
            PortKind::Any,
            PortKind::Any,
            PortKind::Wood,
            PortKind::Wool,
            PortKind::Ore,
        ],
        numbers: vec![3, 4, 5, 6, 8, 9, 10, 11],
        random_tiles: vec![
            TileKind::Desert,
            TileKind::Wood,
            TileKind::Wood,
            TileKind::Brick,
            TileKind::Brick,
            TileKind::Wool,
            TileKind::Wheat,
            TileKind::Wheat,
            TileKind::Ore,
        ],
        map: vec![
            vec![N, R, R, N, N],
            vec![R, S, S, R, N],
            vec![S, S, R, S, S],
            vec![R, S, S, R, N],
            vec![N, R, R, N, N],
        ],
        scenario: Some(ScenarioMetadata {
            expansion: "Seafarers".to_string(),
            key: SCENARIO_FOUR_ISLANDS.to_string(),
            title: SEAFARERS_FOUR_ISLANDS.to_string(),
            victory_points: 13,
            victory_rule_text: "If you have 13 or more VPs at any point during your turn, you win."
                .to_string(),
        }),
    }
}

pub fn fog_islands_map() -> MapDefinition {
    MapDefinition {
        name: SEAFARERS_FOG_ISLANDS.to_string(),
        order: vec![false, true, false, true, false],
        ports: vec![
            PortKind::Any,
            PortKind::Any,
            PortKind::Any,
            PortKind::Wood,
            PortKind::Wool,
            PortKind::Ore,
        ],
        numbers: vec![2, 3, 3, 4, 4, 5, 5, 6, 8, 9, 10, 11, 12],
        random_tiles: vec![
            TileKind::Desert,
            TileKind::Wood,
            TileKind::Wood,
            TileKind::Brick,
            TileKind::Brick,
            TileKind::Wool,
            TileKind::Wool,
            TileKind::Wheat,
            TileKind::Wheat,
            TileKind::Ore,
            TileKind::Gold,
        ],
        map: vec![
            vec![N, R, R, R, N],
            vec![R, S, F, S, N],
            vec![R, S, R, S, R],
            vec![N, S, F, S, N],
            vec![N, R, R, R, N],
        ],
        scenario: Some(ScenarioMetadata {
            expansion: "Seafarers".to_string(),
            key: SCENARIO_FOG_ISLANDS.to_string(),
            title: SEAFARERS_FOG_ISLANDS.to_string(),
            victory_points: 12,
            victory_rule_text: "If you have 12 or more VPs at any point during your turn, you win."
                .to_string(),
        }),
    }
}

pub fn through_desert_map() -> MapDefinition {
    MapDefinition {
        name: SEAFARERS_THROUGH_DESERT.to_string(),
        order: vec![false, true, false, true, false],
        ports: vec![
            PortKind::Any,
            PortKind::Any,
            PortKind::Any,
            PortKind::Wood,
            PortKind::Brick,
            PortKind::Wheat,
            PortKind::Wool,
            PortKind::Ore,
        ],
        numbers: vec![2, 3, 3, 4, 4, 5, 5, 6, 8, 9, 10, 10, 11, 12],
        random_tiles: vec![
            TileKind::Desert,
            TileKind::Desert,
            TileKind::Wood,
            TileKind::Wood,
            TileKind::Brick,
            TileKind::Brick,
            TileKind::Wool,
            TileKind::Wool,
            TileKind::Wheat,
            TileKind::Wheat,
            TileKind::Ore,
            TileKind::Ore,
            TileKind::Gold,
            TileKind::Gold,
            TileKind::Wood,
            TileKind::Wheat,
        ],
        map: vec![
            vec![N, R, R, R, N],
            vec![R, S, R, S, R],
            vec![R, S, D, S, R],
            vec![R, S, R, S, R],
            vec![N, R, R, R, N],
        ],
        scenario: Some(ScenarioMetadata {
            expansion: "Seafarers".to_string(),
            key: SCENARIO_THROUGH_DESERT.to_string(),
            title: SEAFARERS_THROUGH_DESERT.to_string(),
            victory_points: 14,
            victory_rule_text: "If you have 14 or more VPs at any point during your turn, you win."
                .to_string(),
        }),
    }
}
