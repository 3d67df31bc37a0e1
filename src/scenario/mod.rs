//! Scenario rules as tagged variants: each shipped scenario customizes init
//! filtering, settlement bonuses and the victory target through a `match` on
//! its kind, selected once at room setup.

use std::collections::{HashMap, HashSet};

use crate::board::maps::{
    self, MapDefinition,
};
use crate::coords::{Coordinate, EdgeCoordinate, VertexCoordinate};
use crate::game::Game;
use crate::types::TileKind;

mod fog;
mod regions;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    #[default]
    None,
    NewShores,
    FourIslands,
    ThroughDesert,
    FogIslands,
}

impl ScenarioKind {
    pub fn from_key(key: &str) -> ScenarioKind {
        match key {
            maps::SCENARIO_NEW_SHORES => ScenarioKind::NewShores,
            maps::SCENARIO_FOUR_ISLANDS => ScenarioKind::FourIslands,
            maps::SCENARIO_THROUGH_DESERT => ScenarioKind::ThroughDesert,
            maps::SCENARIO_FOG_ISLANDS => ScenarioKind::FogIslands,
            _ => ScenarioKind::None,
        }
    }

    /// Through the Desert splits land regions at the desert strip.
    fn excludes_desert(self) -> bool {
        self == ScenarioKind::ThroughDesert
    }

    fn restricts_init_to_main_region(self) -> bool {
        matches!(self, ScenarioKind::NewShores | ScenarioKind::ThroughDesert)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScenarioState {
    pub kind: ScenarioKind,
    pub victory_points: i32,
    /// Bonus victory points per seat order.
    pub bonus_vp: HashMap<u16, i32>,
    pub region_by_tile: HashMap<Coordinate, u32>,
    pub main_region: u32,
    /// Four Islands: the islands a player's first two settlements touch.
    pub home_regions: HashMap<u16, HashSet<u32>>,
    pub awarded_regions: HashMap<u16, HashSet<u32>>,
    pub fog_tile_stack: Vec<TileKind>,
    pub fog_number_stack: Vec<u16>,
}

impl ScenarioState {
    pub fn for_map(defn: &MapDefinition) -> Self {
        let (kind, victory_points) = defn
            .scenario
            .as_ref()
            .map(|meta| (ScenarioKind::from_key(&meta.key), meta.victory_points))
            .unwrap_or((ScenarioKind::None, 0));
        Self {
            kind,
            victory_points,
            ..Self::default()
        }
    }

    pub fn bonus_for(&self, order: u16) -> i32 {
        self.bonus_vp.get(&order).copied().unwrap_or(0)
    }
}

impl Game {
    pub(crate) fn scenario_finalize_setup(&mut self) {
        if self.scenario.kind == ScenarioKind::FogIslands {
            self.initialize_fog_stacks();
        }
    }

    /// Scenario metadata wins over room settings when both carry a target.
    pub fn victory_target(&self) -> i32 {
        if self.scenario.victory_points > 0 {
            return self.scenario.victory_points;
        }
        self.settings.victory_points
    }

    pub(crate) fn ensure_land_regions(&mut self) {
        if !self.scenario.region_by_tile.is_empty() {
            return;
        }
        let (by_tile, main) =
            regions::compute_land_regions(&self.graph, self.scenario.kind.excludes_desert());
        self.scenario.region_by_tile = by_tile;
        self.scenario.main_region = main;
    }

    fn vertex_touches_region(&self, vc: VertexCoordinate, region: u32) -> bool {
        self.graph
            .vertex_adjacent_tiles(vc)
            .iter()
            .any(|c| self.scenario.region_by_tile.get(c) == Some(&region))
    }

    fn edge_touches_region(&self, ec: EdgeCoordinate, region: u32) -> bool {
        self.graph
            .edge_adjacent_tiles(ec)
            .iter()
            .any(|c| self.scenario.region_by_tile.get(c) == Some(&region))
    }

    pub(crate) fn filter_init_vertices(
        &mut self,
        _idx: usize,
        allowed: Vec<VertexCoordinate>,
    ) -> Vec<VertexCoordinate> {
        if !self.scenario.kind.restricts_init_to_main_region() {
            return allowed;
        }
        self.ensure_land_regions();
        let main = self.scenario.main_region;
        if main == 0 {
            return allowed;
        }
        allowed
            .into_iter()
            .filter(|vc| self.vertex_touches_region(*vc, main))
            .collect()
    }

    pub(crate) fn filter_init_edges(
        &mut self,
        _idx: usize,
        allowed: Vec<EdgeCoordinate>,
    ) -> Vec<EdgeCoordinate> {
        if self.scenario.kind != ScenarioKind::NewShores {
            return allowed;
        }
        self.ensure_land_regions();
        let main = self.scenario.main_region;
        if main == 0 {
            return allowed;
        }
        allowed
            .into_iter()
            .filter(|ec| self.edge_touches_region(*ec, main))
            .collect()
    }

    pub(crate) fn on_scenario_settlement_built(&mut self, idx: usize, vc: VertexCoordinate) {
        match self.scenario.kind {
            ScenarioKind::NewShores | ScenarioKind::ThroughDesert => {
                if !self.is_init_phase() {
                    self.award_region_bonus(idx, vc);
                }
            }
            ScenarioKind::FourIslands => {
                if self.is_init_phase() {
                    self.track_home_islands(idx, vc);
                } else {
                    self.award_island_bonus(idx, vc);
                }
            }
            _ => {}
        }
    }

    pub(crate) fn on_scenario_turn_start(&mut self, _idx: usize) {}

    pub(crate) fn on_scenario_dice_rolled(&mut self, _sum: u8) {}

    /// Default victory rule; scenario targets flow in via
    /// [`Game::victory_target`].
    pub(crate) fn scenario_victory_winner(&self) -> Option<usize> {
        let idx = self.current_player;
        if idx >= self.players.len() {
            return None;
        }
        let vp = self.victory_points(idx, false);
        (vp >= self.victory_target()).then_some(idx)
    }

    /// New Shores / Through the Desert: +2 once per outer region per player.
    /// A settlement bridging two outer regions still awards a single bonus.
    fn award_region_bonus(&mut self, idx: usize, vc: VertexCoordinate) {
        self.ensure_land_regions();
        let main = self.scenario.main_region;
        if self.scenario.region_by_tile.is_empty() || main == 0 {
            return;
        }
        let order = self.players[idx].order;
        let touched: Vec<u32> = self
            .graph
            .vertex_adjacent_tiles(vc)
            .iter()
            .filter_map(|c| self.scenario.region_by_tile.get(c).copied())
            .filter(|rid| *rid != main)
            .collect();
        let awarded = self.scenario.awarded_regions.entry(order).or_default();
        let fresh = touched.into_iter().find(|rid| awarded.insert(*rid));
        if fresh.is_some() {
            *self.scenario.bonus_vp.entry(order).or_insert(0) += 2;
        }
    }

    /// Four Islands: the first two init settlements define home.
    fn track_home_islands(&mut self, idx: usize, vc: VertexCoordinate) {
        self.ensure_land_regions();
        if self.scenario.region_by_tile.is_empty() {
            return;
        }
        let order = self.players[idx].order;
        if self.players[idx].vertex_placements.len() > 2 {
            return;
        }
        let touched: Vec<u32> = self
            .graph
            .vertex_adjacent_tiles(vc)
            .iter()
            .filter_map(|c| self.scenario.region_by_tile.get(c).copied())
            .collect();
        let home = self.scenario.home_regions.entry(order).or_default();
        for rid in touched {
            home.insert(rid);
        }
    }

    /// Four Islands: +2 the first time a player settles a non-home island.
    fn award_island_bonus(&mut self, idx: usize, vc: VertexCoordinate) {
        self.ensure_land_regions();
        if self.scenario.region_by_tile.is_empty() {
            return;
        }
        let order = self.players[idx].order;
        let touched: Vec<u32> = self
            .graph
            .vertex_adjacent_tiles(vc)
            .iter()
            .filter_map(|c| self.scenario.region_by_tile.get(c).copied())
            .collect();
        let home = self.scenario.home_regions.entry(order).or_default().clone();
        let awarded = self.scenario.awarded_regions.entry(order).or_default();
        let fresh = touched
            .into_iter()
            .find(|rid| !home.contains(rid) && awarded.insert(*rid));
        if fresh.is_some() {
            *self.scenario.bonus_vp.entry(order).or_insert(0) += 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::game_on_map;
    use crate::types::GameMode;

    fn scenario_game(map: &str) -> Game {
        game_on_map(map, GameMode::Seafarers, 2, 21)
    }

    fn vertex_touching_region(game: &mut Game, want_main: bool) -> VertexCoordinate {
        game.ensure_land_regions();
        let main = game.scenario.main_region;
        *game
            .graph
            .vertices
            .keys()
            .find(|vc| {
                let regions: Vec<u32> = game
                    .graph
                    .vertex_adjacent_tiles(**vc)
                    .iter()
                    .filter_map(|c| game.scenario.region_by_tile.get(c).copied())
                    .collect();
                if want_main {
                    regions.contains(&main)
                } else {
                    !regions.is_empty() && !regions.contains(&main)
                }
            })
            .expect("matching vertex exists")
    }

    #[test]
    fn new_shores_restricts_init_vertices_to_the_main_island() {
        let mut game = scenario_game(maps::SEAFARERS_NEW_SHORES);
        let all = game.build_locations_settlement(0, true);
        let filtered = game.filter_init_vertices(0, all.clone());
        assert!(!filtered.is_empty());
        assert!(filtered.len() < all.len(), "outer islands must be filtered");
        let main = game.scenario.main_region;
        for vc in &filtered {
            assert!(game.vertex_touches_region(*vc, main));
        }
    }

    #[test]
    fn new_shores_outer_island_awards_two_points_once_per_region() {
        let mut game = scenario_game(maps::SEAFARERS_NEW_SHORES);
        game.init_phase = false;
        let outer = vertex_touching_region(&mut game, false);

        game.on_scenario_settlement_built(0, outer);
        assert_eq!(game.scenario.bonus_for(0), 2);

        // Settling the same island again pays nothing more.
        game.on_scenario_settlement_built(0, outer);
        assert_eq!(game.scenario.bonus_for(0), 2);
    }

    #[test]
    fn new_shores_main_island_settlement_awards_nothing() {
        let mut game = scenario_game(maps::SEAFARERS_NEW_SHORES);
        game.init_phase = false;
        let main_vertex = vertex_touching_region(&mut game, true);
        game.on_scenario_settlement_built(0, main_vertex);
        assert_eq!(game.scenario.bonus_for(0), 0);
    }

    #[test]
    fn four_islands_first_two_settlements_mark_home() {
        let mut game = scenario_game(maps::SEAFARERS_FOUR_ISLANDS);
        game.ensure_land_regions();
        let spots = game.build_locations_settlement(0, true);
        game.build_settlement(0, spots[0]).unwrap();
        let spots = game.build_locations_settlement(0, true);
        game.build_settlement(0, spots[0]).unwrap();

        let home = game.scenario.home_regions.get(&0).cloned().unwrap_or_default();
        assert!(!home.is_empty(), "init settlements must mark home islands");

        // Settling a home island later awards nothing.
        game.init_phase = false;
        let home_vertex = *game
            .graph
            .vertices
            .keys()
            .find(|vc| {
                game.graph
                    .vertex_adjacent_tiles(**vc)
                    .iter()
                    .filter_map(|c| game.scenario.region_by_tile.get(c))
                    .any(|rid| home.contains(rid))
            })
            .unwrap();
        game.on_scenario_settlement_built(0, home_vertex);
        assert_eq!(game.scenario.bonus_for(0), 0);
    }

    #[test]
    fn four_islands_awards_independently_per_island_and_player() {
        let mut game = scenario_game(maps::SEAFARERS_FOUR_ISLANDS);
        game.ensure_land_regions();
        game.init_phase = false;

        // No homes recorded: every island is unexplored for both players.
        let regions: Vec<u32> = {
            let mut seen: Vec<u32> = game.scenario.region_by_tile.values().copied().collect();
            seen.sort_unstable();
            seen.dedup();
            seen
        };
        assert!(regions.len() >= 2, "map must have several islands");

        let vertex_on = |game: &Game, rid: u32| {
            *game
                .graph
                .vertices
                .keys()
                .find(|vc| {
                    game.graph
                        .vertex_adjacent_tiles(**vc)
                        .iter()
                        .any(|c| game.scenario.region_by_tile.get(c) == Some(&rid))
                })
                .unwrap()
        };

        let a = vertex_on(&game, regions[0]);
        let b = vertex_on(&game, regions[1]);
        game.on_scenario_settlement_built(0, a);
        game.on_scenario_settlement_built(0, b);
        assert_eq!(game.scenario.bonus_for(0), 4);

        game.on_scenario_settlement_built(1, a);
        assert_eq!(game.scenario.bonus_for(1), 2, "players award independently");
    }

    #[test]
    fn through_desert_pays_at_most_once_per_settlement() {
        let mut game = scenario_game(maps::SEAFARERS_THROUGH_DESERT);
        game.ensure_land_regions();
        game.init_phase = false;
        let main = game.scenario.main_region;

        // A vertex bridging two outer regions, if the seed produced one,
        // still pays a single +2.
        let bridging = game.graph.vertices.keys().find(|vc| {
            let mut rids: Vec<u32> = game
                .graph
                .vertex_adjacent_tiles(**vc)
                .iter()
                .filter_map(|c| game.scenario.region_by_tile.get(c).copied())
                .filter(|rid| *rid != main)
                .collect();
            rids.sort_unstable();
            rids.dedup();
            rids.len() >= 2
        });
        if let Some(vc) = bridging.copied() {
            game.on_scenario_settlement_built(0, vc);
            assert_eq!(game.scenario.bonus_for(0), 2);
        } else {
            let outer = vertex_touching_region(&mut game, false);
            game.on_scenario_settlement_built(0, outer);
            game.on_scenario_settlement_built(0, outer);
            assert_eq!(game.scenario.bonus_for(0), 2);
        }
    }

    #[test]
    fn through_desert_regions_split_at_the_desert() {
        let mut game = scenario_game(maps::SEAFARERS_THROUGH_DESERT);
        game.ensure_land_regions();
        for (center, _) in game.scenario.region_by_tile.clone() {
            assert_ne!(game.graph.tiles[&center].kind, TileKind::Desert);
        }
    }

    #[test]
    fn scenario_victory_target_prefers_metadata() {
        let game = scenario_game(maps::SEAFARERS_THROUGH_DESERT);
        assert_eq!(game.victory_target(), 14);

        let base = game_on_map(maps::BASE_MAP, GameMode::Base, 2, 1);
        assert_eq!(base.victory_target(), 10);
    }

    #[test]
    fn through_desert_reaches_victory_via_bonus_points() {
        let mut game = scenario_game(maps::SEAFARERS_THROUGH_DESERT);
        game.init_phase = false;
        game.scenario.bonus_vp.insert(0, 14);
        let winner = game.scenario_victory_winner();
        assert_eq!(winner, Some(0));
    }
}
