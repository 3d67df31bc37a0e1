use crate::coords::{EdgeCoordinate, VertexCoordinate};
use crate::errors::EngineError;
use crate::game::{DiceState, EdgePlacement, Game, VertexPlacement};
use crate::messages::Message;
use crate::types::{BuildableKind, CardKind};

/// Resource cost of each buildable, paid into the bank.
pub fn build_cost(kind: BuildableKind) -> &'static [(CardKind, i16)] {
    match kind {
        BuildableKind::Settlement => &[
            (CardKind::Wood, 1),
            (CardKind::Brick, 1),
            (CardKind::Wool, 1),
            (CardKind::Wheat, 1),
        ],
        BuildableKind::City => &[(CardKind::Wheat, 2), (CardKind::Ore, 3)],
        BuildableKind::Road => &[(CardKind::Wood, 1), (CardKind::Brick, 1)],
        BuildableKind::Ship => &[(CardKind::Wood, 1), (CardKind::Wool, 1)],
        BuildableKind::Knight => &[(CardKind::Wool, 1), (CardKind::Ore, 1)],
        BuildableKind::Wall => &[(CardKind::Brick, 2)],
    }
}

impl Game {
    fn supply_left(&self, idx: usize, kind: BuildableKind) -> i16 {
        let left = &self.players[idx].buildables_left;
        match kind {
            BuildableKind::Settlement => left.settlements,
            BuildableKind::City => left.cities,
            BuildableKind::Road => left.roads,
            BuildableKind::Ship => left.ships,
            BuildableKind::Knight => left.knights,
            BuildableKind::Wall => left.walls,
        }
    }

    fn adjust_supply(&mut self, idx: usize, kind: BuildableKind, delta: i16) {
        let left = &mut self.players[idx].buildables_left;
        let slot = match kind {
            BuildableKind::Settlement => &mut left.settlements,
            BuildableKind::City => &mut left.cities,
            BuildableKind::Road => &mut left.roads,
            BuildableKind::Ship => &mut left.ships,
            BuildableKind::Knight => &mut left.knights,
            BuildableKind::Wall => &mut left.walls,
        };
        *slot += delta;
    }

    /// Supply and resource check; the initial placement pass builds for free.
    pub fn ensure_can_build(&self, idx: usize, kind: BuildableKind) -> Result<(), EngineError> {
        if self.supply_left(idx, kind) <= 0 {
            return Err(EngineError::NoneLeft(kind));
        }
        if self.init_phase {
            return Ok(());
        }
        if kind == BuildableKind::Road && self.road_building_free > 0 {
            return Ok(());
        }
        let hand = &self.players[idx].hand;
        for (card, qty) in build_cost(kind) {
            if hand.quantity(*card) < *qty {
                return Err(EngineError::InsufficientResources);
            }
        }
        Ok(())
    }

    fn pay_build_cost(&mut self, idx: usize, kind: BuildableKind) -> Result<(), EngineError> {
        if self.init_phase {
            return Ok(());
        }
        if kind == BuildableKind::Road && self.road_building_free > 0 {
            self.road_building_free -= 1;
            return Ok(());
        }
        let order = self.players[idx].order as i32;
        for (card, qty) in build_cost(kind) {
            self.move_cards(order, super::move_cards::BANK, *card, *qty, false, false)?;
        }
        Ok(())
    }

    fn ensure_build_phase(&self) -> Result<(), EngineError> {
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        if self.init_phase || self.special_build_phase || self.dice_state == DiceState::Rolled {
            Ok(())
        } else {
            Err(EngineError::WrongPhase)
        }
    }

    pub fn vertex_placement(&self, vc: VertexCoordinate) -> Option<&VertexPlacement> {
        self.vertex_placements.get(&vc)
    }

    pub fn edge_placement(&self, ec: EdgeCoordinate) -> Option<&EdgePlacement> {
        self.edge_placements.get(&ec)
    }

    fn vertex_has_own_building(&self, vc: VertexCoordinate, owner: u16) -> bool {
        self.vertex_placements
            .get(&vc)
            .is_some_and(|p| p.owner == owner && p.is_building())
    }

    /// No placement on this vertex or any neighbouring vertex.
    fn distance_rule_ok(&self, vc: VertexCoordinate) -> bool {
        for n in vc.neighbors() {
            if self.graph.vertices.contains_key(&n)
                && self
                    .vertex_placements
                    .get(&n)
                    .is_some_and(|p| p.is_building())
            {
                return false;
            }
        }
        true
    }

    pub(crate) fn vertex_connected_to_route(&self, vc: VertexCoordinate, owner: u16) -> bool {
        self.graph.adjacent_vertex_edges(vc).iter().any(|ec| {
            self.edge_placements
                .get(ec)
                .is_some_and(|p| p.owner == owner)
        })
    }

    // ---- settlements and cities ----

    pub fn build_settlement(
        &mut self,
        idx: usize,
        vc: VertexCoordinate,
    ) -> Result<(), EngineError> {
        self.ensure_build_phase()?;
        self.graph.vertex(vc)?;
        if self.vertex_placements.contains_key(&vc) {
            return Err(EngineError::Occupied);
        }
        if !self.distance_rule_ok(vc) {
            return Err(EngineError::DistanceRule);
        }
        let owner = self.players[idx].order;
        if !self.init_phase && !self.vertex_connected_to_route(vc, owner) {
            return Err(EngineError::NotConnected);
        }
        self.ensure_can_build(idx, BuildableKind::Settlement)?;
        self.pay_build_cost(idx, BuildableKind::Settlement)?;

        self.adjust_supply(idx, BuildableKind::Settlement, -1);
        let placement = VertexPlacement::building(owner, BuildableKind::Settlement);
        self.vertex_placements.insert(vc, placement);
        self.players[idx].vertex_placements.push(vc);
        self.emit_delta(Message::VertexPlacementBuilt {
            vertex: vc,
            placement,
        });

        self.on_scenario_settlement_built(idx, vc);
        self.set_extra_victory_points();
        self.check_for_victory();
        self.broadcast_state();
        Ok(())
    }

    pub fn build_city(&mut self, idx: usize, vc: VertexCoordinate) -> Result<(), EngineError> {
        self.ensure_build_phase()?;
        self.graph.vertex(vc)?;
        let owner = self.players[idx].order;
        let init_city = self.init_phase;
        if init_city {
            // Cities & Knights seats the reverse-pass placement as a city.
            if self.vertex_placements.contains_key(&vc) {
                return Err(EngineError::Occupied);
            }
            if !self.distance_rule_ok(vc) {
                return Err(EngineError::DistanceRule);
            }
        } else {
            let existing = self
                .vertex_placements
                .get(&vc)
                .ok_or(EngineError::IllegalPlacement(BuildableKind::City))?;
            if existing.owner != owner || existing.kind != BuildableKind::Settlement {
                return Err(EngineError::IllegalPlacement(BuildableKind::City));
            }
        }
        self.ensure_can_build(idx, BuildableKind::City)?;
        self.pay_build_cost(idx, BuildableKind::City)?;

        if init_city {
            self.adjust_supply(idx, BuildableKind::City, -1);
            self.players[idx].vertex_placements.push(vc);
        } else {
            // The settlement goes back to the supply.
            self.adjust_supply(idx, BuildableKind::Settlement, 1);
            self.adjust_supply(idx, BuildableKind::City, -1);
        }
        let placement = VertexPlacement::building(owner, BuildableKind::City);
        self.vertex_placements.insert(vc, placement);
        self.emit_delta(Message::VertexPlacementBuilt {
            vertex: vc,
            placement,
        });

        if init_city {
            self.on_scenario_settlement_built(idx, vc);
        }
        self.set_extra_victory_points();
        self.check_for_victory();
        self.broadcast_state();
        Ok(())
    }

    // ---- roads and ships ----

    fn route_connectivity_ok(&self, ec: EdgeCoordinate, owner: u16, ship: bool) -> bool {
        for v in ec.endpoints() {
            if !self.graph.vertices.contains_key(&v) {
                continue;
            }
            if ship {
                if self.vertex_has_own_building(v, owner)
                    && self.graph.vertex_has_adjacent_sea(v)
                {
                    return true;
                }
            } else if self.vertex_has_own_building(v, owner) {
                return true;
            }
            // Continue an existing route, unless an enemy building sits on
            // the junction.
            if let Some(p) = self.vertex_placements.get(&v) {
                if p.owner != owner && p.is_building() {
                    continue;
                }
            }
            let connected = self.graph.adjacent_vertex_edges(v).iter().any(|adj| {
                *adj != ec
                    && self.edge_placements.get(adj).is_some_and(|p| {
                        p.owner == owner
                            && p.kind == if ship { BuildableKind::Ship } else { BuildableKind::Road }
                    })
            });
            if connected {
                return true;
            }
        }
        false
    }

    pub fn build_road(&mut self, idx: usize, ec: EdgeCoordinate) -> Result<(), EngineError> {
        self.ensure_build_phase()?;
        let edge = self.graph.edge(ec)?;
        if !edge.is_land_edge() {
            return Err(EngineError::IllegalPlacement(BuildableKind::Road));
        }
        if self.edge_placements.contains_key(&ec) {
            return Err(EngineError::Occupied);
        }
        let owner = self.players[idx].order;
        if !self.route_connectivity_ok(ec, owner, false) {
            return Err(EngineError::NotConnected);
        }
        self.ensure_can_build(idx, BuildableKind::Road)?;
        self.pay_build_cost(idx, BuildableKind::Road)?;

        self.adjust_supply(idx, BuildableKind::Road, -1);
        let placement = EdgePlacement {
            owner,
            kind: BuildableKind::Road,
        };
        self.edge_placements.insert(ec, placement);
        self.players[idx].edge_placements.push(ec);
        self.emit_delta(Message::EdgePlacementBuilt {
            edge: ec,
            placement,
        });

        self.reveal_fog_for_route(idx, ec);
        self.set_extra_victory_points();
        self.check_for_victory();
        self.broadcast_state();
        Ok(())
    }

    pub fn is_pirate_blocking_edge(&self, ec: EdgeCoordinate) -> bool {
        let Some(pirate) = self.pirate else {
            return false;
        };
        self.graph
            .edge_adjacent_tiles(ec)
            .iter()
            .any(|c| *c == pirate)
    }

    pub fn build_ship(&mut self, idx: usize, ec: EdgeCoordinate) -> Result<(), EngineError> {
        self.ensure_build_phase()?;
        let edge = self.graph.edge(ec)?;
        if !edge.is_water_edge() {
            return Err(EngineError::IllegalPlacement(BuildableKind::Ship));
        }
        if self.edge_placements.contains_key(&ec) {
            return Err(EngineError::Occupied);
        }
        if self.is_pirate_blocking_edge(ec) {
            return Err(EngineError::IllegalPlacement(BuildableKind::Ship));
        }
        let owner = self.players[idx].order;
        if !self.route_connectivity_ok(ec, owner, true) {
            return Err(EngineError::NotConnected);
        }
        self.ensure_can_build(idx, BuildableKind::Ship)?;
        self.pay_build_cost(idx, BuildableKind::Ship)?;

        self.adjust_supply(idx, BuildableKind::Ship, -1);
        let placement = EdgePlacement {
            owner,
            kind: BuildableKind::Ship,
        };
        self.edge_placements.insert(ec, placement);
        self.players[idx].edge_placements.push(ec);
        self.players[idx].ships_built_this_turn.push(ec);
        self.emit_delta(Message::EdgePlacementBuilt {
            edge: ec,
            placement,
        });

        self.reveal_fog_for_route(idx, ec);
        self.set_extra_victory_points();
        self.check_for_victory();
        self.broadcast_state();
        Ok(())
    }

    // ---- removal (ship movement, barbarian city loss, tests) ----

    pub fn remove_vertex_placement(&mut self, vc: VertexCoordinate) -> Result<(), EngineError> {
        let placement = self
            .vertex_placements
            .remove(&vc)
            .ok_or(EngineError::UnknownVertex)?;
        if let Some(idx) = self.player_by_order(placement.owner) {
            self.players[idx].vertex_placements.retain(|c| *c != vc);
            self.adjust_supply(idx, placement.kind, 1);
        }
        self.emit_delta(Message::VertexPlacementRemoved { vertex: vc });
        Ok(())
    }

    pub fn remove_edge_placement(&mut self, ec: EdgeCoordinate) -> Result<(), EngineError> {
        let placement = self
            .edge_placements
            .remove(&ec)
            .ok_or(EngineError::UnknownEdge)?;
        if let Some(idx) = self.player_by_order(placement.owner) {
            self.players[idx].edge_placements.retain(|c| *c != ec);
            self.players[idx]
                .ships_built_this_turn
                .retain(|c| *c != ec);
            self.adjust_supply(idx, placement.kind, 1);
        }
        self.emit_delta(Message::EdgePlacementRemoved { edge: ec });
        Ok(())
    }

    // ---- build location enumeration ----

    pub fn build_locations_settlement(&self, idx: usize, init: bool) -> Vec<VertexCoordinate> {
        let owner = self.players[idx].order;
        let mut out = Vec::new();
        for vc in self.graph.vertices.keys() {
            if self.vertex_placements.contains_key(vc) || !self.distance_rule_ok(*vc) {
                continue;
            }
            // Settlements need at least one land tile to stand on.
            let on_land = self
                .graph
                .vertex_adjacent_tiles(*vc)
                .iter()
                .any(|c| self.graph.tiles.get(c).is_some_and(|t| t.is_land()));
            if !on_land {
                continue;
            }
            if init || self.vertex_connected_to_route(*vc, owner) {
                out.push(*vc);
            }
        }
        out.sort();
        out
    }

    pub fn build_locations_city(&self, idx: usize) -> Vec<VertexCoordinate> {
        let owner = self.players[idx].order;
        let mut out: Vec<VertexCoordinate> = self
            .vertex_placements
            .iter()
            .filter(|(_, p)| p.owner == owner && p.kind == BuildableKind::Settlement)
            .map(|(vc, _)| *vc)
            .collect();
        out.sort();
        out
    }

    pub fn build_locations_road(&self, idx: usize, init: bool) -> Vec<EdgeCoordinate> {
        let owner = self.players[idx].order;
        let mut out = Vec::new();
        for (ec, edge) in &self.graph.edges {
            if !edge.is_land_edge() || self.edge_placements.contains_key(ec) {
                continue;
            }
            if init {
                // During init the road anchors to a fresh settlement; any
                // endpoint with an own building qualifies.
                let anchored = ec
                    .endpoints()
                    .iter()
                    .any(|v| self.vertex_has_own_building(*v, owner));
                if anchored {
                    out.push(*ec);
                }
            } else if self.route_connectivity_ok(*ec, owner, false) {
                out.push(*ec);
            }
        }
        out.sort();
        out
    }

    pub fn build_locations_ship(&self, idx: usize) -> Vec<EdgeCoordinate> {
        let owner = self.players[idx].order;
        let mut out = Vec::new();
        for (ec, edge) in &self.graph.edges {
            if !edge.is_water_edge()
                || self.edge_placements.contains_key(ec)
                || self.is_pirate_blocking_edge(*ec)
            {
                continue;
            }
            if self.route_connectivity_ok(*ec, owner, true) {
                out.push(*ec);
            }
        }
        out.sort();
        out
    }

    // ---- ship movement ----

    pub fn movable_ships(&self, idx: usize) -> Vec<EdgeCoordinate> {
        let player = &self.players[idx];
        let mut out = Vec::new();
        for ec in &player.edge_placements {
            let Some(p) = self.edge_placements.get(ec) else {
                continue;
            };
            if p.kind != BuildableKind::Ship {
                continue;
            }
            if player.ships_built_this_turn.contains(ec) {
                continue;
            }
            if self.is_pirate_blocking_edge(*ec) {
                continue;
            }
            out.push(*ec);
        }
        out.sort();
        out
    }

    /// One ship per turn, only after the dice, never one laid this turn.
    pub fn move_ship(
        &mut self,
        idx: usize,
        from: EdgeCoordinate,
        to: EdgeCoordinate,
    ) -> Result<(), EngineError> {
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        if self.init_phase || self.dice_state != DiceState::Rolled {
            return Err(EngineError::WrongPhase);
        }
        if self.players[idx].ship_moved {
            return Err(EngineError::ShipAlreadyMoved);
        }
        if from == to {
            return Err(EngineError::IllegalPlacement(BuildableKind::Ship));
        }
        if !self.movable_ships(idx).contains(&from) {
            return Err(EngineError::IllegalPlacement(BuildableKind::Ship));
        }

        let owner = self.players[idx].order;
        self.remove_edge_placement(from)?;
        let destination_ok = self.graph.edges.get(&to).is_some_and(|e| e.is_water_edge())
            && !self.edge_placements.contains_key(&to)
            && !self.is_pirate_blocking_edge(to)
            && self.route_connectivity_ok(to, owner, true);
        if !destination_ok {
            // Put the ship back exactly where it was.
            self.adjust_supply(idx, BuildableKind::Ship, -1);
            self.edge_placements.insert(
                from,
                EdgePlacement {
                    owner,
                    kind: BuildableKind::Ship,
                },
            );
            self.players[idx].edge_placements.push(from);
            return Err(EngineError::IllegalPlacement(BuildableKind::Ship));
        }

        self.adjust_supply(idx, BuildableKind::Ship, -1);
        let placement = EdgePlacement {
            owner,
            kind: BuildableKind::Ship,
        };
        self.edge_placements.insert(to, placement);
        self.players[idx].edge_placements.push(to);
        self.players[idx].ship_moved = true;
        self.emit_delta(Message::EdgePlacementBuilt {
            edge: to,
            placement,
        });

        self.reveal_fog_for_route(idx, to);
        self.set_extra_victory_points();
        self.check_for_victory();
        self.broadcast_state();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::{two_player_base_game, two_player_seafarers_game};
    use crate::types::TileKind;

    fn first_settlement_spot(game: &Game) -> VertexCoordinate {
        game.build_locations_settlement(0, true)[0]
    }

    #[test]
    fn init_settlement_is_free_and_respects_distance_rule() {
        let mut game = two_player_base_game();
        let vc = first_settlement_spot(&game);
        game.build_settlement(0, vc).unwrap();
        assert_eq!(game.players[0].buildables_left.settlements, 4);
        assert_eq!(game.players[0].hand.card_count(), 0);

        for n in vc.neighbors() {
            if game.graph.vertices.contains_key(&n) {
                assert!(matches!(
                    game.build_settlement(1, n),
                    Err(EngineError::DistanceRule)
                ));
            }
        }
    }

    #[test]
    fn vertex_carries_at_most_one_placement() {
        let mut game = two_player_base_game();
        let vc = first_settlement_spot(&game);
        game.build_settlement(0, vc).unwrap();
        assert!(matches!(
            game.build_settlement(1, vc),
            Err(EngineError::Occupied)
        ));
    }

    #[test]
    fn build_then_remove_restores_the_supply_and_the_site() {
        let mut game = two_player_base_game();
        let vc = first_settlement_spot(&game);
        game.build_settlement(0, vc).unwrap();
        game.remove_vertex_placement(vc).unwrap();
        assert!(game.vertex_placement(vc).is_none());
        assert_eq!(game.players[0].buildables_left.settlements, 5);
        assert!(game.players[0].vertex_placements.is_empty());
    }

    #[test]
    fn road_requires_connection_outside_init() {
        let mut game = two_player_base_game();
        let vc = first_settlement_spot(&game);
        game.build_settlement(0, vc).unwrap();
        game.init_phase = false;
        game.dice_state = DiceState::Rolled;
        game.players[0].hand.set_resources(5, 5, 5, 5, 5);

        let attached = game
            .graph
            .adjacent_vertex_edges(vc)
            .iter()
            .copied()
            .find(|ec| game.graph.edges[ec].is_land_edge())
            .expect("settlement has a land edge");
        game.build_road(0, attached).unwrap();

        let detached = game
            .graph
            .edges
            .values()
            .find(|e| {
                e.is_land_edge()
                    && !game.edge_placements.contains_key(&e.coord)
                    && !game.route_connectivity_ok(e.coord, 0, false)
            })
            .expect("some unconnected land edge");
        assert!(matches!(
            game.build_road(0, detached.coord),
            Err(EngineError::NotConnected)
        ));
    }

    #[test]
    fn road_on_pure_water_edge_is_rejected() {
        let mut game = two_player_seafarers_game();
        let water = game
            .graph
            .edges
            .values()
            .find(|e| e.is_water_edge() && !e.is_land_edge())
            .expect("sea edge exists")
            .coord;
        let err = game.build_road(0, water).unwrap_err();
        assert!(matches!(err, EngineError::IllegalPlacement(BuildableKind::Road)));
    }

    #[test]
    fn newly_built_ship_cannot_move_until_next_turn() {
        let mut game = two_player_seafarers_game();
        let coastal = game
            .build_locations_settlement(0, true)
            .into_iter()
            .find(|vc| game.graph.vertex_has_adjacent_sea(*vc))
            .expect("coastal settlement location");
        game.build_settlement(0, coastal).unwrap();
        game.init_phase = false;
        game.dice_state = DiceState::Rolled;
        game.players[0].hand.set_resources(10, 10, 10, 10, 10);
        game.pirate = None;

        let ship_spot = game
            .build_locations_ship(0)
            .first()
            .copied()
            .expect("ship location next to coastal settlement");
        game.build_ship(0, ship_spot).unwrap();
        assert!(game.movable_ships(0).is_empty());

        game.players[0].reset_turn_state();
        assert_eq!(game.movable_ships(0), vec![ship_spot]);
    }

    #[test]
    fn ship_moves_once_per_turn_and_only_after_dice() {
        let mut game = two_player_seafarers_game();
        let coastal = game
            .build_locations_settlement(0, true)
            .into_iter()
            .max_by_key(|vc| {
                game.graph
                    .adjacent_vertex_edges(*vc)
                    .iter()
                    .filter(|ec| game.graph.edges[*ec].is_water_edge())
                    .count()
            })
            .expect("coastal settlement location");
        game.build_settlement(0, coastal).unwrap();
        game.init_phase = false;
        game.dice_state = DiceState::Rolled;
        game.players[0].hand.set_resources(10, 10, 10, 10, 10);
        game.pirate = None;

        let from = game.build_locations_ship(0)[0];
        game.build_ship(0, from).unwrap();
        game.players[0].reset_turn_state();

        // Anchor the destination to the settlement so it stays legal once
        // the moving ship is lifted off the board.
        let to = game
            .build_locations_ship(0)
            .into_iter()
            .find(|ec| *ec != from && ec.endpoints().contains(&coastal))
            .expect("destination edge");

        game.dice_state = DiceState::Unrolled;
        assert!(matches!(
            game.move_ship(0, from, to),
            Err(EngineError::WrongPhase)
        ));

        game.dice_state = DiceState::Rolled;
        game.move_ship(0, from, to).unwrap();
        assert!(game.edge_placement(to).is_some());
        assert!(game.edge_placement(from).is_none());

        assert!(matches!(
            game.move_ship(0, to, from),
            Err(EngineError::ShipAlreadyMoved)
        ));
    }

    #[test]
    fn pirate_blocks_ship_building_on_its_tile() {
        let mut game = two_player_seafarers_game();
        let pirate = game.pirate.expect("seafarers game has a pirate");
        assert_eq!(game.graph.tiles[&pirate].kind, TileKind::Sea);
        for ec in game.graph.tile_edge_coordinates(pirate) {
            assert!(game.is_pirate_blocking_edge(ec));
        }
    }
}
