use std::collections::HashSet;

use crate::coords::{EdgeCoordinate, VertexCoordinate};
use crate::game::Game;
use crate::types::BuildableKind;

impl Game {
    /// Longest route over the player's roads and ships. Two placements link
    /// when they meet at a vertex that is empty or the player's own; a
    /// road↔ship transition additionally needs an own settlement or city on
    /// the junction. An enemy building on the junction severs the route.
    pub fn longest_road_length(&self, idx: usize) -> usize {
        let owner = self.players[idx].order;
        let owned: Vec<EdgeCoordinate> = self.players[idx]
            .edge_placements
            .iter()
            .copied()
            .filter(|ec| {
                self.edge_placements.get(ec).is_some_and(|p| {
                    matches!(p.kind, BuildableKind::Road | BuildableKind::Ship)
                })
            })
            .collect();
        if owned.is_empty() {
            return 0;
        }

        let mut visited: HashSet<EdgeCoordinate> = HashSet::with_capacity(owned.len());
        let mut longest = 0;
        for ec in &owned {
            for at in ec.endpoints() {
                let len = self.route_dfs(owner, *ec, at, &mut visited);
                longest = longest.max(len);
            }
            debug_assert!(visited.is_empty(), "visited marker must unwind");
        }
        longest
    }

    fn route_dfs(
        &self,
        owner: u16,
        current: EdgeCoordinate,
        at: VertexCoordinate,
        visited: &mut HashSet<EdgeCoordinate>,
    ) -> usize {
        visited.insert(current);
        let mut best = 0;
        for next in self.linked_routes(owner, current, at) {
            if visited.contains(&next) {
                continue;
            }
            let len = self.route_dfs(owner, next, next.other_end(at), visited);
            best = best.max(len);
        }
        visited.remove(&current);
        1 + best
    }

    fn linked_routes(
        &self,
        owner: u16,
        current: EdgeCoordinate,
        at: VertexCoordinate,
    ) -> Vec<EdgeCoordinate> {
        let Some(current_kind) = self.edge_placements.get(&current).map(|p| p.kind) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for adj in self.graph.adjacent_vertex_edges(at) {
            if adj == current {
                continue;
            }
            let Some(p) = self.edge_placements.get(&adj) else {
                continue;
            };
            if p.owner != owner || !matches!(p.kind, BuildableKind::Road | BuildableKind::Ship) {
                continue;
            }
            if self.route_transition_ok(owner, at, current_kind, p.kind) {
                out.push(adj);
            }
        }
        out
    }

    fn route_transition_ok(
        &self,
        owner: u16,
        at: VertexCoordinate,
        from: BuildableKind,
        to: BuildableKind,
    ) -> bool {
        match self.vertex_placements.get(&at) {
            Some(p) if p.is_building() && p.owner != owner => false,
            Some(p) if p.is_building() && p.owner == owner => true,
            _ => from == to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::{two_player_base_game, two_player_seafarers_game};
    use crate::game::{EdgePlacement, VertexPlacement};

    fn lay_route(game: &mut Game, idx: usize, kind: BuildableKind, ec: EdgeCoordinate) {
        let owner = game.players[idx].order;
        game.edge_placements.insert(ec, EdgePlacement { owner, kind });
        game.players[idx].edge_placements.push(ec);
    }

    fn put_building(game: &mut Game, idx: usize, kind: BuildableKind, vc: VertexCoordinate) {
        let owner = game.players[idx].order;
        game.vertex_placements
            .insert(vc, VertexPlacement::building(owner, kind));
        game.players[idx].vertex_placements.push(vc);
    }

    /// A straight chain of edges starting from a vertex, following the board.
    fn chain_from(game: &Game, start: VertexCoordinate, len: usize) -> Vec<EdgeCoordinate> {
        let mut out = Vec::new();
        let mut at = start;
        let mut last: Option<EdgeCoordinate> = None;
        while out.len() < len {
            let next = game
                .graph
                .adjacent_vertex_edges(at)
                .into_iter()
                .find(|ec| Some(*ec) != last && game.graph.edges.contains_key(ec))
                .expect("chain can continue");
            out.push(next);
            at = next.other_end(at);
            last = Some(next);
        }
        out
    }

    fn some_inland_vertex(game: &Game) -> VertexCoordinate {
        *game
            .graph
            .vertices
            .iter()
            .find(|(vc, v)| v.edges.len() == 3 && !game.graph.vertex_has_adjacent_sea(**vc))
            .map(|(vc, _)| vc)
            .expect("board has inland vertices")
    }

    #[test]
    fn two_disjoint_chains_of_three_score_three() {
        let mut game = two_player_base_game();
        let start = some_inland_vertex(&game);
        let first = chain_from(&game, start, 3);
        for ec in &first {
            lay_route(&mut game, 0, BuildableKind::Road, *ec);
        }

        // A second chain sharing no vertex with the first.
        let first_vertices: std::collections::HashSet<VertexCoordinate> = first
            .iter()
            .flat_map(|ec| ec.endpoints())
            .collect();
        let second = game
            .graph
            .vertices
            .keys()
            .filter(|vc| game.graph.vertices[*vc].edges.len() == 3)
            .map(|vc| chain_from(&game, *vc, 3))
            .find(|chain| {
                chain
                    .iter()
                    .flat_map(|ec| ec.endpoints())
                    .all(|v| !first_vertices.contains(&v))
            })
            .expect("disjoint chain exists");
        for ec in second {
            lay_route(&mut game, 0, BuildableKind::Road, ec);
        }

        assert_eq!(game.longest_road_length(0), 3);
    }

    #[test]
    fn ship_road_chain_counts_through_an_own_settlement() {
        let mut game = two_player_seafarers_game();
        let junction = *game
            .graph
            .vertices
            .iter()
            .find(|(_, v)| {
                let lands = v
                    .edges
                    .iter()
                    .filter(|ec| game.graph.edges[*ec].is_land_edge())
                    .count();
                let waters = v
                    .edges
                    .iter()
                    .filter(|ec| game.graph.edges[*ec].is_water_edge())
                    .count();
                lands >= 1 && waters >= 1
            })
            .map(|(vc, _)| vc)
            .expect("coastal junction vertex");

        let edges = game.graph.adjacent_vertex_edges(junction);
        let land = edges
            .iter()
            .copied()
            .find(|ec| game.graph.edges[ec].is_land_edge())
            .unwrap();
        let water = edges
            .iter()
            .copied()
            .find(|ec| game.graph.edges[ec].is_water_edge() && *ec != land)
            .unwrap();

        lay_route(&mut game, 0, BuildableKind::Road, land);
        lay_route(&mut game, 0, BuildableKind::Ship, water);

        // Without a building on the junction the two halves stay separate.
        assert_eq!(game.longest_road_length(0), 1);

        put_building(&mut game, 0, BuildableKind::Settlement, junction);
        assert_eq!(game.longest_road_length(0), 2);
    }

    #[test]
    fn tie_at_five_keeps_the_previous_holder() {
        let mut game = two_player_base_game();
        let start = some_inland_vertex(&game);
        let first = chain_from(&game, start, 5);
        for ec in &first {
            lay_route(&mut game, 0, BuildableKind::Road, *ec);
        }

        let first_vertices: std::collections::HashSet<VertexCoordinate> = first
            .iter()
            .flat_map(|ec| ec.endpoints())
            .collect();
        let second = game
            .graph
            .vertices
            .keys()
            .filter(|vc| game.graph.vertices[*vc].edges.len() == 3)
            .map(|vc| chain_from(&game, *vc, 5))
            .find(|chain| {
                chain
                    .iter()
                    .flat_map(|ec| ec.endpoints())
                    .all(|v| !first_vertices.contains(&v))
            })
            .expect("disjoint chain exists");
        for ec in second {
            lay_route(&mut game, 1, BuildableKind::Road, ec);
        }

        game.extra_vp.longest_road_holder = Some(1);
        game.set_extra_victory_points();
        assert_eq!(
            game.extra_vp.longest_road_holder,
            Some(1),
            "a tied challenger must not take the card"
        );
    }

    #[test]
    fn enemy_settlement_on_the_junction_severs_the_route() {
        let mut game = two_player_base_game();
        let start = some_inland_vertex(&game);
        let chain = chain_from(&game, start, 4);
        for ec in &chain {
            lay_route(&mut game, 0, BuildableKind::Road, *ec);
        }
        assert_eq!(game.longest_road_length(0), 4);

        // The junction between the second and third edge.
        let cut = if chain[1].has_endpoint(chain[2].a) {
            chain[2].a
        } else {
            chain[2].b
        };
        put_building(&mut game, 1, BuildableKind::Settlement, cut);
        assert_eq!(game.longest_road_length(0), 2);
    }
}
