use rand::seq::SliceRandom;

use crate::coords::EdgeCoordinate;
use crate::game::Game;
use crate::messages::Message;
use crate::types::TileKind;

impl Game {
    /// Record what hides under the fog. Tiles keep their substituted kind
    /// and number behind the flag (broadcasts mask them); the shuffled
    /// stacks mirror the hidden contents for discovery bookkeeping.
    pub(crate) fn initialize_fog_stacks(&mut self) {
        let mut tile_stack = Vec::new();
        let mut number_stack = Vec::new();
        let mut centers: Vec<_> = self.graph.tiles.keys().copied().collect();
        centers.sort_by_key(|c| (c.y, c.x));
        for center in centers {
            let tile = &self.graph.tiles[&center];
            if !tile.fog {
                continue;
            }
            tile_stack.push(tile.kind);
            if tile.kind != TileKind::Sea && tile.kind != TileKind::Desert && tile.number > 0 {
                number_stack.push(tile.number);
            }
        }
        tile_stack.shuffle(&mut self.rng);
        number_stack.shuffle(&mut self.rng);
        self.scenario.fog_tile_stack = tile_stack;
        self.scenario.fog_number_stack = number_stack;
    }

    /// A road or ship on an edge next to fog lifts it: the tile broadcasts
    /// its real kind and number, and a revealed land tile pays the builder
    /// one of its resource if the bank can cover it.
    pub(crate) fn reveal_fog_for_route(&mut self, idx: usize, ec: EdgeCoordinate) {
        let centers = self.graph.edge_adjacent_tiles(ec);
        for center in centers {
            let Some(tile) = self.graph.tiles.get_mut(&center) else {
                continue;
            };
            if !tile.fog {
                continue;
            }
            tile.fog = false;
            let revealed = tile.clone();
            if !self.scenario.fog_tile_stack.is_empty() {
                self.scenario.fog_tile_stack.pop();
            }
            if revealed.kind.takes_number() && !self.scenario.fog_number_stack.is_empty() {
                self.scenario.fog_number_stack.pop();
            }
            self.emit_delta(Message::TileRevealed {
                tile: revealed.clone(),
            });

            if let Some(kind) = revealed.kind.resource() {
                let order = self.players[idx].order as i32;
                let _ = self.move_cards(
                    crate::game::move_cards::BANK,
                    order,
                    kind,
                    1,
                    true,
                    false,
                );
            }
        }
    }
}
