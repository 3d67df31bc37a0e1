use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::coords::{Coordinate, EdgeCoordinate, FloatCoordinate, VertexCoordinate};
use crate::errors::EngineError;
use crate::types::{PortKind, TileKind};

mod builder;
pub mod maps;

pub use builder::build_graph;
pub use maps::{MapDefinition, ScenarioMetadata};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tile {
    pub center: Coordinate,
    pub kind: TileKind,
    pub number: u16,
    pub fog: bool,
}

impl Tile {
    pub fn is_land(&self) -> bool {
        self.kind.is_land()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub coord: VertexCoordinate,
    /// Centers of the adjacent tiles actually present on the board.
    pub adjacent_tiles: SmallVec<[Coordinate; 3]>,
    pub edges: SmallVec<[EdgeCoordinate; 3]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub coord: EdgeCoordinate,
    pub adjacent_tiles: SmallVec<[Coordinate; 2]>,
    pub land: bool,
    pub water: bool,
}

impl Edge {
    pub fn is_land_edge(&self) -> bool {
        self.land
    }

    pub fn is_water_edge(&self) -> bool {
        self.water
    }

    /// Both land and water: a coastline edge takes either a road or a ship.
    pub fn is_coastal(&self) -> bool {
        self.land && self.water
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub kind: PortKind,
    pub edge: EdgeCoordinate,
    pub ratio: i16,
}

/// The per-room board: tiles keyed by center, vertices and edges keyed by
/// their structural coordinates, plus the port layout.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub tiles: HashMap<Coordinate, Tile>,
    pub vertices: HashMap<VertexCoordinate, Vertex>,
    pub edges: HashMap<EdgeCoordinate, Edge>,
    pub ports: Vec<Port>,
}

impl Graph {
    pub fn vertex(&self, c: VertexCoordinate) -> Result<&Vertex, EngineError> {
        self.vertices.get(&c).ok_or(EngineError::UnknownVertex)
    }

    pub fn edge(&self, c: EdgeCoordinate) -> Result<&Edge, EngineError> {
        self.edges.get(&c).ok_or(EngineError::UnknownEdge)
    }

    pub fn tile(&self, c: Coordinate) -> Option<&Tile> {
        self.tiles.get(&c)
    }

    pub fn adjacent_vertex_edges(&self, v: VertexCoordinate) -> SmallVec<[EdgeCoordinate; 3]> {
        self.vertices
            .get(&v)
            .map(|vertex| vertex.edges.clone())
            .unwrap_or_default()
    }

    pub fn vertex_adjacent_tiles(&self, v: VertexCoordinate) -> SmallVec<[Coordinate; 3]> {
        self.vertices
            .get(&v)
            .map(|vertex| vertex.adjacent_tiles.clone())
            .unwrap_or_default()
    }

    pub fn edge_adjacent_tiles(&self, e: EdgeCoordinate) -> SmallVec<[Coordinate; 2]> {
        self.edges
            .get(&e)
            .map(|edge| edge.adjacent_tiles.clone())
            .unwrap_or_default()
    }

    /// The six side edges of a tile that exist on this board.
    pub fn tile_edge_coordinates(&self, center: Coordinate) -> SmallVec<[EdgeCoordinate; 6]> {
        center
            .sides()
            .into_iter()
            .filter(|ec| self.edges.contains_key(ec))
            .collect()
    }

    pub fn tile_vertex_coordinates(&self, center: Coordinate) -> SmallVec<[VertexCoordinate; 6]> {
        center
            .corners()
            .into_iter()
            .filter(|vc| self.vertices.contains_key(vc))
            .collect()
    }

    pub fn vertex_has_adjacent_sea(&self, v: VertexCoordinate) -> bool {
        self.vertex_adjacent_tiles(v)
            .iter()
            .any(|c| self.tiles.get(c).is_some_and(|t| t.kind == TileKind::Sea))
    }

    pub fn vertex_has_adjacent_fog(&self, v: VertexCoordinate) -> bool {
        self.vertex_adjacent_tiles(v)
            .iter()
            .any(|c| self.tiles.get(c).is_some_and(|t| t.fog))
    }

    /// Display positions for every tile center a client needs to draw.
    pub fn display_map(&self) -> (Vec<Coordinate>, Vec<FloatCoordinate>) {
        let mut keys = Vec::with_capacity(self.tiles.len());
        let mut values = Vec::with_capacity(self.tiles.len());
        for center in self.tiles.keys() {
            keys.push(*center);
            values.push(center.display());
        }
        (keys, values)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::types::GameMode;

    fn base_graph() -> Graph {
        let defn = maps::base_map();
        let mut rng = StdRng::seed_from_u64(1);
        build_graph(&defn, GameMode::Base, &mut rng)
            .expect("base board builds")
            .graph
    }

    #[test]
    fn adjacency_queries_agree_with_each_other() {
        let graph = base_graph();
        for tile in graph.tiles.values() {
            for vc in graph.tile_vertex_coordinates(tile.center) {
                assert!(graph.vertex_adjacent_tiles(vc).contains(&tile.center));
            }
            for ec in graph.tile_edge_coordinates(tile.center) {
                assert!(graph.edge_adjacent_tiles(ec).contains(&tile.center));
            }
        }
    }

    #[test]
    fn unknown_coordinates_resolve_to_errors() {
        let graph = base_graph();
        let far = Coordinate::new(400, 400);
        assert!(graph.tile(far).is_none());
        assert!(graph.vertex(far.corner(0)).is_err());
        assert!(graph.edge(far.side(0)).is_err());
    }

    #[test]
    fn display_map_covers_every_tile() {
        let graph = base_graph();
        let (keys, values) = graph.display_map();
        assert_eq!(keys.len(), graph.tiles.len());
        assert_eq!(keys.len(), values.len());
    }
}
