use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;
use smallvec::SmallVec;

use crate::board::maps::MapDefinition;
use crate::board::{Edge, Graph, Port, Tile, Vertex};
use crate::coords::{Coordinate, EdgeCoordinate, VertexCoordinate};
use crate::errors::EngineError;
use crate::types::{GameMode, TileKind};

#[derive(Debug, Clone)]
pub struct BuiltBoard {
    pub graph: Graph,
    pub robber: Coordinate,
    pub pirate: Option<Coordinate>,
}

/// Instantiate a board from a map definition: materialize tiles, substitute
/// the randomized pools, seat the number discs, place robber and pirate, and
/// lay out the ports.
pub fn build_graph(
    defn: &MapDefinition,
    mode: GameMode,
    rng: &mut impl Rng,
) -> Result<BuiltBoard, EngineError> {
    let mut tiles = materialize_tiles(defn)?;
    substitute_random_tiles(&mut tiles, defn, rng)?;
    assign_numbers(&mut tiles, &defn.numbers, rng);

    let robber = place_robber(&tiles)?;
    let pirate = match mode {
        GameMode::Seafarers => place_pirate(&tiles),
        _ => None,
    };

    let mut graph = connect(tiles);
    instantiate_ports(&mut graph, defn);

    Ok(BuiltBoard {
        graph,
        robber,
        pirate,
    })
}

/// Tiles in a stable order so a seeded RNG reproduces the same board.
fn ordered_centers(tiles: &HashMap<Coordinate, Tile>) -> Vec<Coordinate> {
    let mut centers: Vec<Coordinate> = tiles.keys().copied().collect();
    centers.sort_by_key(|c| (c.y, c.x));
    centers
}

fn materialize_tiles(defn: &MapDefinition) -> Result<HashMap<Coordinate, Tile>, EngineError> {
    let mut tiles = HashMap::new();
    for (row, cells) in defn.map.iter().enumerate() {
        let shifted = defn.order.get(row).copied().unwrap_or(false);
        for (col, code) in cells.iter().enumerate() {
            let kind = TileKind::from_code(*code);
            if kind == TileKind::None {
                continue;
            }
            let center = Coordinate::new(col as i32 * 4 + if shifted { 2 } else { 0 }, row as i32 * 4);
            tiles.insert(
                center,
                Tile {
                    center,
                    kind,
                    number: 0,
                    fog: kind == TileKind::Fog,
                },
            );
        }
    }

    let land = tiles.values().filter(|t| t.kind != TileKind::Sea).count();
    if land < 2 {
        return Err(EngineError::InvalidMap("map needs at least two land cells"));
    }
    Ok(tiles)
}

fn substitute_random_tiles(
    tiles: &mut HashMap<Coordinate, Tile>,
    defn: &MapDefinition,
    rng: &mut impl Rng,
) -> Result<(), EngineError> {
    let slots: Vec<Coordinate> = ordered_centers(tiles)
        .into_iter()
        .filter(|c| matches!(tiles[c].kind, TileKind::Random | TileKind::Fog))
        .collect();
    if slots.is_empty() {
        return Ok(());
    }
    if defn.random_tiles.len() < slots.len() {
        return Err(EngineError::InvalidMap("random tile pool smaller than map slots"));
    }

    let mut pool = defn.random_tiles.clone();
    pool.shuffle(rng);
    for (slot, kind) in slots.into_iter().zip(pool) {
        let tile = tiles.get_mut(&slot).expect("slot came from the map");
        tile.kind = kind;
    }
    Ok(())
}

/// Seat the red numbers (6 and 8) first on random eligible tiles such that no
/// two red numbers end up adjacent; seat the rest without that constraint. A
/// red number that cannot be seated is demoted to the white pool.
fn assign_numbers(tiles: &mut HashMap<Coordinate, Tile>, numbers: &[u16], rng: &mut impl Rng) {
    let mut red: Vec<u16> = numbers.iter().copied().filter(|n| *n == 6 || *n == 8).collect();
    let mut white: Vec<u16> = numbers.iter().copied().filter(|n| *n != 6 && *n != 8).collect();

    let mut red_eligible: Vec<Coordinate> = ordered_centers(tiles)
        .into_iter()
        .filter(|c| tiles[c].kind.takes_number())
        .collect();
    let mut white_eligible = red_eligible.clone();

    while let Some(num) = red.pop() {
        if red_eligible.is_empty() {
            white.push(num);
            continue;
        }
        let idx = rng.gen_range(0..red_eligible.len());
        let center = red_eligible.swap_remove(idx);
        tiles.get_mut(&center).expect("eligible tile").number = num;
        white_eligible.retain(|c| *c != center);
        red_eligible.retain(|c| !center.is_neighbor_of(*c));
    }

    for num in white {
        if white_eligible.is_empty() {
            break;
        }
        let idx = rng.gen_range(0..white_eligible.len());
        let center = white_eligible.swap_remove(idx);
        tiles.get_mut(&center).expect("eligible tile").number = num;
    }
}

fn place_robber(tiles: &HashMap<Coordinate, Tile>) -> Result<Coordinate, EngineError> {
    let centers = ordered_centers(tiles);
    if let Some(c) = centers
        .iter()
        .find(|c| tiles[c].kind == TileKind::Desert && !tiles[c].fog)
    {
        return Ok(*c);
    }
    centers
        .iter()
        .find(|c| tiles[c].kind != TileKind::Sea && !tiles[c].fog)
        .copied()
        .ok_or(EngineError::InvalidMap("no tile can host the robber"))
}

fn place_pirate(tiles: &HashMap<Coordinate, Tile>) -> Option<Coordinate> {
    ordered_centers(tiles)
        .into_iter()
        .find(|c| tiles[c].kind == TileKind::Sea && !tiles[c].fog)
}

fn connect(tiles: HashMap<Coordinate, Tile>) -> Graph {
    let mut vertices: HashMap<VertexCoordinate, Vertex> = HashMap::new();
    let mut edges: HashMap<EdgeCoordinate, Edge> = HashMap::new();

    for center in ordered_centers(&tiles) {
        for corner in center.corners() {
            let vertex = vertices.entry(corner).or_insert_with(|| Vertex {
                coord: corner,
                adjacent_tiles: SmallVec::new(),
                edges: SmallVec::new(),
            });
            if !vertex.adjacent_tiles.contains(&center) {
                vertex.adjacent_tiles.push(center);
            }
        }
        for side in center.sides() {
            let edge = edges.entry(side).or_insert_with(|| Edge {
                coord: side,
                adjacent_tiles: SmallVec::new(),
                land: false,
                water: false,
            });
            if !edge.adjacent_tiles.contains(&center) {
                edge.adjacent_tiles.push(center);
            }
        }
    }

    for edge in edges.values_mut() {
        for c in &edge.adjacent_tiles {
            match tiles[c].kind {
                TileKind::Sea => edge.water = true,
                _ => edge.land = true,
            }
        }
    }

    let edge_keys: Vec<EdgeCoordinate> = edges.keys().copied().collect();
    for ec in edge_keys {
        for endpoint in ec.endpoints() {
            if let Some(vertex) = vertices.get_mut(&endpoint) {
                if !vertex.edges.contains(&ec) {
                    vertex.edges.push(ec);
                }
            }
        }
    }

    Graph {
        tiles,
        vertices,
        edges,
        ports: Vec::new(),
    }
}

/// Ports land on coastal edges in declaration order, spread around the coast.
fn instantiate_ports(graph: &mut Graph, defn: &MapDefinition) {
    if defn.ports.is_empty() {
        return;
    }

    let mut coastal: Vec<EdgeCoordinate> = graph
        .edges
        .values()
        .filter(|e| e.is_coastal())
        .map(|e| e.coord)
        .collect();
    if coastal.is_empty() {
        return;
    }

    let centroid = {
        let mut x = 0.0;
        let mut y = 0.0;
        for t in graph.tiles.values() {
            let f = t.center.display();
            x += f.x;
            y += f.y;
        }
        let n = graph.tiles.len() as f32;
        (x / n, y / n)
    };
    coastal.sort_by(|a, b| {
        let angle = |ec: &EdgeCoordinate| {
            let fa = ec.a.display();
            let fb = ec.b.display();
            let mx = (fa.x + fb.x) / 2.0 - centroid.0;
            let my = (fa.y + fb.y) / 2.0 - centroid.1;
            my.atan2(mx)
        };
        angle(a).total_cmp(&angle(b))
    });

    let step = coastal.len() / defn.ports.len().max(1);
    for (i, kind) in defn.ports.iter().enumerate() {
        let edge = coastal[(i * step.max(1)) % coastal.len()];
        graph.ports.push(Port {
            kind: *kind,
            edge,
            ratio: kind.ratio(),
        });
    }
}
