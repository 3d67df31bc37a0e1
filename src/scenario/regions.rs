use std::collections::HashMap;

use crate::board::Graph;
use crate::coords::Coordinate;
use crate::types::TileKind;

/// Label connected land regions by flood fill and return the map together
/// with the id of the largest one. With `exclude_desert` the desert belongs
/// to no region, so land masses on either side of a desert strip come out
/// as separate regions.
pub fn compute_land_regions(
    graph: &Graph,
    exclude_desert: bool,
) -> (HashMap<Coordinate, u32>, u32) {
    let counts_as_land = |kind: TileKind| -> bool {
        if kind == TileKind::Sea || kind == TileKind::None {
            return false;
        }
        !(exclude_desert && kind == TileKind::Desert)
    };

    let mut centers: Vec<Coordinate> = graph
        .tiles
        .values()
        .filter(|t| counts_as_land(t.kind))
        .map(|t| t.center)
        .collect();
    centers.sort_by_key(|c| (c.y, c.x));

    let mut by_tile: HashMap<Coordinate, u32> = HashMap::new();
    let mut sizes: HashMap<u32, usize> = HashMap::new();
    let mut next_region = 0u32;

    for start in centers {
        if by_tile.contains_key(&start) {
            continue;
        }
        next_region += 1;
        let mut stack = vec![start];
        while let Some(center) = stack.pop() {
            if by_tile.contains_key(&center) {
                continue;
            }
            let Some(tile) = graph.tiles.get(&center) else {
                continue;
            };
            if !counts_as_land(tile.kind) {
                continue;
            }
            by_tile.insert(center, next_region);
            *sizes.entry(next_region).or_insert(0) += 1;
            for n in center.neighbors() {
                if !by_tile.contains_key(&n) {
                    stack.push(n);
                }
            }
        }
    }

    let main = sizes
        .iter()
        .max_by_key(|(rid, size)| (**size, std::cmp::Reverse(**rid)))
        .map(|(rid, _)| *rid)
        .unwrap_or(0);
    (by_tile, main)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::build_graph;
    use crate::board::maps;
    use crate::types::GameMode;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn graph_for(name: &str) -> Graph {
        let defn = maps::by_name(name).expect("map exists");
        let mut rng = StdRng::seed_from_u64(17);
        build_graph(&defn, GameMode::Seafarers, &mut rng)
            .expect("board builds")
            .graph
    }

    #[test]
    fn base_map_is_one_region() {
        let graph = graph_for(maps::BASE_MAP);
        let (by_tile, main) = compute_land_regions(&graph, false);
        assert_eq!(by_tile.len(), 19);
        let distinct: std::collections::HashSet<u32> = by_tile.values().copied().collect();
        assert_eq!(distinct.len(), 1);
        assert!(main > 0);
    }

    #[test]
    fn new_shores_main_region_is_the_largest() {
        let graph = graph_for(maps::SEAFARERS_NEW_SHORES);
        let (by_tile, main) = compute_land_regions(&graph, false);
        let main_size = by_tile.values().filter(|rid| **rid == main).count();
        let distinct: std::collections::HashSet<u32> = by_tile.values().copied().collect();
        assert!(distinct.len() >= 2, "outer islands must be separate regions");
        for rid in distinct {
            let size = by_tile.values().filter(|r| **r == rid).count();
            assert!(size <= main_size);
        }
    }

    #[test]
    fn desert_exclusion_drops_desert_tiles_from_every_region() {
        let graph = graph_for(maps::SEAFARERS_THROUGH_DESERT);
        let (with_desert, _) = compute_land_regions(&graph, false);
        let (without_desert, _) = compute_land_regions(&graph, true);
        assert!(without_desert.len() < with_desert.len());
        for center in without_desert.keys() {
            assert_ne!(graph.tiles[center].kind, TileKind::Desert);
        }
    }
}
