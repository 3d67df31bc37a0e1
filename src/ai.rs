//! Fallback decision making for prompts that time out and for bot seats.
//! Scores are simple production-probability sums; enough to keep a room
//! moving, deliberately not a strong opponent.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::Rng;

use crate::coords::{EdgeCoordinate, VertexCoordinate};
use crate::game::{Game, Hand};
use crate::types::CardKind;

static ROLL_PROBABILITIES: Lazy<HashMap<u16, f32>> = Lazy::new(|| {
    let mut probabilities: HashMap<u16, f32> = HashMap::new();
    for red in 1..=6u16 {
        for white in 1..=6u16 {
            *probabilities.entry(red + white).or_insert(0.0) += 1.0 / 36.0;
        }
    }
    probabilities
});

pub fn pick_random<T: Copy>(choices: &[T], rng: &mut impl Rng) -> T {
    choices[rng.gen_range(0..choices.len())]
}

/// Cards to give up when a discard prompt goes unanswered: random picks
/// weighted by what the hand actually holds.
pub fn random_discard(hand: &Hand, quantity: u16, rng: &mut impl Rng) -> Vec<CardKind> {
    let mut bag: Vec<CardKind> = Vec::new();
    for (kind, qty) in hand.card_kinds() {
        for _ in 0..qty {
            bag.push(kind);
        }
    }
    let mut out = Vec::with_capacity(quantity as usize);
    for _ in 0..quantity {
        if bag.is_empty() {
            break;
        }
        let i = rng.gen_range(0..bag.len());
        out.push(bag.swap_remove(i));
    }
    out
}

fn vertex_production(game: &Game, vc: VertexCoordinate) -> f32 {
    let mut score = 0.0;
    for center in game.graph.vertex_adjacent_tiles(vc) {
        let Some(tile) = game.graph.tiles.get(&center) else {
            continue;
        };
        if tile.fog || tile.number == 0 {
            continue;
        }
        let weight = match tile.kind.resource() {
            Some(_) => 1.0,
            // Gold is worth slightly more than a fixed resource.
            None if tile.kind == crate::types::TileKind::Gold => 1.2,
            None => 0.0,
        };
        score += weight * ROLL_PROBABILITIES.get(&tile.number).copied().unwrap_or(0.0);
    }
    score
}

/// Best settlement spot by expected production; ties resolve by coordinate
/// order so seeded rooms stay deterministic.
pub fn choose_best_vertex_settlement(
    game: &Game,
    allowed: &[VertexCoordinate],
) -> VertexCoordinate {
    let mut sorted: Vec<VertexCoordinate> = allowed.to_vec();
    sorted.sort();
    sorted
        .into_iter()
        .map(|vc| (vc, vertex_production(game, vc)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(vc, _)| vc)
        .expect("caller guarantees a non-empty choice set")
}

/// Best road edge: the one whose far endpoint opens the best future spot.
pub fn choose_best_edge_road(game: &Game, idx: usize, allowed: &[EdgeCoordinate]) -> EdgeCoordinate {
    let owner = game.players[idx].order;
    let mut sorted: Vec<EdgeCoordinate> = allowed.to_vec();
    sorted.sort();
    sorted
        .iter()
        .copied()
        .map(|ec| {
            let score = ec
                .endpoints()
                .iter()
                .filter(|v| {
                    game.vertex_placement(**v)
                        .map_or(true, |p| p.owner == owner)
                })
                .map(|v| vertex_production(game, *v))
                .fold(0.0f32, f32::max);
            (ec, score)
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(ec, _)| ec)
        .expect("caller guarantees a non-empty choice set")
}
