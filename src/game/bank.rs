use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::game::hand::Hand;
use crate::types::{
    BANK_COMMODITY_COUNT, BANK_RESOURCE_COUNT, CardKind, DECK_KNIGHTS, DECK_MONOPOLY,
    DECK_ROAD_BUILDING, DECK_VICTORY_POINTS, DECK_YEAR_OF_PLENTY, DevCardKind, GameMode,
};

/// The central inventory: a mirror hand for resources plus the ordered,
/// pre-shuffled development decks. Base mode draws from a single deck through
/// a cursor; Cities & Knights keeps one progress deck per commodity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    pub hand: Hand,
    deck: Vec<DevCardKind>,
    cursor: usize,
    progress_decks: BTreeMap<CardKind, Vec<DevCardKind>>,
}

impl Bank {
    pub fn new(mode: GameMode, rng: &mut impl Rng) -> Self {
        let mut hand = Hand::new(mode);
        for kind in CardKind::RESOURCES {
            hand.add_cards(kind, BANK_RESOURCE_COUNT)
                .expect("fresh bank hand accepts the initial stock");
        }

        let mut deck = Vec::new();
        let mut progress_decks = BTreeMap::new();
        match mode {
            GameMode::CitiesAndKnights => {
                for kind in CardKind::COMMODITIES {
                    hand.add_cards(kind, BANK_COMMODITY_COUNT)
                        .expect("fresh bank hand accepts the initial stock");
                }
                for (kind, cards) in progress_deck_distribution() {
                    let mut cards = cards;
                    cards.shuffle(rng);
                    progress_decks.insert(kind, cards);
                }
            }
            _ => {
                for (kind, count) in [
                    (DevCardKind::Knight, DECK_KNIGHTS),
                    (DevCardKind::VictoryPoint, DECK_VICTORY_POINTS),
                    (DevCardKind::RoadBuilding, DECK_ROAD_BUILDING),
                    (DevCardKind::YearOfPlenty, DECK_YEAR_OF_PLENTY),
                    (DevCardKind::Monopoly, DECK_MONOPOLY),
                ] {
                    deck.extend(std::iter::repeat(kind).take(count));
                }
                deck.shuffle(rng);
            }
        }

        Self {
            hand,
            deck,
            cursor: 0,
            progress_decks,
        }
    }

    pub fn development_remaining(&self) -> usize {
        if self.progress_decks.is_empty() {
            self.deck.len().saturating_sub(self.cursor)
        } else {
            self.progress_decks.values().map(Vec::len).sum()
        }
    }

    pub fn draw_development_card(&mut self) -> Option<DevCardKind> {
        let card = self.deck.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(card)
    }

    pub fn draw_progress_card(&mut self, commodity: CardKind) -> Option<DevCardKind> {
        self.progress_decks.get_mut(&commodity)?.pop()
    }

    pub fn available(&self, kind: CardKind) -> i16 {
        self.hand.quantity(kind)
    }
}

fn progress_deck_distribution() -> Vec<(CardKind, Vec<DevCardKind>)> {
    vec![
        (
            CardKind::Paper,
            vec![
                DevCardKind::Crane,
                DevCardKind::Crane,
                DevCardKind::Irrigation,
                DevCardKind::Irrigation,
                DevCardKind::Mining,
                DevCardKind::Mining,
                DevCardKind::Engineer,
                DevCardKind::Printer,
            ],
        ),
        (
            CardKind::Cloth,
            vec![
                DevCardKind::Merchant,
                DevCardKind::Merchant,
                DevCardKind::Merchant,
                DevCardKind::Merchant,
                DevCardKind::Irrigation,
                DevCardKind::Mining,
            ],
        ),
        (
            CardKind::Coin,
            vec![
                DevCardKind::Bishop,
                DevCardKind::Bishop,
                DevCardKind::Engineer,
                DevCardKind::Constitution,
            ],
        ),
    ]
}
