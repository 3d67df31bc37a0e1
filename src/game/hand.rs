use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::types::{CardKind, DevCardKind, GameMode};

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct CardDeck {
    pub quantity: i16,
    pub can_use: bool,
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct DevCardDeck {
    pub quantity: i16,
    pub num_used: i16,
    pub can_use: bool,
}

/// A player's (or the bank's) card inventory. Quantities are small
/// non-negative integers; any mutation that would go negative is refused
/// before anything changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hand {
    cards: BTreeMap<CardKind, CardDeck>,
    dev_cards: BTreeMap<DevCardKind, DevCardDeck>,
}

impl Hand {
    pub fn new(mode: GameMode) -> Self {
        let mut cards = BTreeMap::new();
        for kind in CardKind::RESOURCES {
            cards.insert(kind, CardDeck::default());
        }
        if mode == GameMode::CitiesAndKnights {
            for kind in CardKind::COMMODITIES {
                cards.insert(kind, CardDeck::default());
            }
        }
        Self {
            cards,
            dev_cards: BTreeMap::new(),
        }
    }

    pub fn card_deck(&self, kind: CardKind) -> CardDeck {
        self.cards.get(&kind).copied().unwrap_or_default()
    }

    pub fn holds(&self, kind: CardKind) -> bool {
        self.cards.contains_key(&kind)
    }

    pub fn quantity(&self, kind: CardKind) -> i16 {
        self.card_deck(kind).quantity
    }

    pub fn card_count(&self) -> i16 {
        self.cards.values().map(|d| d.quantity).sum()
    }

    pub fn card_kinds(&self) -> impl Iterator<Item = (CardKind, i16)> + '_ {
        self.cards.iter().map(|(k, d)| (*k, d.quantity))
    }

    pub fn add_cards(&mut self, kind: CardKind, qty: i16) -> Result<(), EngineError> {
        let deck = self
            .cards
            .get_mut(&kind)
            .ok_or(EngineError::TransferRefused)?;
        deck.quantity = deck
            .quantity
            .checked_add(qty)
            .ok_or(EngineError::Invariant("card quantity overflow"))?;
        Ok(())
    }

    pub fn remove_cards(&mut self, kind: CardKind, qty: i16) -> Result<(), EngineError> {
        let deck = self
            .cards
            .get_mut(&kind)
            .ok_or(EngineError::TransferRefused)?;
        if deck.quantity < qty {
            return Err(EngineError::TransferRefused);
        }
        deck.quantity -= qty;
        Ok(())
    }

    pub fn has_resources(&self, wood: i16, brick: i16, wool: i16, wheat: i16, ore: i16) -> bool {
        self.quantity(CardKind::Wood) >= wood
            && self.quantity(CardKind::Brick) >= brick
            && self.quantity(CardKind::Wool) >= wool
            && self.quantity(CardKind::Wheat) >= wheat
            && self.quantity(CardKind::Ore) >= ore
    }

    /// Test helper in the original; also used by the simulation binary.
    pub fn set_resources(&mut self, wood: i16, brick: i16, wool: i16, wheat: i16, ore: i16) {
        for (kind, qty) in [
            (CardKind::Wood, wood),
            (CardKind::Brick, brick),
            (CardKind::Wool, wool),
            (CardKind::Wheat, wheat),
            (CardKind::Ore, ore),
        ] {
            if let Some(deck) = self.cards.get_mut(&kind) {
                deck.quantity = qty;
            }
        }
    }

    pub fn dev_card_deck(&self, kind: DevCardKind) -> DevCardDeck {
        self.dev_cards.get(&kind).copied().unwrap_or_default()
    }

    pub fn dev_card_deck_mut(&mut self, kind: DevCardKind) -> &mut DevCardDeck {
        self.dev_cards.entry(kind).or_default()
    }

    pub fn dev_card_count(&self) -> i16 {
        self.dev_cards.values().map(|d| d.quantity).sum()
    }

    pub fn dev_card_kinds(&self) -> impl Iterator<Item = (DevCardKind, DevCardDeck)> + '_ {
        self.dev_cards.iter().map(|(k, d)| (*k, *d))
    }

    /// Cards bought this turn mature at the owner's end of turn.
    pub fn mature_dev_cards(&mut self) {
        for deck in self.dev_cards.values_mut() {
            if deck.quantity > 0 {
                deck.can_use = true;
            }
        }
    }
}
