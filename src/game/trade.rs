use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::game::move_cards::BANK;
use crate::game::{DiceState, Game};
use crate::messages::Message;
use crate::types::{CardKind, GameMode};

/// Card vectors indexed by wire kind (slot 0 unused).
pub const OFFER_SLOTS: usize = 9;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOfferDetails {
    pub give: [i16; OFFER_SLOTS],
    pub ask: [i16; OFFER_SLOTS],
}

impl TradeOfferDetails {
    pub fn kinds(counts: &[i16; OFFER_SLOTS]) -> impl Iterator<Item = (CardKind, i16)> + '_ {
        CardKind::RESOURCES
            .into_iter()
            .chain(CardKind::COMMODITIES)
            .filter_map(|k| {
                let n = counts[k as usize];
                (n > 0).then_some((k, n))
            })
    }

    pub fn is_empty(&self) -> bool {
        self.give.iter().all(|n| *n <= 0) && self.ask.iter().all(|n| *n <= 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOffer {
    pub id: i32,
    pub creator: u16,
    pub details: TradeOfferDetails,
    pub accepters: Vec<u16>,
    pub rejecters: Vec<u16>,
}

impl Game {
    /// Bank exchange rates per card kind: 4:1 by default, 3:1 behind an open
    /// harbor, 2:1 behind the matching harbor, and 2:1 for the merchant's
    /// resource for its owner.
    pub fn trade_ratios_for_player(&self, idx: usize) -> [i16; OFFER_SLOTS] {
        let owner = self.players[idx].order;
        let mut ratios = [4i16; OFFER_SLOTS];
        ratios[0] = 0;

        let has_port = |resource: Option<CardKind>| {
            self.graph.ports.iter().any(|port| {
                port.kind.resource() == resource
                    && port.edge.endpoints().iter().any(|v| {
                        self.vertex_placements
                            .get(v)
                            .is_some_and(|p| p.owner == owner && p.is_building())
                    })
            })
        };

        if has_port(None) {
            for k in CardKind::RESOURCES {
                ratios[k as usize] = 3;
            }
        }
        for k in CardKind::RESOURCES {
            if has_port(Some(k)) {
                ratios[k as usize] = 2;
            }
        }
        if let Some(merchant) = &self.merchant {
            if merchant.owner == owner {
                if let Some(kind) = self
                    .graph
                    .tiles
                    .get(&merchant.tile)
                    .and_then(|t| t.kind.resource())
                {
                    ratios[kind as usize] = 2;
                }
            }
        }
        ratios
    }

    /// Validates an exchange with the bank without touching any hand.
    pub fn can_trade_with_bank(
        &self,
        idx: usize,
        details: &TradeOfferDetails,
    ) -> Result<(), EngineError> {
        if details.is_empty() {
            return Err(EngineError::InvalidOffer);
        }
        let ratios = self.trade_ratios_for_player(idx);
        let hand = &self.players[idx].hand;
        let mut credits = 0i16;
        for (kind, n) in TradeOfferDetails::kinds(&details.give) {
            if hand.quantity(kind) < n {
                return Err(EngineError::InsufficientResources);
            }
            let ratio = ratios[kind as usize];
            if ratio <= 0 || n % ratio != 0 {
                return Err(EngineError::InvalidOffer);
            }
            credits += n / ratio;
        }
        let mut asked = 0i16;
        for (kind, n) in TradeOfferDetails::kinds(&details.ask) {
            if self.bank.available(kind) < n {
                return Err(EngineError::BankShort(kind));
            }
            asked += n;
        }
        if credits != asked || asked == 0 {
            return Err(EngineError::InvalidOffer);
        }
        Ok(())
    }

    pub fn trade_with_bank(
        &mut self,
        idx: usize,
        details: &TradeOfferDetails,
    ) -> Result<(), EngineError> {
        if self.init_phase || self.dice_state != DiceState::Rolled || self.special_build_phase {
            return Err(EngineError::WrongPhase);
        }
        self.can_trade_with_bank(idx, details)?;
        let order = self.players[idx].order as i32;
        for (kind, n) in TradeOfferDetails::kinds(&details.give) {
            self.move_cards(order, BANK, kind, n, false, false)?;
        }
        for (kind, n) in TradeOfferDetails::kinds(&details.ask) {
            self.move_cards(BANK, order, kind, n, false, false)?;
        }
        self.broadcast_state();
        self.send_player_secret(idx);
        Ok(())
    }

    // ---- player-to-player offers ----

    pub fn create_offer(
        &mut self,
        order: u16,
        details: TradeOfferDetails,
    ) -> Result<i32, EngineError> {
        if self.init_phase || self.special_build_phase || self.dice_state != DiceState::Rolled {
            return Err(EngineError::WrongPhase);
        }
        if details.is_empty() {
            return Err(EngineError::InvalidOffer);
        }
        let idx = self
            .player_by_order(order)
            .ok_or(EngineError::NotAParticipant)?;
        if self.players[idx].is_spectator {
            return Err(EngineError::SpectatorsNotAllowed);
        }
        if self.mode != GameMode::CitiesAndKnights {
            for (kind, _) in TradeOfferDetails::kinds(&details.give)
                .chain(TradeOfferDetails::kinds(&details.ask))
            {
                if kind.is_commodity() {
                    return Err(EngineError::InvalidOffer);
                }
            }
        }
        for (kind, n) in TradeOfferDetails::kinds(&details.give) {
            if self.players[idx].hand.quantity(kind) < n {
                return Err(EngineError::InsufficientResources);
            }
        }

        let id = self.next_offer_id;
        self.next_offer_id += 1;
        let offer = TradeOffer {
            id,
            creator: order,
            details,
            accepters: Vec::new(),
            rejecters: Vec::new(),
        };
        self.broadcast_message(&Message::TradeOffer(offer.clone()));
        self.offers.push(offer);
        Ok(id)
    }

    fn offer_mut(&mut self, id: i32) -> Result<&mut TradeOffer, EngineError> {
        self.offers
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(EngineError::InvalidOffer)
    }

    pub fn accept_offer(&mut self, id: i32, order: u16) -> Result<(), EngineError> {
        let idx = self
            .player_by_order(order)
            .ok_or(EngineError::NotAParticipant)?;
        let ask = {
            let offer = self.offer_mut(id)?;
            if offer.creator == order {
                return Err(EngineError::InvalidOffer);
            }
            offer.details.ask
        };
        for (kind, n) in TradeOfferDetails::kinds(&ask) {
            if self.players[idx].hand.quantity(kind) < n {
                return Err(EngineError::InsufficientResources);
            }
        }
        let offer = self.offer_mut(id)?;
        offer.rejecters.retain(|o| *o != order);
        if !offer.accepters.contains(&order) {
            offer.accepters.push(order);
        }
        let snapshot = offer.clone();
        self.broadcast_message(&Message::TradeOffer(snapshot));
        Ok(())
    }

    pub fn reject_offer(&mut self, id: i32, order: u16) -> Result<(), EngineError> {
        let offer = self.offer_mut(id)?;
        offer.accepters.retain(|o| *o != order);
        if !offer.rejecters.contains(&order) {
            offer.rejecters.push(order);
        }
        let snapshot = offer.clone();
        self.broadcast_message(&Message::TradeOffer(snapshot));
        Ok(())
    }

    /// The creator closes the deal with one of the accepters; both sides are
    /// re-validated at closing time.
    pub fn close_offer(
        &mut self,
        id: i32,
        closer: u16,
        accepting: u16,
    ) -> Result<(), EngineError> {
        let offer = self
            .offers
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or(EngineError::InvalidOffer)?;
        if offer.creator != closer {
            return Err(EngineError::InvalidOffer);
        }
        if !offer.accepters.contains(&accepting) {
            return Err(EngineError::InvalidOffer);
        }
        let creator_idx = self
            .player_by_order(offer.creator)
            .ok_or(EngineError::NotAParticipant)?;
        let accepting_idx = self
            .player_by_order(accepting)
            .ok_or(EngineError::NotAParticipant)?;
        for (kind, n) in TradeOfferDetails::kinds(&offer.details.give) {
            if self.players[creator_idx].hand.quantity(kind) < n {
                return Err(EngineError::InsufficientResources);
            }
        }
        for (kind, n) in TradeOfferDetails::kinds(&offer.details.ask) {
            if self.players[accepting_idx].hand.quantity(kind) < n {
                return Err(EngineError::InsufficientResources);
            }
        }

        for (kind, n) in TradeOfferDetails::kinds(&offer.details.give) {
            self.move_cards(offer.creator as i32, accepting as i32, kind, n, false, false)?;
        }
        for (kind, n) in TradeOfferDetails::kinds(&offer.details.ask) {
            self.move_cards(accepting as i32, offer.creator as i32, kind, n, false, false)?;
        }
        self.offers.retain(|o| o.id != id);
        self.broadcast_state();
        self.send_player_secret(creator_idx);
        self.send_player_secret(accepting_idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::two_player_base_game;

    fn playing() -> Game {
        let mut game = two_player_base_game();
        game.init_phase = false;
        game.dice_state = DiceState::Rolled;
        game
    }

    fn details(give: &[(CardKind, i16)], ask: &[(CardKind, i16)]) -> TradeOfferDetails {
        let mut d = TradeOfferDetails::default();
        for (k, n) in give {
            d.give[*k as usize] = *n;
        }
        for (k, n) in ask {
            d.ask[*k as usize] = *n;
        }
        d
    }

    #[test]
    fn bank_trade_rejects_offers_above_the_hand() {
        let game = playing();
        let wood = game.players[0].hand.quantity(CardKind::Wood);
        let d = details(&[(CardKind::Wood, wood + 4)], &[(CardKind::Wool, 1)]);
        assert!(game.can_trade_with_bank(0, &d).is_err());
    }

    #[test]
    fn four_to_one_without_any_port() {
        let mut game = playing();
        game.players[0].hand.set_resources(4, 0, 0, 0, 0);
        let good = details(&[(CardKind::Wood, 4)], &[(CardKind::Ore, 1)]);
        game.trade_with_bank(0, &good).unwrap();
        assert_eq!(game.players[0].hand.quantity(CardKind::Wood), 0);
        assert_eq!(game.players[0].hand.quantity(CardKind::Ore), 1);

        game.players[0].hand.set_resources(3, 0, 0, 0, 0);
        let short = details(&[(CardKind::Wood, 3)], &[(CardKind::Ore, 1)]);
        assert!(matches!(
            game.can_trade_with_bank(0, &short),
            Err(EngineError::InvalidOffer)
        ));
    }

    #[test]
    fn offer_lifecycle_create_accept_close() {
        let mut game = playing();
        game.players[0].hand.set_resources(2, 0, 0, 0, 0);
        game.players[1].hand.set_resources(0, 0, 0, 1, 0);

        let d = details(&[(CardKind::Wood, 2)], &[(CardKind::Wheat, 1)]);
        let id = game.create_offer(0, d).unwrap();
        game.accept_offer(id, 1).unwrap();
        game.close_offer(id, 0, 1).unwrap();

        assert_eq!(game.players[0].hand.quantity(CardKind::Wheat), 1);
        assert_eq!(game.players[1].hand.quantity(CardKind::Wood), 2);
        assert!(game.offers.is_empty());
    }

    #[test]
    fn closing_needs_an_actual_accepter() {
        let mut game = playing();
        game.players[0].hand.set_resources(1, 0, 0, 0, 0);
        let d = details(&[(CardKind::Wood, 1)], &[(CardKind::Wheat, 1)]);
        let id = game.create_offer(0, d).unwrap();
        game.reject_offer(id, 1).unwrap();
        assert!(matches!(
            game.close_offer(id, 0, 1),
            Err(EngineError::InvalidOffer)
        ));
    }

    #[test]
    fn offers_disappear_at_end_of_turn() {
        let mut game = playing();
        game.players[0].hand.set_resources(1, 0, 0, 0, 0);
        let d = details(&[(CardKind::Wood, 1)], &[(CardKind::Wheat, 1)]);
        game.create_offer(0, d).unwrap();
        game.end_turn(0).unwrap();
        assert!(game.offers.is_empty());
    }
}
