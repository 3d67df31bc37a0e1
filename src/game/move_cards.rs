use crate::errors::EngineError;
use crate::game::Game;
use crate::messages::Message;
use crate::types::CardKind;

pub const BANK: i32 = -1;

impl Game {
    /// The only mutator of hands and the bank. Atomic: when either side
    /// cannot cover the move, nothing changes on either side.
    ///
    /// `from`/`to` are seat orders, with [`BANK`] standing for the bank.
    /// `allow_bank_short` caps a bank-sourced move at what the bank still
    /// has instead of refusing it outright.
    pub fn move_cards(
        &mut self,
        from: i32,
        to: i32,
        kind: CardKind,
        qty: i16,
        allow_bank_short: bool,
        discard: bool,
    ) -> Result<(), EngineError> {
        if qty <= 0 {
            return Ok(());
        }

        let available = self.hand_of(from)?.quantity(kind);
        let moved = if from == BANK && allow_bank_short {
            qty.min(available)
        } else {
            qty
        };
        if moved == 0 {
            return Ok(());
        }
        if available < moved {
            return Err(EngineError::TransferRefused);
        }
        if !self.hand_of(to)?.holds(kind) {
            return Err(EngineError::TransferRefused);
        }

        self.hand_of_mut(from)?.remove_cards(kind, moved)?;
        self.hand_of_mut(to)?
            .add_cards(kind, moved)
            .expect("destination verified before the debit");

        self.emit_delta(Message::CardMove {
            from,
            to,
            kind,
            qty: moved,
            discard,
        });
        Ok(())
    }

    fn hand_of(&self, order: i32) -> Result<&crate::game::Hand, EngineError> {
        if order == BANK {
            return Ok(&self.bank.hand);
        }
        let idx = self
            .player_by_order(order as u16)
            .ok_or(EngineError::NotAParticipant)?;
        Ok(&self.players[idx].hand)
    }

    fn hand_of_mut(&mut self, order: i32) -> Result<&mut crate::game::Hand, EngineError> {
        if order == BANK {
            return Ok(&mut self.bank.hand);
        }
        let idx = self
            .player_by_order(order as u16)
            .ok_or(EngineError::NotAParticipant)?;
        Ok(&mut self.players[idx].hand)
    }

    /// Conservation check: bank plus all hands, per kind.
    #[cfg(test)]
    pub(crate) fn total_in_play(&self, kind: CardKind) -> i16 {
        self.bank.hand.quantity(kind)
            + self
                .players
                .iter()
                .map(|p| p.hand.quantity(kind))
                .sum::<i16>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::two_player_base_game;

    #[test]
    fn overdrawing_a_player_hand_mutates_nothing() {
        let mut game = two_player_base_game();
        game.players[0].hand.add_cards(CardKind::Wood, 3).unwrap();
        let before_player = game.players[0].hand.quantity(CardKind::Wood);
        let before_bank = game.bank.hand.quantity(CardKind::Wood);

        let err = game
            .move_cards(0, BANK, CardKind::Wood, before_player + 1, true, false)
            .unwrap_err();
        assert!(matches!(err, EngineError::TransferRefused));
        assert_eq!(game.players[0].hand.quantity(CardKind::Wood), before_player);
        assert_eq!(game.bank.hand.quantity(CardKind::Wood), before_bank);
    }

    #[test]
    fn there_and_back_restores_both_hands() {
        let mut game = two_player_base_game();
        game.players[0].hand.add_cards(CardKind::Brick, 4).unwrap();
        game.players[1].hand.add_cards(CardKind::Brick, 1).unwrap();
        let p0 = game.players[0].hand.quantity(CardKind::Brick);
        let p1 = game.players[1].hand.quantity(CardKind::Brick);

        game.move_cards(0, 1, CardKind::Brick, 3, false, false).unwrap();
        game.move_cards(1, 0, CardKind::Brick, 3, false, false).unwrap();
        assert_eq!(game.players[0].hand.quantity(CardKind::Brick), p0);
        assert_eq!(game.players[1].hand.quantity(CardKind::Brick), p1);
    }

    #[test]
    fn bank_short_moves_cap_at_what_the_bank_has() {
        let mut game = two_player_base_game();
        let stock = game.bank.hand.quantity(CardKind::Ore);
        game.move_cards(BANK, 0, CardKind::Ore, stock, false, false)
            .unwrap();

        // Strict move now fails; capped move becomes a no-op.
        assert!(game.move_cards(BANK, 1, CardKind::Ore, 1, false, false).is_err());
        game.move_cards(BANK, 1, CardKind::Ore, 1, true, false).unwrap();
        assert_eq!(game.players[1].hand.quantity(CardKind::Ore), 0);
    }

    #[test]
    fn conservation_holds_across_arbitrary_moves() {
        let mut game = two_player_base_game();
        let total = game.total_in_play(CardKind::Wheat);
        game.move_cards(BANK, 0, CardKind::Wheat, 5, false, false).unwrap();
        game.move_cards(0, 1, CardKind::Wheat, 2, false, false).unwrap();
        game.move_cards(1, BANK, CardKind::Wheat, 1, false, false).unwrap();
        assert_eq!(game.total_in_play(CardKind::Wheat), total);
    }
}
