use crate::errors::EngineError;
use crate::game::move_cards::BANK;
use crate::game::{DiceState, Game, PlayerAction, PlayerActionData};
use crate::messages::Message;
use crate::types::{CardKind, DevCardKind, GameMode};

const DEV_CARD_COST: [(CardKind, i16); 3] = [
    (CardKind::Wool, 1),
    (CardKind::Wheat, 1),
    (CardKind::Ore, 1),
];

impl Game {
    pub fn can_buy_development_card(&self, idx: usize) -> bool {
        self.mode != GameMode::CitiesAndKnights
            && self.bank.development_remaining() > 0
            && DEV_CARD_COST
                .iter()
                .all(|(kind, qty)| self.players[idx].hand.quantity(*kind) >= *qty)
    }

    /// Draw the next card off the shuffled deck. It stays unusable until the
    /// buyer's turn completes.
    pub fn buy_development_card(&mut self, idx: usize) -> Result<(), EngineError> {
        if self.mode == GameMode::CitiesAndKnights {
            return Err(EngineError::WrongPhase);
        }
        if self.init_phase || self.dice_state != DiceState::Rolled {
            return Err(EngineError::WrongPhase);
        }
        if self.bank.development_remaining() == 0 {
            return Err(EngineError::DevCardNotUsable);
        }
        if !self.can_buy_development_card(idx) {
            return Err(EngineError::InsufficientResources);
        }

        let order = self.players[idx].order as i32;
        for (kind, qty) in DEV_CARD_COST {
            self.move_cards(order, BANK, kind, qty, false, false)?;
        }
        let card = self
            .bank
            .draw_development_card()
            .ok_or(EngineError::DevCardNotUsable)?;
        let deck = self.players[idx].hand.dev_card_deck_mut(card);
        deck.quantity += 1;

        self.emit_delta(Message::DevCardBought {
            order: order as u16,
        });
        self.send_player_secret(idx);
        self.broadcast_state();
        Ok(())
    }

    /// Play a development card. One per turn; never one bought this turn.
    pub async fn use_development_card(
        &mut self,
        idx: usize,
        kind: DevCardKind,
    ) -> Result<(), EngineError> {
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        if self.init_phase {
            return Err(EngineError::WrongPhase);
        }
        if idx != self.current_player {
            return Err(EngineError::NotYourTurn);
        }
        if kind == DevCardKind::VictoryPoint {
            // Victory point cards score from the hand; they are never played.
            return Err(EngineError::DevCardNotUsable);
        }
        if self.players[idx].played_dev_card_this_turn {
            return Err(EngineError::DevCardNotUsable);
        }
        {
            let deck = self.players[idx].hand.dev_card_deck(kind);
            if deck.quantity <= 0 || !deck.can_use {
                return Err(EngineError::DevCardNotUsable);
            }
        }

        if kind.is_progress() {
            return self.use_progress_card(idx, kind).await;
        }

        let deck = self.players[idx].hand.dev_card_deck_mut(kind);
        deck.quantity -= 1;
        deck.num_used += 1;
        self.players[idx].played_dev_card_this_turn = true;
        let order = self.players[idx].order;
        self.emit_delta(Message::DevCardUsed { order, card: kind });

        match kind {
            DevCardKind::Knight => {
                self.set_extra_victory_points();
                self.place_robber_flow(idx).await?;
            }
            DevCardKind::RoadBuilding => {
                self.road_building_free = 2;
                for _ in 0..2 {
                    if self.road_building_free == 0 {
                        break;
                    }
                    let locations = self.build_locations_road(idx, false);
                    if locations.is_empty() {
                        break;
                    }
                    let response = self
                        .block_for_action(
                            idx,
                            self.timer_vals.dev_card,
                            PlayerAction {
                                message: "Choose location for road".to_string(),
                                can_cancel: false,
                                data: PlayerActionData::ChooseEdge {
                                    allowed: locations.clone(),
                                },
                            },
                        )
                        .await;
                    let edge = response
                        .ok()
                        .and_then(|r| r.into_edge())
                        .filter(|ec| locations.contains(ec))
                        .unwrap_or_else(|| {
                            crate::ai::choose_best_edge_road(self, idx, &locations)
                        });
                    let _ = self.build_road(idx, edge);
                }
                self.road_building_free = 0;
            }
            DevCardKind::YearOfPlenty => {
                self.award_gold_choice(idx, 2).await;
            }
            DevCardKind::Monopoly => {
                let response = self
                    .block_for_action(
                        idx,
                        self.timer_vals.dev_card,
                        PlayerAction {
                            message: "Name a resource to monopolize".to_string(),
                            can_cancel: false,
                            data: PlayerActionData::SelectCards {
                                allowed_kinds: CardKind::RESOURCES.to_vec(),
                                quantity: 1,
                                not_self_hand: true,
                            },
                        },
                    )
                    .await;
                let target = response
                    .ok()
                    .and_then(|r| r.into_cards())
                    .and_then(|cards| cards.first().copied())
                    .unwrap_or_else(|| {
                        crate::ai::pick_random(&CardKind::RESOURCES, &mut self.rng)
                    });
                let me = self.players[idx].order;
                let others: Vec<u16> = self
                    .players
                    .iter()
                    .filter(|p| p.order != me)
                    .map(|p| p.order)
                    .collect();
                for other in others {
                    let held = self
                        .player_by_order(other)
                        .map(|i| self.players[i].hand.quantity(target))
                        .unwrap_or(0);
                    self.move_cards(other as i32, me as i32, target, held, false, false)?;
                }
            }
            _ => unreachable!("progress cards branch off earlier"),
        }

        self.set_extra_victory_points();
        self.check_for_victory();
        self.broadcast_state();
        self.send_player_secret(idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::two_player_base_game;

    fn playing_game() -> Game {
        let mut game = two_player_base_game();
        game.init_phase = false;
        game.dice_state = DiceState::Rolled;
        game
    }

    #[test]
    fn bought_card_stays_unusable_until_end_turn() {
        let mut game = playing_game();
        game.players[0].hand.set_resources(0, 0, 1, 1, 1);
        game.buy_development_card(0).unwrap();

        let (kind, deck) = game.players[0]
            .hand
            .dev_card_kinds()
            .find(|(_, d)| d.quantity > 0)
            .expect("a card was drawn");
        assert!(!deck.can_use, "fresh card must not be usable");

        game.end_turn(0).unwrap();
        assert!(game.players[0].hand.dev_card_deck(kind).can_use);
    }

    #[test]
    fn buying_without_payment_is_refused() {
        let mut game = playing_game();
        let err = game.buy_development_card(0).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientResources));
        assert_eq!(game.bank.development_remaining(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_card_cannot_be_played_this_turn() {
        let mut game = playing_game();
        game.players[0].hand.set_resources(0, 0, 1, 1, 1);
        game.buy_development_card(0).unwrap();
        let (kind, _) = game.players[0]
            .hand
            .dev_card_kinds()
            .find(|(_, d)| d.quantity > 0)
            .unwrap();
        if kind != DevCardKind::VictoryPoint {
            let err = game.use_development_card(0, kind).await.unwrap_err();
            assert!(matches!(err, EngineError::DevCardNotUsable));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn knight_play_counts_toward_largest_army() {
        let mut game = playing_game();
        let deck = game.players[0].hand.dev_card_deck_mut(DevCardKind::Knight);
        deck.quantity = 3;
        deck.can_use = true;

        for _ in 0..3 {
            game.use_development_card(0, DevCardKind::Knight)
                .await
                .unwrap();
            game.players[0].played_dev_card_this_turn = false;
        }
        assert_eq!(
            game.players[0]
                .hand
                .dev_card_deck(DevCardKind::Knight)
                .num_used,
            3
        );
        assert_eq!(game.extra_vp.largest_army_holder, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn monopoly_drains_the_named_resource_from_everyone() {
        let mut game = playing_game();
        let deck = game.players[0].hand.dev_card_deck_mut(DevCardKind::Monopoly);
        deck.quantity = 1;
        deck.can_use = true;
        game.players[1].hand.set_resources(0, 4, 0, 0, 0);

        let tx = game.players[0].response_sender();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
            let _ = tx.send(crate::game::ActionResponse::Cards {
                cards: vec![CardKind::Brick],
            });
        });
        game.use_development_card(0, DevCardKind::Monopoly)
            .await
            .unwrap();

        assert_eq!(game.players[0].hand.quantity(CardKind::Brick), 4);
        assert_eq!(game.players[1].hand.quantity(CardKind::Brick), 0);
    }
}
