use crate::coords::Coordinate;
use crate::errors::EngineError;
use crate::game::move_cards::BANK;
use crate::game::{DiceState, Game, PlayerAction, PlayerActionData};
use crate::messages::Message;
use crate::types::{BuildableKind, CardKind, GameMode, TileKind};

impl Game {
    /// Roll the dice for the current player. `forced` pins the dice for
    /// tests; live rooms roll from the room RNG.
    pub async fn roll_dice(
        &mut self,
        idx: usize,
        forced: Option<(u8, u8)>,
    ) -> Result<(), EngineError> {
        if !self.initialized {
            return Err(EngineError::NotInitialized);
        }
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        if self.init_phase || self.special_build_phase {
            return Err(EngineError::WrongPhase);
        }
        if idx != self.current_player {
            return Err(EngineError::NotYourTurn);
        }
        if self.dice_state != DiceState::Unrolled {
            return Err(EngineError::WrongPhase);
        }

        let (red, white) = match forced {
            Some(dice) => dice,
            None => (self.roll_die(), self.roll_die()),
        };
        let event = if self.mode == GameMode::CitiesAndKnights {
            self.roll_die()
        } else {
            0
        };
        self.last_roll = super::DieRollState { red, white, event };
        self.dice_state = DiceState::Rolled;
        self.set_current_player_time_left(self.timer_vals.turn);
        self.emit_delta(Message::DiceRoll {
            red,
            white,
            event,
            init: false,
        });

        if self.mode == GameMode::CitiesAndKnights {
            self.resolve_event_die(event, red).await?;
        }

        let sum = red + white;
        self.on_scenario_dice_rolled(sum);
        if sum == 7 {
            self.run_seven_flow().await?;
        } else {
            self.distribute_roll(sum).await?;
        }

        self.check_for_victory();
        self.broadcast_state();
        for i in 0..self.players.len() {
            self.send_player_secret(i);
        }
        Ok(())
    }

    /// Pay out production for a non-seven roll. Fog tiles never produce
    /// while hidden; the robber's tile is mute; gold prompts its owner.
    async fn distribute_roll(&mut self, sum: u8) -> Result<(), EngineError> {
        let mut gold_claims: Vec<(usize, i16)> = Vec::new();
        let mut centers: Vec<Coordinate> = self.graph.tiles.keys().copied().collect();
        centers.sort_by_key(|c| (c.y, c.x));

        for center in centers {
            let tile = &self.graph.tiles[&center];
            if tile.fog || tile.number != sum as u16 || center == self.robber {
                continue;
            }
            let kind = tile.kind;
            for vc in self.graph.tile_vertex_coordinates(center) {
                let Some(placement) = self.vertex_placements.get(&vc).copied() else {
                    continue;
                };
                if !placement.is_building() {
                    continue;
                }
                let Some(owner_idx) = self.player_by_order(placement.owner) else {
                    continue;
                };
                let weight: i16 = if placement.kind == BuildableKind::City { 2 } else { 1 };

                if kind == TileKind::Gold {
                    gold_claims.push((owner_idx, weight));
                    continue;
                }
                let Some(resource) = kind.resource() else {
                    continue;
                };
                if self.mode == GameMode::CitiesAndKnights
                    && placement.kind == BuildableKind::City
                {
                    if let Some(commodity) = resource.commodity() {
                        self.move_cards(BANK, placement.owner as i32, resource, 1, true, false)?;
                        self.move_cards(BANK, placement.owner as i32, commodity, 1, true, false)?;
                        continue;
                    }
                }
                self.move_cards(BANK, placement.owner as i32, resource, weight, true, false)?;
            }
        }

        for (owner_idx, weight) in gold_claims {
            self.award_gold_choice(owner_idx, weight).await;
        }
        Ok(())
    }

    /// Let a player pick `qty` resources from the bank, falling back to a
    /// random available kind on timeout or a bad answer.
    pub(crate) async fn award_gold_choice(&mut self, idx: usize, qty: i16) {
        for _ in 0..qty {
            let available: Vec<CardKind> = CardKind::RESOURCES
                .into_iter()
                .filter(|k| self.bank.available(*k) > 0)
                .collect();
            if available.is_empty() {
                return;
            }

            let timeout = self.timer_vals.dev_card;
            let response = self
                .block_for_action(
                    idx,
                    timeout,
                    PlayerAction {
                        message: "Choose a resource".to_string(),
                        can_cancel: false,
                        data: PlayerActionData::SelectCards {
                            allowed_kinds: available.clone(),
                            quantity: 1,
                            not_self_hand: true,
                        },
                    },
                )
                .await;

            let chosen = response
                .ok()
                .and_then(|r| r.into_cards())
                .and_then(|cards| cards.into_iter().find(|k| available.contains(k)))
                .unwrap_or_else(|| crate::ai::pick_random(&available, &mut self.rng));
            let order = self.players[idx].order as i32;
            let _ = self.move_cards(BANK, order, chosen, 1, true, false);
        }
    }

    /// Walls raise the discard threshold in Cities & Knights.
    pub fn discard_limit(&self, idx: usize) -> i16 {
        let base = self.settings.discard_limit;
        if self.mode != GameMode::CitiesAndKnights {
            return base;
        }
        let owner = self.players[idx].order;
        let walls = self
            .vertex_placements
            .values()
            .filter(|p| p.owner == owner && p.walled)
            .count() as i16;
        base + 2 * walls
    }

    /// A seven: everyone over the limit discards half, then the roller moves
    /// the robber (or, on a sea tile, the pirate) and steals one card.
    async fn run_seven_flow(&mut self) -> Result<(), EngineError> {
        for idx in 0..self.players.len() {
            let count = self.players[idx].hand.card_count();
            let limit = self.discard_limit(idx);
            if count <= limit {
                continue;
            }
            let quantity = (count / 2) as u16;
            let allowed: Vec<CardKind> = self.players[idx]
                .hand
                .card_kinds()
                .filter(|(_, q)| *q > 0)
                .map(|(k, _)| k)
                .collect();
            let response = self
                .block_for_action(
                    idx,
                    self.timer_vals.discard,
                    PlayerAction {
                        message: format!("Discard {quantity} cards"),
                        can_cancel: false,
                        data: PlayerActionData::SelectCards {
                            allowed_kinds: allowed,
                            quantity,
                            not_self_hand: false,
                        },
                    },
                )
                .await;

            let order = self.players[idx].order as i32;
            let chosen = response.ok().and_then(|r| r.into_cards()).filter(|cards| {
                cards.len() == quantity as usize && self.hand_covers(idx, cards)
            });
            let cards = match chosen {
                Some(cards) => cards,
                None => crate::ai::random_discard(&self.players[idx].hand, quantity, &mut self.rng),
            };
            for kind in cards {
                self.move_cards(order, BANK, kind, 1, false, true)?;
            }
        }

        let roller = self.current_player;
        self.place_robber_flow(roller).await
    }

    fn hand_covers(&self, idx: usize, cards: &[CardKind]) -> bool {
        let hand = &self.players[idx].hand;
        CardKind::RESOURCES
            .into_iter()
            .chain(CardKind::COMMODITIES)
            .all(|k| {
                let wanted = cards.iter().filter(|c| **c == k).count() as i16;
                wanted <= hand.quantity(k)
            })
    }

    /// Prompt for the robber's (or pirate's) destination, move the token and
    /// steal from one adjacent victim.
    pub async fn place_robber_flow(&mut self, idx: usize) -> Result<(), EngineError> {
        let mut allowed: Vec<Coordinate> = self
            .graph
            .tiles
            .values()
            .filter(|t| !t.fog)
            .filter(|t| {
                if t.kind == TileKind::Sea {
                    self.mode == GameMode::Seafarers && Some(t.center) != self.pirate
                } else {
                    t.center != self.robber
                }
            })
            .map(|t| t.center)
            .collect();
        allowed.sort();
        if allowed.is_empty() {
            return Ok(());
        }

        let response = self
            .block_for_action(
                idx,
                self.timer_vals.robber,
                PlayerAction {
                    message: "Move the robber".to_string(),
                    can_cancel: false,
                    data: PlayerActionData::ChooseTile {
                        allowed: allowed.clone(),
                    },
                },
            )
            .await;
        let tile = response
            .ok()
            .and_then(|r| r.into_tile())
            .filter(|c| allowed.contains(c))
            .unwrap_or_else(|| crate::ai::pick_random(&allowed, &mut self.rng));

        self.move_robber_and_steal(idx, tile).await
    }

    pub(crate) async fn move_robber_and_steal(
        &mut self,
        idx: usize,
        tile: Coordinate,
    ) -> Result<(), EngineError> {
        let is_sea = self
            .graph
            .tiles
            .get(&tile)
            .is_some_and(|t| t.kind == TileKind::Sea);
        if is_sea {
            self.pirate = Some(tile);
            self.emit_delta(Message::PirateMoved { tile });
        } else {
            self.robber = tile;
            self.emit_delta(Message::RobberMoved { tile });
        }

        let victims = self.steal_victims_at(tile, idx);
        if victims.is_empty() {
            self.broadcast_state();
            return Ok(());
        }
        let victim = if victims.len() == 1 {
            victims[0]
        } else {
            let response = self
                .block_for_action(
                    idx,
                    self.timer_vals.choose_player,
                    PlayerAction {
                        message: "Choose a player to steal from".to_string(),
                        can_cancel: false,
                        data: PlayerActionData::ChoosePlayer {
                            allowed: victims.clone(),
                        },
                    },
                )
                .await;
            response
                .ok()
                .and_then(|r| r.into_player())
                .filter(|o| victims.contains(o))
                .unwrap_or_else(|| crate::ai::pick_random(&victims, &mut self.rng))
        };

        let thief = self.players[idx].order;
        self.steal_random_card(victim, thief)?;
        self.broadcast_state();
        Ok(())
    }

    /// Who can be robbed at this tile: owners of adjacent buildings on land,
    /// owners of adjacent ships when the pirate parks on sea.
    fn steal_victims_at(&self, tile: Coordinate, thief_idx: usize) -> Vec<u16> {
        let thief = self.players[thief_idx].order;
        let is_sea = self
            .graph
            .tiles
            .get(&tile)
            .is_some_and(|t| t.kind == TileKind::Sea);
        let mut victims: Vec<u16> = Vec::new();
        if is_sea {
            for ec in self.graph.tile_edge_coordinates(tile) {
                if let Some(p) = self.edge_placements.get(&ec) {
                    if p.kind == BuildableKind::Ship && p.owner != thief {
                        victims.push(p.owner);
                    }
                }
            }
        } else {
            for vc in self.graph.tile_vertex_coordinates(tile) {
                if let Some(p) = self.vertex_placements.get(&vc) {
                    if p.is_building() && p.owner != thief {
                        victims.push(p.owner);
                    }
                }
            }
        }
        victims.sort_unstable();
        victims.dedup();
        victims.retain(|o| {
            self.player_by_order(*o)
                .is_some_and(|i| self.players[i].hand.card_count() > 0)
        });
        victims
    }

    /// Steal one random card from whoever is adjacent to the given tile.
    /// The pirate steals from ships, the robber from buildings.
    pub fn steal_card_at_tile(&mut self, tile: Coordinate) -> Result<(), EngineError> {
        let idx = self.current_player;
        let victims = self.steal_victims_at(tile, idx);
        let Some(victim) = victims.first().copied() else {
            return Ok(());
        };
        let thief = self.players[idx].order;
        self.steal_random_card(victim, thief)
    }

    pub(crate) fn steal_random_card(&mut self, from: u16, to: u16) -> Result<(), EngineError> {
        let Some(victim_idx) = self.player_by_order(from) else {
            return Err(EngineError::NotAParticipant);
        };
        let mut bag: Vec<CardKind> = Vec::new();
        for (kind, qty) in self.players[victim_idx].hand.card_kinds() {
            for _ in 0..qty {
                bag.push(kind);
            }
        }
        if bag.is_empty() {
            return Ok(());
        }
        let kind = crate::ai::pick_random(&bag, &mut self.rng);
        self.move_cards(from as i32, to as i32, kind, 1, false, false)
    }

    // ---- end of turn ----

    pub fn can_end_turn(&self) -> Result<(), EngineError> {
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        if self.init_phase {
            return Err(EngineError::WrongPhase);
        }
        if self.special_build_phase {
            return Ok(());
        }
        if self.dice_state != DiceState::Rolled {
            return Err(EngineError::WrongPhase);
        }
        Ok(())
    }

    pub fn end_turn(&mut self, idx: usize) -> Result<(), EngineError> {
        if idx != self.current_player {
            return Err(EngineError::NotYourTurn);
        }
        self.can_end_turn()?;
        self.advance_turn();
        Ok(())
    }

    /// The ticker ends an overdue turn unconditionally.
    pub(crate) fn force_end_turn(&mut self) {
        if self.game_over || self.init_phase {
            return;
        }
        self.advance_turn();
    }

    fn advance_turn(&mut self) {
        // Development cards bought during the closing turn become usable once
        // it completes.
        for p in &mut self.players {
            p.hand.mature_dev_cards();
        }
        self.road_building_free = 0;
        self.offers.clear();

        if self.special_build_phase {
            if let Some(next) = self.next_special_builder() {
                self.current_player = next;
                self.players[next].special_build = false;
                self.set_current_player_time_left(self.timer_vals.special_build);
                self.broadcast_state();
                self.send_player_secret(next);
                return;
            }
            self.special_build_phase = false;
            let starter = self.special_build_starter.take().unwrap_or(self.turn_owner);
            self.begin_turn_of((starter + 1) % self.players.len());
            return;
        }

        if self.settings.special_build && self.any_special_build_requested() {
            self.special_build_phase = true;
            self.special_build_starter = Some(self.turn_owner);
            if let Some(next) = self.next_special_builder() {
                self.current_player = next;
                self.players[next].special_build = false;
                self.set_current_player_time_left(self.timer_vals.special_build);
                self.broadcast_state();
                self.send_player_secret(next);
                return;
            }
            self.special_build_phase = false;
            self.special_build_starter = None;
        }

        let next = (self.turn_owner + 1) % self.players.len();
        self.begin_turn_of(next);
    }

    fn begin_turn_of(&mut self, next: usize) {
        self.current_player = next;
        self.turn_owner = next;
        self.turn += 1;
        self.dice_state = DiceState::Unrolled;
        self.players[next].reset_turn_state();
        self.set_current_player_time_left(self.timer_vals.dice);
        self.on_scenario_turn_start(next);
        self.check_for_victory();
        self.broadcast_state();
        self.send_player_secret(next);
    }

    fn any_special_build_requested(&self) -> bool {
        self.players
            .iter()
            .enumerate()
            .any(|(i, p)| p.special_build && i != self.turn_owner)
    }

    fn next_special_builder(&self) -> Option<usize> {
        let n = self.players.len();
        (1..n)
            .map(|offset| (self.current_player + offset) % n)
            .find(|i| *i != self.turn_owner && self.players[*i].special_build)
    }

    pub fn request_special_build(&mut self, order: u16) -> Result<(), EngineError> {
        if !self.settings.special_build {
            return Err(EngineError::WrongPhase);
        }
        let idx = self
            .player_by_order(order)
            .ok_or(EngineError::NotAParticipant)?;
        if idx == self.current_player {
            return Err(EngineError::WrongPhase);
        }
        if self.players[idx].special_build {
            return Err(EngineError::WrongPhase);
        }
        self.players[idx].special_build = true;
        self.send_player_secret(idx);
        Ok(())
    }

    /// Pick one of your movable ships, then its new edge.
    pub async fn move_ship_interactive(&mut self, idx: usize) -> Result<(), EngineError> {
        let movable = self.movable_ships(idx);
        if movable.is_empty() {
            return Err(EngineError::NowhereToBuild);
        }
        let response = self
            .block_for_action(
                idx,
                0,
                PlayerAction {
                    message: "Choose a ship to move".to_string(),
                    can_cancel: true,
                    data: PlayerActionData::ChooseEdge {
                        allowed: movable.clone(),
                    },
                },
            )
            .await?;
        let from = response
            .into_edge()
            .filter(|ec| movable.contains(ec))
            .ok_or(EngineError::Protocol("expected a movable ship edge"))?;

        // Destinations are computed with the ship lifted off the board.
        let owner = self.players[idx].order;
        let keep_flag = self.players[idx].ships_built_this_turn.clone();
        self.remove_edge_placement(from)?;
        let destinations = self.build_locations_ship(idx);
        self.adjust_supply_for_restore(idx);
        self.edge_placements.insert(
            from,
            super::EdgePlacement {
                owner,
                kind: BuildableKind::Ship,
            },
        );
        self.players[idx].edge_placements.push(from);
        self.players[idx].ships_built_this_turn = keep_flag;

        if destinations.is_empty() {
            return Err(EngineError::NowhereToBuild);
        }
        let response = self
            .block_for_action(
                idx,
                0,
                PlayerAction {
                    message: "Choose the ship's destination".to_string(),
                    can_cancel: true,
                    data: PlayerActionData::ChooseEdge {
                        allowed: destinations.clone(),
                    },
                },
            )
            .await?;
        let to = response
            .into_edge()
            .filter(|ec| destinations.contains(ec))
            .ok_or(EngineError::Protocol("expected a destination edge"))?;
        self.move_ship(idx, from, to)
    }

    fn adjust_supply_for_restore(&mut self, idx: usize) {
        self.players[idx].buildables_left.ships -= 1;
    }
}
