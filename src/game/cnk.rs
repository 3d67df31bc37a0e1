//! Cities & Knights: knights, walls, city improvements, the event die and
//! the barbarian fleet.

use crate::coords::VertexCoordinate;
use crate::errors::EngineError;
use crate::game::move_cards::BANK;
use crate::game::{Game, PlayerAction, PlayerActionData, VertexPlacement};
use crate::messages::Message;
use crate::types::{BuildableKind, CardKind, DevCardKind, GameMode, TileKind};

const BARBARIAN_TRACK_LEN: i16 = 7;
const MAX_KNIGHT_LEVEL: u8 = 3;
const MAX_IMPROVEMENT_LEVEL: u8 = 5;
const METROPOLIS_LEVEL: u8 = 4;

impl Game {
    fn ensure_cnk(&self) -> Result<(), EngineError> {
        if self.mode != GameMode::CitiesAndKnights {
            return Err(EngineError::WrongPhase);
        }
        Ok(())
    }

    // ---- knights ----

    pub fn activated_knight_strength(&self, idx: usize) -> i32 {
        let owner = self.players[idx].order;
        self.vertex_placements
            .values()
            .filter(|p| p.owner == owner && p.kind == BuildableKind::Knight && p.knight_active)
            .map(|p| p.knight_level as i32)
            .sum()
    }

    pub fn build_locations_knight(&self, idx: usize, include_upgrades: bool) -> Vec<VertexCoordinate> {
        let owner = self.players[idx].order;
        let mut out = Vec::new();
        for vc in self.graph.vertices.keys() {
            match self.vertex_placements.get(vc) {
                None => {
                    if self.vertex_connected_to_route(*vc, owner) {
                        out.push(*vc);
                    }
                }
                Some(p)
                    if include_upgrades
                        && p.owner == owner
                        && p.kind == BuildableKind::Knight
                        && p.knight_level < MAX_KNIGHT_LEVEL =>
                {
                    out.push(*vc);
                }
                Some(_) => {}
            }
        }
        out.sort();
        out
    }

    /// A new knight arrives at level 1 and asleep; building on an own knight
    /// raises its level instead.
    pub fn build_knight(&mut self, idx: usize, vc: VertexCoordinate) -> Result<(), EngineError> {
        self.ensure_cnk()?;
        self.graph.vertex(vc)?;
        let owner = self.players[idx].order;
        match self.vertex_placements.get(&vc).copied() {
            None => {
                if !self.vertex_connected_to_route(vc, owner) {
                    return Err(EngineError::NotConnected);
                }
                self.ensure_can_build(idx, BuildableKind::Knight)?;
                self.pay_knight_cost(idx)?;
                self.players[idx].buildables_left.knights -= 1;
                let placement = VertexPlacement {
                    owner,
                    kind: BuildableKind::Knight,
                    knight_level: 1,
                    knight_active: false,
                    walled: false,
                };
                self.vertex_placements.insert(vc, placement);
                self.players[idx].vertex_placements.push(vc);
                self.emit_delta(Message::VertexPlacementBuilt {
                    vertex: vc,
                    placement,
                });
            }
            Some(p) if p.owner == owner && p.kind == BuildableKind::Knight => {
                if p.knight_level >= MAX_KNIGHT_LEVEL {
                    return Err(EngineError::IllegalPlacement(BuildableKind::Knight));
                }
                // Upgrades bypass the supply but pay the full cost, checked
                // up front so the payment stays atomic.
                if !self.init_phase && !self.players[idx].hand.has_resources(0, 0, 1, 0, 1) {
                    return Err(EngineError::InsufficientResources);
                }
                self.pay_knight_cost(idx)?;
                let placement = self
                    .vertex_placements
                    .get_mut(&vc)
                    .expect("checked just above");
                placement.knight_level += 1;
                let updated = *placement;
                self.emit_delta(Message::VertexPlacementBuilt {
                    vertex: vc,
                    placement: updated,
                });
            }
            Some(_) => return Err(EngineError::Occupied),
        }
        self.broadcast_state();
        Ok(())
    }

    fn pay_knight_cost(&mut self, idx: usize) -> Result<(), EngineError> {
        if self.init_phase {
            return Ok(());
        }
        let order = self.players[idx].order as i32;
        for (kind, qty) in crate::game::placements::build_cost(BuildableKind::Knight) {
            self.move_cards(order, BANK, *kind, *qty, false, false)?;
        }
        Ok(())
    }

    pub fn activate_locations_knight(&self, idx: usize) -> Vec<VertexCoordinate> {
        let owner = self.players[idx].order;
        let mut out: Vec<VertexCoordinate> = self
            .vertex_placements
            .iter()
            .filter(|(_, p)| {
                p.owner == owner && p.kind == BuildableKind::Knight && !p.knight_active
            })
            .map(|(vc, _)| *vc)
            .collect();
        out.sort();
        out
    }

    /// Feeding a knight one wheat wakes it for the barbarian count.
    pub fn activate_knight(&mut self, idx: usize, vc: VertexCoordinate) -> Result<(), EngineError> {
        self.ensure_cnk()?;
        let owner = self.players[idx].order;
        let placement = self
            .vertex_placements
            .get(&vc)
            .copied()
            .ok_or(EngineError::UnknownVertex)?;
        if placement.owner != owner
            || placement.kind != BuildableKind::Knight
            || placement.knight_active
        {
            return Err(EngineError::IllegalPlacement(BuildableKind::Knight));
        }
        self.move_cards(owner as i32, BANK, CardKind::Wheat, 1, false, false)?;
        let p = self.vertex_placements.get_mut(&vc).expect("checked above");
        p.knight_active = true;
        let updated = *p;
        self.emit_delta(Message::VertexPlacementBuilt {
            vertex: vc,
            placement: updated,
        });
        self.broadcast_state();
        Ok(())
    }

    /// An active knight adjacent to the robber's tile chases it away; the
    /// knight goes back to sleep and its owner picks the new tile.
    pub async fn knight_chase_robber(
        &mut self,
        idx: usize,
        dry_run: bool,
    ) -> Result<(), EngineError> {
        self.ensure_cnk()?;
        let owner = self.players[idx].order;
        let robber = self.robber;
        let candidates: Vec<VertexCoordinate> = self
            .graph
            .tile_vertex_coordinates(robber)
            .into_iter()
            .filter(|vc| {
                self.vertex_placements.get(vc).is_some_and(|p| {
                    p.owner == owner && p.kind == BuildableKind::Knight && p.knight_active
                })
            })
            .collect();
        let Some(knight) = candidates.first().copied() else {
            return Err(EngineError::IllegalPlacement(BuildableKind::Knight));
        };
        if dry_run {
            return Ok(());
        }
        if let Some(p) = self.vertex_placements.get_mut(&knight) {
            p.knight_active = false;
        }
        self.place_robber_flow(idx).await
    }

    /// Move an active knight along the owner's routes to an empty vertex.
    pub async fn knight_move(&mut self, idx: usize, dry_run: bool) -> Result<(), EngineError> {
        self.ensure_cnk()?;
        let owner = self.players[idx].order;
        let mut movable: Vec<(VertexCoordinate, Vec<VertexCoordinate>)> = Vec::new();
        for (vc, p) in &self.vertex_placements {
            if p.owner != owner || p.kind != BuildableKind::Knight || !p.knight_active {
                continue;
            }
            let destinations: Vec<VertexCoordinate> = self
                .graph
                .adjacent_vertex_edges(*vc)
                .iter()
                .filter(|ec| {
                    self.edge_placements
                        .get(ec)
                        .is_some_and(|e| e.owner == owner)
                })
                .map(|ec| ec.other_end(*vc))
                .filter(|dest| !self.vertex_placements.contains_key(dest))
                .collect();
            if !destinations.is_empty() {
                movable.push((*vc, destinations));
            }
        }
        movable.sort_by_key(|(vc, _)| *vc);
        if movable.is_empty() {
            return Err(EngineError::NowhereToBuild);
        }
        if dry_run {
            return Ok(());
        }

        let knights: Vec<VertexCoordinate> = movable.iter().map(|(vc, _)| *vc).collect();
        let response = self
            .block_for_action(
                idx,
                0,
                PlayerAction {
                    message: "Choose a warrior to move".to_string(),
                    can_cancel: true,
                    data: PlayerActionData::ChooseVertex {
                        allowed: knights.clone(),
                    },
                },
            )
            .await?;
        let from = response
            .into_vertex()
            .filter(|vc| knights.contains(vc))
            .ok_or(EngineError::Protocol("expected a knight vertex"))?;
        let destinations = movable
            .into_iter()
            .find(|(vc, _)| *vc == from)
            .map(|(_, d)| d)
            .expect("from came from the movable list");

        let response = self
            .block_for_action(
                idx,
                0,
                PlayerAction {
                    message: "Choose the warrior's destination".to_string(),
                    can_cancel: true,
                    data: PlayerActionData::ChooseVertex {
                        allowed: destinations.clone(),
                    },
                },
            )
            .await?;
        let to = response
            .into_vertex()
            .filter(|vc| destinations.contains(vc))
            .ok_or(EngineError::Protocol("expected a destination vertex"))?;

        let mut placement = self
            .vertex_placements
            .remove(&from)
            .expect("knight existed at the start of the move");
        placement.knight_active = false;
        self.players[idx].vertex_placements.retain(|c| *c != from);
        self.vertex_placements.insert(to, placement);
        self.players[idx].vertex_placements.push(to);
        self.emit_delta(Message::VertexPlacementRemoved { vertex: from });
        self.emit_delta(Message::VertexPlacementBuilt {
            vertex: to,
            placement,
        });
        self.broadcast_state();
        Ok(())
    }

    // ---- walls ----

    pub fn build_locations_wall(&self, idx: usize) -> Vec<VertexCoordinate> {
        let owner = self.players[idx].order;
        let mut out: Vec<VertexCoordinate> = self
            .vertex_placements
            .iter()
            .filter(|(_, p)| p.owner == owner && p.kind == BuildableKind::City && !p.walled)
            .map(|(vc, _)| *vc)
            .collect();
        out.sort();
        out
    }

    /// Walls go under own cities and raise the discard limit.
    pub fn build_wall(&mut self, idx: usize, vc: VertexCoordinate) -> Result<(), EngineError> {
        self.ensure_cnk()?;
        let owner = self.players[idx].order;
        let placement = self
            .vertex_placements
            .get(&vc)
            .copied()
            .ok_or(EngineError::UnknownVertex)?;
        if placement.owner != owner || placement.kind != BuildableKind::City || placement.walled {
            return Err(EngineError::IllegalPlacement(BuildableKind::Wall));
        }
        self.ensure_can_build(idx, BuildableKind::Wall)?;
        let order = owner as i32;
        for (kind, qty) in crate::game::placements::build_cost(BuildableKind::Wall) {
            self.move_cards(order, BANK, *kind, *qty, false, false)?;
        }
        self.players[idx].buildables_left.walls -= 1;
        let p = self.vertex_placements.get_mut(&vc).expect("checked above");
        p.walled = true;
        let updated = *p;
        self.emit_delta(Message::VertexPlacementBuilt {
            vertex: vc,
            placement: updated,
        });
        self.broadcast_state();
        Ok(())
    }

    // ---- city improvements ----

    pub fn improvement_cost(&self, idx: usize, track: CardKind) -> i16 {
        let level = self.players[idx].improvement_level(track) as i16;
        let discount = if self.players[idx].crane_discount { 1 } else { 0 };
        (level + 1 - discount).max(1)
    }

    pub fn can_build_improvement(&self, idx: usize, track: CardKind) -> Result<(), EngineError> {
        self.ensure_cnk()?;
        if !track.is_commodity() {
            return Err(EngineError::Protocol("improvements take a commodity track"));
        }
        let player = &self.players[idx];
        if player.improvement_level(track) >= MAX_IMPROVEMENT_LEVEL {
            return Err(EngineError::WrongPhase);
        }
        if player.hand.quantity(track) < self.improvement_cost(idx, track) {
            return Err(EngineError::InsufficientResources);
        }
        Ok(())
    }

    pub fn build_city_improvement(
        &mut self,
        idx: usize,
        track: CardKind,
    ) -> Result<(), EngineError> {
        self.can_build_improvement(idx, track)?;
        let cost = self.improvement_cost(idx, track);
        let order = self.players[idx].order as i32;
        self.move_cards(order, BANK, track, cost, false, false)?;
        self.players[idx].crane_discount = false;
        let level = {
            let p = &mut self.players[idx];
            let slot = p.improvements.entry(track).or_insert(0);
            *slot += 1;
            *slot
        };
        self.emit_delta(Message::CityImprovement {
            order: order as u16,
            track,
            level,
        });

        if level >= METROPOLIS_LEVEL {
            self.award_metropolis(idx, track, level);
        }
        self.check_for_victory();
        self.broadcast_state();
        self.send_player_secret(idx);
        Ok(())
    }

    /// The metropolis of a track goes to the first player at level four and
    /// moves only to someone who out-levels the current holder.
    fn award_metropolis(&mut self, idx: usize, track: CardKind, level: u8) {
        match self.extra_vp.metropolis.get(&track) {
            Some(holder) if *holder == idx => {}
            Some(holder) => {
                let holder_level = self.players[*holder].improvement_level(track);
                if level > holder_level {
                    self.extra_vp.metropolis.insert(track, idx);
                }
            }
            None => {
                self.extra_vp.metropolis.insert(track, idx);
            }
        }
    }

    // ---- event die and the barbarian fleet ----

    pub(crate) async fn resolve_event_die(
        &mut self,
        event: u8,
        red: u8,
    ) -> Result<(), EngineError> {
        match event {
            1..=3 => {
                self.barbarian_position += 1;
                if self.barbarian_position >= BARBARIAN_TRACK_LEN {
                    self.resolve_barbarian_attack();
                    self.barbarian_position = 0;
                }
            }
            4..=6 => {
                let track = match event {
                    4 => CardKind::Paper,
                    5 => CardKind::Cloth,
                    _ => CardKind::Coin,
                };
                for idx in 0..self.players.len() {
                    let level = self.players[idx].improvement_level(track);
                    if level == 0 || red > level + 1 {
                        continue;
                    }
                    self.draw_progress_for(idx, track);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn draw_progress_for(&mut self, idx: usize, track: CardKind) {
        let Some(card) = self.bank.draw_progress_card(track) else {
            return;
        };
        match card {
            DevCardKind::Constitution => {
                self.extra_vp.constitution_holder = Some(idx);
            }
            DevCardKind::Printer => {
                self.extra_vp.printer_holder = Some(idx);
            }
            _ => {
                self.players[idx].hand.dev_card_deck_mut(card).quantity += 1;
            }
        }
        self.send_player_secret(idx);
    }

    /// Barbarian strength is the cities on the board; the defense is the
    /// activated knights. Losers of a sacked island downgrade a city; the
    /// strongest defenders earn a point. All knights go back to sleep.
    fn resolve_barbarian_attack(&mut self) {
        let strength: i32 = self
            .vertex_placements
            .values()
            .filter(|p| p.kind == BuildableKind::City)
            .count() as i32;
        let defenses: Vec<i32> = (0..self.players.len())
            .map(|i| self.activated_knight_strength(i))
            .collect();
        let defense: i32 = defenses.iter().sum();

        if defense >= strength && strength > 0 {
            let best = defenses.iter().copied().max().unwrap_or(0);
            if best > 0 {
                for (i, d) in defenses.iter().enumerate() {
                    if *d == best {
                        self.players[i].defender_points += 1;
                    }
                }
            }
        } else if strength > 0 {
            let worst = defenses.iter().copied().min().unwrap_or(0);
            let losers: Vec<u16> = self
                .players
                .iter()
                .enumerate()
                .filter(|(i, _)| defenses[*i] == worst)
                .map(|(_, p)| p.order)
                .collect();
            for owner in losers {
                let Some(city) = self
                    .vertex_placements
                    .iter()
                    .filter(|(_, p)| p.owner == owner && p.kind == BuildableKind::City && !p.walled)
                    .map(|(vc, _)| *vc)
                    .min()
                else {
                    continue;
                };
                let p = self
                    .vertex_placements
                    .get_mut(&city)
                    .expect("city came from the map");
                p.kind = BuildableKind::Settlement;
                let updated = *p;
                if let Some(i) = self.player_by_order(owner) {
                    self.players[i].buildables_left.cities += 1;
                    self.players[i].buildables_left.settlements -= 1;
                }
                self.emit_delta(Message::VertexPlacementBuilt {
                    vertex: city,
                    placement: updated,
                });
            }
        }

        for p in self.vertex_placements.values_mut() {
            if p.kind == BuildableKind::Knight {
                p.knight_active = false;
            }
        }
        self.emit_delta(Message::BarbarianAttack {
            strength,
            defense,
        });
    }

    // ---- progress cards ----

    pub(crate) async fn use_progress_card(
        &mut self,
        idx: usize,
        kind: DevCardKind,
    ) -> Result<(), EngineError> {
        self.ensure_cnk()?;
        let deck = self.players[idx].hand.dev_card_deck_mut(kind);
        deck.quantity -= 1;
        deck.num_used += 1;
        let order = self.players[idx].order;
        self.emit_delta(Message::DevCardUsed { order, card: kind });

        match kind {
            DevCardKind::Crane => {
                self.players[idx].crane_discount = true;
            }
            DevCardKind::Irrigation => {
                self.move_cards(BANK, order as i32, CardKind::Wheat, 2, true, false)?;
            }
            DevCardKind::Mining => {
                self.move_cards(BANK, order as i32, CardKind::Ore, 2, true, false)?;
            }
            DevCardKind::Engineer => {
                let locations = self.build_locations_wall(idx);
                if let Some(vc) = locations.first().copied() {
                    let response = self
                        .block_for_action(
                            idx,
                            self.timer_vals.dev_card,
                            PlayerAction {
                                message: "Choose a city to fortify".to_string(),
                                can_cancel: false,
                                data: PlayerActionData::ChooseVertex {
                                    allowed: locations.clone(),
                                },
                            },
                        )
                        .await;
                    let target = response
                        .ok()
                        .and_then(|r| r.into_vertex())
                        .filter(|v| locations.contains(v))
                        .unwrap_or(vc);
                    if let Some(p) = self.vertex_placements.get_mut(&target) {
                        p.walled = true;
                        let updated = *p;
                        self.players[idx].buildables_left.walls -= 1;
                        self.emit_delta(Message::VertexPlacementBuilt {
                            vertex: target,
                            placement: updated,
                        });
                    }
                }
            }
            DevCardKind::Merchant => {
                let mut allowed: Vec<_> = self
                    .graph
                    .tiles
                    .values()
                    .filter(|t| t.is_land() && t.kind != TileKind::Desert && !t.fog)
                    .filter(|t| {
                        self.graph
                            .tile_vertex_coordinates(t.center)
                            .iter()
                            .any(|vc| {
                                self.vertex_placements
                                    .get(vc)
                                    .is_some_and(|p| p.owner == order && p.is_building())
                            })
                    })
                    .map(|t| t.center)
                    .collect();
                allowed.sort();
                if !allowed.is_empty() {
                    let response = self
                        .block_for_action(
                            idx,
                            self.timer_vals.dev_card,
                            PlayerAction {
                                message: "Place the merchant".to_string(),
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
                        .unwrap_or(allowed[0]);
                    self.merchant = Some(super::Merchant { tile, owner: order });
                    self.emit_delta(Message::MerchantMoved { tile, owner: order });
                }
            }
            DevCardKind::Bishop => {
                self.place_robber_flow(idx).await?;
            }
            _ => return Err(EngineError::DevCardNotUsable),
        }

        self.players[idx].played_dev_card_this_turn = true;
        self.check_for_victory();
        self.broadcast_state();
        self.send_player_secret(idx);
        Ok(())
    }
}
