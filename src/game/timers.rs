use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::game::Game;
use crate::types::{
    SPEED_15S, SPEED_30S, SPEED_60S, SPEED_120S, SPEED_200M, SPEED_240S, SPEED_SLOW,
};

/// Seconds granted per step, calibrated per room speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerValues {
    pub turn: i32,
    pub dice: i32,
    pub discard: i32,
    pub robber: i32,
    pub choose_player: i32,
    pub init_vertex: i32,
    pub init_edge: i32,
    pub dev_card: i32,
    pub special_build: i32,
}

impl Default for TimerValues {
    fn default() -> Self {
        timer_values_for_speed(SPEED_60S)
    }
}

/// The single calibration table. Legacy speed names map onto the new tiers;
/// anything unrecognized lands on the 60s tier.
pub fn timer_values_for_speed(speed: &str) -> TimerValues {
    let very_fast = TimerValues {
        turn: 30,
        dice: 10,
        discard: 20,
        robber: 15,
        choose_player: 10,
        init_vertex: 60,
        init_edge: 15,
        dev_card: 10,
        special_build: 5,
    };

    match speed {
        SPEED_15S => TimerValues {
            turn: 15,
            ..very_fast
        },
        SPEED_30S => very_fast,
        SPEED_120S => TimerValues {
            turn: 120,
            dice: 20,
            discard: 40,
            robber: 40,
            choose_player: 40,
            init_vertex: 180,
            init_edge: 45,
            dev_card: 40,
            special_build: 20,
        },
        SPEED_200M | "200 min" => TimerValues {
            turn: 12000,
            dice: 3000,
            discard: 3000,
            robber: 3000,
            choose_player: 3000,
            init_vertex: 18000,
            init_edge: 4500,
            dev_card: 3000,
            special_build: 3000,
        },
        SPEED_240S | SPEED_SLOW => TimerValues {
            turn: 240,
            dice: 60,
            discard: 80,
            robber: 80,
            choose_player: 80,
            init_vertex: 360,
            init_edge: 90,
            dev_card: 60,
            special_build: 60,
        },
        // 60s tier, also the home of the legacy normal/fast aliases and the
        // fallback for unknown keys.
        _ => TimerValues {
            turn: 60,
            dice: 10,
            discard: 20,
            robber: 20,
            choose_player: 20,
            init_vertex: 120,
            init_edge: 30,
            dev_card: 20,
            special_build: 10,
        },
    }
}

impl Game {
    /// Clients drop any server deadline carrying a stale phase id, so every
    /// authoritative reset of the countdown must bump it.
    pub fn bump_timer_phase(&mut self) {
        self.timer_phase_id += 1;
    }

    pub fn reset_time_left(&mut self) {
        let turn = self.timer_vals.turn;
        self.set_current_player_time_left(turn);
    }

    pub fn set_current_player_time_left(&mut self, secs: i32) {
        let idx = self.current_player;
        if let Some(p) = self.players.get_mut(idx) {
            p.time_left = secs;
        }
        self.bump_timer_phase();
    }

    /// One second of the room clock. Prompt countdowns run inside
    /// `block_for_action`; this drives the no-prompt turn clock and the
    /// automatic end of an overdue turn.
    pub fn tick(&mut self) {
        if !self.initialized || self.game_over || self.paused {
            return;
        }
        if self.has_player_pending_action() || self.init_phase {
            return;
        }
        let idx = self.current_player;
        let Some(p) = self.players.get_mut(idx) else {
            return;
        };
        p.time_left -= 1;
        if p.time_left < 0 {
            self.force_end_turn();
        }
    }

    /// Pauses/resumes timer progression. Spectators and outsiders may not.
    pub fn toggle_pause(&mut self, order: u16) -> Result<(), EngineError> {
        if self.game_over {
            return Err(EngineError::GameOver);
        }
        let idx = self
            .player_by_order(order)
            .ok_or(EngineError::NotAParticipant)?;
        if self.players[idx].is_spectator {
            return Err(EngineError::SpectatorsNotAllowed);
        }
        self.paused = !self.paused;
        self.bump_timer_phase();
        self.broadcast_state();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::two_player_base_game;
    use crate::types::{SPEED_FAST, SPEED_NORMAL};

    fn tier_60s() -> TimerValues {
        TimerValues {
            turn: 60,
            dice: 10,
            discard: 20,
            robber: 20,
            choose_player: 20,
            init_vertex: 120,
            init_edge: 30,
            dev_card: 20,
            special_build: 10,
        }
    }

    #[test]
    fn timer_table_for_every_speed_key() {
        let very_fast = TimerValues {
            turn: 30,
            dice: 10,
            discard: 20,
            robber: 15,
            choose_player: 10,
            init_vertex: 60,
            init_edge: 15,
            dev_card: 10,
            special_build: 5,
        };
        let tier_15s = TimerValues {
            turn: 15,
            ..very_fast
        };
        let tier_120s = TimerValues {
            turn: 120,
            dice: 20,
            discard: 40,
            robber: 40,
            choose_player: 40,
            init_vertex: 180,
            init_edge: 45,
            dev_card: 40,
            special_build: 20,
        };
        let tier_200m = TimerValues {
            turn: 12000,
            dice: 3000,
            discard: 3000,
            robber: 3000,
            choose_player: 3000,
            init_vertex: 18000,
            init_edge: 4500,
            dev_card: 3000,
            special_build: 3000,
        };
        let tier_240s = TimerValues {
            turn: 240,
            dice: 60,
            discard: 80,
            robber: 80,
            choose_player: 80,
            init_vertex: 360,
            init_edge: 90,
            dev_card: 60,
            special_build: 60,
        };

        let cases = [
            (SPEED_15S, tier_15s),
            (SPEED_30S, very_fast),
            (SPEED_60S, tier_60s()),
            (SPEED_120S, tier_120s),
            (SPEED_200M, tier_200m),
            ("200 min", tier_200m),
            (SPEED_240S, tier_240s),
            (SPEED_SLOW, tier_240s),
            (SPEED_NORMAL, tier_60s()),
            (SPEED_FAST, tier_60s()),
            ("unknown", tier_60s()),
        ];
        for (speed, expected) in cases {
            assert_eq!(
                timer_values_for_speed(speed),
                expected,
                "speed key {speed:?}"
            );
        }
    }

    #[test]
    fn tick_leaves_time_untouched_while_paused() {
        let mut game = two_player_base_game();
        game.init_phase = false;
        game.players[0].time_left = 42;
        game.toggle_pause(0).unwrap();
        assert!(game.paused);

        game.tick();
        assert_eq!(game.players[0].time_left, 42);

        game.toggle_pause(0).unwrap();
        assert!(!game.paused);
        game.tick();
        assert_eq!(game.players[0].time_left, 41);
    }

    #[test]
    fn non_participant_cannot_toggle_pause() {
        let mut game = two_player_base_game();
        assert!(game.toggle_pause(7).is_err());
        assert!(!game.paused);
    }

    #[test]
    fn overdue_turn_advances_to_the_next_seat() {
        let mut game = two_player_base_game();
        game.init_phase = false;
        game.players[0].time_left = 1;

        game.tick();
        assert_eq!(game.current_player, 0);
        game.tick();
        assert_eq!(game.current_player, 1);
    }

    #[test]
    fn phase_id_strictly_increases_on_resets() {
        let mut game = two_player_base_game();
        let start = game.timer_phase_id;
        game.reset_time_left();
        game.toggle_pause(0).unwrap();
        game.toggle_pause(0).unwrap();
        assert!(game.timer_phase_id >= start + 3);
    }
}
