//! The persistence collaborator. The engine only ever talks to this trait;
//! transient write failures are logged by callers and never kill a room.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::board::maps::MapDefinition;

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;
pub type StoreResult<T> = Result<T, StoreError>;

pub trait Store: Send + Sync {
    fn init(&self, id: &str) -> StoreResult<()>;
    fn create_game_if_not_exists(&self, id: &str) -> StoreResult<()>;
    fn create_game_state_if_not_exists(&self, id: &str, state: Vec<u8>) -> StoreResult<()>;
    fn write_game_server(&self, id: &str) -> StoreResult<()>;
    fn write_game_started(&self, id: &str) -> StoreResult<()>;
    fn write_game_finished(&self, id: &str) -> StoreResult<()>;
    fn write_game_completed_for_user(&self, user_id: &str) -> StoreResult<()>;
    fn write_game_players(&self, id: &str, num_players: i32) -> StoreResult<()>;
    fn write_game_active_players(&self, id: &str, num_players: i32, host: &str) -> StoreResult<()>;
    #[allow(clippy::too_many_arguments)]
    fn write_game_presence(
        &self,
        id: &str,
        connected_players: i32,
        connected_humans: i32,
        host: &str,
        host_id: &str,
        last_human_seen_at: Option<SystemTime>,
    ) -> StoreResult<()>;
    fn write_game_participants(&self, id: &str, participant_ids: &[String]) -> StoreResult<()>;
    fn write_game_privacy(&self, id: &str, private: bool) -> StoreResult<()>;
    fn write_game_settings(&self, id: &str, settings: Vec<u8>) -> StoreResult<()>;
    fn write_journal_entries(&self, id: &str, entries: Vec<Vec<u8>>) -> StoreResult<()>;
    fn write_game_state(&self, id: &str, state: Vec<u8>) -> StoreResult<()>;
    fn write_game_id_for_user(&self, game_id: &str, user_id: &str) -> StoreResult<()>;
    fn read_journal(&self, id: &str) -> StoreResult<Vec<Vec<u8>>>;
    fn read_game_players(&self, id: &str) -> StoreResult<i32>;
    fn read_user(&self, id: &str) -> StoreResult<HashMap<String, String>>;
    fn get_official_map_names(&self) -> Vec<String>;
    fn get_all_map_names_for_user(&self, user_id: &str) -> StoreResult<Vec<String>>;
    fn get_map(&self, name: &str) -> Option<MapDefinition>;
    fn check_if_journal_exists(&self, id: &str) -> StoreResult<bool>;
    fn terminate_game(&self, id: &str) -> StoreResult<()>;

    fn as_any(&self) -> &dyn Any;
}

/// In-memory store used by tests and the simulation binary.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    games: HashMap<String, MemoryGame>,
}

#[derive(Debug, Default)]
struct MemoryGame {
    started: bool,
    finished: bool,
    terminated: bool,
    num_players: i32,
    settings: Vec<u8>,
    journal: Vec<Vec<u8>>,
    state: Option<Vec<u8>>,
}

impl MemoryStore {
    fn with_game<R>(&self, id: &str, f: impl FnOnce(&mut MemoryGame) -> R) -> R {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        f(inner.games.entry(id.to_string()).or_default())
    }

    pub fn journal_entries(&self, id: &str) -> Vec<Vec<u8>> {
        self.with_game(id, |g| g.journal.clone())
    }

    pub fn game_state_bytes(&self, id: &str) -> Option<Vec<u8>> {
        self.with_game(id, |g| g.state.clone())
    }

    pub fn finished(&self, id: &str) -> bool {
        self.with_game(id, |g| g.finished)
    }

    pub fn terminated(&self, id: &str) -> bool {
        self.with_game(id, |g| g.terminated)
    }
}

impl Store for MemoryStore {
    fn init(&self, _id: &str) -> StoreResult<()> {
        Ok(())
    }

    fn create_game_if_not_exists(&self, id: &str) -> StoreResult<()> {
        self.with_game(id, |_| ());
        Ok(())
    }

    fn create_game_state_if_not_exists(&self, id: &str, state: Vec<u8>) -> StoreResult<()> {
        self.with_game(id, |g| {
            if g.state.is_none() {
                g.state = Some(state);
            }
        });
        Ok(())
    }

    fn write_game_server(&self, _id: &str) -> StoreResult<()> {
        Ok(())
    }

    fn write_game_started(&self, id: &str) -> StoreResult<()> {
        self.with_game(id, |g| g.started = true);
        Ok(())
    }

    fn write_game_finished(&self, id: &str) -> StoreResult<()> {
        self.with_game(id, |g| g.finished = true);
        Ok(())
    }

    fn write_game_completed_for_user(&self, _user_id: &str) -> StoreResult<()> {
        Ok(())
    }

    fn write_game_players(&self, id: &str, num_players: i32) -> StoreResult<()> {
        self.with_game(id, |g| g.num_players = num_players);
        Ok(())
    }

    fn write_game_active_players(
        &self,
        _id: &str,
        _num_players: i32,
        _host: &str,
    ) -> StoreResult<()> {
        Ok(())
    }

    fn write_game_presence(
        &self,
        _id: &str,
        _connected_players: i32,
        _connected_humans: i32,
        _host: &str,
        _host_id: &str,
        _last_human_seen_at: Option<SystemTime>,
    ) -> StoreResult<()> {
        Ok(())
    }

    fn write_game_participants(&self, _id: &str, _participant_ids: &[String]) -> StoreResult<()> {
        Ok(())
    }

    fn write_game_privacy(&self, _id: &str, _private: bool) -> StoreResult<()> {
        Ok(())
    }

    fn write_game_settings(&self, id: &str, settings: Vec<u8>) -> StoreResult<()> {
        self.with_game(id, |g| g.settings = settings);
        Ok(())
    }

    fn write_journal_entries(&self, id: &str, entries: Vec<Vec<u8>>) -> StoreResult<()> {
        self.with_game(id, |g| g.journal.extend(entries));
        Ok(())
    }

    fn write_game_state(&self, id: &str, state: Vec<u8>) -> StoreResult<()> {
        self.with_game(id, |g| g.state = Some(state));
        Ok(())
    }

    fn write_game_id_for_user(&self, _game_id: &str, _user_id: &str) -> StoreResult<()> {
        Ok(())
    }

    fn read_journal(&self, id: &str) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self.journal_entries(id))
    }

    fn read_game_players(&self, id: &str) -> StoreResult<i32> {
        Ok(self.with_game(id, |g| g.num_players))
    }

    fn read_user(&self, _id: &str) -> StoreResult<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    fn get_official_map_names(&self) -> Vec<String> {
        crate::board::maps::official_map_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn get_all_map_names_for_user(&self, _user_id: &str) -> StoreResult<Vec<String>> {
        Ok(self.get_official_map_names())
    }

    fn get_map(&self, name: &str) -> Option<MapDefinition> {
        crate::board::maps::by_name(name)
    }

    fn check_if_journal_exists(&self, id: &str) -> StoreResult<bool> {
        Ok(!self.journal_entries(id).is_empty())
    }

    fn terminate_game(&self, id: &str) -> StoreResult<()> {
        self.with_game(id, |g| g.terminated = true);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
