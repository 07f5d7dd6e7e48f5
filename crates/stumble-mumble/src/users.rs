//! Table of connected users, kept in sync from `UserState` / `UserRemove`.

use std::collections::HashMap;

use stumble_core::User;

use crate::proto::UserState;

#[derive(Debug, Default)]
pub struct UserTable {
    users: HashMap<u32, User>,
}

impl UserTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or updates a user from a state packet.
    ///
    /// Packets without a session id are ignored. Only fields present in the
    /// packet overwrite existing values.
    pub fn apply(&mut self, state: &UserState) -> Option<&User> {
        let session = state.session?;
        let user = self
            .users
            .entry(session)
            .or_insert_with(|| User::new(session, ""));
        if let Some(name) = &state.name {
            user.name.clone_from(name);
        }
        if let Some(user_id) = state.user_id {
            user.user_id = Some(user_id);
        }
        if let Some(channel_id) = state.channel_id {
            user.channel_id = channel_id;
        }
        Some(user)
    }

    pub fn remove(&mut self, session: u32) -> Option<User> {
        self.users.remove(&session)
    }

    pub fn get(&self, session: u32) -> Option<&User> {
        self.users.get(&session)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&User> {
        self.users.values().find(|u| u.name == name)
    }

    /// Users sorted by session id.
    pub fn snapshot(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by_key(|u| u.session);
        users
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
