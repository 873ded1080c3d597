//! Channel struct definition
//!
//! Represents a named chat channel with a member set, topic, and mode flag.

use std::collections::HashSet;

use crate::types::{ChannelName, ClientId};

/// Named communication group
///
/// Created lazily on the first `/JOIN` that references its name. Membership
/// is a set of session ids; the user records themselves stay in the server's
/// user registry.
#[derive(Debug)]
pub struct Channel {
    /// Normalized channel name
    pub name: ChannelName,
    /// Sessions currently joined
    members: HashSet<ClientId>,
    /// Channel topic, set via /TOPIC
    pub topic: String,
    /// Free-text mode flag, set via /MODE (storage only)
    pub mode: String,
}

impl Channel {
    /// Create an empty channel with the given name
    pub fn new(name: ChannelName) -> Self {
        Self {
            name,
            members: HashSet::new(),
            topic: String::new(),
            mode: String::new(),
        }
    }

    /// Add a member
    ///
    /// Returns false if the session was already a member.
    pub fn add_member(&mut self, id: ClientId) -> bool {
        self.members.insert(id)
    }

    /// Remove a member
    ///
    /// Returns true if the channel is now empty and should be dropped from
    /// the registry.
    pub fn remove_member(&mut self, id: ClientId) -> bool {
        self.members.remove(&id);
        self.members.is_empty()
    }

    /// Check whether a session is a member
    pub fn contains(&self, id: ClientId) -> bool {
        self.members.contains(&id)
    }

    /// Number of current members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Iterate over the member session ids
    pub fn members(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.members.iter().copied()
    }
}
