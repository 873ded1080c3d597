//! ChatServer actor implementation
//!
//! The central actor that owns all shared state: the user registry, the
//! channel registry, and the username-to-channel map. Uses the actor pattern
//! with mpsc channels: sessions never touch the registries directly, they
//! send `ServerCommand`s, and this one task processes them sequentially. A
//! read-then-act sequence (look up a channel, then mutate it) is therefore
//! atomic without any locks.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::protocol::{self, Command};
use crate::types::{ChannelName, ClientId};
use crate::user::{User, UserStatus};

/// Wall-clock format used for the start-time and `/TIME` strings
pub(crate) const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Commands sent from session handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted; registers the user record
    Connect {
        client_id: ClientId,
        sender: mpsc::Sender<String>,
    },
    /// Handshake attempt to claim a username
    Register {
        client_id: ClientId,
        username: String,
        ack: oneshot::Sender<Registration>,
    },
    /// A recognized command line with a valid argument shape
    Dispatch {
        client_id: ClientId,
        command: Command,
    },
    /// A chat line bound for the user's current channel
    Chat {
        client_id: ClientId,
        text: String,
    },
    /// The session ended (peer closed, I/O error, idle deadline)
    Disconnect {
        client_id: ClientId,
    },
    /// Process-level shutdown request (Ctrl-C)
    Shutdown,
}

/// Outcome of a username claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Accepted,
    NameTaken,
}

/// The main ChatServer actor
///
/// Owns every registry. `users_to_channel` is keyed by username and records
/// the single channel a user currently occupies; the join, quit, kill and
/// disconnect paths keep it consistent with the channels' member sets.
pub struct ChatServer {
    /// All connected users: ClientId -> User
    pub(crate) users: HashMap<ClientId, User>,
    /// All live channels: ChannelName -> Channel
    pub(crate) channels: HashMap<ChannelName, Channel>,
    /// Username -> the one channel that user occupies
    pub(crate) users_to_channel: HashMap<String, ChannelName>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    /// Shutdown flag watched by the acceptor and every session
    shutdown: watch::Sender<bool>,
    /// Start time rendered once for /INFO
    pub(crate) started_at: String,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver and shutdown
    /// flag handle
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, shutdown: watch::Sender<bool>) -> Self {
        Self {
            users: HashMap::new(),
            channels: HashMap::new(),
            users_to_channel: HashMap::new(),
            receiver,
            shutdown,
            started_at: chrono::Local::now().format(TIME_FORMAT).to_string(),
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes commands until all senders are
    /// dropped, which happens once the acceptor and every session have
    /// finished.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    pub(crate) fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { client_id, sender } => {
                self.handle_connect(client_id, sender);
            }
            ServerCommand::Register {
                client_id,
                username,
                ack,
            } => {
                self.handle_register(client_id, username, ack);
            }
            ServerCommand::Dispatch { client_id, command } => {
                self.dispatch(client_id, command);
            }
            ServerCommand::Chat { client_id, text } => {
                self.handle_chat(client_id, text);
            }
            ServerCommand::Disconnect { client_id } => {
                self.handle_disconnect(client_id);
            }
            ServerCommand::Shutdown => {
                self.initiate_shutdown();
            }
        }
    }

    /// Handle a newly accepted connection
    fn handle_connect(&mut self, client_id: ClientId, sender: mpsc::Sender<String>) {
        info!("Client {} connected", client_id);
        let mut user = User::new(client_id, sender);
        user.status = UserStatus::Online;
        self.users.insert(client_id, user);
        debug!(
            "Total users: {}, Total channels: {}",
            self.users.len(),
            self.channels.len()
        );
    }

    /// Handle a username claim from the handshake
    ///
    /// The uniqueness check and the claim happen in one actor step, so two
    /// sessions racing for the same name cannot both win. Dropping the ack
    /// without answering (unknown session) tells the handshake to bail out.
    fn handle_register(
        &mut self,
        client_id: ClientId,
        username: String,
        ack: oneshot::Sender<Registration>,
    ) {
        let taken = self
            .users
            .values()
            .any(|u| u.username.as_deref() == Some(username.as_str()));
        if taken {
            let _ = ack.send(Registration::NameTaken);
            return;
        }

        let Some(user) = self.users.get_mut(&client_id) else {
            return;
        };

        user.set_username(username.clone());
        info!("Client {} registered as '{}'", client_id, username);
        let _ = ack.send(Registration::Accepted);
    }

    /// Forward a chat line to the sender's current channel
    fn handle_chat(&mut self, client_id: ClientId, text: String) {
        let Some(user) = self.users.get(&client_id) else {
            return;
        };
        let Some(username) = user.username.as_deref() else {
            return;
        };

        match self.users_to_channel.get(username) {
            Some(channel_name) => {
                let message = format!("{username}: {text}");
                self.broadcast(channel_name, &message);
            }
            None => self.reply(client_id, protocol::NOT_IN_CHANNEL),
        }
    }

    /// Handle a session ending for any reason other than /QUIT or /KILL
    fn handle_disconnect(&mut self, client_id: ClientId) {
        // Quit and kill already removed the user; this is then a no-op.
        if self.users.contains_key(&client_id) {
            info!("Client {} disconnected", client_id);
            self.remove_user(client_id);
        }
    }

    /// Flip the shutdown flag watched by the acceptor and all sessions
    pub(crate) fn initiate_shutdown(&self) {
        info!("Server shutdown initiated");
        let _ = self.shutdown.send(true);
    }

    /// Remove a user from every registry (the single removal path)
    ///
    /// Used by /QUIT, /KILL and disconnect alike: leaves the current channel
    /// (if any), drops the `users_to_channel` entry, marks the user Offline
    /// and discards the record. Discarding the record closes the outbound
    /// queue, which is what ends the session's write loop.
    pub(crate) fn remove_user(&mut self, client_id: ClientId) {
        if let Some(username) = self.users.get(&client_id).and_then(|u| u.username.clone()) {
            if let Some(channel_name) = self.users_to_channel.remove(&username) {
                self.remove_from_channel(client_id, &username, &channel_name);
            }
        }

        if let Some(mut user) = self.users.remove(&client_id) {
            user.status = UserStatus::Offline;
            info!("Client {} has left", user.display_name());
        }

        debug!(
            "Total users: {}, Total channels: {}",
            self.users.len(),
            self.channels.len()
        );
    }

    /// Take a user out of a channel's member set
    ///
    /// Callers maintain `users_to_channel` themselves. An emptied channel is
    /// dropped from the registry; otherwise the remaining members get the
    /// leave notice.
    pub(crate) fn remove_from_channel(
        &mut self,
        client_id: ClientId,
        username: &str,
        channel_name: &ChannelName,
    ) {
        let Some(channel) = self.channels.get_mut(channel_name) else {
            return;
        };

        let now_empty = channel.remove_member(client_id);
        if now_empty {
            self.channels.remove(channel_name);
            debug!("Channel {} dropped (empty)", channel_name);
        } else {
            self.broadcast(channel_name, &protocol::left_notice(username));
        }
    }

    /// Deliver a line to every member of a channel, the sender included
    ///
    /// Best-effort: a member whose queue is full or gone is skipped with a
    /// warning and delivery to the rest continues.
    pub(crate) fn broadcast(&self, channel_name: &ChannelName, text: &str) {
        let Some(channel) = self.channels.get(channel_name) else {
            return;
        };

        for member_id in channel.members() {
            let Some(member) = self.users.get(&member_id) else {
                continue;
            };
            if let Err(err) = member.send_line(text) {
                warn!(
                    "Dropping broadcast line for {} in {}: {}",
                    member.display_name(),
                    channel_name,
                    err
                );
            }
        }
    }

    /// Send one reply line to the invoking user
    pub(crate) fn reply(&self, client_id: ClientId, line: impl Into<String>) {
        let Some(user) = self.users.get(&client_id) else {
            return;
        };
        if let Err(err) = user.send_line(line) {
            warn!("Failed to deliver reply to {}: {}", user.display_name(), err);
        }
    }
}
