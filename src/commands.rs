//! Command dispatch and per-command handlers
//!
//! Runs inside the ChatServer actor, so every handler sees a consistent
//! snapshot of the registries and mutates them without locks. Each handler
//! queues exactly one reply line for the invoking user; `/QUIT` and `/DIE`
//! answer with their control tokens instead.

use tracing::{debug, info};

use crate::channel::Channel;
use crate::protocol::{self, Command};
use crate::server::{ChatServer, TIME_FORMAT};
use crate::types::{ChannelName, ClientId};
use crate::user::User;

impl ChatServer {
    /// Route a validated command to its handler
    pub(crate) fn dispatch(&mut self, client_id: ClientId, command: Command) {
        match command {
            Command::Join(channel) => self.cmd_join(client_id, &channel),
            Command::List => self.cmd_list(client_id),
            Command::Nick(nickname) => self.cmd_nick(client_id, nickname),
            Command::Pass(password) => self.cmd_pass(client_id, password),
            Command::Topic { channel, text } => self.cmd_topic(client_id, &channel, text),
            Command::Mode { mode, channel } => self.cmd_mode(client_id, mode, &channel),
            Command::Kill(username) => self.cmd_kill(client_id, &username),
            Command::Ison(nickname) => self.cmd_ison(client_id, &nickname),
            Command::Users => self.cmd_users(client_id),
            Command::Ping => self.reply(client_id, protocol::PONG_TOKEN),
            Command::Help => self.reply(client_id, protocol::HELP_TEXT),
            Command::Info => self.cmd_info(client_id),
            Command::Time => self.cmd_time(client_id),
            Command::Version => self.reply(client_id, env!("CARGO_PKG_VERSION")),
            Command::Rules => self.reply(client_id, protocol::RULES_TEXT),
            Command::Quit => self.cmd_quit(client_id),
            Command::Die => self.initiate_shutdown(),
        }
    }

    /// Create-or-switch channel membership
    ///
    /// Rejoining the current channel changes nothing. Switching leaves the
    /// old channel through the same path every other departure uses. The
    /// join notice goes out before the member set grows, so the joiner gets
    /// the confirmation reply and nothing else.
    fn cmd_join(&mut self, client_id: ClientId, channel_arg: &str) {
        let Some(username) = self.users.get(&client_id).and_then(|u| u.username.clone()) else {
            return;
        };
        let target = ChannelName::from_string(channel_arg);

        if self.users_to_channel.get(&username) == Some(&target) {
            self.reply(client_id, format!("\n> You are already in channel: {target}"));
            return;
        }

        if let Some(old) = self.users_to_channel.remove(&username) {
            self.remove_from_channel(client_id, &username, &old);
        }

        if !self.channels.contains_key(&target) {
            self.channels.insert(target.clone(), Channel::new(target.clone()));
            debug!("Channel {} created", target);
        }

        self.broadcast(&target, &protocol::joined_notice(&username));
        if let Some(channel) = self.channels.get_mut(&target) {
            channel.add_member(client_id);
        }
        self.users_to_channel.insert(username.clone(), target.clone());

        info!("{} joined channel {}", username, target);
        self.reply(
            client_id,
            format!("\n> You have joined the channel {target}."),
        );
    }

    /// List every live channel with its member count, sorted by name
    fn cmd_list(&self, client_id: ClientId) {
        if self.channels.is_empty() {
            self.reply(client_id, protocol::NO_ROOMS);
            return;
        }

        let mut names: Vec<&ChannelName> = self.channels.keys().collect();
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let mut out = String::from("\n\n> Current channels available are: ");
        for name in names {
            if let Some(channel) = self.channels.get(name) {
                out.push_str(&format!("\n    {}: {} user(s)", name, channel.member_count()));
            }
        }
        self.reply(client_id, out);
    }

    /// Set the nickname; no uniqueness check, nicknames are display-only
    fn cmd_nick(&mut self, client_id: ClientId, nickname: String) {
        let Some(user) = self.users.get_mut(&client_id) else {
            return;
        };
        user.nickname = nickname.clone();
        self.reply(
            client_id,
            format!("Nickname has been changed to {nickname}"),
        );
    }

    /// Set the stored password; requires a claimed username
    fn cmd_pass(&mut self, client_id: ClientId, password: String) {
        let Some(user) = self.users.get_mut(&client_id) else {
            return;
        };
        let reply = if user.username.is_none() {
            protocol::USAGE_PASS.to_string()
        } else {
            user.password = password;
            "Password has been changed".to_string()
        };
        self.reply(client_id, reply);
    }

    /// Set a channel's topic
    fn cmd_topic(&mut self, client_id: ClientId, channel_arg: &str, text: String) {
        let target = ChannelName::from_string(channel_arg);
        let reply = match self.channels.get_mut(&target) {
            Some(channel) => {
                channel.topic = text.clone();
                format!("Channel {target} -> topic has been changed to {text}")
            }
            None => format!("Error, channel with a name {target} was not found"),
        };
        self.reply(client_id, reply);
    }

    /// Set a channel's mode string; modes are stored, never enforced
    fn cmd_mode(&mut self, client_id: ClientId, mode: String, channel_arg: &str) {
        let target = ChannelName::from_string(channel_arg);
        let reply = match self.channels.get_mut(&target) {
            Some(channel) => {
                channel.mode = mode.clone();
                format!("{target} mode has changed to {mode}")
            }
            None => format!("{target} not found"),
        };
        self.reply(client_id, reply);
    }

    /// Forcibly remove a user by username
    ///
    /// The confirmation goes out before the removal, so a self-kill still
    /// sees it before its own queue closes.
    fn cmd_kill(&mut self, client_id: ClientId, username_arg: &str) {
        let needle = username_arg.to_ascii_lowercase();
        let target = self
            .users
            .values()
            .find(|u| u.username.as_deref() == Some(needle.as_str()))
            .map(|u| u.id);

        match target {
            Some(target_id) => {
                self.reply(client_id, format!("User {needle} has been removed"));
                info!("User {} removed via /kill", needle);
                self.remove_user(target_id);
            }
            None => self.reply(client_id, format!("User {needle} not found")),
        }
    }

    /// Report whether a nickname is currently connected
    fn cmd_ison(&self, client_id: ClientId, nickname: &str) {
        let connected = self
            .users
            .values()
            .any(|u| u.nickname.eq_ignore_ascii_case(nickname));
        let reply = if connected {
            format!("User {nickname} is connected")
        } else {
            format!("{nickname} not found")
        };
        self.reply(client_id, reply);
    }

    /// Dump every connected user's fields, ordered by username
    fn cmd_users(&self, client_id: ClientId) {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| a.display_name().cmp(b.display_name()));

        let mut out = String::new();
        for user in users {
            out.push_str(&format!(
                "User name = {}\nUser nickname = {}\nPassword = {}\nUser type = {}\nStatus = {}\nReal name = {}\n\n",
                user.display_name(),
                user.nickname,
                user.password,
                user.user_type,
                user.status,
                user.realname
            ));
        }
        self.reply(client_id, out.trim_end_matches('\n').to_string());
    }

    fn cmd_info(&self, client_id: ClientId) {
        self.reply(
            client_id,
            format!(
                "Server version = {}\nServer start time = {}",
                env!("CARGO_PKG_VERSION"),
                self.started_at
            ),
        );
    }

    fn cmd_time(&self, client_id: ClientId) {
        self.reply(
            client_id,
            format!("Server time = {}", chrono::Local::now().format(TIME_FORMAT)),
        );
    }

    /// Orderly departure: the token is queued before removal closes the
    /// queue, and the session drains it on the way out
    fn cmd_quit(&mut self, client_id: ClientId) {
        self.reply(client_id, protocol::QUIT_TOKEN);
        self.remove_user(client_id);
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::sync::{mpsc, oneshot};

    use crate::server::testing::*;
    use crate::server::{ChatServer, ServerCommand};

    use super::*;

    fn dispatch(server: &mut ChatServer, client_id: ClientId, command: Command) {
        server.handle_command(ServerCommand::Dispatch { client_id, command });
    }

    #[tokio::test]
    async fn test_join_creates_channel_and_confirms() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(&mut server, alice, Command::Join("general".to_string()));

        let lines = drain(&mut alice_rx);
        assert_eq!(lines, vec!["\n> You have joined the channel general.".to_string()]);

        let general = ChannelName::from_string("general");
        assert_eq!(server.channels.get(&general).unwrap().member_count(), 1);
        assert_eq!(server.users_to_channel.get("alice"), Some(&general));
        assert_registry_consistent(&server);
    }

    #[tokio::test]
    async fn test_join_same_channel_is_idempotent() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        join(&mut server, alice, "general");
        drain(&mut alice_rx);

        dispatch(&mut server, alice, Command::Join("general".to_string()));

        let lines = drain(&mut alice_rx);
        assert_eq!(lines, vec!["\n> You are already in channel: general".to_string()]);
        let general = ChannelName::from_string("general");
        assert_eq!(server.channels.get(&general).unwrap().member_count(), 1);
    }

    #[tokio::test]
    async fn test_join_addresses_channels_case_insensitively() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(&mut server, alice, Command::Join("RoomA".to_string()));
        drain(&mut alice_rx);
        dispatch(&mut server, alice, Command::Join("rooma".to_string()));

        let lines = drain(&mut alice_rx);
        assert_eq!(lines, vec!["\n> You are already in channel: rooma".to_string()]);
        assert_eq!(server.channels.len(), 1);
        assert!(server
            .channels
            .contains_key(&ChannelName::from_string("rooma")));
    }

    #[tokio::test]
    async fn test_join_notifies_existing_members_only() {
        let (mut server, _shutdown) = server();
        let (bob, mut bob_rx) = connect(&mut server, "bob");
        join(&mut server, bob, "general");
        drain(&mut bob_rx);

        let (alice, mut alice_rx) = connect(&mut server, "alice");
        join(&mut server, alice, "general");

        assert_eq!(drain(&mut bob_rx), vec![protocol::joined_notice("alice")]);
        assert_eq!(
            drain(&mut alice_rx),
            vec!["\n> You have joined the channel general.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_switching_channels_moves_membership() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        let (bob, mut bob_rx) = connect(&mut server, "bob");
        join(&mut server, alice, "rooma");
        join(&mut server, bob, "rooma");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        dispatch(&mut server, alice, Command::Join("roomb".to_string()));

        let rooma = ChannelName::from_string("rooma");
        let roomb = ChannelName::from_string("roomb");
        assert_eq!(server.channels.get(&rooma).unwrap().member_count(), 1);
        assert_eq!(server.channels.get(&roomb).unwrap().member_count(), 1);
        assert_eq!(server.users_to_channel.get("alice"), Some(&roomb));
        assert_eq!(drain(&mut bob_rx), vec![protocol::left_notice("alice")]);
        assert_registry_consistent(&server);
    }

    #[tokio::test]
    async fn test_switching_drops_emptied_channel() {
        let (mut server, _shutdown) = server();
        let (alice, _alice_rx) = connect(&mut server, "alice");
        join(&mut server, alice, "rooma");

        dispatch(&mut server, alice, Command::Join("roomb".to_string()));

        assert!(!server
            .channels
            .contains_key(&ChannelName::from_string("rooma")));
        assert_registry_consistent(&server);
    }

    #[tokio::test]
    async fn test_list_reports_no_rooms() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(&mut server, alice, Command::List);

        assert_eq!(drain(&mut alice_rx), vec![protocol::NO_ROOMS.to_string()]);
    }

    #[tokio::test]
    async fn test_list_sorts_channels_with_counts() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        let (bob, _bob_rx) = connect(&mut server, "bob");
        let (carol, _carol_rx) = connect(&mut server, "carol");
        join(&mut server, alice, "zebra");
        join(&mut server, bob, "alpha");
        join(&mut server, carol, "zebra");
        drain(&mut alice_rx);

        dispatch(&mut server, alice, Command::List);

        let lines = drain(&mut alice_rx);
        assert_eq!(
            lines,
            vec![
                "\n\n> Current channels available are: \
                 \n    alpha: 1 user(s)\
                 \n    zebra: 2 user(s)"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_nick_updates_nickname() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(&mut server, alice, Command::Nick("Speedy".to_string()));

        assert_eq!(
            drain(&mut alice_rx),
            vec!["Nickname has been changed to Speedy".to_string()]
        );
        assert_eq!(server.users.get(&alice).unwrap().nickname, "Speedy");
    }

    #[tokio::test]
    async fn test_pass_requires_username() {
        let (mut server, _shutdown) = server();
        let client_id = ClientId::new();
        let (tx, mut rx) = mpsc::channel(8);
        server.handle_command(ServerCommand::Connect {
            client_id,
            sender: tx,
        });

        dispatch(&mut server, client_id, Command::Pass("secret".to_string()));

        assert_eq!(drain(&mut rx), vec![protocol::USAGE_PASS.to_string()]);
        assert_eq!(server.users.get(&client_id).unwrap().password, "@");
    }

    #[tokio::test]
    async fn test_pass_updates_password() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(&mut server, alice, Command::Pass("secret".to_string()));

        assert_eq!(
            drain(&mut alice_rx),
            vec!["Password has been changed".to_string()]
        );
        assert_eq!(server.users.get(&alice).unwrap().password, "secret");
    }

    #[tokio::test]
    async fn test_topic_sets_and_reports() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        join(&mut server, alice, "general");
        drain(&mut alice_rx);

        dispatch(
            &mut server,
            alice,
            Command::Topic {
                channel: "general".to_string(),
                text: "all about rust".to_string(),
            },
        );

        assert_eq!(
            drain(&mut alice_rx),
            vec!["Channel general -> topic has been changed to all about rust".to_string()]
        );
        let general = ChannelName::from_string("general");
        assert_eq!(server.channels.get(&general).unwrap().topic, "all about rust");
    }

    #[tokio::test]
    async fn test_topic_unknown_channel() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(
            &mut server,
            alice,
            Command::Topic {
                channel: "nowhere".to_string(),
                text: "x".to_string(),
            },
        );

        assert_eq!(
            drain(&mut alice_rx),
            vec!["Error, channel with a name nowhere was not found".to_string()]
        );
    }

    #[tokio::test]
    async fn test_mode_sets_and_reports() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        join(&mut server, alice, "general");
        drain(&mut alice_rx);

        dispatch(
            &mut server,
            alice,
            Command::Mode {
                mode: "+m".to_string(),
                channel: "general".to_string(),
            },
        );

        assert_eq!(
            drain(&mut alice_rx),
            vec!["general mode has changed to +m".to_string()]
        );
        let general = ChannelName::from_string("general");
        assert_eq!(server.channels.get(&general).unwrap().mode, "+m");
    }

    #[tokio::test]
    async fn test_mode_unknown_channel() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(
            &mut server,
            alice,
            Command::Mode {
                mode: "+m".to_string(),
                channel: "nowhere".to_string(),
            },
        );

        assert_eq!(drain(&mut alice_rx), vec!["nowhere not found".to_string()]);
    }

    #[tokio::test]
    async fn test_kill_removes_target_and_confirms() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        let (bob, _bob_rx) = connect(&mut server, "bob");
        let (carol, mut carol_rx) = connect(&mut server, "carol");
        join(&mut server, alice, "general");
        join(&mut server, bob, "general");
        join(&mut server, carol, "general");
        drain(&mut alice_rx);
        drain(&mut carol_rx);

        dispatch(&mut server, carol, Command::Kill("bob".to_string()));

        assert_eq!(
            drain(&mut carol_rx),
            vec![
                "User bob has been removed".to_string(),
                protocol::left_notice("bob"),
            ]
        );
        assert_eq!(drain(&mut alice_rx), vec![protocol::left_notice("bob")]);
        assert!(!server.users.contains_key(&bob));
        assert!(!server.users_to_channel.contains_key("bob"));
        let general = ChannelName::from_string("general");
        assert_eq!(server.channels.get(&general).unwrap().member_count(), 2);
        assert_registry_consistent(&server);
    }

    #[tokio::test]
    async fn test_kill_matches_username_case_insensitively() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        let (bob, _bob_rx) = connect(&mut server, "bob");

        dispatch(&mut server, alice, Command::Kill("BOB".to_string()));

        assert_eq!(
            drain(&mut alice_rx),
            vec!["User bob has been removed".to_string()]
        );
        assert!(!server.users.contains_key(&bob));
    }

    #[tokio::test]
    async fn test_kill_unknown_user_not_found() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(&mut server, alice, Command::Kill("ghost".to_string()));

        assert_eq!(
            drain(&mut alice_rx),
            vec!["User ghost not found".to_string()]
        );
    }

    #[tokio::test]
    async fn test_self_kill_still_sees_confirmation() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        join(&mut server, alice, "general");
        drain(&mut alice_rx);

        dispatch(&mut server, alice, Command::Kill("alice".to_string()));

        // The confirmation was queued before the queue closed.
        assert_eq!(
            drain(&mut alice_rx),
            vec!["User alice has been removed".to_string()]
        );
        assert_eq!(alice_rx.try_recv(), Err(TryRecvError::Disconnected));
        assert!(server.users.is_empty());
        assert!(server.channels.is_empty());
    }

    #[tokio::test]
    async fn test_ison_matches_nickname_case_insensitively() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        let (bob, _bob_rx) = connect(&mut server, "bob");
        dispatch(&mut server, bob, Command::Nick("Speedy".to_string()));

        dispatch(&mut server, alice, Command::Ison("SPEEDY".to_string()));
        assert_eq!(
            drain(&mut alice_rx),
            vec!["User SPEEDY is connected".to_string()]
        );

        dispatch(&mut server, alice, Command::Ison("ghost".to_string()));
        assert_eq!(drain(&mut alice_rx), vec!["ghost not found".to_string()]);
    }

    #[tokio::test]
    async fn test_users_lists_every_connected_user() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        let (_bob, _bob_rx) = connect(&mut server, "bob");

        dispatch(&mut server, alice, Command::Users);

        let lines = drain(&mut alice_rx);
        assert_eq!(lines.len(), 1);
        let dump = &lines[0];
        assert!(dump.starts_with("User name = alice\n"));
        assert!(dump.contains("User name = bob\n"));
        assert!(dump.contains("Password = @\n"));
        assert!(dump.contains("User type = user\n"));
        assert!(dump.contains("Status = Online\n"));
        assert!(dump.ends_with("Real name = -"));
    }

    #[tokio::test]
    async fn test_ping_replies_with_pong_only() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(&mut server, alice, Command::Ping);

        assert_eq!(drain(&mut alice_rx), vec![protocol::PONG_TOKEN.to_string()]);
    }

    #[tokio::test]
    async fn test_info_reports_version_and_start_time() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(&mut server, alice, Command::Info);

        let lines = drain(&mut alice_rx);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with(&format!(
            "Server version = {}\nServer start time = ",
            env!("CARGO_PKG_VERSION")
        )));
    }

    #[tokio::test]
    async fn test_time_help_version_rules() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");

        dispatch(&mut server, alice, Command::Time);
        let lines = drain(&mut alice_rx);
        assert!(lines[0].starts_with("Server time = "));

        dispatch(&mut server, alice, Command::Help);
        let lines = drain(&mut alice_rx);
        assert!(lines[0].contains("/WHOIS [nickname]"));

        dispatch(&mut server, alice, Command::Version);
        assert_eq!(
            drain(&mut alice_rx),
            vec![env!("CARGO_PKG_VERSION").to_string()]
        );

        dispatch(&mut server, alice, Command::Rules);
        assert_eq!(
            drain(&mut alice_rx),
            vec![protocol::RULES_TEXT.to_string()]
        );
    }

    #[tokio::test]
    async fn test_quit_sends_token_then_removes() {
        let (mut server, _shutdown) = server();
        let (alice, mut alice_rx) = connect(&mut server, "alice");
        let (bob, mut bob_rx) = connect(&mut server, "bob");
        join(&mut server, alice, "general");
        join(&mut server, bob, "general");
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        dispatch(&mut server, alice, Command::Quit);

        assert_eq!(
            drain(&mut alice_rx),
            vec![protocol::QUIT_TOKEN.to_string()]
        );
        assert_eq!(alice_rx.try_recv(), Err(TryRecvError::Disconnected));
        assert_eq!(drain(&mut bob_rx), vec![protocol::left_notice("alice")]);
        assert!(!server.users.contains_key(&alice));
        assert_registry_consistent(&server);
    }

    #[tokio::test]
    async fn test_die_flips_shutdown_flag() {
        let (mut server, shutdown_rx) = server();
        let (alice, _alice_rx) = connect(&mut server, "alice");

        dispatch(&mut server, alice, Command::Die);

        assert!(*shutdown_rx.borrow());
    }

    #[tokio::test]
    async fn test_register_ack_dropped_for_unknown_session() {
        let (mut server, _shutdown) = server();
        let (ack_tx, mut ack_rx) = oneshot::channel();

        server.handle_command(ServerCommand::Register {
            client_id: ClientId::new(),
            username: "ghost".to_string(),
            ack: ack_tx,
        });

        assert!(ack_rx.try_recv().is_err());
    }
}
