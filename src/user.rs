//! User record
//!
//! Represents one connected user: identity fields, session state, and the
//! handle for queueing lines to that user's connection.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::types::ClientId;

/// Role tag for a connected user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    User,
    Operator,
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::User => write!(f, "user"),
            UserType::Operator => write!(f, "operator"),
        }
    }
}

/// Whether the user's session is live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Online,
    Offline,
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserStatus::Online => write!(f, "Online"),
            UserStatus::Offline => write!(f, "Offline"),
        }
    }
}

/// Connected user information
///
/// Created when a connection is accepted, before the username handshake, so
/// `username` starts out as `None`. The `sender` is the actor's only way to
/// reach this user's socket; dropping the record closes the queue and with it
/// the session's write loop.
#[derive(Debug)]
pub struct User {
    /// Unique identifier for this session
    pub id: ClientId,
    /// Unique name claimed during the handshake (None until then)
    pub username: Option<String>,
    /// Display alias; mutable via /NICK, not unique
    pub nickname: String,
    /// Plaintext connection password, settable via /PASS
    pub password: String,
    /// Role tag
    pub user_type: UserType,
    /// Online/Offline marker
    pub status: UserStatus,
    /// Free-text real name
    pub realname: String,
    /// Queue of lines destined for this user's connection
    sender: mpsc::Sender<String>,
}

impl User {
    /// Create a new user with default fields and the given outbound queue
    pub fn new(id: ClientId, sender: mpsc::Sender<String>) -> Self {
        Self {
            id,
            username: None,
            nickname: random_nickname(),
            password: "@".to_string(),
            user_type: UserType::User,
            status: UserStatus::Offline,
            realname: "-".to_string(),
            sender,
        }
    }

    /// Queue one line for this user's connection without blocking
    ///
    /// Delivery is best-effort: a full queue (stalled consumer) or a closed
    /// queue (session gone) is reported so the caller can log and move on.
    pub fn send_line(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.sender.try_send(line.into()).map_err(|err| match err {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Set the username claimed by the handshake
    pub fn set_username(&mut self, username: String) {
        self.username = Some(username);
    }

    /// The username for display purposes; empty before the handshake finishes
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }
}

/// Generate the default nickname for a fresh connection
fn random_nickname() -> String {
    use rand::Rng;
    let suffix: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(4)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!("guest-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_defaults() {
        let (tx, _rx) = mpsc::channel(32);
        let user = User::new(ClientId::new(), tx);

        assert!(user.username.is_none());
        assert!(user.nickname.starts_with("guest-"));
        assert_eq!(user.password, "@");
        assert_eq!(user.user_type, UserType::User);
        assert_eq!(user.status, UserStatus::Offline);
        assert_eq!(user.realname, "-");
        assert_eq!(user.display_name(), "");
    }

    #[test]
    fn test_set_username() {
        let (tx, _rx) = mpsc::channel(32);
        let mut user = User::new(ClientId::new(), tx);

        user.set_username("alice".to_string());
        assert_eq!(user.display_name(), "alice");
    }

    #[tokio::test]
    async fn test_send_line_reaches_queue() {
        let (tx, mut rx) = mpsc::channel(32);
        let user = User::new(ClientId::new(), tx);

        user.send_line("hello").unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_send_line_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let user = User::new(ClientId::new(), tx);

        user.send_line("first").unwrap();
        assert!(matches!(user.send_line("second"), Err(SendError::Full)));
    }

    #[tokio::test]
    async fn test_send_line_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        let user = User::new(ClientId::new(), tx);

        drop(rx);
        assert!(matches!(user.send_line("late"), Err(SendError::Closed)));
    }

    #[test]
    fn test_status_and_type_render() {
        assert_eq!(UserStatus::Online.to_string(), "Online");
        assert_eq!(UserStatus::Offline.to_string(), "Offline");
        assert_eq!(UserType::User.to_string(), "user");
        assert_eq!(UserType::Operator.to_string(), "operator");
    }
}
