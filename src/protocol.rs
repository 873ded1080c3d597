//! Wire protocol: line grammar, control tokens, and static texts
//!
//! Everything on the wire is a UTF-8 line. A line whose first
//! whitespace-delimited token starts with `/` and matches a known keyword
//! (case-insensitively) is a command; a known keyword with a bad argument
//! shape is a usage error; everything else is routed as chat, including
//! unknown `/commands` (the help text advertises more keywords than the
//! server implements). Matching is strictly on the leading token, so a chat
//! line that merely contains a keyword never misfires.

/// Maximum accepted line length in bytes; longer input is a framing error
/// that ends the session.
pub const MAX_LINE_LEN: usize = 4096;

/// Sent to a client to acknowledge an orderly `/QUIT`.
pub const QUIT_TOKEN: &str = "/quit";

/// Sent to every client when the server shuts down.
pub const SQUIT_TOKEN: &str = "/squit";

/// Reply to `/PING`, nothing else attached.
pub const PONG_TOKEN: &str = "/pong";

/// First line written to every accepted connection.
pub const WELCOME_BANNER: &str = "\n> Welcome to our chat app!!!";

/// Username handshake prompt, re-sent until a usable name arrives.
pub const USERNAME_PROMPT: &str = "\n> Please enter the username you wish to use";

/// Handshake rejection for a name some connected user already holds.
pub const USERNAME_TAKEN: &str =
    "\n> The username provided already exists, please choose a different username";

/// Reply to a chat line from a user who has not joined any channel.
pub const NOT_IN_CHANNEL: &str = "\n> You are currently not in any channels:\n\n\
Use /list to see a list of available channels.\n\
Use /join [channel name] to join a channel.\n";

/// `/LIST` reply when no channel exists.
pub const NO_ROOMS: &str =
    "\n> No rooms available. Create your own by typing /join [channel_name]";

/// `/RULES` reply.
pub const RULES_TEXT: &str = "No rules";

pub const USAGE_JOIN: &str = "Error, input is incorrect: /join [channel_name]";
pub const USAGE_NICK: &str = "Error, input is incorrect: /nick [new nickname]";
pub const USAGE_PASS: &str =
    "Error, user undefined or input is incorrect: /pass [new password]";
pub const USAGE_TOPIC: &str =
    "Error, user undefined or input is incorrect: /topic [channel] [topic]";
pub const USAGE_MODE: &str = "Error, input is incorrect: /mode [mode] [channel]";
pub const USAGE_KILL: &str = "Error, input is incorrect: /kill [client name]";
pub const USAGE_ISON: &str = "Error, input is incorrect: /ison [client name]";

/// `/HELP` reply: the full advertised surface. Deliberately wider than the
/// implemented command set; unhandled keywords fall through to chat.
pub const HELP_TEXT: &str = "\n> The list of commands available are:\n\n\
    /HELP                                  - Show the instructions\n\
    /JOIN [channel_name] [password]        - To create or switch to a channel.\n\
    /QUIT                                  - Exits the program.\n\
    /LIST                                  - Lists all available channels.\n\n\
    /AWAY [message]                        - mode - send everything as a private message\n\
    /CONNECT [server] [port] [remote]      - connect to a remote server\n\
    /DIE                                   - shut down server\n\
    /INFO                                  - Returns information about the current server\n\
    /ISON [nicknames]                      - Queries the server to see if the clients in the space-separated list are currently on the network.\n\
    /KICK [channel] [client]               - Eject a client from the channel\n\
    /KILL [client]                         - forcibly remove client from server\n\
    /KNOCK [channel]                       - send an invite-request to a private channel\n\
    /MODE [mode] [channel]                 - Change the channel mode\n\
    /NICK [nickname]                       - change user nickname to [nickname]\n\
    /NOTICE [target user] [message]        - private message, no auto reply\n\
    /PART [channel]                        - user leaves specified channel\n\
    /OPER [username] [password]            - authenticates user as operator\n\
    /PASS [password]                       - set a connection password\n\
    /PING                                  - test the connection with server\n\
    /PONG                                  - reply to the PING command\n\
    /PRIVMSG [target] [message]            - private message to [target]\n\
    /RESTART                               - restart server\n\
    /RULES                                 - request server rules\n\
    /SETNAME                               - allows to re-set a real name\n\
    /SILENCE [nickname]                    - not implemented\n\
    /TIME                                  - returns server time\n\
    /TOPIC [channel] [topic]               - Change the channel topic\n\
    /USER [username] [hostname] [realname] - specify connection details at session start\n\
    /USERHOST [nickname]                   - returns info on specified user\n\
    /USERIP [nickname]                     - returns IP of [nickname]\n\
    /USERS                                 - return info on all of the users on the server\n\
    /VERSION                               - returns server info\n\
    /WALLOPS [message]                     - send message to all operators\n\
    /WHO [name]                            - return a list of users who match [name]\n\
    /WHOIS [nickname]                      - returns info on nickname masks\n";

/// Personal welcome once the handshake has claimed a username.
pub fn registered_welcome(username: &str) -> String {
    format!("\n> Welcome {username}, type /help for a list of helpful commands.\n")
}

/// Broadcast to a channel when a user joins it.
pub fn joined_notice(username: &str) -> String {
    format!("\n> {username} has joined the channel.")
}

/// Broadcast to the remaining members when a user leaves a channel.
pub fn left_notice(username: &str) -> String {
    format!("\n> {username} has left the channel.")
}

/// A parsed command with validated argument shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/JOIN <channel>`: create-or-switch; extra arguments (the advertised
    /// password) are accepted and ignored
    Join(String),
    /// `/LIST`
    List,
    /// `/NICK <name>`
    Nick(String),
    /// `/PASS <password>`
    Pass(String),
    /// `/TOPIC <channel> <text…>`
    Topic { channel: String, text: String },
    /// `/MODE <mode> <channel>`
    Mode { mode: String, channel: String },
    /// `/KILL <username>`
    Kill(String),
    /// `/ISON <nickname>`
    Ison(String),
    /// `/USERS`
    Users,
    /// `/PING`
    Ping,
    /// `/HELP`
    Help,
    /// `/INFO`
    Info,
    /// `/TIME`
    Time,
    /// `/VERSION`
    Version,
    /// `/RULES`
    Rules,
    /// `/QUIT`
    Quit,
    /// `/DIE`
    Die,
}

/// One client line, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A recognized command with a valid argument shape
    Command(Command),
    /// A recognized command with a bad argument shape; carries the usage reply
    Invalid(&'static str),
    /// Anything else, forwarded to the user's current channel
    Chat(String),
}

/// Interpret one line of client input
pub fn parse_line(line: &str) -> Input {
    let mut tokens = line.split_whitespace();
    let Some(first) = tokens.next() else {
        return Input::Chat(line.to_string());
    };
    let Some(keyword) = first.strip_prefix('/') else {
        return Input::Chat(line.to_string());
    };
    let args: Vec<&str> = tokens.collect();

    match keyword.to_ascii_lowercase().as_str() {
        "join" => match args.first() {
            Some(channel) => Input::Command(Command::Join((*channel).to_string())),
            None => Input::Invalid(USAGE_JOIN),
        },
        "nick" => match args.as_slice() {
            [name] => Input::Command(Command::Nick((*name).to_string())),
            _ => Input::Invalid(USAGE_NICK),
        },
        "pass" => match args.as_slice() {
            [password] => Input::Command(Command::Pass((*password).to_string())),
            _ => Input::Invalid(USAGE_PASS),
        },
        "topic" => match args.as_slice() {
            [channel, text @ ..] if !text.is_empty() => Input::Command(Command::Topic {
                channel: (*channel).to_string(),
                text: text.join(" "),
            }),
            _ => Input::Invalid(USAGE_TOPIC),
        },
        "mode" => match args.as_slice() {
            [mode, channel] => Input::Command(Command::Mode {
                mode: (*mode).to_string(),
                channel: (*channel).to_string(),
            }),
            _ => Input::Invalid(USAGE_MODE),
        },
        "kill" => match args.as_slice() {
            [username] => Input::Command(Command::Kill((*username).to_string())),
            _ => Input::Invalid(USAGE_KILL),
        },
        "ison" => match args.as_slice() {
            [nickname] => Input::Command(Command::Ison((*nickname).to_string())),
            _ => Input::Invalid(USAGE_ISON),
        },
        "list" => Input::Command(Command::List),
        "users" => Input::Command(Command::Users),
        "ping" => Input::Command(Command::Ping),
        "help" => Input::Command(Command::Help),
        "info" => Input::Command(Command::Info),
        "time" => Input::Command(Command::Time),
        "version" => Input::Command(Command::Version),
        "rules" => Input::Command(Command::Rules),
        "quit" => Input::Command(Command::Quit),
        "die" => Input::Command(Command::Die),
        _ => Input::Chat(line.to_string()),
    }
}
