//! Message protocol definitions
//!
//! Plain-text, CRLF-terminated protocol. Inbound lines are parsed into a
//! [`Command`]; outbound traffic is either a routed [`Message`] or one of the
//! fixed server texts (banner, prompt, registration errors).

use std::fmt;

use crate::types::{Handle, ALL, SYSTEM};

/// Prefix that marks a line as a command
pub const COMMAND_MARKER: char = '\\';

/// Directed message prefix: `\to:<handle> <text>`
pub const DIRECT_PREFIX: &str = "\\to:";

/// Graceful departure command
pub const QUIT_COMMAND: &str = "\\quit";

/// Registration prompt
pub const USERNAME_PROMPT: &str = "Please, enter your username\r\n";

/// Sender of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The server itself
    System,
    /// A registered user
    User(Handle),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::System => f.write_str(SYSTEM),
            Origin::User(handle) => write!(f, "{}", handle),
        }
    }
}

/// Destination of a message
///
/// `User` carries the raw name typed by the sender; it may not be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every registered session, the sender included
    All,
    /// A single handle
    User(String),
}

impl Target {
    /// Map a typed recipient name onto a target (`all` is the broadcast address)
    pub fn parse(name: &str) -> Self {
        if name == ALL {
            Target::All
        } else {
            Target::User(name.to_string())
        }
    }
}

impl From<&Handle> for Target {
    fn from(handle: &Handle) -> Self {
        Target::User(handle.as_str().to_string())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str(ALL),
            Target::User(name) => f.write_str(name),
        }
    }
}

/// A routed chat message
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    origin: Origin,
    target: Target,
    body: String,
}

impl Message {
    pub fn new(origin: Origin, target: Target, body: impl Into<String>) -> Self {
        Self {
            origin,
            target,
            body: body.into(),
        }
    }

    /// Broadcast from a user
    pub fn broadcast(from: &Handle, body: impl Into<String>) -> Self {
        Self::new(Origin::User(from.clone()), Target::All, body)
    }

    /// `system` → `all` announcement
    pub fn announcement(body: impl Into<String>) -> Self {
        Self::new(Origin::System, Target::All, body)
    }

    /// `system` → one handle
    pub fn system_to(handle: &Handle, body: impl Into<String>) -> Self {
        Self::new(Origin::System, Target::from(handle), body)
    }

    pub fn entered(handle: &Handle) -> Self {
        Self::announcement(format!("{} entered chat", handle))
    }

    pub fn greeting(handle: &Handle) -> Self {
        Self::system_to(
            handle,
            format!("Hello, {}. You can start chatting now.", handle),
        )
    }

    pub fn departed(handle: &Handle) -> Self {
        Self::announcement(format!("User {} has left the chat", handle))
    }

    pub fn no_such_user(to: &Handle, missing: &str) -> Self {
        Self::system_to(to, format!("Error: no such user as {}", missing))
    }

    pub fn unknown_command(to: &Handle) -> Self {
        Self::system_to(to, "Unknown command")
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Wire rendering: `from: <sender>, to: <target>\r\n<body>\r\n`
    pub fn render(&self) -> String {
        format!("from: {}, to: {}\r\n{}\r\n", self.origin, self.target, self.body)
    }
}

/// Parsed inbound line from an active session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text, broadcast to everyone
    Say(String),
    /// `\to:<target> <body>`
    Direct { target: Target, body: String },
    /// Any line starting with `\quit`
    Quit,
    /// Any other marker-prefixed line
    Unknown(String),
    /// Nothing left after cleaning the line
    Empty,
}

impl Command {
    /// Parse one cleaned line
    pub fn parse(line: &str) -> Self {
        if line.is_empty() {
            return Command::Empty;
        }
        if !line.starts_with(COMMAND_MARKER) {
            return Command::Say(line.to_string());
        }
        if let Some(rest) = line.strip_prefix(DIRECT_PREFIX) {
            let (target, body) = rest.split_once(' ').unwrap_or((rest, ""));
            return Command::Direct {
                target: Target::parse(target),
                body: body.to_string(),
            };
        }
        if line.starts_with(QUIT_COMMAND) {
            return Command::Quit;
        }
        Command::Unknown(line.to_string())
    }
}

/// Banner sent right after a connection is accepted
///
/// Reports the current session count and the online handles.
pub fn welcome_banner(online: &[Handle]) -> String {
    let listing = if online.is_empty() {
        String::new()
    } else {
        let names: Vec<&str> = online.iter().map(Handle::as_str).collect();
        format!(": {}", names.join(", "))
    };
    format!(
        "Welcome to chat.\r\n\
         Just enter text to send public message.\r\n\
         Commands (without quotes):\r\n\
         '\\to:<user> <message>' to send privately <message> to <user>.\r\n\
         '\\quit' to leave chat and break connection.\r\n\
         Currently there are {} user(s) in the chat{}.\r\n",
        online.len(),
        listing
    )
}

/// Registration error line shown before re-prompting
pub fn registration_error(reason: &str) -> String {
    format!("Error: {}\r\n", reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> Handle {
        Handle::parse(name).unwrap()
    }

    #[test]
    fn test_render_broadcast() {
        let msg = Message::broadcast(&handle("alice"), "hello");
        assert_eq!(msg.render(), "from: alice, to: all\r\nhello\r\n");
    }

    #[test]
    fn test_render_system_reply() {
        let msg = Message::no_such_user(&handle("alice"), "carol");
        assert_eq!(
            msg.render(),
            "from: system, to: alice\r\nError: no such user as carol\r\n"
        );
    }

    #[test]
    fn test_parse_plain_text() {
        assert_eq!(Command::parse("hello there"), Command::Say("hello there".into()));
    }

    #[test]
    fn test_parse_direct() {
        assert_eq!(
            Command::parse("\\to:bob hi there"),
            Command::Direct {
                target: Target::User("bob".into()),
                body: "hi there".into(),
            }
        );
    }

    #[test]
    fn test_parse_direct_without_body() {
        assert_eq!(
            Command::parse("\\to:bob"),
            Command::Direct {
                target: Target::User("bob".into()),
                body: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_direct_to_all_is_broadcast() {
        assert_eq!(
            Command::parse("\\to:all hey"),
            Command::Direct {
                target: Target::All,
                body: "hey".into(),
            }
        );
    }

    #[test]
    fn test_parse_quit_and_unknown() {
        assert_eq!(Command::parse("\\quit"), Command::Quit);
        assert_eq!(Command::parse("\\quit now"), Command::Quit);
        assert_eq!(Command::parse("\\quitx"), Command::Quit);
        assert_eq!(Command::parse("\\qui"), Command::Unknown("\\qui".into()));
        assert_eq!(Command::parse("\\help"), Command::Unknown("\\help".into()));
        assert_eq!(Command::parse(""), Command::Empty);
    }

    #[test]
    fn test_banner_lists_online_users() {
        let banner = welcome_banner(&[handle("alice"), handle("bob")]);
        assert!(banner.ends_with("Currently there are 2 user(s) in the chat: alice, bob.\r\n"));

        let empty = welcome_banner(&[]);
        assert!(empty.ends_with("Currently there are 0 user(s) in the chat.\r\n"));
    }
}
