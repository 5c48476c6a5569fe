//! Line protocol definitions
//!
//! Plain-text, newline-terminated protocol shared by server and client:
//! - `recipient <- body` is a directed message, anything else a broadcast
//! - delivered lines are rewritten as `sender: body`
//! - negotiation replies travel on the reserved `Server: hidden: <token>` channel
//! - a line whose trimmed content is `exit` closes the connection

/// Separates the recipient from the body of a directed message
pub const DIRECTED_DELIMITER: &str = "<-";

/// Sentinel line that closes a connection
pub const EXIT_SENTINEL: &str = "exit";

/// Sender name used for lines originating from the server itself
pub const SERVER_SENDER: &str = "Server";

/// Key of the channel carrying negotiation replies
pub const HIDDEN_CHANNEL: &str = "hidden";

/// Classified outbound line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Deliver to every registered session
    Broadcast(String),
    /// Deliver to exactly one named session
    Directed { recipient: String, body: String },
}

/// Negotiation reply token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Name accepted, session is active
    Accepted,
    /// Name held by another live session
    Taken,
    /// Name refused by validation
    Invalid,
}

impl Ack {
    pub fn token(self) -> &'static str {
        match self {
            Ack::Accepted => "ok",
            Ack::Taken => "exists",
            Ack::Invalid => "invalid",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ok" => Some(Ack::Accepted),
            "exists" => Some(Ack::Taken),
            "invalid" => Some(Ack::Invalid),
            _ => None,
        }
    }
}

/// Server → client line as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Handshake reply, never shown to the user
    Ack(Ack),
    /// Chat line to display
    Chat { sender: String, body: String },
}

/// Classify a line as broadcast or directed
///
/// A line is directed when it contains the delimiter with a non-empty
/// recipient before it. Recipient and body are trimmed.
pub fn classify(line: &str) -> Route {
    if let Some((recipient, body)) = line.split_once(DIRECTED_DELIMITER) {
        let recipient = recipient.trim();
        if !recipient.is_empty() {
            return Route::Directed {
                recipient: recipient.to_string(),
                body: body.trim().to_string(),
            };
        }
    }
    Route::Broadcast(line.trim().to_string())
}

/// Remove the `name:` tag a client puts in front of its own lines
///
/// Lines not tagged with `name` are returned unchanged.
pub fn strip_sender<'a>(line: &'a str, name: &str) -> &'a str {
    line.strip_prefix(name)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(str::trim_start)
        .unwrap_or(line)
}

/// Parse a server → client line
///
/// Returns `None` for lines without a `sender:` prefix and for hidden
/// lines carrying an unknown token. The hidden channel is only honored
/// when the sender is the server, so users cannot forge replies.
pub fn parse_inbound(line: &str) -> Option<Inbound> {
    let (sender, rest) = line.split_once(':')?;
    let sender = sender.trim();
    let rest = rest.trim();

    if sender == SERVER_SENDER {
        if let Some((key, value)) = rest.split_once(':') {
            if key.trim() == HIDDEN_CHANNEL {
                return Ack::from_token(value.trim()).map(Inbound::Ack);
            }
        }
    }

    Some(Inbound::Chat {
        sender: sender.to_string(),
        body: rest.to_string(),
    })
}

/// Format a line for delivery to a recipient
pub fn format_delivery(sender: &str, body: &str) -> String {
    format!("{}: {}", sender, body)
}

/// Negotiation reply line
pub fn ack_line(ack: Ack) -> String {
    format!("{}: {}: {}", SERVER_SENDER, HIDDEN_CHANNEL, ack.token())
}

/// Notice sent back to the origin of a directed message nobody could take
pub fn not_found_notice(recipient: &str) -> String {
    format_delivery(
        SERVER_SENDER,
        &format!("recipient '{}' is not connected", recipient),
    )
}

/// Check for the close sentinel
pub fn is_exit(line: &str) -> bool {
    line.trim() == EXIT_SENTINEL
}
