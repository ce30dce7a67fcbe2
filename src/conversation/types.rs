//! Transport-neutral inbound events and outbound replies

/// A slash command split into name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Command name without `/` and without a `@botname` suffix
    pub name: String,
    /// Everything after the command name, trimmed
    pub args: String,
}

impl ParsedCommand {
    /// Parses `/name[@bot] [args]`. Returns `None` for plain text.
    ///
    /// # Example
    /// ```
    /// use bookclub::conversation::ParsedCommand;
    ///
    /// let cmd = ParsedCommand::parse("/removeBook@club_bot 7").unwrap();
    /// assert_eq!(cmd.name, "removeBook");
    /// assert_eq!(cmd.args, "7");
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;
        let (head, args) = match rest.split_once(char::is_whitespace) {
            Some((head, args)) => (head, args.trim()),
            None => (rest, ""),
        };
        let name = head.split('@').next().unwrap_or_default();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            args: args.to_string(),
        })
    }
}

/// One message from a member, as the router sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Telegram username without `@`
    pub sender_handle: String,
    pub text: String,
    pub command: Option<ParsedCommand>,
}

impl InboundEvent {
    pub fn new(sender_handle: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let command = ParsedCommand::parse(&text);
        Self {
            sender_handle: sender_handle.into(),
            text,
            command,
        }
    }
}

/// Reply keyboard attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub rows: Vec<Vec<String>>,
    /// Hide the keyboard after the member taps a button
    pub one_time: bool,
}

/// The single reply produced for an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<ReplyKeyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}
