//! Bot initialization and the command menu

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Commands shown in the Telegram command menu.
///
/// Parsing happens in the conversation core; this enum only feeds the menu
/// and must stay in sync with `ClubCommand`.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "camelCase", description = "Book club commands:")]
pub enum Command {
    #[command(description = "show the list of commands")]
    Help,
    #[command(description = "update your reading progress")]
    SetProgress,
    #[command(description = "show the book the club is reading")]
    GetCurrentBook,
    #[command(description = "show everyone's progress")]
    GetGroupProgress,
    #[command(description = "list all books")]
    GetBookList,
    #[command(description = "list club members")]
    GetUserList,
    #[command(description = "add a new current book (admins only)")]
    AddBook,
    #[command(description = "change the meeting date (admins only)")]
    SetMeetingDate,
    #[command(description = "remove a book by id (admins only)")]
    RemoveBook,
    #[command(description = "add a member (admins only)")]
    AddUser,
    #[command(description = "remove a member (admins only)")]
    RemoveUser,
    #[command(description = "abandon the current step")]
    Cancel,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token, invalid BOT_API_URL or HTTP client failure
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN is not set");
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    match config::BOT_API_URL.as_deref() {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

/// Publishes the command menu in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}
