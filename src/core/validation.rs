//! Member input validation
//!
//! Every value a member types during a flow goes through one of these
//! functions. Errors display as the re-prompt the member should see, so a
//! flow can forward them verbatim.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::core::error::AppError;

/// Telegram username grammar: a letter followed by 4..=31 letters, digits or underscores.
static NICKNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{4,31}$").expect("nickname regex is valid"));

static MEETING_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}\.\d{2}\.\d{4}$").expect("meeting date regex is valid"));

/// Display/input format for meeting dates
pub const MEETING_DATE_FORMAT: &str = "%d.%m.%Y";

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Please enter a number.")]
    NotANumber,

    #[error("Please enter a number greater than 0.")]
    NotPositive,

    #[error("Please enter a number less than or equal to the total number of pages - {0}.")]
    PageAboveTotal(u32),

    #[error("Please enter a number between 0 and 100.")]
    PercentOutOfRange,

    #[error("Invalid date format. Please enter the date in format dd.mm.yyyy:")]
    InvalidDate,

    #[error("The date must be later than today. Please enter a valid later date in format dd.mm.yyyy:")]
    DateNotInFuture,

    #[error("Please enter a valid nickname.")]
    InvalidNickname,

    #[error("Please enter some text.")]
    Empty,
}

impl From<InputError> for AppError {
    fn from(err: InputError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Strips a leading `@` the way members usually paste handles
pub fn normalize_handle(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed)
}

/// Checks a Telegram nickname against the username grammar.
///
/// # Examples
/// ```
/// use bookclub::core::validation::is_valid_nickname;
///
/// assert!(is_valid_nickname("abcde"));
/// assert!(!is_valid_nickname("1abcde"));
/// ```
pub fn is_valid_nickname(nickname: &str) -> bool {
    NICKNAME_RE.is_match(nickname)
}

/// Validates a nickname typed by an admin and returns it without the `@`
pub fn parse_nickname(input: &str) -> Result<&str, InputError> {
    let nickname = normalize_handle(input);
    if is_valid_nickname(nickname) {
        Ok(nickname)
    } else {
        Err(InputError::InvalidNickname)
    }
}

/// Requires non-blank free text and returns it trimmed
pub fn parse_text(input: &str) -> Result<&str, InputError> {
    let text = input.trim();
    if text.is_empty() {
        Err(InputError::Empty)
    } else {
        Ok(text)
    }
}

fn parse_number(input: &str) -> Result<i64, InputError> {
    input.trim().parse::<i64>().map_err(|_| InputError::NotANumber)
}

/// Parses a book's total page count (> 0)
pub fn parse_total_pages(input: &str) -> Result<u32, InputError> {
    let pages = parse_number(input)?;
    if pages <= 0 {
        return Err(InputError::NotPositive);
    }
    u32::try_from(pages).map_err(|_| InputError::NotANumber)
}

/// Parses the page a member is on, in `(0, total_pages]`
pub fn parse_page(input: &str, total_pages: u32) -> Result<u32, InputError> {
    let page = parse_number(input)?;
    if page <= 0 {
        return Err(InputError::NotPositive);
    }
    if page > i64::from(total_pages) {
        return Err(InputError::PageAboveTotal(total_pages));
    }
    u32::try_from(page).map_err(|_| InputError::NotANumber)
}

/// Parses an audiobook listening percent in `[0, 100]`
pub fn parse_percent(input: &str) -> Result<u8, InputError> {
    let percent = parse_number(input)?;
    if !(0..=100).contains(&percent) {
        return Err(InputError::PercentOutOfRange);
    }
    u8::try_from(percent).map_err(|_| InputError::PercentOutOfRange)
}

/// Parses a `dd.mm.yyyy` meeting date that must be strictly after `today`.
///
/// # Arguments
/// * `input` - Text typed by the member
/// * `today` - Current calendar date
///
/// # Returns
/// * `Ok(NaiveDate)` - A real calendar date later than `today`
/// * `Err(InputError)` - Wrong shape, impossible date (e.g. 31.02) or not in the future
pub fn parse_meeting_date(input: &str, today: NaiveDate) -> Result<NaiveDate, InputError> {
    let input = input.trim();
    if !MEETING_DATE_RE.is_match(input) {
        return Err(InputError::InvalidDate);
    }
    let date = NaiveDate::parse_from_str(input, MEETING_DATE_FORMAT).map_err(|_| InputError::InvalidDate)?;
    if date <= today {
        return Err(InputError::DateNotInFuture);
    }
    Ok(date)
}

/// Formats a meeting date the way members type it
pub fn format_meeting_date(date: NaiveDate) -> String {
    date.format(MEETING_DATE_FORMAT).to_string()
}

/// Replaces typographic quotes that phone keyboards insert with ASCII ones
pub fn normalize_quotes(input: &str) -> String {
    input
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
}
