//! Connection and mailbox configuration

use crate::capability::Level;
use crate::error::{Error, Result};
use crate::paginator::{DEFAULT_PAGE_SIZE, PageSize};
use crate::sort::SortProgram;
use std::env;

/// IMAP connection configuration
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ImapConfig {
    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `127.0.0.1`)
    /// - `IMAP_PORT` (default: `1143`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or
    /// the port is not a number.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: env::var("IMAP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("IMAP_PORT")
                .unwrap_or_else(|_| "1143".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
            username: env::var("IMAP_USERNAME")
                .map_err(|_| Error::Config("IMAP_USERNAME not set".into()))?,
            password: env::var("IMAP_PASSWORD")
                .map_err(|_| Error::Config("IMAP_PASSWORD not set".into()))?,
        })
    }
}

/// How folders and message lists behave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxOptions {
    pub page_size: PageSize,
    pub sort: SortProgram,
    /// Server-side search expression, passed through untouched.
    pub search: String,
    pub display: Level,
    pub charset: String,
    /// Folders pinned to the top of their sibling list.
    pub special_folders: Vec<String>,
    /// Folders whose children are shown by the expanded walk.
    pub expand_folders: Vec<String>,
    /// Use LSUB instead of LIST.
    pub subscribed_only: bool,
    /// Sort/thread locally when the server cannot.
    pub client_fallback: bool,
}

impl Default for MailboxOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::new(DEFAULT_PAGE_SIZE),
            sort: SortProgram::default(),
            search: "ALL".to_string(),
            display: Level::Sorted,
            charset: "UTF-8".to_string(),
            special_folders: vec!["INBOX".to_string()],
            expand_folders: Vec::new(),
            subscribed_only: true,
            client_fallback: true,
        }
    }
}

impl MailboxOptions {
    /// Load mailbox options from environment variables
    ///
    /// All variables are optional:
    /// - `MAILBOX_PAGE_SIZE` (default: `50`, `0` disables paging)
    /// - `MAILBOX_SORT` (default: `-DATE`)
    /// - `MAILBOX_SEARCH` (default: `ALL`)
    /// - `MAILBOX_DISPLAY` (default: `sorted`)
    /// - `MAILBOX_CHARSET` (default: `UTF-8`)
    /// - `MAILBOX_SPECIAL_FOLDERS` (default: `INBOX`, comma separated)
    /// - `MAILBOX_EXPAND_FOLDERS` (default: none, comma separated)
    /// - `MAILBOX_SUBSCRIBED_ONLY` (default: `true`)
    /// - `MAILBOX_CLIENT_FALLBACK` (default: `true`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] or [`Error::SortProg`] for values that
    /// do not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build options from any key lookup.
    ///
    /// # Errors
    ///
    /// As [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            page_size: match lookup("MAILBOX_PAGE_SIZE") {
                Some(raw) => PageSize::new(
                    raw.trim()
                        .parse()
                        .map_err(|e| Error::Config(format!("Invalid MAILBOX_PAGE_SIZE: {e}")))?,
                ),
                None => defaults.page_size,
            },
            sort: match lookup("MAILBOX_SORT") {
                Some(raw) => raw.parse()?,
                None => defaults.sort,
            },
            search: lookup("MAILBOX_SEARCH")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.search),
            display: match lookup("MAILBOX_DISPLAY") {
                Some(raw) => raw.parse()?,
                None => defaults.display,
            },
            charset: lookup("MAILBOX_CHARSET").unwrap_or(defaults.charset),
            special_folders: lookup("MAILBOX_SPECIAL_FOLDERS")
                .map_or(defaults.special_folders, |raw| split_list(&raw)),
            expand_folders: lookup("MAILBOX_EXPAND_FOLDERS")
                .map_or(defaults.expand_folders, |raw| split_list(&raw)),
            subscribed_only: match lookup("MAILBOX_SUBSCRIBED_ONLY") {
                Some(raw) => parse_bool("MAILBOX_SUBSCRIBED_ONLY", &raw)?,
                None => defaults.subscribed_only,
            },
            client_fallback: match lookup("MAILBOX_CLIENT_FALLBACK") {
                Some(raw) => parse_bool("MAILBOX_CLIENT_FALLBACK", &raw)?,
                None => defaults.client_fallback,
            },
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("Invalid {key}: {other}"))),
    }
}
