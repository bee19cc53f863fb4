//! Header-level message data
//!
//! A [`MessageRecord`] is what a FETCH of `(UID ENVELOPE RFC822.SIZE
//! FLAGS INTERNALDATE)` returns for one message. Bodies are never
//! fetched here.

use crate::flag::Flag;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An envelope address (RFC 3501 section 7.4.2).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: Option<String>,
    pub mailbox: Option<String>,
    pub host: Option<String>,
}

impl Address {
    /// `mailbox@host`, if both halves are present.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(mailbox), Some(host)) => Some(format!("{mailbox}@{host}")),
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let email = self.email().unwrap_or_default();
        match &self.name {
            Some(name) if !name.is_empty() => write!(f, "{name} <{email}>"),
            _ => f.write_str(&email),
        }
    }
}

/// Structured header summary of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub date: Option<String>,
    pub subject: Option<String>,
    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub in_reply_to: Option<String>,
    pub message_id: Option<String>,
}

impl Envelope {
    /// The `Date:` header parsed as RFC 2822, if it parses.
    #[must_use]
    pub fn parsed_date(&self) -> Option<DateTime<FixedOffset>> {
        let raw = self.date.as_deref()?.trim();
        DateTime::parse_from_rfc2822(raw).ok()
    }
}

/// Header-level data for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub uid: u32,
    pub envelope: Envelope,
    pub size: u32,
    pub flags: Vec<Flag>,
    pub internal_date: Option<DateTime<FixedOffset>>,
}

impl MessageRecord {
    #[must_use]
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            envelope: Envelope::default(),
            size: 0,
            flags: Vec::new(),
            internal_date: None,
        }
    }

    #[must_use]
    pub fn has_flag(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    #[must_use]
    pub fn is_seen(&self) -> bool {
        self.has_flag(&Flag::Seen)
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.has_flag(&Flag::Deleted)
    }

    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.has_flag(&Flag::Answered)
    }

    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.has_flag(&Flag::Flagged)
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.has_flag(&Flag::Draft)
    }

    #[must_use]
    pub fn is_recent(&self) -> bool {
        self.has_flag(&Flag::Recent)
    }

    /// The date used for DATE ordering: the `Date:` header, falling
    /// back to the internal date when the header is missing or broken.
    #[must_use]
    pub fn sent_date(&self) -> Option<DateTime<FixedOffset>> {
        self.envelope.parsed_date().or(self.internal_date)
    }
}
