//! Server capability negotiation
//!
//! IMAP servers advertise optional extensions as plain capability
//! strings. The message list only cares about three of them (SORT,
//! THREAD and the plain SEARCH every server has), which nest: a server
//! that threads can also sort, and a server that sorts can also search.
//! [`Level`] encodes that nesting as bit flags so that "can the server
//! satisfy this request on its own" is a single bitwise AND.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Capability names the negotiator looks at.
pub const INTERESTING: [&str; 5] = [
    "SORT",
    "THREAD=REFERENCES",
    "THREAD=ORDEREDSUBJECT",
    "UIDPLUS",
    "UNSELECT",
];

/// The set of capabilities a server advertised.
///
/// Names are stored upper-cased; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(BTreeSet<String>);

impl Capabilities {
    /// Whether the server advertised `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.0.contains(&name.to_ascii_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Capabilities {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|name| name.as_ref().to_ascii_uppercase())
                .collect(),
        )
    }
}

/// How much ordering work a message listing needs, or how much a
/// server can do.
///
/// Used both for the requested display mode and for the negotiated
/// server level.
///
/// ```
/// use imap_mailbox::Level;
///
/// assert!(Level::Threaded.satisfies(Level::Sorted));
/// assert!(!Level::Sorted.satisfies(Level::Threaded));
/// assert_eq!(Level::Sorted.bits() & Level::Threaded.bits(), Level::Sorted.bits());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Plain SEARCH, server order.
    Unsorted,
    /// SORT by the active sort program.
    Sorted,
    /// THREAD into conversations.
    Threaded,
}

impl Level {
    pub const UNSORTED: u8 = 0b001;
    pub const SORTED: u8 = 0b011;
    pub const THREADED: u8 = 0b111;

    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            Self::Unsorted => Self::UNSORTED,
            Self::Sorted => Self::SORTED,
            Self::Threaded => Self::THREADED,
        }
    }

    /// The part of `requested` a server at this level can do itself.
    #[must_use]
    pub const fn usable(self, requested: Self) -> u8 {
        self.bits() & requested.bits()
    }

    /// Whether a server at this level can satisfy `requested` without
    /// any client-side work.
    #[must_use]
    pub const fn satisfies(self, requested: Self) -> bool {
        self.usable(requested) == requested.bits()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsorted => "unsorted",
            Self::Sorted => "sorted",
            Self::Threaded => "threaded",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unsorted" | "search" => Ok(Self::Unsorted),
            "sorted" | "sort" => Ok(Self::Sorted),
            "threaded" | "thread" => Ok(Self::Threaded),
            other => Err(Error::Config(format!("Unknown display mode: {other}"))),
        }
    }
}

/// THREAD algorithm (RFC 5256).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadAlgorithm {
    References,
    OrderedSubject,
}

impl ThreadAlgorithm {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::References => "REFERENCES",
            Self::OrderedSubject => "ORDEREDSUBJECT",
        }
    }
}

impl fmt::Display for ThreadAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities boiled down to what the mailbox model acts on.
///
/// Computed once per session (or per explicit renegotiation) so that
/// nothing downstream re-queries capability strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Negotiated {
    pub level: Level,
    /// Present whenever `level` is [`Level::Threaded`].
    pub thread_algorithm: Option<ThreadAlgorithm>,
    /// UIDPLUS: UIDVALIDITY/UIDNEXT from SELECT are trusted.
    pub uidplus: bool,
    /// UNSELECT: a folder can be left without an implicit expunge.
    pub unselect: bool,
}

impl Negotiated {
    #[must_use]
    pub fn from_capabilities(caps: &Capabilities) -> Self {
        let thread_algorithm = if caps.has("THREAD=REFERENCES") {
            Some(ThreadAlgorithm::References)
        } else if caps.has("THREAD=ORDEREDSUBJECT") {
            Some(ThreadAlgorithm::OrderedSubject)
        } else {
            None
        };

        let level = if thread_algorithm.is_some() {
            Level::Threaded
        } else if caps.has("SORT") {
            Level::Sorted
        } else {
            Level::Unsorted
        };

        Self {
            level,
            thread_algorithm,
            uidplus: caps.has("UIDPLUS"),
            unselect: caps.has("UNSELECT"),
        }
    }
}

impl Default for Negotiated {
    fn default() -> Self {
        Self {
            level: Level::Unsorted,
            thread_algorithm: None,
            uidplus: false,
            unselect: false,
        }
    }
}
