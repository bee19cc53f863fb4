//! IMAP message flags
//!
//! [`Flag`] is a single message flag. [`Flags`] is what a folder
//! reports on SELECT: the flags valid in it and the subset a client may
//! store permanently.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An IMAP message flag.
///
/// System flags (prefixed with `\` in the IMAP protocol) have
/// dedicated variants. User-defined keyword flags use [`Flag::Keyword`].
///
/// # Examples
///
/// ```
/// use imap_mailbox::Flag;
///
/// assert_eq!(Flag::parse("\\seen"), Flag::Seen);
/// assert_eq!(Flag::Seen.as_imap_str(), "\\Seen");
///
/// let kw = Flag::parse("$Important");
/// assert_eq!(kw, Flag::Keyword("$Important".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    /// Session-only flag; never settable by a client.
    Recent,
    /// A user-defined keyword flag (no `\` prefix).
    Keyword(String),
}

impl Flag {
    /// Parse a flag as it appears on the wire. System flag names are
    /// case-insensitive.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\SEEN" => Self::Seen,
            "\\ANSWERED" => Self::Answered,
            "\\FLAGGED" => Self::Flagged,
            "\\DELETED" => Self::Deleted,
            "\\DRAFT" => Self::Draft,
            "\\RECENT" => Self::Recent,
            _ => Self::Keyword(s.to_string()),
        }
    }

    /// The IMAP wire representation of this flag.
    #[must_use]
    pub fn as_imap_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Recent => "\\Recent",
            Self::Keyword(kw) => kw,
        }
    }

    #[must_use]
    pub const fn is_keyword(&self) -> bool {
        matches!(self, Self::Keyword(_))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

/// The `\*` marker in PERMANENTFLAGS.
pub const ANY_KEYWORD: &str = "\\*";

/// Flags a folder reported on selection.
///
/// Replaced wholesale every time the folder is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags {
    valid: Vec<Flag>,
    permanent: Vec<Flag>,
    /// PERMANENTFLAGS carried `\*`: new keywords can be stored too.
    any_keyword: bool,
}

impl Flags {
    /// Build from the raw FLAGS and PERMANENTFLAGS lists.
    pub fn new<V, P, S, T>(valid: V, permanent: P) -> Self
    where
        V: IntoIterator<Item = S>,
        P: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut any_keyword = false;
        let permanent = permanent
            .into_iter()
            .filter_map(|raw| {
                if raw.as_ref() == ANY_KEYWORD {
                    any_keyword = true;
                    None
                } else {
                    Some(Flag::parse(raw.as_ref()))
                }
            })
            .collect();

        Self {
            valid: valid.into_iter().map(|raw| Flag::parse(raw.as_ref())).collect(),
            permanent,
            any_keyword,
        }
    }

    /// Whether `flag` can be changed permanently (the session must
    /// also be read-write).
    #[must_use]
    pub fn permanent_ok(&self, flag: &Flag) -> bool {
        if *flag == Flag::Recent {
            return false;
        }
        self.any_keyword || self.permanent.contains(flag)
    }

    /// Whether `flag` is applicable in this folder at all.
    #[must_use]
    pub fn flag_ok(&self, flag: &Flag) -> bool {
        self.valid.contains(flag)
    }

    /// Valid flags that are keywords rather than system flags.
    pub fn keywords(&self) -> impl Iterator<Item = &Flag> {
        self.valid.iter().filter(|flag| flag.is_keyword())
    }

    #[must_use]
    pub fn valid(&self) -> &[Flag] {
        &self.valid
    }

    #[must_use]
    pub fn permanent(&self) -> &[Flag] {
        &self.permanent
    }

    #[must_use]
    pub const fn any_keyword(&self) -> bool {
        self.any_keyword
    }
}
