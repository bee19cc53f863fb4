//! Sort programs (RFC 5256)
//!
//! A sort program is an ordered list of criteria like `-DATE FROM`. It
//! is sent verbatim to servers that can SORT, and evaluated locally
//! against fetched envelopes when they cannot.

use crate::error::{Error, Result};
use crate::message::{Address, MessageRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    Arrival,
    Cc,
    Date,
    From,
    Size,
    Subject,
    To,
}

impl SortKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arrival => "ARRIVAL",
            Self::Cc => "CC",
            Self::Date => "DATE",
            Self::From => "FROM",
            Self::Size => "SIZE",
            Self::Subject => "SUBJECT",
            Self::To => "TO",
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ARRIVAL" => Ok(Self::Arrival),
            "CC" => Ok(Self::Cc),
            "DATE" => Ok(Self::Date),
            "FROM" => Ok(Self::From),
            "SIZE" => Ok(Self::Size),
            "SUBJECT" => Ok(Self::Subject),
            "TO" => Ok(Self::To),
            _ => Err(Error::SortProg(format!("unknown sort key '{s}'"))),
        }
    }
}

/// One key of a sort program, optionally reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortCriterion {
    pub key: SortKey,
    pub reverse: bool,
}

impl SortCriterion {
    fn compare(self, a: &MessageRecord, b: &MessageRecord) -> Ordering {
        let ordering = match self.key {
            SortKey::Arrival => a.internal_date.cmp(&b.internal_date),
            SortKey::Date => a.sent_date().cmp(&b.sent_date()),
            SortKey::Size => a.size.cmp(&b.size),
            SortKey::From => first_mailbox(&a.envelope.from).cmp(&first_mailbox(&b.envelope.from)),
            SortKey::To => first_mailbox(&a.envelope.to).cmp(&first_mailbox(&b.envelope.to)),
            SortKey::Cc => first_mailbox(&a.envelope.cc).cmp(&first_mailbox(&b.envelope.cc)),
            SortKey::Subject => base_subject(a.envelope.subject.as_deref().unwrap_or_default())
                .cmp(&base_subject(b.envelope.subject.as_deref().unwrap_or_default())),
        };
        if self.reverse {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reverse {
            f.write_str("-")?;
        }
        f.write_str(self.key.as_str())
    }
}

impl FromStr for SortCriterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (reverse, name) = s
            .strip_prefix('-')
            .map_or((false, s), |rest| (true, rest));
        Ok(Self {
            key: name.parse()?,
            reverse,
        })
    }
}

/// An ordered, non-empty list of sort criteria.
///
/// ```
/// use imap_mailbox::SortProgram;
///
/// let program: SortProgram = "-date from".parse().unwrap();
/// assert_eq!(program.to_string(), "-DATE FROM");
/// assert_eq!(program.to_imap(), "(REVERSE DATE FROM)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortProgram(Vec<SortCriterion>);

impl SortProgram {
    /// # Errors
    ///
    /// [`Error::SortProg`] if `criteria` is empty.
    pub fn new(criteria: Vec<SortCriterion>) -> Result<Self> {
        if criteria.is_empty() {
            return Err(Error::SortProg("empty sort program".to_string()));
        }
        Ok(Self(criteria))
    }

    #[must_use]
    pub fn criteria(&self) -> &[SortCriterion] {
        &self.0
    }

    /// The parenthesized form a UID SORT command takes.
    #[must_use]
    pub fn to_imap(&self) -> String {
        let keys: Vec<String> = self
            .0
            .iter()
            .map(|c| {
                if c.reverse {
                    format!("REVERSE {}", c.key.as_str())
                } else {
                    c.key.as_str().to_string()
                }
            })
            .collect();
        format!("({})", keys.join(" "))
    }

    /// Compare two records under this program.
    #[must_use]
    pub fn compare(&self, a: &MessageRecord, b: &MessageRecord) -> Ordering {
        self.0
            .iter()
            .map(|criterion| criterion.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Stable-sort `ids` in place using `records`. Ids without a record
    /// sort after every id that has one.
    pub fn sort_ids(&self, ids: &mut [u32], records: &HashMap<u32, MessageRecord>) {
        ids.sort_by(|a, b| match (records.get(a), records.get(b)) {
            (Some(ra), Some(rb)) => self.compare(ra, rb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
}

impl Default for SortProgram {
    fn default() -> Self {
        Self(vec![SortCriterion {
            key: SortKey::Date,
            reverse: true,
        }])
    }
}

impl fmt::Display for SortProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, criterion) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{criterion}")?;
        }
        Ok(())
    }
}

impl FromStr for SortProgram {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let criteria = s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<_>>>()?;
        Self::new(criteria)
    }
}

fn first_mailbox(addresses: &[Address]) -> String {
    addresses
        .first()
        .and_then(|a| a.mailbox.as_deref())
        .unwrap_or_default()
        .to_ascii_uppercase()
}

/// Reduce a subject to its RFC 5256 base subject: reply and forward
/// markers and bracketed blobs are removed, whitespace is collapsed,
/// and the result is upper-cased for comparison.
///
/// ```
/// use imap_mailbox::sort::base_subject;
///
/// assert_eq!(base_subject("Re: [list] Fwd:  Hello   world (fwd)"), "HELLO WORLD");
/// assert_eq!(base_subject("[Fwd: Lunch]"), "LUNCH");
/// ```
#[must_use]
pub fn base_subject(subject: &str) -> String {
    let mut s = subject.split_whitespace().collect::<Vec<_>>().join(" ");

    loop {
        let before = s.len();

        while s.to_ascii_lowercase().ends_with("(fwd)") {
            s.truncate(s.len() - "(fwd)".len());
            s.truncate(s.trim_end().len());
        }

        loop {
            let inner = strip_leader(&s);
            if inner.len() == s.len() {
                break;
            }
            s = inner.to_string();
        }

        if let Some(inner) = fwd_wrapper(&s) {
            s = inner.to_string();
        }

        if s.len() == before {
            break;
        }
    }

    s.to_uppercase()
}

/// Strip one leading `re:`/`fw:`/`fwd:` (optionally with a `[blob]`
/// before the colon) or one leading `[blob]` that does not swallow the
/// whole subject.
fn strip_leader(s: &str) -> &str {
    let lower = s.to_ascii_lowercase();
    for prefix in ["re", "fwd", "fw"] {
        if let Some(rest) = lower.strip_prefix(prefix) {
            let mut rest = rest.trim_start();
            if rest.starts_with('[')
                && let Some(end) = rest.find(']')
            {
                rest = rest[end + 1..].trim_start();
            }
            if let Some(after) = rest.strip_prefix(':') {
                let offset = s.len() - after.len();
                return s[offset..].trim_start();
            }
        }
    }
    if s.starts_with('[')
        && let Some(end) = s.find(']')
    {
        let rest = s[end + 1..].trim_start();
        if !rest.is_empty() {
            return rest;
        }
    }
    s
}

fn fwd_wrapper(s: &str) -> Option<&str> {
    let lower = s.to_ascii_lowercase();
    if lower.starts_with("[fwd:") && s.ends_with(']') {
        Some(s["[fwd:".len()..s.len() - 1].trim())
    } else {
        None
    }
}
