//! Folder nodes
//!
//! A [`Folder`] is one node of the [`FolderTree`](crate::FolderTree):
//! its path, tree attributes, cached status and the flags captured at
//! the last selection. Nodes never own each other; children are listed
//! by path.

use crate::capability::Negotiated;
use crate::error::{Error, Result};
use crate::flag::{ANY_KEYWORD, Flags};
use crate::transport::SelectResponse;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-folder counters from STATUS or SELECT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderStatus {
    pub messages: Option<u32>,
    pub recent: Option<u32>,
    pub uid_next: Option<u32>,
    pub uid_validity: Option<u32>,
    pub unseen: Option<u32>,
}

impl FolderStatus {
    /// True when nothing at all is known.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.messages.is_none()
            && self.recent.is_none()
            && self.uid_next.is_none()
            && self.uid_validity.is_none()
            && self.unseen.is_none()
    }
}

/// RFC 6154 special-use role of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialUse {
    All,
    Archive,
    Drafts,
    Flagged,
    Junk,
    Sent,
    Trash,
}

impl SpecialUse {
    /// Recognize a LIST attribute. Accepts `\Sent`, `Sent` or any text
    /// ending in the attribute name.
    #[must_use]
    pub fn from_attribute(raw: &str) -> Option<Self> {
        let trimmed = raw.trim_end_matches(|c: char| !c.is_ascii_alphabetic());
        let start = trimmed
            .rfind(|c: char| !c.is_ascii_alphabetic())
            .map_or(0, |i| i + 1);
        match trimmed[start..].to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "archive" => Some(Self::Archive),
            "drafts" => Some(Self::Drafts),
            "flagged" => Some(Self::Flagged),
            "junk" => Some(Self::Junk),
            "sent" => Some(Self::Sent),
            "trash" => Some(Self::Trash),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "\\All",
            Self::Archive => "\\Archive",
            Self::Drafts => "\\Drafts",
            Self::Flagged => "\\Flagged",
            Self::Junk => "\\Junk",
            Self::Sent => "\\Sent",
            Self::Trash => "\\Trash",
        }
    }
}

impl fmt::Display for SpecialUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    parts: Vec<String>,
    delimiter: Option<String>,
    path: String,
    pub subscribed: bool,
    pub no_select: bool,
    /// Sorted before non-special siblings.
    pub special: bool,
    pub expanded: bool,
    pub special_use: Option<SpecialUse>,
    pub(crate) status: Option<FolderStatus>,
    pub(crate) flags: Option<Flags>,
    #[serde(skip)]
    pub(crate) children: Vec<String>,
}

impl Folder {
    #[must_use]
    pub fn new(parts: Vec<String>, delimiter: Option<String>) -> Self {
        let path = join(&parts, delimiter.as_deref());
        Self {
            parts,
            delimiter,
            path,
            subscribed: true,
            no_select: false,
            special: false,
            expanded: false,
            special_use: None,
            status: None,
            flags: None,
            children: Vec::new(),
        }
    }

    /// Canonical path, as the server names it.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    #[must_use]
    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    /// Last path component, still in modified UTF-7.
    #[must_use]
    pub fn name(&self) -> &str {
        self.parts.last().map_or("", String::as_str)
    }

    /// Depth in the tree; roots are level 0.
    #[must_use]
    pub fn level(&self) -> usize {
        self.parts.len().saturating_sub(1)
    }

    #[must_use]
    pub fn parent_path(&self) -> Option<String> {
        (self.parts.len() > 1)
            .then(|| join(&self.parts[..self.parts.len() - 1], self.delimiter.as_deref()))
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Paths of the immediate children, in display order.
    #[must_use]
    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// Human-readable name: the last component decoded from IMAP
    /// modified UTF-7 (RFC 3501 section 5.1.3).
    #[must_use]
    pub fn display_name(&self) -> String {
        utf7_imap::decode_utf7_imap(self.name().to_string())
    }

    /// The path encoded for use in a URL.
    #[must_use]
    pub fn url_token(&self) -> String {
        URL_SAFE.encode(self.path.as_bytes())
    }

    /// Decode a token made by [`url_token`](Self::url_token).
    ///
    /// # Errors
    ///
    /// [`Error::Parse`] if the token is not valid base64 or not UTF-8.
    pub fn path_from_url_token(token: &str) -> Result<String> {
        let bytes = URL_SAFE
            .decode(token)
            .map_err(|e| Error::Parse(format!("Invalid folder token: {e}")))?;
        String::from_utf8(bytes).map_err(|e| Error::Parse(format!("Invalid folder token: {e}")))
    }

    /// Cached status, if any has been loaded.
    #[must_use]
    pub const fn cached_status(&self) -> Option<&FolderStatus> {
        self.status.as_ref()
    }

    /// Flags captured at the last selection.
    #[must_use]
    pub const fn flags(&self) -> Option<&Flags> {
        self.flags.as_ref()
    }

    /// Drop the cached status so the next read goes to the server.
    pub fn invalidate_status(&mut self) {
        self.status = None;
    }

    /// Supersede the cache with what a SELECT reported.
    pub(crate) fn apply_select(&mut self, response: &SelectResponse, negotiated: &Negotiated) {
        let permanent: Vec<&str> = if response.permanent_flags.is_empty() {
            vec![ANY_KEYWORD]
        } else {
            response.permanent_flags.iter().map(String::as_str).collect()
        };
        self.flags = Some(Flags::new(&response.flags, permanent));

        let mut status = self.status.take().unwrap_or_default();
        status.messages = Some(response.exists);
        status.recent = Some(response.recent.unwrap_or(0));
        status.unseen = Some(response.unseen.unwrap_or(0));
        if negotiated.uidplus {
            status.uid_next = Some(response.uid_next.unwrap_or(0));
            status.uid_validity = Some(response.uid_validity.unwrap_or(0));
        }
        self.status = Some(status);
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

pub(crate) fn join<S: AsRef<str>>(parts: &[S], delimiter: Option<&str>) -> String {
    let parts: Vec<&str> = parts.iter().map(AsRef::as_ref).collect();
    parts.join(delimiter.unwrap_or_default())
}
