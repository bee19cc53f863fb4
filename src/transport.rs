//! The seam between the mailbox model and the wire
//!
//! Everything the model needs from a server goes through [`Transport`].
//! [`ImapTransport`](crate::ImapTransport) implements it over
//! async-imap; tests implement it in memory.

use crate::capability::{Capabilities, ThreadAlgorithm};
use crate::error::Result;
use crate::flag::Flag;
use crate::folder::FolderStatus;
use crate::message::MessageRecord;
use crate::sort::SortProgram;
use crate::thread::ThreadItem;
use std::collections::HashMap;

/// Status items requested for every folder.
pub const STATUS_ITEMS: &str = "(MESSAGES RECENT UIDNEXT UIDVALIDITY UNSEEN)";

/// Items fetched per message record.
pub const FETCH_ITEMS: &str = "(UID ENVELOPE RFC822.SIZE FLAGS INTERNALDATE)";

/// One entry of a LIST/LSUB response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderDescriptor {
    pub parts: Vec<String>,
    /// `None` for servers with a flat namespace.
    pub delimiter: Option<String>,
    pub no_select: bool,
    /// RFC 6154 attribute such as `\Sent`, if any.
    pub special_use: Option<String>,
}

impl FolderDescriptor {
    /// Split a raw mailbox name on its delimiter.
    #[must_use]
    pub fn from_name(name: &str, delimiter: Option<&str>) -> Self {
        let parts = match delimiter {
            Some(d) if !d.is_empty() => name.split(d).map(ToString::to_string).collect(),
            _ => vec![name.to_string()],
        };
        Self {
            parts,
            delimiter: delimiter.map(ToString::to_string),
            no_select: false,
            special_use: None,
        }
    }
}

/// How to ask the server for an ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingRequest<'a> {
    Search {
        expr: &'a str,
    },
    Sort {
        program: &'a SortProgram,
        charset: &'a str,
        expr: &'a str,
    },
    Thread {
        algorithm: ThreadAlgorithm,
        charset: &'a str,
        expr: &'a str,
    },
}

impl OrderingRequest<'_> {
    /// Command name, for logs.
    #[must_use]
    pub const fn command(&self) -> &'static str {
        match self {
            Self::Search { .. } => "SEARCH",
            Self::Sort { .. } => "SORT",
            Self::Thread { .. } => "THREAD",
        }
    }
}

/// A server's answer to an [`OrderingRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedOrdering {
    /// SEARCH or SORT: UIDs in order.
    Flat(Vec<u32>),
    /// THREAD: nested UIDs.
    Threaded(Vec<ThreadItem>),
}

/// Whether STORE adds or removes the named flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Add,
    Remove,
}

impl StoreMode {
    /// STORE data item name. The non-silent form, so the server echoes
    /// the resulting flags.
    #[must_use]
    pub const fn as_imap(self) -> &'static str {
        match self {
            Self::Add => "+FLAGS",
            Self::Remove => "-FLAGS",
        }
    }
}

/// A part of a message fetched as raw bytes, without MIME decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSection {
    /// The whole message source.
    Full,
    /// The top-level header block.
    Header,
}

impl RawSection {
    /// FETCH item for this section. `PEEK` leaves `\Seen` alone.
    #[must_use]
    pub const fn fetch_item(self) -> &'static str {
        match self {
            Self::Full => "BODY.PEEK[]",
            Self::Header => "BODY.PEEK[HEADER]",
        }
    }
}

/// Render flags as a parenthesized IMAP flag list.
#[must_use]
pub fn flag_list(flags: &[Flag]) -> String {
    let names: Vec<&str> = flags.iter().map(Flag::as_imap_str).collect();
    format!("({})", names.join(" "))
}

/// What a SELECT reports about the folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectResponse {
    pub flags: Vec<String>,
    /// Empty when the server sent no PERMANENTFLAGS.
    pub permanent_flags: Vec<String>,
    pub exists: u32,
    pub recent: Option<u32>,
    pub unseen: Option<u32>,
    pub uid_next: Option<u32>,
    pub uid_validity: Option<u32>,
}

/// Server operations the mailbox model consumes.
///
/// All methods take `&mut self`: one command is in flight at a time.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn capabilities(&mut self) -> Result<Capabilities>;

    /// LIST (or LSUB when `subscribed_only`) with `reference` and
    /// `pattern`.
    async fn list_folders(
        &mut self,
        reference: &str,
        pattern: &str,
        subscribed_only: bool,
    ) -> Result<Vec<FolderDescriptor>>;

    /// Run SEARCH, SORT or THREAD in the selected folder.
    async fn resolve_ordering(&mut self, request: OrderingRequest<'_>) -> Result<ResolvedOrdering>;

    /// Fetch [`FETCH_ITEMS`] for `uids` in one batch. UIDs the server
    /// does not know are absent from the map.
    async fn fetch_records(&mut self, uids: &[u32]) -> Result<HashMap<u32, MessageRecord>>;

    async fn select(&mut self, path: &str) -> Result<SelectResponse>;

    /// STATUS with [`STATUS_ITEMS`].
    async fn status(&mut self, path: &str) -> Result<FolderStatus>;

    /// Leave the selected folder: UNSELECT when `unselect` is true,
    /// CLOSE otherwise.
    async fn unselect_or_close(&mut self, unselect: bool) -> Result<()>;

    async fn expunge(&mut self) -> Result<()>;

    /// STORE `flags` on `uids` in the selected folder. Returns the
    /// flags each message carries afterwards, as the server echoed
    /// them; UIDs it did not echo are absent.
    async fn store_flags(
        &mut self,
        uids: &[u32],
        mode: StoreMode,
        flags: &[Flag],
    ) -> Result<HashMap<u32, Vec<Flag>>>;

    /// APPEND `message` to the folder at `path` with `flags` set.
    async fn append(&mut self, path: &str, flags: &[Flag], message: &[u8]) -> Result<()>;

    /// Raw bytes of one section of `uid` in the selected folder, or
    /// `None` if the server returned nothing for it.
    async fn fetch_raw(&mut self, uid: u32, section: RawSection) -> Result<Option<Vec<u8>>>;
}
