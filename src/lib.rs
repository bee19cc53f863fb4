//! Navigable IMAP mailbox model
//!
//! Turns raw server answers into a folder hierarchy, a
//! capability-aware message listing and page arithmetic over it:
//!
//! - [`FolderTree`] builds a tree from flat LIST/LSUB paths,
//!   synthesizing missing parents and ordering siblings.
//! - [`MessageList`] resolves SEARCH, SORT or THREAD orderings
//!   depending on what the server can do, finishing the job locally
//!   when it cannot, and fetches header records one page at a time.
//! - [`Paginator`] maps the ordering to pages.
//!
//! Everything talks to the server through the [`Transport`] trait.
//! [`ImapTransport`] implements it over async-imap with STARTTLS;
//! [`Mailbox`] ties one transport to a tree and its message lists.
#![allow(clippy::future_not_send)]

pub mod capability;
mod config;
mod error;
mod flag;
mod folder;
mod imap;
mod message;
mod message_list;
mod paginator;
mod session;
pub mod sort;
pub mod thread;
mod transport;
mod tree;

pub use capability::{Capabilities, Level, Negotiated, ThreadAlgorithm};
pub use config::{ImapConfig, MailboxOptions};
pub use error::{Error, Result};
pub use flag::{ANY_KEYWORD, Flag, Flags};
pub use folder::{Folder, FolderStatus, SpecialUse};
pub use imap::{ImapSession, ImapTransport};
pub use message::{Address, Envelope, MessageRecord};
pub use message_list::{MessageEntry, MessageList, MessageOrdering};
pub use paginator::{DEFAULT_PAGE_SIZE, PageSize, Paginator};
pub use session::Mailbox;
pub use sort::{SortCriterion, SortKey, SortProgram};
pub use thread::{ThreadItem, ThreadPosition};
pub use transport::{
    FETCH_ITEMS, FolderDescriptor, OrderingRequest, RawSection, ResolvedOrdering, STATUS_ITEMS,
    SelectResponse, StoreMode, Transport, flag_list,
};
pub use tree::{FolderTree, Walk};
