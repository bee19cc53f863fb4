//! Error types for imap-mailbox

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Response parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    /// The server answered the folder listing with nothing at all.
    #[error("No folders found")]
    NoFolderList,

    #[error("No such folder: {0}")]
    NoSuchFolder(String),

    #[error("Folder cannot be selected: {0}")]
    NotSelectable(String),

    #[error("No folder selected")]
    NoFolderSelected,

    #[error("Sort program error: {0}")]
    SortProg(String),

    #[error("Message {0} not found")]
    MessageNotFound(u32),

    /// The selected folder's PERMANENTFLAGS do not cover this flag.
    #[error("Flag cannot be stored permanently: {0}")]
    FlagNotPermanent(String),

    /// Client-side reconciliation was needed but is switched off.
    #[error("Not yet supported: {0}")]
    NotYetSupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;
