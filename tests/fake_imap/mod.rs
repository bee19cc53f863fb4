//! Fake IMAP server for integration testing
//!
//! This module provides an in-process IMAP server that speaks enough
//! of the protocol to drive `ImapTransport` end-to-end:
//!
//! TCP -> greeting -> STARTTLS -> TLS handshake -> LOGIN -> commands -> LOGOUT
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, TLS setup, and connection dispatch
//! - `handlers/` -- one file per IMAP command (LIST, SELECT, etc.)
//! - `account` -- test data model (folders, emails, builder)
//! - `io` -- shared write helpers

#![allow(dead_code)]

pub mod account;

pub use account::{AccountBuilder, TestEmail};
pub use server::FakeImapServer;
