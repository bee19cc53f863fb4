//! One logical mailbox session
//!
//! [`Mailbox`] ties a [`Transport`] to the negotiated capabilities, the
//! folder tree and one message list per folder. Every operation takes
//! `&mut self`, so callers serialize access by construction.

use crate::capability::{Capabilities, Negotiated};
use crate::config::MailboxOptions;
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::folder::{Folder, FolderStatus};
use crate::message::MessageRecord;
use crate::message_list::{MessageEntry, MessageList};
use crate::tree::FolderTree;
use crate::transport::{RawSection, StoreMode, Transport, flag_list};
use std::collections::HashMap;
use tracing::{debug, info};

pub struct Mailbox<T: Transport> {
    transport: T,
    options: MailboxOptions,
    capabilities: Capabilities,
    negotiated: Negotiated,
    tree: FolderTree,
    lists: HashMap<String, MessageList>,
}

impl<T: Transport> Mailbox<T> {
    /// Wrap an authenticated transport and negotiate capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the CAPABILITY query fails.
    pub async fn open(mut transport: T, options: MailboxOptions) -> Result<Self> {
        let capabilities = transport.capabilities().await?;
        let negotiated = Negotiated::from_capabilities(&capabilities);
        info!(
            "Negotiated level {} (thread: {:?}, uidplus: {}, unselect: {})",
            negotiated.level, negotiated.thread_algorithm, negotiated.uidplus, negotiated.unselect
        );

        let mut tree = FolderTree::new(options.subscribed_only);
        tree.set_properties(
            options.expand_folders.as_slice(),
            options.special_folders.as_slice(),
        );

        Ok(Self {
            transport,
            tree,
            options,
            capabilities,
            negotiated,
            lists: HashMap::new(),
        })
    }

    /// Query capabilities again, e.g. after the server upgraded the
    /// session. Message lists whose level changed are invalidated.
    ///
    /// # Errors
    ///
    /// Returns an error if the CAPABILITY query fails.
    pub async fn renegotiate(&mut self) -> Result<&Negotiated> {
        let capabilities = self.transport.capabilities().await?;
        self.negotiated = Negotiated::from_capabilities(&capabilities);
        self.capabilities = capabilities;
        for list in self.lists.values_mut() {
            list.set_negotiated(self.negotiated);
        }
        debug!("Renegotiated level {}", self.negotiated.level);
        Ok(&self.negotiated)
    }

    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[must_use]
    pub const fn negotiated(&self) -> &Negotiated {
        &self.negotiated
    }

    #[must_use]
    pub const fn options(&self) -> &MailboxOptions {
        &self.options
    }

    #[must_use]
    pub const fn tree(&self) -> &FolderTree {
        &self.tree
    }

    pub const fn tree_mut(&mut self) -> &mut FolderTree {
        &mut self.tree
    }

    /// Load the folder list (LSUB when `subscribed_only`, LIST
    /// otherwise), then apply the configured expand/special lists and
    /// sort.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderList`] if the server lists nothing, or any
    /// transport error. The tree is unchanged on failure.
    pub async fn refresh_folders(&mut self, subscribed_only: bool) -> Result<()> {
        let listing = self
            .transport
            .list_folders("", "*", subscribed_only)
            .await?;
        self.tree.load(listing, subscribed_only)?;
        self.tree.set_properties(
            self.options.expand_folders.as_slice(),
            self.options.special_folders.as_slice(),
        );
        self.tree.sort();
        self.lists.retain(|path, _| self.tree.contains(path));
        Ok(())
    }

    /// Folders in the expanded walk.
    pub fn folders(&self) -> impl Iterator<Item = &Folder> {
        self.tree.iter_expanded()
    }

    /// Every folder, depth-first.
    pub fn all_folders(&self) -> impl Iterator<Item = &Folder> {
        self.tree.iter_all()
    }

    /// # Errors
    ///
    /// [`Error::NoSuchFolder`] if the server does not list `path`.
    pub async fn folder(&mut self, path: &str) -> Result<&Folder> {
        self.tree.resolve(&mut self.transport, path).await
    }

    /// Select `path`. Selecting a different folder than the current one
    /// drops that folder's cached message list.
    ///
    /// # Errors
    ///
    /// [`Error::NotSelectable`], [`Error::NoSuchFolder`], or any
    /// transport error.
    pub async fn select(&mut self, path: &str) -> Result<&Folder> {
        let previous = self.tree.selected().map(ToString::to_string);
        let folder = self
            .tree
            .select(&mut self.transport, &self.negotiated, path)
            .await?;

        let selected = folder.path().to_string();
        if previous.as_deref() != Some(selected.as_str())
            && let Some(list) = self.lists.get_mut(&selected)
        {
            list.invalidate();
        }
        self.tree
            .get(&selected)
            .ok_or(Error::NoSuchFolder(selected))
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.tree.selected()
    }

    /// Leave the selected folder (UNSELECT, or CLOSE when the server
    /// lacks it).
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] or any transport error.
    pub async fn close(&mut self) -> Result<()> {
        let path = self
            .tree
            .close_selected(&mut self.transport, &self.negotiated)
            .await?;
        if !self.negotiated.unselect
            && let Some(list) = self.lists.get_mut(&path)
        {
            list.invalidate();
        }
        Ok(())
    }

    /// Cached status of `path`, loaded on first access.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchFolder`] or any transport error.
    pub async fn status(&mut self, path: &str) -> Result<FolderStatus> {
        self.tree.status(&mut self.transport, path).await
    }

    /// # Errors
    ///
    /// [`Error::NoSuchFolder`] or any transport error.
    pub async fn refresh_status(&mut self, path: &str) -> Result<FolderStatus> {
        self.tree
            .refresh_status(&mut self.transport, path)
            .await
            .cloned()
    }

    /// # Errors
    ///
    /// Stops at the first transport error.
    pub async fn refresh_all_status(&mut self) -> Result<()> {
        self.tree.refresh_all_status(&mut self.transport).await
    }

    /// Permanently remove `\Deleted` messages from the selected folder.
    /// Its message list and status are invalidated.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] or any transport error.
    pub async fn expunge(&mut self) -> Result<()> {
        let path = self
            .tree
            .selected()
            .map(ToString::to_string)
            .ok_or(Error::NoFolderSelected)?;
        self.transport.expunge().await?;
        if let Some(list) = self.lists.get_mut(&path) {
            list.invalidate();
        }
        if let Some(folder) = self.tree.get_mut(&path) {
            folder.invalidate_status();
        }
        info!("Expunged {path}");
        Ok(())
    }

    fn selected_path(&self) -> Result<String> {
        self.tree
            .selected()
            .map(ToString::to_string)
            .ok_or(Error::NoFolderSelected)
    }

    /// Message list of the selected folder, created with the configured
    /// defaults on first use.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] if nothing is selected.
    pub fn messages(&mut self) -> Result<&mut MessageList> {
        let path = self.selected_path()?;
        let negotiated = self.negotiated;
        let options = &self.options;
        Ok(self
            .lists
            .entry(path)
            .or_insert_with(|| MessageList::new(negotiated, options)))
    }

    /// Re-resolve the ordering of the selected folder. On failure the
    /// previous ordering stays in place.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] or any ordering error.
    pub async fn refresh_messages(&mut self) -> Result<()> {
        self.messages()?;
        let path = self.selected_path()?;
        let list = self.lists.get_mut(&path).ok_or(Error::NoFolderSelected)?;
        list.refresh_messages(&mut self.transport).await
    }

    /// Resolve the message count of the selected folder.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] or any ordering error.
    pub async fn number_messages(&mut self) -> Result<usize> {
        self.messages()?;
        let path = self.selected_path()?;
        let list = self.lists.get_mut(&path).ok_or(Error::NoFolderSelected)?;
        list.number_messages(&mut self.transport).await
    }

    /// Entries of the current page of the selected folder.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] or any error of
    /// [`MessageList::page`].
    pub async fn page(&mut self) -> Result<Vec<&MessageEntry>> {
        self.messages()?;
        let path = self.selected_path()?;
        let list = self.lists.get_mut(&path).ok_or(Error::NoFolderSelected)?;
        list.page(&mut self.transport).await
    }

    /// Fetch one message of the selected folder by UID.
    ///
    /// # Errors
    ///
    /// [`Error::MessageNotFound`], [`Error::NoFolderSelected`] or any
    /// transport error.
    pub async fn message(&mut self, uid: u32) -> Result<MessageRecord> {
        self.messages()?;
        let path = self.selected_path()?;
        let list = self.lists.get_mut(&path).ok_or(Error::NoFolderSelected)?;
        list.get_message(&mut self.transport, uid).await
    }

    /// Add `flags` to messages of the selected folder. Returns the
    /// flags each message carries afterwards.
    ///
    /// # Errors
    ///
    /// [`Error::FlagNotPermanent`] if the folder cannot keep one of
    /// `flags`, [`Error::NoFolderSelected`], or any transport error.
    pub async fn set_flags(&mut self, uids: &[u32], flags: &[Flag]) -> Result<HashMap<u32, Vec<Flag>>> {
        self.store_flags(uids, StoreMode::Add, flags).await
    }

    /// Remove `flags` from messages of the selected folder. Returns the
    /// flags each message carries afterwards.
    ///
    /// # Errors
    ///
    /// As [`set_flags`](Self::set_flags).
    pub async fn reset_flags(&mut self, uids: &[u32], flags: &[Flag]) -> Result<HashMap<u32, Vec<Flag>>> {
        self.store_flags(uids, StoreMode::Remove, flags).await
    }

    async fn store_flags(
        &mut self,
        uids: &[u32],
        mode: StoreMode,
        flags: &[Flag],
    ) -> Result<HashMap<u32, Vec<Flag>>> {
        let path = self.selected_path()?;
        if let Some(allowed) = self.tree.get(&path).and_then(Folder::flags)
            && let Some(refused) = flags.iter().find(|flag| !allowed.permanent_ok(flag))
        {
            return Err(Error::FlagNotPermanent(refused.to_string()));
        }

        let echoed = self.transport.store_flags(uids, mode, flags).await?;
        if let Some(list) = self.lists.get_mut(&path) {
            list.update_flags(&echoed);
        }
        if flags.contains(&Flag::Seen)
            && let Some(folder) = self.tree.get_mut(&path)
        {
            folder.invalidate_status();
        }
        info!(
            "{} {} on {} message(s) in {path}",
            mode.as_imap(),
            flag_list(flags),
            echoed.len()
        );
        Ok(echoed)
    }

    /// Append `message` to the folder at `path` with `flags` set. The
    /// folder's cached status and message list are dropped.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchFolder`], [`Error::NotSelectable`], or any
    /// transport error.
    pub async fn append(&mut self, path: &str, message: &[u8], flags: &[Flag]) -> Result<()> {
        let folder = self.tree.resolve(&mut self.transport, path).await?;
        if folder.no_select {
            return Err(Error::NotSelectable(folder.path().to_string()));
        }
        let path = folder.path().to_string();

        self.transport.append(&path, flags, message).await?;
        if let Some(folder) = self.tree.get_mut(&path) {
            folder.invalidate_status();
        }
        if let Some(list) = self.lists.get_mut(&path) {
            list.invalidate();
        }
        Ok(())
    }

    /// Raw source of one message of the selected folder, undecoded.
    ///
    /// # Errors
    ///
    /// [`Error::MessageNotFound`], [`Error::NoFolderSelected`] or any
    /// transport error.
    pub async fn source(&mut self, uid: u32) -> Result<Vec<u8>> {
        self.fetch_raw(uid, RawSection::Full).await
    }

    /// Raw header block of one message of the selected folder.
    ///
    /// # Errors
    ///
    /// As [`source`](Self::source).
    pub async fn header(&mut self, uid: u32) -> Result<Vec<u8>> {
        self.fetch_raw(uid, RawSection::Header).await
    }

    async fn fetch_raw(&mut self, uid: u32, section: RawSection) -> Result<Vec<u8>> {
        self.selected_path()?;
        self.transport
            .fetch_raw(uid, section)
            .await?
            .ok_or(Error::MessageNotFound(uid))
    }

    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give the transport back, e.g. to log out.
    pub fn into_transport(self) -> T {
        self.transport
    }
}
