//! Folder hierarchy
//!
//! Servers list folders as flat, delimiter-joined paths. [`FolderTree`]
//! owns one [`Folder`] per path, links each to its parent by path, and
//! synthesizes parents the server never listed (`INBOX.A.B` alone still
//! yields `INBOX` and `INBOX.A`, both non-selectable).

use crate::capability::Negotiated;
use crate::error::{Error, Result};
use crate::folder::{Folder, FolderStatus, SpecialUse, join};
use crate::transport::{FolderDescriptor, Transport};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// All folders of one account, indexed by canonical path.
#[derive(Debug, Clone, Default)]
pub struct FolderTree {
    delimiter: Option<String>,
    folders: HashMap<String, Folder>,
    roots: Vec<String>,
    selected: Option<String>,
    subscribed_only: bool,
    /// Paths from the last [`set_properties`](Self::set_properties).
    expand: Vec<String>,
    special: Vec<String>,
}

impl FolderTree {
    #[must_use]
    pub fn new(subscribed_only: bool) -> Self {
        Self {
            subscribed_only,
            ..Self::default()
        }
    }

    /// Replace the tree with a fresh listing.
    ///
    /// Cached status, flags and the expanded marker survive for paths
    /// that are still listed; so does the selection.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderList`] if `listing` is empty. The tree is left
    /// as it was.
    pub fn load(&mut self, listing: Vec<FolderDescriptor>, subscribed: bool) -> Result<()> {
        let Some(first) = listing.first() else {
            return Err(Error::NoFolderList);
        };

        let mut tree = Self {
            delimiter: first.delimiter.clone(),
            subscribed_only: self.subscribed_only,
            expand: std::mem::take(&mut self.expand),
            special: std::mem::take(&mut self.special),
            ..Self::default()
        };
        for descriptor in listing {
            tree.add_folder(descriptor, subscribed);
        }

        for (path, folder) in &mut tree.folders {
            if let Some(old) = self.folders.remove(path) {
                folder.status = old.status;
                folder.flags = old.flags;
                folder.expanded = old.expanded;
            }
        }
        tree.selected = self
            .selected
            .take()
            .filter(|path| tree.folders.contains_key(path));

        info!("Loaded {} folders", tree.folders.len());
        *self = tree;
        Ok(())
    }

    /// Add one listed folder, synthesizing missing parents. Returns its
    /// canonical path.
    pub fn add_folder(&mut self, descriptor: FolderDescriptor, subscribed: bool) -> String {
        let delimiter = descriptor.delimiter.or_else(|| self.delimiter.clone());
        let path = join(&descriptor.parts, delimiter.as_deref());
        let special_use = descriptor
            .special_use
            .as_deref()
            .and_then(SpecialUse::from_attribute);

        if let Some(existing) = self.folders.get_mut(&path) {
            existing.no_select = descriptor.no_select;
            existing.subscribed = subscribed;
            existing.special_use = special_use.or(existing.special_use);
        } else {
            let mut folder = Folder::new(descriptor.parts, delimiter);
            folder.no_select = descriptor.no_select;
            folder.subscribed = subscribed;
            folder.special_use = special_use;
            self.insert(folder);
        }
        path
    }

    fn insert(&mut self, folder: Folder) {
        let parts = folder.parts().to_vec();
        let delimiter = folder.delimiter().map(ToString::to_string);
        let mut child = folder.path().to_string();
        self.folders.insert(child.clone(), folder);

        for depth in (1..parts.len()).rev() {
            let parent = join(&parts[..depth], delimiter.as_deref());
            let existed = self.folders.contains_key(&parent);
            let node = self.folders.entry(parent.clone()).or_insert_with(|| {
                debug!("Synthesizing folder {}", join(&parts[..depth], delimiter.as_deref()));
                let mut synthesized = Folder::new(parts[..depth].to_vec(), delimiter.clone());
                synthesized.no_select = true;
                synthesized.subscribed = false;
                synthesized
            });
            if !node.children.contains(&child) {
                node.children.push(child);
            }
            if existed {
                return;
            }
            child = parent;
        }

        if !self.roots.contains(&child) {
            self.roots.push(child);
        }
    }

    /// Mark folders expanded or special by path. Folders carrying a
    /// special-use attribute are special as well. Unknown paths are
    /// ignored now, and the lists are kept for folders resolved later.
    pub fn set_properties<E, S>(&mut self, expand: &[E], special: &[S])
    where
        E: AsRef<str>,
        S: AsRef<str>,
    {
        self.expand = expand.iter().map(|p| p.as_ref().to_string()).collect();
        self.special = special.iter().map(|p| p.as_ref().to_string()).collect();
        let paths: Vec<String> = self.folders.keys().cloned().collect();
        self.apply_properties(&paths);
    }

    fn apply_properties(&mut self, paths: &[String]) {
        for path in paths {
            let Some(folder) = self.folders.get_mut(path) else {
                continue;
            };
            if self.expand.contains(path) {
                folder.expanded = true;
            }
            if self.special.contains(path) || folder.special_use.is_some() {
                folder.special = true;
            }
        }
    }

    /// Order every sibling list: special folders first, then by path.
    pub fn sort(&mut self) {
        let mut roots = std::mem::take(&mut self.roots);
        roots.sort_by(|a, b| self.compare(a, b));
        self.roots = roots;

        let paths: Vec<String> = self.folders.keys().cloned().collect();
        for path in paths {
            let Some(folder) = self.folders.get_mut(&path) else {
                continue;
            };
            let mut children = std::mem::take(&mut folder.children);
            children.sort_by(|a, b| self.compare(a, b));
            if let Some(folder) = self.folders.get_mut(&path) {
                folder.children = children;
            }
        }
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        let special = |path: &str| self.folders.get(path).is_some_and(|f| f.special);
        special(b).cmp(&special(a)).then_with(|| a.cmp(b))
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Folder> {
        self.folders.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Folder> {
        self.folders.get_mut(path)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.folders.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    #[must_use]
    pub fn delimiter(&self) -> Option<&str> {
        self.delimiter.as_deref()
    }

    /// Root-level paths in display order.
    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Path of the currently selected folder.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Every folder, depth-first in display order.
    #[must_use]
    pub fn iter_all(&self) -> Walk<'_> {
        Walk::new(self, false)
    }

    /// Depth-first, without descending below collapsed folders.
    #[must_use]
    pub fn iter_expanded(&self) -> Walk<'_> {
        Walk::new(self, true)
    }

    /// Make sure `path` is in the tree, asking the server for it if it
    /// is not. Returns the canonical path.
    async fn ensure<T: Transport>(&mut self, transport: &mut T, path: &str) -> Result<String> {
        if self.folders.contains_key(path) {
            return Ok(path.to_string());
        }

        debug!("Resolving unknown folder {path}");
        let listing = transport
            .list_folders("", path, self.subscribed_only)
            .await?;
        let Some(descriptor) = listing.into_iter().next() else {
            return Err(Error::NoSuchFolder(path.to_string()));
        };
        if self.delimiter.is_none() {
            self.delimiter.clone_from(&descriptor.delimiter);
        }
        let known: HashSet<String> = self.folders.keys().cloned().collect();
        let resolved = self.add_folder(descriptor, self.subscribed_only);
        let added: Vec<String> = self
            .folders
            .keys()
            .filter(|path| !known.contains(*path))
            .cloned()
            .collect();
        self.apply_properties(&added);
        self.sort();
        Ok(resolved)
    }

    /// Look up `path`, listing it on the server if it is not yet known.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchFolder`] if the server does not list it, or any
    /// transport error.
    pub async fn resolve<T: Transport>(&mut self, transport: &mut T, path: &str) -> Result<&Folder> {
        let path = self.ensure(transport, path).await?;
        self.folders
            .get(&path)
            .ok_or(Error::NoSuchFolder(path))
    }

    /// Select `path`, leaving any other selected folder first.
    ///
    /// # Errors
    ///
    /// [`Error::NotSelectable`] for `\Noselect` folders,
    /// [`Error::NoSuchFolder`] for unknown ones, or any transport error.
    /// A failed SELECT leaves the folder's cache untouched.
    pub async fn select<T: Transport>(
        &mut self,
        transport: &mut T,
        negotiated: &Negotiated,
        path: &str,
    ) -> Result<&Folder> {
        let path = self.ensure(transport, path).await?;
        if self.folders.get(&path).is_some_and(|f| f.no_select) {
            return Err(Error::NotSelectable(path));
        }

        if let Some(current) = self.selected.clone()
            && current != path
        {
            debug!("Leaving {current} before selecting {path}");
            transport.unselect_or_close(negotiated.unselect).await?;
            self.selected = None;
            if !negotiated.unselect
                && let Some(closed) = self.folders.get_mut(&current)
            {
                // CLOSE expunged it
                closed.invalidate_status();
            }
        }

        let response = transport.select(&path).await?;
        info!("Selected {path} ({} messages)", response.exists);

        let folder = self
            .folders
            .get_mut(&path)
            .ok_or_else(|| Error::NoSuchFolder(path.clone()))?;
        folder.apply_select(&response, negotiated);
        self.selected = Some(path);
        Ok(folder)
    }

    /// Leave the selected folder.
    ///
    /// # Errors
    ///
    /// [`Error::NoFolderSelected`] if nothing is selected, or any
    /// transport error.
    pub async fn close_selected<T: Transport>(
        &mut self,
        transport: &mut T,
        negotiated: &Negotiated,
    ) -> Result<String> {
        let Some(path) = self.selected.clone() else {
            return Err(Error::NoFolderSelected);
        };
        transport.unselect_or_close(negotiated.unselect).await?;
        self.selected = None;
        if !negotiated.unselect
            && let Some(folder) = self.folders.get_mut(&path)
        {
            folder.invalidate_status();
        }
        debug!("Closed {path}");
        Ok(path)
    }

    /// Reload the status of `path` from the server. Non-selectable
    /// folders get an empty status without a server round trip.
    ///
    /// # Errors
    ///
    /// [`Error::NoSuchFolder`] or any transport error; the previous
    /// status is kept on failure.
    pub async fn refresh_status<T: Transport>(
        &mut self,
        transport: &mut T,
        path: &str,
    ) -> Result<&FolderStatus> {
        let path = self.ensure(transport, path).await?;
        let no_select = self.folders.get(&path).is_some_and(|f| f.no_select);
        let status = if no_select {
            FolderStatus::default()
        } else {
            transport.status(&path).await?
        };

        let folder = self
            .folders
            .get_mut(&path)
            .ok_or_else(|| Error::NoSuchFolder(path.clone()))?;
        Ok(folder.status.insert(status))
    }

    /// Cached status of `path`, loading it on first access.
    ///
    /// # Errors
    ///
    /// As [`refresh_status`](Self::refresh_status).
    pub async fn status<T: Transport>(&mut self, transport: &mut T, path: &str) -> Result<FolderStatus> {
        let path = self.ensure(transport, path).await?;
        if let Some(status) = self.folders.get(&path).and_then(|f| f.status.clone()) {
            return Ok(status);
        }
        self.refresh_status(transport, &path).await.cloned()
    }

    /// Refresh the status of every folder in the tree.
    ///
    /// # Errors
    ///
    /// Stops at the first transport error. Folders refreshed before it
    /// keep their new status.
    pub async fn refresh_all_status<T: Transport>(&mut self, transport: &mut T) -> Result<()> {
        let paths: Vec<String> = self.iter_all().map(|f| f.path().to_string()).collect();
        for path in &paths {
            self.refresh_status(transport, path).await?;
        }
        debug!("Refreshed status of {} folders", paths.len());
        Ok(())
    }
}

/// Depth-first traversal of a [`FolderTree`].
pub struct Walk<'a> {
    tree: &'a FolderTree,
    stack: Vec<&'a str>,
    expanded_only: bool,
}

impl<'a> Walk<'a> {
    fn new(tree: &'a FolderTree, expanded_only: bool) -> Self {
        Self {
            tree,
            stack: tree.roots.iter().rev().map(String::as_str).collect(),
            expanded_only,
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Folder;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = self.stack.pop()?;
            let Some(folder) = self.tree.folders.get(path) else {
                continue;
            };
            if !self.expanded_only || folder.expanded {
                self.stack
                    .extend(folder.children.iter().rev().map(String::as_str));
            }
            return Some(folder);
        }
    }
}
