//! Message list engine
//!
//! Turns a search expression, a sort program and a display mode into an
//! ordering of UIDs for the selected folder, and materializes header
//! records one page at a time.
//!
//! The server does the work whenever its negotiated [`Level`] covers
//! the requested display mode. When it does not, the engine asks for as
//! much as the server can give (SORT, or plain SEARCH), fetches the
//! records and finishes the sort and/or threading locally.

use crate::capability::{Level, Negotiated, ThreadAlgorithm};
use crate::config::MailboxOptions;
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::message::MessageRecord;
use crate::paginator::{PageSize, Paginator};
use crate::sort::SortProgram;
use crate::thread::{ThreadItem, flatten, thread_locally, thread_positions};
use crate::transport::{OrderingRequest, ResolvedOrdering, Transport};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Per-message state inside an ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub id: u32,
    pub parent: Option<u32>,
    pub children: Vec<u32>,
    /// Thread depth; always 0 outside threaded display.
    pub level: usize,
    /// `None` until the record has been fetched.
    pub record: Option<MessageRecord>,
}

impl MessageEntry {
    const fn new(id: u32) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            level: 0,
            record: None,
        }
    }
}

/// A resolved ordering: flat display order plus thread structure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOrdering {
    flat_order: Vec<u32>,
    root_list: Vec<u32>,
    entries: HashMap<u32, MessageEntry>,
}

impl MessageOrdering {
    /// An ordering without thread structure. Duplicate ids keep their
    /// first position.
    #[must_use]
    pub fn flat(ids: Vec<u32>) -> Self {
        let flat_order = dedupe(ids);
        let entries = flat_order
            .iter()
            .map(|id| (*id, MessageEntry::new(*id)))
            .collect();
        Self {
            root_list: flat_order.clone(),
            flat_order,
            entries,
        }
    }

    /// An ordering from a nested thread result. Display order is the
    /// pre-order walk of the resulting tree, so every child follows its
    /// parent's subtree position.
    #[must_use]
    pub fn threaded(items: &[ThreadItem]) -> Self {
        let mut entries = HashMap::new();
        let mut root_list = Vec::new();
        for position in thread_positions(items) {
            let mut entry = MessageEntry::new(position.id);
            entry.level = position.level;
            entry.parent = position.parent;
            entries.insert(position.id, entry);
            match position.parent {
                None => root_list.push(position.id),
                Some(parent) => {
                    if let Some(parent_entry) = entries.get_mut(&parent) {
                        parent_entry.children.push(position.id);
                    }
                }
            }
        }

        let mut flat_order = Vec::with_capacity(entries.len());
        let mut stack: Vec<u32> = root_list.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            flat_order.push(id);
            if let Some(entry) = entries.get(&id) {
                stack.extend(entry.children.iter().rev());
            }
        }

        Self {
            flat_order,
            root_list,
            entries,
        }
    }

    /// Every id in display order.
    #[must_use]
    pub fn flat_order(&self) -> &[u32] {
        &self.flat_order
    }

    /// Top-level ids; the whole list outside threaded display.
    #[must_use]
    pub fn root_list(&self) -> &[u32] {
        &self.root_list
    }

    #[must_use]
    pub fn entry(&self, id: u32) -> Option<&MessageEntry> {
        self.entries.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flat_order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flat_order.is_empty()
    }

    /// Store fetched records on their entries. Records for ids outside
    /// the ordering are dropped.
    fn attach(&mut self, records: HashMap<u32, MessageRecord>) {
        for (id, record) in records {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.record = Some(record);
            }
        }
    }

    fn missing_records(&self, ids: &[u32]) -> Vec<u32> {
        ids.iter()
            .copied()
            .filter(|id| self.entries.get(id).is_some_and(|e| e.record.is_none()))
            .collect()
    }
}

fn dedupe(ids: Vec<u32>) -> Vec<u32> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// The message listing of one folder.
#[derive(Debug, Clone)]
pub struct MessageList {
    negotiated: Negotiated,
    sort_program: SortProgram,
    search: String,
    display: Level,
    charset: String,
    fallback: bool,
    paginator: Paginator,
    ordering: Option<MessageOrdering>,
}

impl MessageList {
    #[must_use]
    pub fn new(negotiated: Negotiated, options: &MailboxOptions) -> Self {
        Self {
            negotiated,
            sort_program: options.sort.clone(),
            search: options.search.clone(),
            display: options.display,
            charset: options.charset.clone(),
            fallback: options.client_fallback,
            paginator: Paginator::new(options.page_size),
            ordering: None,
        }
    }

    #[must_use]
    pub const fn negotiated(&self) -> &Negotiated {
        &self.negotiated
    }

    pub fn set_negotiated(&mut self, negotiated: Negotiated) {
        if self.negotiated != negotiated {
            self.negotiated = negotiated;
            self.invalidate();
        }
    }

    #[must_use]
    pub const fn sort_program(&self) -> &SortProgram {
        &self.sort_program
    }

    pub fn set_sort_program(&mut self, program: SortProgram) {
        if self.sort_program != program {
            self.sort_program = program;
            self.invalidate();
        }
    }

    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, expr: impl Into<String>) {
        let expr = expr.into();
        if self.search != expr {
            self.search = expr;
            self.invalidate();
        }
    }

    #[must_use]
    pub const fn display(&self) -> Level {
        self.display
    }

    pub fn set_display(&mut self, display: Level) {
        if self.display != display {
            self.display = display;
            self.invalidate();
        }
    }

    #[must_use]
    pub const fn client_fallback(&self) -> bool {
        self.fallback
    }

    pub fn set_client_fallback(&mut self, fallback: bool) {
        self.fallback = fallback;
    }

    pub fn set_page_size(&mut self, page_size: PageSize) {
        self.paginator.set_page_size(page_size);
    }

    /// Pin the current page (clamped). Returns the page pinned.
    pub fn set_page(&mut self, page: usize) -> usize {
        self.paginator.set_current_page(page)
    }

    #[must_use]
    pub const fn paginator(&self) -> &Paginator {
        &self.paginator
    }

    pub const fn paginator_mut(&mut self) -> &mut Paginator {
        &mut self.paginator
    }

    /// The current ordering, if it has been resolved.
    #[must_use]
    pub const fn ordering(&self) -> Option<&MessageOrdering> {
        self.ordering.as_ref()
    }

    /// Cached entry for `id`, without contacting the server.
    #[must_use]
    pub fn entry(&self, id: u32) -> Option<&MessageEntry> {
        self.ordering.as_ref().and_then(|o| o.entry(id))
    }

    /// Drop the ordering; the next read re-resolves it.
    pub fn invalidate(&mut self) {
        if self.ordering.take().is_some() {
            debug!("Message list invalidated");
        }
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.ordering.is_none()
    }

    /// True when the server alone cannot produce the display mode.
    #[must_use]
    pub const fn needs_reconcile(&self) -> bool {
        !self.negotiated.level.satisfies(self.display)
    }

    fn thread_algorithm(&self) -> ThreadAlgorithm {
        self.negotiated
            .thread_algorithm
            .unwrap_or(ThreadAlgorithm::References)
    }

    async fn resolve<T: Transport>(&self, transport: &mut T) -> Result<MessageOrdering> {
        if !self.needs_reconcile() {
            let request = match self.display {
                Level::Threaded => OrderingRequest::Thread {
                    algorithm: self.thread_algorithm(),
                    charset: &self.charset,
                    expr: &self.search,
                },
                Level::Sorted => OrderingRequest::Sort {
                    program: &self.sort_program,
                    charset: &self.charset,
                    expr: &self.search,
                },
                Level::Unsorted => OrderingRequest::Search { expr: &self.search },
            };
            debug!("Resolving ordering with {}", request.command());
            return Ok(match transport.resolve_ordering(request).await? {
                ResolvedOrdering::Flat(ids) => MessageOrdering::flat(ids),
                ResolvedOrdering::Threaded(items) => MessageOrdering::threaded(&items),
            });
        }

        if !self.fallback {
            return Err(Error::NotYetSupported(format!(
                "{} display on a server limited to {}",
                self.display, self.negotiated.level
            )));
        }

        self.reconcile(transport).await
    }

    /// Order client-side what the server cannot.
    async fn reconcile<T: Transport>(&self, transport: &mut T) -> Result<MessageOrdering> {
        let server_sorts = self.negotiated.level.satisfies(Level::Sorted);
        let request = if server_sorts {
            OrderingRequest::Sort {
                program: &self.sort_program,
                charset: &self.charset,
                expr: &self.search,
            }
        } else {
            OrderingRequest::Search { expr: &self.search }
        };
        info!(
            "Server level {} cannot produce {} display; ordering client-side after {}",
            self.negotiated.level,
            self.display,
            request.command()
        );

        let mut ids = match transport.resolve_ordering(request).await? {
            ResolvedOrdering::Flat(ids) => dedupe(ids),
            ResolvedOrdering::Threaded(items) => dedupe(flatten(&items)),
        };
        let records = if ids.is_empty() {
            HashMap::new()
        } else {
            transport.fetch_records(&ids).await?
        };

        if !server_sorts {
            self.sort_program.sort_ids(&mut ids, &records);
        }

        let mut ordering = if self.display == Level::Threaded {
            MessageOrdering::threaded(&thread_locally(&ids, &records, self.thread_algorithm()))
        } else {
            MessageOrdering::flat(ids)
        };
        ordering.attach(records);
        Ok(ordering)
    }

    /// Re-resolve the ordering from the server.
    ///
    /// # Errors
    ///
    /// [`Error::NotYetSupported`] when the server cannot produce the
    /// display mode and the client-side fallback is off, or any
    /// transport error. The previous ordering is kept on failure.
    pub async fn refresh_messages<T: Transport>(&mut self, transport: &mut T) -> Result<()> {
        let ordering = self.resolve(transport).await?;
        debug!("Resolved {} messages", ordering.len());
        self.paginator.set_item_count(ordering.len());
        self.ordering = Some(ordering);
        Ok(())
    }

    async fn ensure_ordering<T: Transport>(&mut self, transport: &mut T) -> Result<&mut MessageOrdering> {
        if self.ordering.is_none() {
            self.refresh_messages(transport).await?;
        }
        self.ordering
            .as_mut()
            .ok_or_else(|| Error::Imap("Message ordering unavailable".to_string()))
    }

    /// Number of messages matching the search expression.
    ///
    /// # Errors
    ///
    /// As [`refresh_messages`](Self::refresh_messages).
    pub async fn number_messages<T: Transport>(&mut self, transport: &mut T) -> Result<usize> {
        Ok(self.ensure_ordering(transport).await?.len())
    }

    /// # Errors
    ///
    /// As [`refresh_messages`](Self::refresh_messages).
    pub async fn have_messages<T: Transport>(&mut self, transport: &mut T) -> Result<bool> {
        Ok(self.number_messages(transport).await? > 0)
    }

    /// Entries of the current page, with records fetched. Only records
    /// not already held are fetched, in one batch.
    ///
    /// # Errors
    ///
    /// [`Error::NotYetSupported`] when no ordering is held and the
    /// server cannot produce the display mode without the client-side
    /// fallback. [`Error::SortProg`] when an ordering is held but the
    /// fallback has since been switched off. Any transport error.
    pub async fn page<T: Transport>(&mut self, transport: &mut T) -> Result<Vec<&MessageEntry>> {
        self.ensure_ordering(transport).await?;
        if self.needs_reconcile() && !self.fallback {
            return Err(Error::SortProg(format!(
                "cannot page {} display on a server limited to {}",
                self.display, self.negotiated.level
            )));
        }
        self.paginator.clear_refresh();
        let window = self.paginator.window();
        let page = self.paginator.current_page();

        let Some(ordering) = self.ordering.as_mut() else {
            return Ok(Vec::new());
        };
        let window = window.start.min(ordering.len())..window.end.min(ordering.len());

        let missing = ordering.missing_records(&ordering.flat_order[window.clone()]);
        if !missing.is_empty() {
            debug!("Fetching {} records for page {page}", missing.len());
            let records = transport.fetch_records(&missing).await?;
            ordering.attach(records);
        }

        Ok(ordering.flat_order[window]
            .iter()
            .filter_map(|id| ordering.entries.get(id))
            .collect())
    }

    /// Replace the cached flags of the given messages, e.g. with what
    /// a STORE echoed. Messages without a cached record are skipped.
    pub fn update_flags(&mut self, flags: &HashMap<u32, Vec<Flag>>) {
        let Some(ordering) = self.ordering.as_mut() else {
            return;
        };
        for (uid, current) in flags {
            if let Some(record) = ordering
                .entries
                .get_mut(uid)
                .and_then(|entry| entry.record.as_mut())
            {
                record.flags.clone_from(current);
            }
        }
    }

    /// Fetch one message directly, outside page iteration.
    ///
    /// # Errors
    ///
    /// [`Error::MessageNotFound`] if the server returns no record for
    /// `id`, or any transport error.
    pub async fn get_message<T: Transport>(&mut self, transport: &mut T, id: u32) -> Result<MessageRecord> {
        let record = transport
            .fetch_records(&[id])
            .await?
            .remove(&id)
            .ok_or(Error::MessageNotFound(id))?;
        if let Some(entry) = self.ordering.as_mut().and_then(|o| o.entries.get_mut(&id)) {
            entry.record = Some(record.clone());
        }
        Ok(record)
    }
}
