//! Thread structures
//!
//! A THREAD response is a nested list of message ids. Inside one list,
//! consecutive ids chain linearly: each id is the child of the id
//! before it, not of the enclosing list. A nested list branches off
//! the last id seen before it.
//!
//! ```text
//! (2)(3 6 (4 23)(44 7 96))
//!
//! 2
//! 3
//! └─ 6
//!    ├─ 4
//!    │  └─ 23
//!    └─ 44
//!       └─ 7
//!          └─ 96
//! ```

use crate::capability::ThreadAlgorithm;
use crate::message::MessageRecord;
use crate::sort::base_subject;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One element of a thread response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadItem {
    Id(u32),
    Nested(Vec<ThreadItem>),
}

impl ThreadItem {
    /// Build a `Nested` item from plain ids.
    #[must_use]
    pub fn chain(ids: &[u32]) -> Self {
        Self::Nested(ids.iter().copied().map(Self::Id).collect())
    }
}

/// Every id in `items`, depth-first, ignoring structure.
#[must_use]
pub fn flatten(items: &[ThreadItem]) -> Vec<u32> {
    let mut out = Vec::new();
    let mut stack: Vec<std::slice::Iter<'_, ThreadItem>> = vec![items.iter()];
    while let Some(iter) = stack.last_mut() {
        match iter.next() {
            Some(ThreadItem::Id(id)) => out.push(*id),
            Some(ThreadItem::Nested(inner)) => stack.push(inner.iter()),
            None => {
                stack.pop();
            }
        }
    }
    out
}

/// Where an id sits in the displayed thread tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadPosition {
    pub id: u32,
    pub level: usize,
    pub parent: Option<u32>,
}

/// Positions of every id in `items` under linear chaining.
///
/// An id is placed at its first occurrence only. A later occurrence
/// emits nothing, and the ids chained after it hang under the first
/// placement instead.
#[must_use]
pub fn thread_positions(items: &[ThreadItem]) -> Vec<ThreadPosition> {
    let mut out = Vec::new();
    let mut placed = HashMap::new();
    walk(items, 0, None, &mut placed, &mut out);
    out
}

fn walk(
    items: &[ThreadItem],
    mut level: usize,
    mut parent: Option<u32>,
    placed: &mut HashMap<u32, usize>,
    out: &mut Vec<ThreadPosition>,
) {
    for item in items {
        match item {
            ThreadItem::Id(id) => {
                match placed.get(id).copied() {
                    Some(first) => level = first + 1,
                    None => {
                        placed.insert(*id, level);
                        out.push(ThreadPosition {
                            id: *id,
                            level,
                            parent,
                        });
                        level += 1;
                    }
                }
                parent = Some(*id);
            }
            ThreadItem::Nested(inner) => walk(inner, level, parent, placed, out),
        }
    }
}

/// Thread `order` locally from fetched envelopes, producing the same
/// nested shape a server THREAD command would.
///
/// With [`ThreadAlgorithm::References`] a message hangs under the
/// message its `In-Reply-To` names, when that message is in `order`.
/// Under both algorithms, messages left without a parent are grouped by
/// base subject beneath the first message of the group. Siblings and
/// roots keep their relative position in `order`.
#[must_use]
pub fn thread_locally(
    order: &[u32],
    records: &HashMap<u32, MessageRecord>,
    algorithm: ThreadAlgorithm,
) -> Vec<ThreadItem> {
    let mut parents: HashMap<u32, u32> = HashMap::new();

    if algorithm == ThreadAlgorithm::References {
        let mut by_message_id: HashMap<&str, u32> = HashMap::new();
        for id in order {
            if let Some(mid) = records.get(id).and_then(|r| r.envelope.message_id.as_deref()) {
                by_message_id.entry(mid.trim()).or_insert(*id);
            }
        }
        for id in order {
            let candidate = records
                .get(id)
                .and_then(|r| r.envelope.in_reply_to.as_deref())
                .and_then(|irt| by_message_id.get(irt.trim()).copied());
            if let Some(parent) = candidate
                && !is_ancestor(&parents, *id, parent)
            {
                parents.insert(*id, parent);
            }
        }
    }

    let mut leaders: HashMap<String, u32> = HashMap::new();
    for id in order {
        if parents.contains_key(id) {
            continue;
        }
        let subject = records
            .get(id)
            .map(|r| base_subject(r.envelope.subject.as_deref().unwrap_or_default()))
            .unwrap_or_default();
        if subject.is_empty() {
            continue;
        }
        match leaders.get(&subject) {
            Some(leader) => {
                parents.insert(*id, *leader);
            }
            None => {
                leaders.insert(subject, *id);
            }
        }
    }

    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    let mut roots = Vec::new();
    for id in order {
        match parents.get(id) {
            Some(parent) => children.entry(*parent).or_default().push(*id),
            None => roots.push(*id),
        }
    }

    roots
        .into_iter()
        .map(|root| ThreadItem::Nested(encode(root, &children)))
        .collect()
}

/// True if `candidate` already descends from `id`, so making it
/// `id`'s parent would close a loop.
fn is_ancestor(parents: &HashMap<u32, u32>, id: u32, candidate: u32) -> bool {
    let mut cursor = Some(candidate);
    while let Some(current) = cursor {
        if current == id {
            return true;
        }
        cursor = parents.get(&current).copied();
    }
    false
}

fn encode(root: u32, children: &HashMap<u32, Vec<u32>>) -> Vec<ThreadItem> {
    let mut out = vec![ThreadItem::Id(root)];
    let mut current = root;
    loop {
        match children.get(&current).map(Vec::as_slice) {
            Some([only]) => {
                out.push(ThreadItem::Id(*only));
                current = *only;
            }
            Some(many) if !many.is_empty() => {
                out.extend(many.iter().map(|child| ThreadItem::Nested(encode(*child, children))));
                break;
            }
            _ => break,
        }
    }
    out
}
