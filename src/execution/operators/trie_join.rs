// Prefix-match join over a character trie

use crate::error::{JoinError, Result};
use crate::execution::operators::JoinOperator;
use crate::execution::output::concat_in_order;
use crate::execution::scheduler::{Schedule, WorkerPool};
use crate::types::{char_slot, combine, CastRow, ResultRow, TitleRow, ALPHABET_SLOTS};
use log::debug;
use std::ops::Range;

const ROOT: usize = 0;
/// Child id meaning "no child". The root is never anyone's child, so id 0 is free.
const NO_CHILD: u32 = 0;

#[derive(Clone, Debug)]
struct TrieNode {
    children: [u32; ALPHABET_SLOTS],
    /// Cast rows whose note ends here; non-empty exactly when the node is terminal
    rows: Vec<usize>,
}

impl TrieNode {
    fn new() -> Self {
        Self {
            children: [NO_CHILD; ALPHABET_SLOTS],
            rows: Vec::new(),
        }
    }

    #[inline]
    fn child(&self, slot: usize) -> Option<usize> {
        match self.children[slot] {
            NO_CHILD => None,
            id => Some(id as usize),
        }
    }
}

/// Character trie over the notes of a borrowed cast relation.
///
/// Nodes live in an arena and refer to children by id. Terminal nodes store indices into the
/// relation, never copies; the `'a` borrow keeps the trie from outliving the rows it indexes.
///
/// Letters are case-folded and every character outside `[a-z0-9]` shares one slot, so notes
/// that differ only in punctuation or whitespace land on the same path.
#[derive(Clone, Debug)]
pub struct PrefixTrie<'a> {
    cast: &'a [CastRow],
    nodes: Vec<TrieNode>,
}

impl<'a> PrefixTrie<'a> {
    /// Empty trie (just a root) over `cast`
    pub fn new(cast: &'a [CastRow]) -> Self {
        Self {
            cast,
            nodes: vec![TrieNode::new()],
        }
    }

    /// Sequentially insert every row of `cast`
    pub fn from_relation(cast: &'a [CastRow]) -> Result<Self> {
        check_capacity(cast, 1)?;
        let mut trie = Self::new(cast);
        for row in 0..cast.len() {
            trie.insert(row);
        }
        Ok(trie)
    }

    /// Arena size, including slots absorbed by [`merge`](Self::merge) until the next
    /// [`compact`](Self::compact)
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Insert cast row `row` under its note
    pub fn insert(&mut self, row: usize) {
        let cast = self.cast;
        let mut node = ROOT;
        for c in cast[row].note.chars() {
            let slot = char_slot(c);
            node = match self.nodes[node].child(slot) {
                Some(next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::new());
                    self.nodes[node].children[slot] = next as u32;
                    next
                }
            };
        }
        self.nodes[node].rows.push(row);
    }

    /// Fold `other` (built over the same relation) into this trie.
    ///
    /// The other arena is appended with rebased ids, then both roots are merged: row lists are
    /// concatenated (ours first), a child present on one side only is adopted by copying its
    /// id, and children present on both sides are merged in turn.
    pub fn merge(&mut self, other: PrefixTrie<'a>) {
        let base = self.nodes.len();
        self.nodes.extend(other.nodes.into_iter().map(|mut node| {
            for child in node.children.iter_mut().filter(|c| **c != NO_CHILD) {
                *child += base as u32;
            }
            node
        }));

        let mut pending = vec![(ROOT, base)];
        while let Some((into, from)) = pending.pop() {
            let rows = std::mem::take(&mut self.nodes[from].rows);
            self.nodes[into].rows.extend(rows);
            for slot in 0..ALPHABET_SLOTS {
                let Some(theirs) = self.nodes[from].child(slot) else {
                    continue;
                };
                match self.nodes[into].child(slot) {
                    None => self.nodes[into].children[slot] = theirs as u32,
                    Some(ours) => pending.push((ours, theirs)),
                }
            }
        }
    }

    /// Drop arena slots no longer reachable from the root, renumbering in breadth-first order
    pub fn compact(&mut self) {
        let mut order = vec![ROOT];
        let mut head = 0;
        while head < order.len() {
            let node = &self.nodes[order[head]];
            order.extend((0..ALPHABET_SLOTS).filter_map(|slot| node.child(slot)));
            head += 1;
        }
        if order.len() == self.nodes.len() {
            return;
        }

        let mut new_id = vec![NO_CHILD; self.nodes.len()];
        for (id, &old) in order.iter().enumerate() {
            new_id[old] = id as u32;
        }
        let mut old_nodes: Vec<Option<TrieNode>> =
            std::mem::take(&mut self.nodes).into_iter().map(Some).collect();
        self.nodes = order
            .iter()
            .map(|&old| {
                let mut node = old_nodes[old].take().unwrap_or_else(TrieNode::new);
                for child in node.children.iter_mut().filter(|c| **c != NO_CHILD) {
                    *child = new_id[*child as usize];
                }
                node
            })
            .collect();
    }

    /// Call `emit(row)` for every cast row whose note is a prefix of `text`, shortest
    /// first. The walk stops at the first missing child.
    pub fn for_each_prefix_of<F: FnMut(usize)>(&self, text: &str, mut emit: F) {
        let mut node = &self.nodes[ROOT];
        for c in text.chars() {
            node.rows.iter().for_each(|&row| emit(row));
            match node.child(char_slot(c)) {
                Some(next) => node = &self.nodes[next],
                None => return,
            }
        }
        node.rows.iter().for_each(|&row| emit(row));
    }

    /// Cast rows whose note is a prefix of `text`
    pub fn prefixes_of(&self, text: &str) -> Vec<&'a CastRow> {
        let cast = self.cast;
        let mut found = Vec::new();
        self.for_each_prefix_of(text, |row| found.push(&cast[row]));
        found
    }
}

/// Every character may add one node, plus one root per private trie
fn check_capacity(cast: &[CastRow], tries: usize) -> Result<()> {
    let nodes = cast
        .iter()
        .fold(tries, |acc, row| acc.saturating_add(row.note.chars().count()));
    if nodes > u32::MAX as usize {
        return Err(JoinError::TrieCapacity(nodes));
    }
    Ok(())
}

/// Build one private trie per worker over a contiguous cast range, then fold them together
/// in worker order
fn build_merged<'a>(pool: &WorkerPool, cast: &'a [CastRow]) -> PrefixTrie<'a> {
    let tries = pool.parallel_for(
        cast.len(),
        Schedule::Static,
        |_| PrefixTrie::new(cast),
        |trie: &mut PrefixTrie<'a>, range: Range<usize>| {
            for row in range {
                trie.insert(row);
            }
        },
    );

    let mut tries = tries.into_iter();
    let mut trie = tries.next().unwrap_or_else(|| PrefixTrie::new(cast));
    for other in tries {
        trie.merge(other);
    }
    trie.compact();
    trie
}

/// Configuration for [`TrieJoinOperator`]
#[derive(Clone, Debug)]
pub struct TrieJoinConfig {
    /// How title rows are handed to workers in the query phase
    pub query_schedule: Schedule,
}

impl Default for TrieJoinConfig {
    fn default() -> Self {
        Self {
            query_schedule: Schedule::Dynamic(256),
        }
    }
}

/// Prefix join: emits `(cast, title)` whenever the folded note is a prefix of the folded title.
#[derive(Default)]
pub struct TrieJoinOperator {
    config: TrieJoinConfig,
}

impl TrieJoinOperator {
    pub fn new(config: TrieJoinConfig) -> Self {
        Self { config }
    }
}

impl JoinOperator for TrieJoinOperator {
    fn name(&self) -> &'static str {
        "trie"
    }

    fn execute(
        &self,
        pool: &WorkerPool,
        cast: &[CastRow],
        title: &[TitleRow],
    ) -> Result<Vec<ResultRow>> {
        if cast.is_empty() || title.is_empty() {
            return Ok(Vec::new());
        }
        check_capacity(cast, pool.workers())?;

        let trie = build_merged(pool, cast);
        debug!(
            "Trie: {} nodes over {} cast rows",
            trie.node_count(),
            cast.len()
        );

        // Query: every title walks the merged trie
        let trie = &trie;
        let parts = pool.parallel_for(
            title.len(),
            self.config.query_schedule,
            |_| Vec::new(),
            |out: &mut Vec<ResultRow>, range: Range<usize>| {
                for title_row in &title[range] {
                    trie.for_each_prefix_of(&title_row.title, |row| {
                        out.push(combine(&cast[row], title_row))
                    });
                }
            },
        );
        Ok(concat_in_order(parts))
    }
}
