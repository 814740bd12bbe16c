// Relation row types

use rayon::prelude::*;

/// One row of the fact relation. `movie_id` is not unique.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CastRow {
    pub movie_id: i32,
    pub note: String,
}

/// One row of the dimension relation. `title_id` is not unique either.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TitleRow {
    pub title_id: i32,
    pub title: String,
}

/// A matched cast/title pair. Only built through [`combine`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultRow {
    pub movie_id: i32,
    pub note: String,
    pub title_id: i32,
    pub title: String,
}

impl CastRow {
    pub fn new(movie_id: i32, note: impl Into<String>) -> Self {
        Self {
            movie_id,
            note: note.into(),
        }
    }
}

impl TitleRow {
    pub fn new(title_id: i32, title: impl Into<String>) -> Self {
        Self {
            title_id,
            title: title.into(),
        }
    }
}

/// Combine a matching cast and title row into one result row
pub fn combine(cast: &CastRow, title: &TitleRow) -> ResultRow {
    ResultRow {
        movie_id: cast.movie_id,
        note: cast.note.clone(),
        title_id: title.title_id,
        title: title.title.clone(),
    }
}

/// Access to the integer equality-join key of a row
pub trait JoinKey {
    fn join_key(&self) -> i32;
}

impl JoinKey for CastRow {
    #[inline]
    fn join_key(&self) -> i32 {
        self.movie_id
    }
}

impl JoinKey for TitleRow {
    #[inline]
    fn join_key(&self) -> i32 {
        self.title_id
    }
}

/// Sorted copy of a cast relation, ascending by `movie_id`.
/// Stable, so rows with equal keys keep their input order.
pub fn sort_cast_relation(rows: &[CastRow]) -> Vec<CastRow> {
    let mut sorted = rows.to_vec();
    sorted.par_sort_by_key(|r| r.movie_id);
    sorted
}

/// Sorted copy of a title relation, ascending by `title_id`
pub fn sort_title_relation(rows: &[TitleRow]) -> Vec<TitleRow> {
    let mut sorted = rows.to_vec();
    sorted.par_sort_by_key(|r| r.title_id);
    sorted
}

/// Number of distinct alphabet slots used by prefix matching: a-z, 0-9, and one shared slot
/// for everything else.
pub const ALPHABET_SLOTS: usize = 37;

/// Slot shared by every character that is not an ASCII letter or digit
pub const OTHER_SLOT: usize = 36;

/// Map a character to its prefix-matching slot. Letters are case-folded.
#[inline]
pub fn char_slot(c: char) -> usize {
    match c.to_ascii_lowercase() {
        c @ 'a'..='z' => c as usize - 'a' as usize,
        c @ '0'..='9' => 26 + (c as usize - '0' as usize),
        _ => OTHER_SLOT,
    }
}

/// Brute-force prefix test under the same folding the trie uses.
pub fn prefix_matches(note: &str, title: &str) -> bool {
    let mut title_chars = title.chars();
    note.chars().all(|n| match title_chars.next() {
        Some(t) => char_slot(n) == char_slot(t),
        None => false,
    })
}
