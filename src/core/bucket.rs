use std::collections::HashSet;
use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::core::identity::{identity_key, IdentityKey, KeyScheme};
use crate::models::MovieRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Directors,
    Actors,
    Decades,
    Genres,
    Studios,
    Languages,
    Countries,
}

impl Category {
    /// Report order.
    pub const ALL: [Category; 7] = [
        Category::Directors,
        Category::Actors,
        Category::Decades,
        Category::Genres,
        Category::Studios,
        Category::Languages,
        Category::Countries,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Directors => "directors",
            Category::Actors => "actors",
            Category::Decades => "decades",
            Category::Genres => "genres",
            Category::Studios => "studios",
            Category::Languages => "languages",
            Category::Countries => "countries",
        }
    }

    /// Distinct values of this category on one record, in the record's order.
    pub fn values(&self, record: &MovieRecord) -> IndexSet<String> {
        let iter: Box<dyn Iterator<Item = &String>> = match self {
            Category::Directors => Box::new(record.directors.iter()),
            Category::Actors => Box::new(record.actors.iter()),
            Category::Genres => Box::new(record.genres.iter()),
            Category::Studios => Box::new(record.studios.iter()),
            Category::Languages => Box::new(record.languages.iter()),
            Category::Countries => Box::new(record.countries.iter()),
            Category::Decades => {
                return record
                    .decade()
                    .map(|d| format!("{d}s"))
                    .into_iter()
                    .collect();
            }
        };
        iter.map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub type CategoryCounts = IndexMap<Category, IndexMap<String, usize>>;

fn empty_counts() -> CategoryCounts {
    Category::ALL
        .iter()
        .map(|c| (*c, IndexMap::new()))
        .collect()
}

/// A named collection of at most `cap` films plus leaderboard counts over them.
///
/// Counts are a cache over `members`: every value is counted once per member
/// that carries it, so replaying the members always rebuilds them.
#[derive(Debug, Clone)]
pub struct BucketStore {
    name: String,
    cap: usize,
    scheme: KeyScheme,
    members: Vec<MovieRecord>,
    keys: HashSet<IdentityKey>,
    counts: CategoryCounts,
    /// Distinct films refused only because the bucket was full.
    overflow: HashSet<IdentityKey>,
}

impl BucketStore {
    pub fn new(name: impl Into<String>, cap: usize, scheme: KeyScheme) -> Self {
        Self {
            name: name.into(),
            cap,
            scheme,
            members: Vec::new(),
            keys: HashSet::new(),
            counts: empty_counts(),
            overflow: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn members(&self) -> &[MovieRecord] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.cap
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.keys.contains(key)
    }

    /// How many films would be in the bucket without a cap.
    pub fn ceiling(&self) -> usize {
        self.members.len() + self.overflow.len()
    }

    #[cfg(test)]
    pub fn counts(&self) -> &CategoryCounts {
        &self.counts
    }

    #[cfg(test)]
    pub fn count_of(&self, category: Category, value: &str) -> usize {
        self.counts
            .get(&category)
            .and_then(|m| m.get(value))
            .copied()
            .unwrap_or(0)
    }

    /// Append `record` unless it is already present, has no identity under this
    /// bucket's scheme, or the bucket is full. Returns whether it was added.
    pub fn add(&mut self, record: MovieRecord) -> bool {
        let Some(key) = identity_key(&record, self.scheme) else {
            return false;
        };
        if self.keys.contains(&key) {
            return false;
        }
        if self.is_full() {
            self.overflow.insert(key);
            return false;
        }

        tally(&mut self.counts, &record);
        self.keys.insert(key);
        self.members.push(record);
        true
    }

    /// The `n` most frequent values of a category, highest first. Ties keep the
    /// order in which the values were first counted.
    pub fn top(&self, category: Category, n: usize) -> Vec<(String, usize)> {
        let Some(values) = self.counts.get(&category) else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, usize)> =
            values.iter().map(|(v, c)| (v.clone(), *c)).collect();
        // sort_by is stable, so equal counts stay in insertion order.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    /// Recompute counts from scratch by replaying `members`.
    #[cfg(test)]
    pub fn replay_counts(&self) -> CategoryCounts {
        let mut counts = empty_counts();
        for record in &self.members {
            tally(&mut counts, record);
        }
        counts
    }
}

fn tally(counts: &mut CategoryCounts, record: &MovieRecord) {
    for category in Category::ALL {
        let slot = counts.entry(category).or_default();
        for value in category.values(record) {
            *slot.entry(value).or_insert(0) += 1;
        }
    }
}
