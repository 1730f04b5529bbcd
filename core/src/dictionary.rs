//! Read-only dictionary store.
//!
//! `DictionaryStore` is the seam the engine queries; `Dictionary` is the
//! in-process implementation. Codes are indexed by an `fst::Map` from
//! jyutping code to a bucket of entry positions, which serves both exact and
//! prefix lookups. Written-form lookups use a hash index (exact) or a scan.
//!
//! Frequency floors are exclusive: `min_frequency: Some(50)` keeps entries
//! with `frequency > 50`. `None` disables the floor.
//!
//! Ranking for code queries mirrors the tiered search contract:
//! 1. code equal to `preferred`
//! 2. code starting with `preferred`
//! 3. everything else
//!
//! then frequency descending, then insertion order ascending.

use ahash::{AHashMap, AHashSet};
use fst::automaton::Str;
use fst::{Automaton, IntoStreamer, Map, Streamer};
use tracing::debug;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::entry::DictionaryEntry;
use crate::error::{Error, Result};

/// Parameters for code lookups.
#[derive(Debug, Clone, Copy)]
pub struct LookupQuery<'a> {
    pub codes: &'a [String],
    pub min_frequency: Option<u64>,
    pub limit: usize,
    /// Codes equal to (then starting with) this value rank first.
    pub preferred: Option<&'a str>,
}

impl<'a> LookupQuery<'a> {
    pub fn new(codes: &'a [String], min_frequency: Option<u64>, limit: usize) -> Self {
        Self {
            codes,
            min_frequency,
            limit,
            preferred: None,
        }
    }

    pub fn prefer(mut self, code: &'a str) -> Self {
        self.preferred = Some(code);
        self
    }

    fn rank(&self, code: &str) -> u8 {
        match self.preferred {
            Some(p) if code == p => 0,
            Some(p) if code.starts_with(p) => 1,
            _ => 2,
        }
    }
}

/// Read-only dictionary collaborator.
///
/// Implementations must be safe to share across concurrent requests.
pub trait DictionaryStore: Send + Sync {
    /// Entries whose code equals any of `query.codes`.
    fn find_by_code(&self, query: &LookupQuery<'_>) -> Result<Vec<DictionaryEntry>>;

    /// Entries whose code starts with any of `query.codes`.
    fn find_by_prefix(&self, query: &LookupQuery<'_>) -> Result<Vec<DictionaryEntry>>;

    /// Highest-frequency entry whose hanzi or word equals `text`.
    fn find_exact(&self, text: &str, min_frequency: Option<u64>)
        -> Result<Option<DictionaryEntry>>;

    /// Highest-frequency entry whose hanzi or word starts with `text`.
    fn find_text_prefix(
        &self,
        text: &str,
        min_frequency: Option<u64>,
    ) -> Result<Option<DictionaryEntry>>;

    /// Entries whose code, hanzi or word contains `needle`, in insertion order.
    fn find_containing(
        &self,
        needle: &str,
        min_frequency: Option<u64>,
    ) -> Result<Vec<DictionaryEntry>>;

    /// Entries carrying any of `tags`, frequency descending then insertion order.
    fn find_tagged(
        &self,
        tags: &[&str],
        min_frequency: Option<u64>,
        limit: usize,
    ) -> Result<Vec<DictionaryEntry>>;
}

fn above(entry: &DictionaryEntry, floor: Option<u64>) -> bool {
    floor.map_or(true, |f| entry.frequency > f)
}

/// Frequency descending, then insertion order.
pub fn by_popularity(a: &DictionaryEntry, b: &DictionaryEntry) -> std::cmp::Ordering {
    b.frequency.cmp(&a.frequency).then(a.id.cmp(&b.id))
}

/// In-memory dictionary with an fst code index.
#[derive(Debug, Clone)]
pub struct Dictionary {
    entries: Vec<DictionaryEntry>,
    // code -> bucket position
    index: Map<Vec<u8>>,
    buckets: Vec<Vec<usize>>,
    // hanzi / word -> entry positions
    by_text: AHashMap<String, Vec<usize>>,
}

impl Dictionary {
    /// Build a dictionary. Entries receive ids in the order given (1-based).
    pub fn from_entries(mut entries: Vec<DictionaryEntry>) -> Result<Self> {
        for (i, e) in entries.iter_mut().enumerate() {
            e.id = i as u64 + 1;
            e.jyutping_code = e.jyutping_code.trim().to_ascii_lowercase();
            e.clear_blank_text();
        }

        let mut grouped: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut by_text: AHashMap<String, Vec<usize>> = AHashMap::new();
        for (i, e) in entries.iter().enumerate() {
            grouped.entry(e.jyutping_code.as_str()).or_default().push(i);
            if let Some(h) = e.hanzi.as_deref() {
                by_text.entry(h.to_string()).or_default().push(i);
            }
            if let Some(w) = e.word.as_deref() {
                if e.hanzi.as_deref() != Some(w) {
                    by_text.entry(w.to_string()).or_default().push(i);
                }
            }
        }

        let mut buckets = Vec::with_capacity(grouped.len());
        let index = Map::from_iter(grouped.into_iter().map(|(code, positions)| {
            buckets.push(positions);
            (code, (buckets.len() - 1) as u64)
        }))
        .map_err(|e| Error::load("dictionary index", e))?;
        debug!(entries = entries.len(), codes = buckets.len(), "dictionary indexed");

        Ok(Self {
            entries,
            index,
            buckets,
            by_text,
        })
    }

    /// Empty dictionary.
    pub fn empty() -> Self {
        Self::from_entries(Vec::new()).unwrap_or_else(|_| unreachable!("empty fst always builds"))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    /// Load a dictionary, choosing the format by extension:
    /// `.json` (array of entries), `.bin`/`.bincode` (snapshot), otherwise
    /// tab-separated text.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::load_json(path),
            Some("bin") | Some("bincode") => Self::load_bincode(path),
            _ => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| Error::load(path.display().to_string(), e))?;
                Self::from_tsv_str(&text)
            }
        }
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::load(path.display().to_string(), e))?;
        let entries: Vec<DictionaryEntry> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::load(path.display().to_string(), e))?;
        Self::from_entries(entries)
    }

    /// Parse tab-separated rows: `hanzi  code  frequency  [word]  [tag,tag]`.
    /// Blank lines and lines starting with `#` are skipped. An empty hanzi
    /// column stores the row under `word` only.
    pub fn from_tsv_str(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim_end();
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 3 {
                return Err(Error::load(
                    format!("dictionary line {}", lineno + 1),
                    "expected at least hanzi, code and frequency columns",
                ));
            }
            let frequency = cols[2].trim().parse::<u64>().map_err(|e| {
                Error::load(format!("dictionary line {} frequency", lineno + 1), e)
            })?;
            let hanzi = Some(cols[0].trim().to_string()).filter(|h| !h.is_empty());
            let word = cols
                .get(3)
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty());
            let tags = cols
                .get(4)
                .map(|t| {
                    t.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            entries.push(DictionaryEntry {
                id: 0,
                hanzi,
                jyutping_code: cols[1].to_string(),
                word,
                frequency,
                tags,
            });
        }
        Self::from_entries(entries)
    }

    /// Save entries as a bincode snapshot; the index is rebuilt on load.
    pub fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::load(path.display().to_string(), e))?;
        bincode::serialize_into(BufWriter::new(file), &self.entries)
            .map_err(|e| Error::load(path.display().to_string(), e))
    }

    pub fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::load(path.display().to_string(), e))?;
        let entries: Vec<DictionaryEntry> = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| Error::load(path.display().to_string(), e))?;
        Self::from_entries(entries)
    }

    fn bucket(&self, code: &str) -> &[usize] {
        self.index
            .get(code)
            .and_then(|b| self.buckets.get(b as usize))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn collect_ranked(&self, positions: AHashSet<usize>, query: &LookupQuery<'_>) -> Vec<DictionaryEntry> {
        let mut hits: Vec<&DictionaryEntry> = positions
            .into_iter()
            .map(|i| &self.entries[i])
            .filter(|e| above(e, query.min_frequency))
            .collect();
        hits.sort_by(|a, b| {
            query
                .rank(&a.jyutping_code)
                .cmp(&query.rank(&b.jyutping_code))
                .then_with(|| by_popularity(a, b))
        });
        hits.into_iter().take(query.limit).cloned().collect()
    }

    fn best_of<'a, I>(&'a self, candidates: I, floor: Option<u64>) -> Option<DictionaryEntry>
    where
        I: Iterator<Item = &'a DictionaryEntry>,
    {
        candidates
            .filter(|e| above(e, floor))
            .min_by(|a, b| by_popularity(a, b))
            .cloned()
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::empty()
    }
}

impl DictionaryStore for Dictionary {
    fn find_by_code(&self, query: &LookupQuery<'_>) -> Result<Vec<DictionaryEntry>> {
        let positions: AHashSet<usize> = query
            .codes
            .iter()
            .flat_map(|c| self.bucket(c).iter().copied())
            .collect();
        Ok(self.collect_ranked(positions, query))
    }

    fn find_by_prefix(&self, query: &LookupQuery<'_>) -> Result<Vec<DictionaryEntry>> {
        let mut positions = AHashSet::new();
        for prefix in query.codes.iter().filter(|p| !p.is_empty()) {
            let mut stream = self
                .index
                .search(Str::new(prefix).starts_with())
                .into_stream();
            while let Some((_, b)) = stream.next() {
                if let Some(bucket) = self.buckets.get(b as usize) {
                    positions.extend(bucket.iter().copied());
                }
            }
        }
        Ok(self.collect_ranked(positions, query))
    }

    fn find_exact(
        &self,
        text: &str,
        min_frequency: Option<u64>,
    ) -> Result<Option<DictionaryEntry>> {
        let hits = self.by_text.get(text).map(Vec::as_slice).unwrap_or_default();
        Ok(self.best_of(hits.iter().map(|&i| &self.entries[i]), min_frequency))
    }

    fn find_text_prefix(
        &self,
        text: &str,
        min_frequency: Option<u64>,
    ) -> Result<Option<DictionaryEntry>> {
        if text.is_empty() {
            return Ok(None);
        }
        Ok(self.best_of(
            self.entries.iter().filter(|e| e.text_starts_with(text)),
            min_frequency,
        ))
    }

    fn find_containing(
        &self,
        needle: &str,
        min_frequency: Option<u64>,
    ) -> Result<Vec<DictionaryEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| above(e, min_frequency))
            .filter(|e| {
                e.jyutping_code.contains(needle)
                    || e.hanzi.as_deref().is_some_and(|h| h.contains(needle))
                    || e.word.as_deref().is_some_and(|w| w.contains(needle))
            })
            .cloned()
            .collect())
    }

    fn find_tagged(
        &self,
        tags: &[&str],
        min_frequency: Option<u64>,
        limit: usize,
    ) -> Result<Vec<DictionaryEntry>> {
        let mut hits: Vec<&DictionaryEntry> = self
            .entries
            .iter()
            .filter(|e| above(e, min_frequency) && e.has_any_tag(tags))
            .collect();
        hits.sort_by(|a, b| by_popularity(a, b));
        Ok(hits.into_iter().take(limit).cloned().collect())
    }
}
