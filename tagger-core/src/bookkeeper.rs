//! The Symbol Book-keeper (C1): a bidirectional, order-preserving, cutoff-
//! capable mapping between symbolic names (features, labels) and dense
//! integer indices, shared by training and tagging.
//!
//! Grounded on `huntag/tools.py: BookKeeper`. Ids are assigned in strict
//! first-seen order starting at 0; a side occurrence counter (training only)
//! drives `cutoff`.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Result, TaggerError};

#[derive(Debug, Clone, Default)]
pub struct BookKeeper {
    name_to_id: HashMap<String, u32>,
    counts: HashMap<String, u32>,
    next_id: u32,
}

impl BookKeeper {
    pub fn new() -> Self {
        BookKeeper::default()
    }

    /// Training path: increments the occurrence count and returns the id,
    /// assigning the next integer in first-seen order for a new name.
    pub fn get_or_assign(&mut self, name: &str) -> u32 {
        *self.counts.entry(name.to_string()).or_insert(0) += 1;
        if let Some(&id) = self.name_to_id.get(name) {
            id
        } else {
            let id = self.next_id;
            self.next_id += 1;
            self.name_to_id.insert(name.to_string(), id);
            id
        }
    }

    /// Tagging path: no counting, no mutation.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.name_to_id.get(name).copied()
    }

    pub fn size(&self) -> usize {
        self.name_to_id.len()
    }

    pub fn num_of_names(&self) -> usize {
        self.size()
    }

    /// Builds the id->name reverse map on demand, analogous to the
    /// reference's lazily-constructed `no_to_name`.
    pub fn names_by_id(&self) -> HashMap<u32, String> {
        self.name_to_id
            .iter()
            .map(|(name, &id)| (id, name.clone()))
            .collect()
    }

    /// Removes every name with `count < k`; returns the ids just removed and
    /// compacts the surviving ids to `[0, N')`, preserving their relative
    /// order. Discards the occurrence counter afterwards.
    pub fn cutoff(&mut self, k: u32) -> HashSet<u32> {
        let to_delete: HashSet<u32> = self
            .counts
            .iter()
            .filter(|&(_, &count)| count < k)
            .filter_map(|(name, _)| self.name_to_id.get(name).copied())
            .collect();
        self.counts.clear();

        let mut survivors: Vec<(String, u32)> = self
            .name_to_id
            .drain()
            .filter(|(_, id)| !to_delete.contains(id))
            .collect();
        survivors.sort_by_key(|(_, id)| *id);

        self.name_to_id = survivors
            .into_iter()
            .enumerate()
            .map(|(new_id, (name, _old_id))| (name, new_id as u32))
            .collect();
        self.next_id = self.name_to_id.len() as u32;

        to_delete
    }

    /// Writes `name<TAB>id\n` lines in id order, gzip-compressed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut entries: Vec<(&String, &u32)> = self.name_to_id.iter().collect();
        entries.sort_by_key(|&(_, &id)| id);

        let file = std::fs::File::create(path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        for (name, id) in entries {
            writeln!(encoder, "{name}\t{id}")?;
        }
        encoder.finish()?;
        Ok(())
    }

    /// Reads the table back, recovering the name->id direction and setting
    /// the next-id cursor to `max(id)+1` so that subsequent `get_or_assign`
    /// calls continue the id sequence without collision.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(GzDecoder::new(file));

        let mut name_to_id = HashMap::new();
        let mut max_id: i64 = -1;
        for line in reader.lines() {
            let line = line?;
            let mut parts = line.splitn(2, '\t');
            let name = parts
                .next()
                .ok_or_else(|| TaggerError::format("malformed bookkeeper line"))?;
            let id: u32 = parts
                .next()
                .ok_or_else(|| TaggerError::format("malformed bookkeeper line"))?
                .parse()
                .map_err(|_| TaggerError::format("malformed bookkeeper id"))?;
            name_to_id.insert(name.to_string(), id);
            max_id = max_id.max(id as i64);
        }

        Ok(BookKeeper {
            name_to_id,
            counts: HashMap::new(),
            next_id: (max_id + 1) as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_assign_first_seen_order() {
        let mut bk = BookKeeper::new();
        assert_eq!(bk.get_or_assign("a"), 0);
        assert_eq!(bk.get_or_assign("b"), 1);
        assert_eq!(bk.get_or_assign("a"), 0);
        assert_eq!(bk.size(), 2);
    }

    #[test]
    fn test_lookup_absent() {
        let mut bk = BookKeeper::new();
        bk.get_or_assign("a");
        assert_eq!(bk.lookup("a"), Some(0));
        assert_eq!(bk.lookup("missing"), None);
    }

    /// Insert a,b,c,a,a,b then cutoff(2): only the twice-or-more-seen
    /// entries (a, b) should survive, compacted to ids 0 and 1.
    #[test]
    fn test_cutoff_drops_singleton_entries() {
        let mut bk = BookKeeper::new();
        let c_id = {
            bk.get_or_assign("a");
            bk.get_or_assign("b");
            let c_id = bk.get_or_assign("c");
            bk.get_or_assign("a");
            bk.get_or_assign("a");
            bk.get_or_assign("b");
            c_id
        };

        let deleted = bk.cutoff(2);
        assert_eq!(bk.size(), 2);
        assert_eq!(bk.lookup("a"), Some(0));
        assert_eq!(bk.lookup("b"), Some(1));
        assert_eq!(bk.lookup("c"), None);
        assert!(deleted.contains(&c_id));
    }

    #[test]
    fn test_cutoff_preserves_relative_order() {
        let mut bk = BookKeeper::new();
        bk.get_or_assign("a"); // id 0, count 1 -> removed
        bk.get_or_assign("b"); // id 1, count 2 -> kept
        bk.get_or_assign("b");
        bk.get_or_assign("c"); // id 2, count 3 -> kept
        bk.get_or_assign("c");
        bk.get_or_assign("c");

        bk.cutoff(2);
        assert_eq!(bk.lookup("b"), Some(0));
        assert_eq!(bk.lookup("c"), Some(1));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut bk = BookKeeper::new();
        bk.get_or_assign("alpha");
        bk.get_or_assign("beta");
        bk.get_or_assign("gamma");

        let path = std::env::temp_dir().join(format!("bookkeeper_test_{}.gz", std::process::id()));
        bk.save(&path).unwrap();
        let loaded = BookKeeper::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.lookup("alpha"), Some(0));
        assert_eq!(loaded.lookup("beta"), Some(1));
        assert_eq!(loaded.lookup("gamma"), Some(2));
        assert_eq!(loaded.size(), 3);
    }

    #[test]
    fn test_load_then_continue_assigning_without_collision() {
        let mut bk = BookKeeper::new();
        bk.get_or_assign("alpha");
        bk.get_or_assign("beta");
        let path = std::env::temp_dir().join(format!("bookkeeper_test2_{}.gz", std::process::id()));
        bk.save(&path).unwrap();

        let mut loaded = BookKeeper::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let new_id = loaded.get_or_assign("gamma");
        assert_eq!(new_id, 2);
        assert_eq!(loaded.get_or_assign("alpha"), 0);
    }
}
