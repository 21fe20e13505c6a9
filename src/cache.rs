//! Optional cache-file persistence for resuming or testing a run without
//! redoing earlier phases (spec §6 "Cache files").
//!
//! Format is deliberately plain text, one record per line -- the spec leaves
//! the on-disk form unspecified beyond "an ASCII JSON-like textual form is
//! sufficient", so this picks the simplest thing that round-trips.

use std::collections::HashSet;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::GraftError;
use crate::hash::ObjectHash;
use crate::rewrite::ConcurrentMap;

/// Writes the flattened Phase-1 blob selection (`blobs.cache`), one hex hash
/// per line.
pub fn save_blob_selection(path: &Path, selected: &HashSet<ObjectHash>) -> Result<(), GraftError> {
    let mut out = std::fs::File::create(path)?;
    for hash in selected {
        writeln!(out, "{hash}")?;
    }
    Ok(out.flush()?)
}

pub fn load_blob_selection(path: &Path) -> Result<HashSet<ObjectHash>, GraftError> {
    let file = std::fs::File::open(path)?;
    let mut selected = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        selected.insert(line.parse()?);
    }
    Ok(selected)
}

/// Writes a `source_hash target_hash` mapping cache (`tree_map` or
/// `blob_map`/`commit_map`), one pair per line.
pub fn save_mapping(path: &Path, map: &ConcurrentMap) -> Result<(), GraftError> {
    let mut out = std::fs::File::create(path)?;
    for (source, target) in map.to_hash_map() {
        writeln!(out, "{source} {target}")?;
    }
    Ok(out.flush()?)
}

pub fn load_mapping(path: &Path) -> Result<ConcurrentMap, GraftError> {
    let file = std::fs::File::open(path)?;
    let map = ConcurrentMap::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (source, target) = line
            .split_once(' ')
            .ok_or_else(|| GraftError::Protocol(format!("malformed cache line: {line:?}")))?;
        map.insert_or_check(source.parse()?, target.parse()?)?;
    }
    Ok(map)
}
