use crate::{hash64, Hash64, IdKey};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

/// Lookup from id-string hashes back to the strings they were made from.
///
/// Every string is registered under its full 64-bit hash and under the low
/// 32 bits. When two strings share a key the later one wins.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    full: HashMap<Hash64, String>,
    short: HashMap<u32, String>,
}

fn id_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#ID\[([0-9a-fA-F]+)\]").expect("id tag pattern"))
}

impl SymbolTable {
    /// Build a table from consecutive NUL-terminated strings. The end of the
    /// buffer terminates the last string.
    pub fn parse(buffer: &[u8]) -> Self {
        let mut table = SymbolTable::default();
        let mut start = 0;
        while start < buffer.len() {
            let end = buffer[start..].iter().position(|&b| b == 0).map_or(buffer.len(), |n| start + n);
            table.insert(&buffer[start..end]);
            start = end + 1;
        }
        tracing::debug!(strings = table.full.len(), "parsed id string table");
        table
    }

    /// Read and parse a string table file (usually `strings.txt` in a project's data dir).
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::parse(&bytes))
    }

    fn insert(&mut self, raw: &[u8]) {
        let hash = hash64(raw);
        let s = String::from_utf8_lossy(raw).into_owned();
        self.short.insert(hash.low32(), s.clone());
        self.full.insert(hash, s);
    }

    pub fn get(&self, hash: Hash64) -> Option<&str> {
        self.full.get(&hash).map(String::as_str)
    }

    pub fn get_short(&self, id: u32) -> Option<&str> {
        self.short.get(&id).map(String::as_str)
    }

    pub fn lookup(&self, key: IdKey) -> Option<&str> {
        match key {
            IdKey::Full(h) => self.get(h),
            IdKey::Short(id) => self.get_short(id),
        }
    }

    /// Look up an 8- or 16-digit hex key. Anything else resolves to nothing.
    pub fn lookup_hex(&self, hex: &str) -> Option<&str> {
        hex.parse::<IdKey>().ok().and_then(|k| self.lookup(k))
    }

    pub fn len(&self) -> usize {
        self.full.len()
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Hash64, &str)> {
        self.full.iter().map(|(h, s)| (*h, s.as_str()))
    }

    /// Replace every `#ID[<hex>]` tag in `text` with the string it names.
    /// Tags that do not resolve are left as they are.
    pub fn substitute<'a>(&self, text: &'a str) -> Cow<'a, str> {
        id_tag().replace_all(text, |caps: &Captures| match self.lookup_hex(&caps[1]) {
            Some(s) => s.to_string(),
            None => caps[0].to_string(),
        })
    }
}
