/// Interned strings with precomputed hashes.
///
/// Every string the compiler touches (identifiers, literals, module names)
/// is interned: equal byte sequences share one `StringId`, so identifier
/// comparison is an integer compare.
use std::collections::HashMap;
use std::fmt;

/// An opaque handle to a string in the interner.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StringId(pub u32);

/// An interned string with its precomputed hash.
#[derive(Clone)]
pub struct ObjString {
    bytes: Box<[u8]>,
    hash: u32,
}

impl ObjString {
    fn new(bytes: &[u8]) -> Self {
        ObjString {
            bytes: bytes.into(),
            hash: fnv1a(bytes),
        }
    }

    /// Get the bytes of this string.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get the length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the string is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Get the precomputed hash.
    pub fn hash(&self) -> u32 {
        self.hash
    }
}

impl fmt::Debug for ObjString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(s) = std::str::from_utf8(&self.bytes) {
            write!(f, "\"{}\"", s)
        } else {
            write!(f, "<binary string len={}>", self.len())
        }
    }
}

/// FNV-1a over the raw bytes.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// String interner: owns every string and deduplicates by content.
#[derive(Debug, Default)]
pub struct StringInterner {
    /// All strings, indexed by StringId.
    strings: Vec<ObjString>,
    /// Lookup table: hash → list of StringIds with that hash.
    lookup: HashMap<u32, Vec<u32>>,
}

impl StringInterner {
    /// Create a new empty interner.
    pub fn new() -> Self {
        StringInterner {
            strings: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Intern a byte string. Returns the existing StringId if already interned.
    pub fn intern(&mut self, bytes: &[u8]) -> StringId {
        let hash = fnv1a(bytes);

        if let Some(ids) = self.lookup.get(&hash) {
            for &id in ids {
                if self.strings[id as usize].as_bytes() == bytes {
                    return StringId(id);
                }
            }
        }

        let id = self.strings.len() as u32;
        self.strings.push(ObjString::new(bytes));
        self.lookup.entry(hash).or_default().push(id);
        StringId(id)
    }

    /// Get a string by its ID.
    pub fn get(&self, id: StringId) -> &ObjString {
        &self.strings[id.0 as usize]
    }

    /// Get the raw bytes of a string by its ID.
    pub fn get_bytes(&self, id: StringId) -> &[u8] {
        self.strings[id.0 as usize].as_bytes()
    }

    /// Get a string by its ID as UTF-8, with a placeholder for binary data.
    pub fn get_str(&self, id: StringId) -> &str {
        std::str::from_utf8(self.get_bytes(id)).unwrap_or("<binary>")
    }

    /// Get the number of strings stored.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if no strings are stored.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
