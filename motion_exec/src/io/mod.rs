//! # Controllers IO
//!
//! The blackboard shared by every controller of a chain. Values are stored under the FNV-1a hash
//! of their key name in a store with a fixed capacity. Every write is recorded in a per-round
//! "modified" set, which parallel compositions use to detect two siblings writing the same key.
//!
//! The IO performs no internal locking, it is owned by the engine and only ever touched from the
//! control thread.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod value;

pub use value::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::{BTreeSet, HashMap};
use log::{error, warn};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of distinct keys held by the IO.
pub const MAX_PARAMS: usize = 64;

/// Maximum number of keys which can be marked read-only at once.
pub const MAX_READONLY: usize = 16;

/// Maximum length in bytes of a string value.
pub const MAX_STRING_LEN: usize = 32;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Hash of a key name.
pub type KeyHash = u32;

/// A set of key hashes, ordered so that logs are deterministic.
pub type KeySet = BTreeSet<KeyHash>;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    value: Value
}

/// The shared key/value store of a controller chain.
#[derive(Debug, Default)]
pub struct ControllersIO {
    entries: HashMap<KeyHash, Entry>,
    readonly: KeySet,
    modified: KeySet,
    reset_requested: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors returned when writing to the IO.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IoError {
    #[error("Key \"{0}\" is read-only (EACCES)")]
    AccessDenied(String),

    #[error("No space left to store key \"{0}\" (ENOMEM)")]
    OutOfMemory(String)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Hash a key name with 32 bit FNV-1a.
pub fn hash_key(key: &str) -> KeyHash {
    key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
    })
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ControllersIO {
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_capacity(MAX_PARAMS),
            readonly: KeySet::new(),
            modified: KeySet::new(),
            reset_requested: false
        }
    }

    /// Insert or update a value.
    ///
    /// Fails with `AccessDenied` if the key is read-only and with `OutOfMemory` if the key is new
    /// and the store is full. On failure the store is left untouched.
    pub fn set<V: Into<Value>>(&mut self, key: &str, value: V) -> Result<(), IoError> {
        let hash = hash_key(key);

        if self.readonly.contains(&hash) {
            return Err(IoError::AccessDenied(key.to_string()));
        }

        let value = Self::bound_value(key, value.into());

        match self.entries.get_mut(&hash) {
            Some(entry) => entry.value = value,
            None => {
                if self.entries.len() >= MAX_PARAMS {
                    return Err(IoError::OutOfMemory(key.to_string()));
                }
                self.entries.insert(hash, Entry { name: key.to_string(), value });
            }
        }

        if self.modified.len() >= MAX_PARAMS && !self.modified.contains(&hash) {
            warn!("Modified key set is full, \"{}\" is not tracked this round", key);
        }
        else {
            self.modified.insert(hash);
        }

        Ok(())
    }

    /// Write a value, logging any failure instead of returning it.
    ///
    /// This is what controllers use for their outputs: a failed write is a wiring error which
    /// must not stop the tick.
    pub fn write<V: Into<Value>>(&mut self, key: &str, value: V) {
        if let Err(e) = self.set(key, value) {
            error!("ControllersIO write failed: {}", e);
        }
    }

    /// Get the raw value stored under a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(&hash_key(key)).map(|e| &e.value)
    }

    /// Get a value of a specific type.
    ///
    /// Returns `None` if the key is absent or holds another type. A type mismatch is logged as it
    /// always points at a wiring mistake.
    pub fn get_as<T: FromValue>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;

        let v = T::from_value(value);
        if v.is_none() {
            error!(
                "Key \"{}\" holds a {} but was read as a {}",
                key, value.type_name(), T::TYPE_NAME
            );
        }
        v
    }

    /// Get a value, substituting `default` with a warning if it is missing.
    pub fn get_or<T: FromValue>(&self, key: &str, default: T) -> T {
        match self.get_as(key) {
            Some(v) => v,
            None => {
                warn!("Key \"{}\" not available, using default", key);
                default
            }
        }
    }

    /// Whether the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&hash_key(key))
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name of the key with the given hash.
    pub fn key_name(&self, hash: KeyHash) -> Option<&str> {
        self.entries.get(&hash).map(|e| e.name.as_str())
    }

    /// Mark a key as read-only until the next `reset_readonly_markers`.
    pub fn mark_readonly(&mut self, key: &str) -> Result<(), IoError> {
        let hash = hash_key(key);

        if !self.readonly.contains(&hash) && self.readonly.len() >= MAX_READONLY {
            return Err(IoError::OutOfMemory(key.to_string()));
        }

        self.readonly.insert(hash);
        Ok(())
    }

    /// Whether the key is currently read-only.
    pub fn is_readonly(&self, key: &str) -> bool {
        self.readonly.contains(&hash_key(key))
    }

    /// Clear every read-only marker.
    pub fn reset_readonly_markers(&mut self) {
        self.readonly.clear();
    }

    /// Copy of the keys written since the last `clear_modified`.
    pub fn snapshot_modified(&self) -> KeySet {
        self.modified.clone()
    }

    /// Forget the keys written so far this round.
    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }

    /// Take the keys written so far this round, leaving the set empty.
    pub fn take_modified(&mut self) -> KeySet {
        std::mem::take(&mut self.modified)
    }

    /// Add keys back into the set of keys written this round.
    pub fn merge_modified(&mut self, keys: &KeySet) {
        self.modified.extend(keys.iter().copied());
    }

    /// Keys of `new_keys` already present in `already_written`.
    pub fn find_collisions(new_keys: &KeySet, already_written: &KeySet) -> Vec<KeyHash> {
        new_keys.intersection(already_written).copied().collect()
    }

    /// Keys present in `after` but not in `before`.
    pub fn difference(after: &KeySet, before: &KeySet) -> KeySet {
        after.difference(before).copied().collect()
    }

    /// Ask the sequential meta controller currently executing to reset its children.
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    /// Consume a pending reset request.
    pub fn take_reset_request(&mut self) -> bool {
        std::mem::replace(&mut self.reset_requested, false)
    }

    fn bound_value(key: &str, value: Value) -> Value {
        match value {
            Value::Str(mut s) if s.len() > MAX_STRING_LEN => {
                warn!("String value for \"{}\" truncated to {} bytes", key, MAX_STRING_LEN);
                let mut end = MAX_STRING_LEN;
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                s.truncate(end);
                Value::Str(s)
            }
            v => v
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hash_key() {
        assert_eq!(hash_key(""), 0x811c_9dc5);
        assert_eq!(hash_key("a"), 0xe40c_292c);
        assert_eq!(hash_key("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_round_trip() {
        let mut io = ControllersIO::new();

        io.set("f32", 1.5f32).unwrap();
        io.set("f64", -2.25f64).unwrap();
        io.set("i32", 7i32).unwrap();
        io.set("bool", true).unwrap();
        io.set("str", "hello").unwrap();
        io.set("status", TargetPoseStatus::Blocked).unwrap();

        assert_eq!(io.get_as::<f32>("f32"), Some(1.5));
        assert_eq!(io.get_as::<f64>("f64"), Some(-2.25));
        assert_eq!(io.get_as::<i32>("i32"), Some(7));
        assert_eq!(io.get_as::<bool>("bool"), Some(true));
        assert_eq!(io.get_as::<String>("str"), Some("hello".to_string()));
        assert_eq!(io.get_as::<TargetPoseStatus>("status"), Some(TargetPoseStatus::Blocked));

        // Type mismatch and missing key
        assert_eq!(io.get_as::<f64>("i32"), None);
        assert_eq!(io.get_as::<f64>("missing"), None);
        assert_eq!(io.get_or("missing", 3.0f64), 3.0);
    }

    #[test]
    fn test_readonly() {
        let mut io = ControllersIO::new();

        io.set("pose", 10.0).unwrap();
        io.mark_readonly("pose").unwrap();

        assert_eq!(
            io.set("pose", 20.0),
            Err(IoError::AccessDenied("pose".to_string()))
        );
        assert_eq!(io.get_as::<f64>("pose"), Some(10.0));

        io.reset_readonly_markers();
        io.set("pose", 20.0).unwrap();
        assert_eq!(io.get_as::<f64>("pose"), Some(20.0));

        // The read-only set is bounded too
        for i in 0..MAX_READONLY {
            io.mark_readonly(&format!("ro_{}", i)).unwrap();
        }
        assert!(io.mark_readonly("one_too_many").is_err());
        assert!(io.mark_readonly("ro_0").is_ok());
    }

    #[test]
    fn test_capacity() {
        let mut io = ControllersIO::new();

        for i in 0..MAX_PARAMS {
            io.set(&format!("key_{}", i), i as i32).unwrap();
        }
        assert_eq!(io.len(), MAX_PARAMS);

        assert_eq!(
            io.set("new_key", 0),
            Err(IoError::OutOfMemory("new_key".to_string()))
        );
        assert!(!io.contains("new_key"));

        // Existing keys can still be updated
        io.set("key_3", 42).unwrap();
        assert_eq!(io.get_as::<i32>("key_3"), Some(42));
    }

    #[test]
    fn test_modified_tracking() {
        let mut io = ControllersIO::new();

        io.set("a", 1.0).unwrap();
        let before = io.snapshot_modified();
        io.set("b", 2.0).unwrap();
        io.set("a", 3.0).unwrap();
        let after = io.snapshot_modified();

        let just_written = ControllersIO::difference(&after, &before);
        assert_eq!(just_written, vec![hash_key("b")].into_iter().collect::<KeySet>());

        let collisions = ControllersIO::find_collisions(&after, &before);
        assert_eq!(collisions, vec![hash_key("a")]);
        assert_eq!(io.key_name(hash_key("a")), Some("a"));

        io.clear_modified();
        assert!(io.snapshot_modified().is_empty());
    }

    #[test]
    fn test_take_and_merge_modified() {
        let mut io = ControllersIO::new();

        io.set("a", 1.0).unwrap();
        let round = io.take_modified();
        assert!(io.snapshot_modified().is_empty());

        // Rewriting a key of the round is seen again once the set was taken
        io.set("a", 2.0).unwrap();
        assert_eq!(io.snapshot_modified(), round);

        io.set("b", 3.0).unwrap();
        io.merge_modified(&round);
        assert_eq!(
            io.snapshot_modified(),
            vec![hash_key("a"), hash_key("b")].into_iter().collect::<KeySet>()
        );
    }

    #[test]
    fn test_string_truncation() {
        let mut io = ControllersIO::new();

        io.set("name", "x".repeat(40)).unwrap();
        assert_eq!(io.get_as::<String>("name").map(|s| s.len()), Some(MAX_STRING_LEN));
    }
}
