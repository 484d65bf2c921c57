//! Vocabulary types shared across the txcache crates
//!
//! Everything in here is identity and data: cache keys and values, the opaque
//! handle naming a local transaction, the global branch identifier the
//! transaction manager hands out, and the XA protocol flags.

use std::fmt;

/// Key identifying one cache entry.
///
/// Keys are the unit of conflict detection: two transactions touching
/// different keys never interfere with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a key from anything string-like.
    pub fn new(key: impl Into<String>) -> Self {
        CacheKey(key.into())
    }

    /// Borrow the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey(key.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        CacheKey(key)
    }
}

/// Value stored in the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit absence of a value
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// UTF-8 string value
    Str(String),
    /// Raw bytes value
    Bytes(Vec<u8>),
}

/// A key/value pair: the unit the store holds and write commands carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Key of this entry
    pub key: CacheKey,
    /// Value of this entry
    pub value: Value,
}

impl Element {
    /// Create an element from a key and value.
    pub fn new(key: impl Into<CacheKey>, value: Value) -> Self {
        Element {
            key: key.into(),
            value,
        }
    }
}

/// Opaque identity of the local transaction object supplied by the external
/// transaction manager.
///
/// Equality and hashing follow whatever the transaction manager considers
/// "the same transaction": repeated lookups within one branch's lifetime must
/// yield handles that compare equal. All per-transaction bookkeeping (context
/// table, version checkouts) is keyed by this identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnHandle(u64);

impl TxnHandle {
    /// Wrap a raw transaction identity.
    pub fn new(raw: u64) -> Self {
        TxnHandle(raw)
    }

    /// The raw identity value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Global transaction branch identifier: the X/Open triple of format id,
/// global transaction id and branch qualifier.
///
/// Issued by the external transaction manager, immutable for the lifetime of
/// the branch, and used as the external-facing key for every protocol call.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Gtrid {
    format_id: u32,
    global_id: Vec<u8>,
    branch_qualifier: Vec<u8>,
}

impl Gtrid {
    /// Create a branch identifier from its three parts.
    pub fn new(
        format_id: u32,
        global_id: impl Into<Vec<u8>>,
        branch_qualifier: impl Into<Vec<u8>>,
    ) -> Self {
        Gtrid {
            format_id,
            global_id: global_id.into(),
            branch_qualifier: branch_qualifier.into(),
        }
    }

    /// The format identifier.
    pub fn format_id(&self) -> u32 {
        self.format_id
    }

    /// The global transaction id bytes.
    pub fn global_id(&self) -> &[u8] {
        &self.global_id
    }

    /// The branch qualifier bytes.
    pub fn branch_qualifier(&self) -> &[u8] {
        &self.branch_qualifier
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

impl fmt::Display for Gtrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.format_id)?;
        write_hex(f, &self.global_id)?;
        f.write_str(":")?;
        write_hex(f, &self.branch_qualifier)
    }
}

impl fmt::Debug for Gtrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gtrid({})", self)
    }
}

/// XA protocol flags passed to `start`, `end` and `recover`.
///
/// The values are the standard X/Open constants.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct XaFlags(u32);

impl XaFlags {
    /// No flags
    pub const NONE: XaFlags = XaFlags(0);
    /// Join an existing branch
    pub const JOIN: XaFlags = XaFlags(0x0020_0000);
    /// End a recovery scan
    pub const END_RSCAN: XaFlags = XaFlags(0x0080_0000);
    /// Start a recovery scan
    pub const START_RSCAN: XaFlags = XaFlags(0x0100_0000);
    /// Suspend the association with the branch
    pub const SUSPEND: XaFlags = XaFlags(0x0200_0000);
    /// Portion of work completed successfully
    pub const SUCCESS: XaFlags = XaFlags(0x0400_0000);
    /// Resume a suspended association
    pub const RESUME: XaFlags = XaFlags(0x0800_0000);
    /// Portion of work failed
    pub const FAIL: XaFlags = XaFlags(0x2000_0000);
    /// Caller is using one-phase optimization
    pub const ONE_PHASE: XaFlags = XaFlags(0x4000_0000);

    /// Build flags from a raw bit pattern.
    pub fn from_bits(bits: u32) -> Self {
        XaFlags(bits)
    }

    /// The raw bit pattern.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// True when every bit of `other` is set in `self`.
    pub fn contains(self, other: XaFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl fmt::Debug for XaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XaFlags(0x{:08x})", self.0)
    }
}
