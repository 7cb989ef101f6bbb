//! Map backend used for the tick index and checkpoint ledger.
//!
//! Exactly one of the `rustc-hash` / `ahash` features selects a fast hasher.
//! Enabling none, both, or `std-hash` falls back to the standard `HashMap`.

#[cfg(all(
    feature = "rustc-hash",
    not(feature = "ahash"),
    not(feature = "std-hash")
))]
pub type FastMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[cfg(all(
    feature = "ahash",
    not(feature = "rustc-hash"),
    not(feature = "std-hash")
))]
pub type FastMap<K, V> = ahash::AHashMap<K, V>;

#[cfg(not(any(
    all(
        feature = "rustc-hash",
        not(feature = "ahash"),
        not(feature = "std-hash")
    ),
    all(
        feature = "ahash",
        not(feature = "rustc-hash"),
        not(feature = "std-hash")
    ),
)))]
pub type FastMap<K, V> = std::collections::HashMap<K, V>;
