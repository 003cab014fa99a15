//! Hash collections with the FxHash hasher.
//!
//! All hot-path maps in the engine key on short strings (paths, node ids);
//! FxHash beats SipHash there and the keys are never attacker-controlled
//! across a trust boundary.

pub use rustc_hash::{FxHashMap, FxHashSet};
