//! In-process store provider.
//!
//! [`MemoryLimitStore`] keeps quota records inside the current process using a
//! [`DashMap`](dashmap::DashMap). Per-key operations run under the map's shard lock, so
//! the increment primitives are atomic with respect to each other.
//!
//! # When to Use
//!
//! ✅ **Use the memory store when:**
//! - A single process serves all requests
//! - Writing tests against the guard
//!
//! ❌ **Don't use the memory store when:**
//! - Several stateless workers must share quotas (use the Redis store)
//! - Quotas must survive process restarts

mod memory_limit_store;
pub use memory_limit_store::*;
