//! Redis store provider.
//!
//! Lets any number of stateless workers share quota state through one Redis
//! deployment. See [`RedisLimitStore`].

mod common;
pub use common::*;

mod redis_limit_store;
pub use redis_limit_store::*;
