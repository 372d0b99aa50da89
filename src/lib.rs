#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod common;
pub use common::{DailyLimit, KeySegment, LimitTier};

mod error;
pub use error::*;

mod clock;
pub use clock::*;

mod policy;
pub use policy::*;

mod key_scheme;
pub use key_scheme::*;

mod store;
pub use store::*;

mod local;
pub use local::*;

#[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
mod redis;
#[cfg(any(feature = "redis-tokio", feature = "redis-smol"))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "redis-tokio", feature = "redis-smol"))))]
pub use self::redis::*;

mod throttle;
pub use throttle::*;

mod guard;
pub use guard::*;

#[cfg(test)]
mod tests;
