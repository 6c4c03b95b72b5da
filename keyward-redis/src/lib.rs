#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod connection;
pub mod connector;
pub mod error;

#[doc(inline)]
pub use crate::connection::RedisConnection;
#[doc(inline)]
pub use crate::connector::{RedisConnector, RedisConnectorBuilder};
#[doc(inline)]
pub use crate::error::Error;
