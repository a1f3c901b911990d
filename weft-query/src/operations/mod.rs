//! Query operations.
//!
//! - [`Resolver::find`] / [`Resolver::find_one`]: the read entry point
//! - [`Resolver::create`], [`Resolver::bulk_create`],
//!   [`Resolver::set_association`]: seeding and linking writes
//! - [`WriteBatch`]: independent writes run concurrently

mod find;
mod write;

pub use find::{FindOperation, FindOptions, Resolver};
pub use write::WriteBatch;
