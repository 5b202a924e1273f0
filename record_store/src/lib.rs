//! Local implementation of the record store contract.

mod db;
mod events;
mod store;
mod tree;

pub use store::LocalStore;
