//! Database seeding functionality
//!
//! Local and test profiles can load a church directory fixture so the matcher has
//! something to match against without the surrounding platform.

pub mod directory;

pub use directory::{DirectoryFixture, seed_directory, seed_directory_from_path};
