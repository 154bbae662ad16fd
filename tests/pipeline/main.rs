// Record pipeline integration tests

#[path = "../common/mod.rs"]
mod common;
