// Relay runtime integration tests

#[path = "../common/mod.rs"]
mod common;

mod relay_test;
