// Configuration integration tests

mod config_test;
