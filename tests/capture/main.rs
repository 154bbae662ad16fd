// Capture integration tests

mod provision_test;
