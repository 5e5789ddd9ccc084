//! End-to-end pipeline tests against `MockDriver`.

mod common;

mod cancel_tests;
mod commit_tests;
mod discard_tests;
mod export_tests;
mod failure_tests;
mod postprocess_tests;
mod validation_tests;
