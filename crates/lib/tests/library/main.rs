//! Integration tests for the public generation API.

mod common;
mod dispatch_tests;
mod generate_tests;
