//! Crate-level integration tests.

mod end_to_end;
