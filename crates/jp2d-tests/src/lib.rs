//! End-to-end tests for the jp2d crates.
//!
//! These run the whole derivative pipeline against fixtures generated in
//! temp directories. The encoder is replaced by [`FakeEncoder`]-style
//! runners, so no encoder binary is required.

#[cfg(test)]
mod support;
