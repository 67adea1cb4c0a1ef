//! Workspace-level integration tests for subwire.
//!
//! The tests under `tests/` exercise `subwire-process` end to end against
//! real OS processes (`echo`, `cat`, `sh`, `sleep`).
