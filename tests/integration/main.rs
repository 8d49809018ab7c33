// Integration test suite for the file-exchange control plane.
//
// Organized into focused modules by feature area. Each module tests a
// specific API surface. All modules share common::TestClient for DB
// lifecycle management.

mod common;

mod admission;
mod expiry;
mod invariants;
mod shares;
mod signaling;
mod system;
