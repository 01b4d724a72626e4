//! Library surface for the storage engine and statement layer, split out of the binary so
//! integration tests (and any future embedding caller) can drive a `Table` directly instead
//! of shelling out to the REPL.
pub mod command;
pub mod errors;
pub mod repl;
pub mod storage;
