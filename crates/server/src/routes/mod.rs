// crates/server/src/routes/mod.rs
pub mod assets;
pub mod status;
