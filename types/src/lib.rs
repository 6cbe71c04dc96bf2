pub mod config;
pub mod containers;
pub mod keys;
pub mod nonstandard;
pub mod primitives;
pub mod state;
