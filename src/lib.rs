// Library crate exposing modules for the binary and integration tests

pub mod error;
pub mod model;
pub mod parser;
pub mod repository;
pub mod source;
pub mod util;
