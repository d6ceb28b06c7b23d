#![allow(dead_code)] // Each integration test binary uses a different subset

pub mod builders;
pub mod recording_sink;
pub mod strategies;

pub use builders::*;
pub use recording_sink::*;
