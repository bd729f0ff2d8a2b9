//! Command implementations

pub mod list;
pub mod live;
pub mod record;
pub mod relay;
pub mod serve;
