//! Core value types shared by the Lino chain modules.

pub mod account;
pub mod coin;
pub mod dec;

pub use account::*;
pub use coin::*;
pub use dec::*;

/// Block time in whole seconds since the Unix epoch.
pub type UnixTime = i64;
