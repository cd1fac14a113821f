//! Lino bandwidth module.
//!
//! Decides, once per block and with fixed-point arithmetic only, what fee an
//! ordinary message must pay and how many messages each registered app may
//! submit for its users:
//! - network-wide EMAs of the general and app message rates
//! - a general fee and an app vacancy coefficient priced from those EMAs
//! - a per-app credit bucket refilled at a stake-weighted rate
//! - a punishment coefficient for apps exceeding their expected rate

pub mod block_stats;
pub mod credit;
pub mod deps;
pub mod errors;
pub mod manager;
pub mod math;
pub mod model;
pub mod params;
pub mod rate_stats;
pub mod storage;

pub use deps::*;
pub use errors::*;
pub use manager::BandwidthManager;
pub use math::approx_exp;
pub use model::*;
pub use params::BandwidthParams;
