//! Database models split into domain-specific modules.

pub mod audit;
pub mod catalog;
pub mod common;
pub mod lease;
pub mod listing;
pub mod maintenance;
pub mod payment;
pub mod registration;
pub mod user;
pub mod viewing;

pub use audit::*;
pub use catalog::*;
pub use common::*;
pub use lease::*;
pub use listing::*;
pub use maintenance::*;
pub use payment::*;
pub use registration::*;
pub use user::*;
pub use viewing::*;
