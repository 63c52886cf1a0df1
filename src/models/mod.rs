pub mod equipment;
pub mod icon;
pub mod otp;
pub mod registration;
pub mod user;

pub use equipment::*;
pub use icon::*;
pub use otp::*;
pub use registration::*;
pub use user::*;
