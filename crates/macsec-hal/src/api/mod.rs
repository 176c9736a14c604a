//! Driver interface and implementations.
//!
//! - [`driver`]: the flat [`MacsecDriver`] trait every PHY backend implements
//! - [`register`]: [`RegisterDriver`], the register-map backend over a
//!   [`RegisterTransport`](crate::transport::RegisterTransport)

pub mod driver;
pub mod register;

pub use driver::MacsecDriver;
pub use register::{PollConfig, RegisterDriver};
