//! Envoy Display Library
//!
//! This library polls an Enphase IQ Gateway for production and consumption
//! telemetry and shows the power left over on a Yoctopuce display.

pub mod config;
pub mod display_loop;
pub mod enphase_cloud;
pub mod error;
pub mod format;
pub mod gateway;
pub mod session;
pub mod telemetry;
pub mod yocto_display;

// Re-export commonly used types for easier access
pub use config::{Config, CredentialStore, Credentials};
pub use enphase_cloud::{CloudAuthenticator, EnphaseAuthentication};
pub use error::Error;
pub use format::format_watts;
pub use gateway::{Gateway, GatewayApi, GatewayClient, GatewayConnector};
pub use session::establish_session;
pub use telemetry::{fetch_reading, Reading};
pub use yocto_display::{Display, YoctoDisplay};
