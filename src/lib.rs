//! T5 Bridge library
//!
//! Multi-headset session management, pose conversion, wand input decoding and
//! stereo frame submission for Tilt Five style AR glasses.

pub mod config;
pub mod coords;
pub mod frame;
pub mod input;
pub mod paths;
pub mod pool;
pub mod runtime;
pub mod sdk;
pub mod session;

pub use config::AppConfig;
pub use pool::DevicePool;
pub use runtime::Runtime;
