pub mod calibration;
#[cfg(feature = "desktop")]
pub mod camera;
pub mod config;
pub mod geometry;
pub mod integrity;
pub mod measure;
pub mod perception;
#[cfg(feature = "desktop")]
pub mod recorder;
pub mod session;
