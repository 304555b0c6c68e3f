//! Provision Azure external identity (CIAM) directories through the ARM
//! control plane.

pub mod arm;
pub mod config;
