//! Pod admin API: user directory and companion app provisioning.

pub mod client;

pub use client::PodClient;
