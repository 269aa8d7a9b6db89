//! HTTP session construction shared by the entitlement and pod clients.

pub mod client;

pub use client::{Session, SessionFactory, SessionFactoryBuilder};
