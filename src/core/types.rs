//! Core type aliases and re-exports

pub use glam::{
    Vec2, Vec3,
    Mat4,
    Quat,
};

/// Standard Result type for the paging core
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;
