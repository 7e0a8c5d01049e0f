//! HTTP handlers for catalog entities.

pub mod entity;
