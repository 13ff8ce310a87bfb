//! Blacar Core — shared persistence and domain abstractions.
//!
//! This crate defines the building blocks every bounded context depends
//! on: the criteria/filter compiler, the repository contract, the domain
//! event broker, and the aggregate-root lifecycle. It contains no
//! infrastructure code.

pub mod broker;
pub mod clock;
pub mod criteria;
pub mod entity;
pub mod error;
pub mod event;
pub mod filters;
pub mod pagination;
pub mod repository;
pub mod value;
