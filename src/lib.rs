//! bunkhouse Library
//!
//! Event-sourced reservations of shared sleeping accommodations.
//! Re-exports modules for integration testing and external use.

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod domain;
pub mod event_store;
pub mod handlers;
pub mod memory;
pub mod migration;
pub mod projection;
pub mod queries;
pub mod repository;
pub mod services;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use domain::{DomainError, OperationContext};
pub use error::AppError;
pub use services::{Services, Settings, Stores};
