//! Delivery Route Optimizer
//!
//! Turns a set of geocoded delivery stops and a fleet of vehicles into
//! ordered routes. Routes come from the HERE Tour Planning v3 service when
//! it answers in time, and from a local nearest-neighbor + 2-opt heuristic
//! when it does not, so a caller always gets drivable routes.
//!
//! # Pipeline
//!
//! - [`clustering`]: split stops by city label or geographic proximity
//! - [`depot`]: pick the depot (explicit, geocoded, centroid, clamped)
//! - [`problem`]: build the tour-planning problem document
//! - [`tour_planning`]: submit, poll and decode remote solutions
//! - [`heuristics`]: nearest neighbor and 2-opt fallback routing
//! - [`orchestrator`]: the remote-first, heuristic-fallback policy
//!
//! # Outer surface
//!
//! - [`service`]: background jobs with cancellation
//! - [`api`]: axum REST endpoints and Swagger UI

pub mod api;
pub mod auth;
pub mod cache;
pub mod clustering;
pub mod config;
pub mod console;
pub mod converters;
pub mod demo_data;
pub mod depot;
pub mod domain;
pub mod dto;
pub mod error;
pub mod geocoding;
pub mod heuristics;
pub mod orchestrator;
pub mod problem;
pub mod service;
pub mod tour_planning;
