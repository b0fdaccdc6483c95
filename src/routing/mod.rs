//! Request routes and the bucket keys they share quota under.

pub mod endpoints;
mod route;

pub use route::{Route, RouteBuilder, PLACEHOLDER};
