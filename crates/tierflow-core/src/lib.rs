//! Core types for Tierflow layouts.
//!
//! This crate holds the vocabulary shared by the layout engine and its
//! consumers: logical geometry, the workflow graph model and the
//! [`node::NodeLike`] abstraction implemented by both real graph nodes and
//! the ephemeral placeholders created for open branches.
//!
//! # Overview
//!
//! - [`geometry`] - Points, sizes, bounds and the canvas view transform.
//! - [`node`] - Node kinds, the [`node::NodeLike`] trait and [`node::VirtualEndpoint`].
//! - [`model`] - Graph nodes, edges and open branch declarations.

pub mod geometry;
pub mod model;
pub mod node;
