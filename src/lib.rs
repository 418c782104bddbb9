//! parviz: visualize the results of a remote parametric energy study.
//!
//! The pipeline is a linear sequence over two external collaborators: parse
//! a job URL, fetch run metadata, download and unzip per-run artifacts,
//! extract one EUI scalar per run, assemble the runs table into a
//! parallel-coordinates chart, and convert-and-serve the geometry of a
//! selected option.

pub mod api;
pub mod app;
pub mod chart;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod fs_util;
pub mod output;
pub mod session;
pub mod table;
pub mod tui;
pub mod viewer;
