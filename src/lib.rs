//! Markdown to PDF Conversion Service Library
//!
//! Markdown is injected into a Typst skeleton template and compiled to PDF by
//! an external renderer, under a deadline, with every in-flight render
//! tracked for stats and health reporting.
//!
//! ## Module Overview
//!
//! - `template`: skeleton loading and placeholder substitution
//! - `converter`: the `Renderer` seam and the `typst` CLI implementation
//! - `invoker`: deadline-bounded, cancellable renderer calls
//! - `job` / `registry`: job records and the active-job registry
//! - `service`: the conversion orchestrator
//! - `http`: axum routes for the service
//! - `config` / `cli`: layered configuration and command-line entry points
//! - `telemetry`: logging setup and OpenTelemetry spans
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mdpdf_service::{
//!     converter::TypstCliRenderer,
//!     registry::JobRegistry,
//!     request::ConversionRequest,
//!     service::{ConversionLimits, ConversionService},
//!     template::TemplateSource,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let template = TemplateSource::new("exam-template.typ");
//!     let renderer = TypstCliRenderer::new("typst", template.root_dir(), std::env::temp_dir());
//!     let service = ConversionService::new(
//!         Arc::new(renderer),
//!         Arc::new(JobRegistry::new()),
//!         template,
//!         ConversionLimits::default(),
//!     );
//!
//!     let pdf = service
//!         .convert(ConversionRequest::markdown("# Test").with_filename("report"))
//!         .await
//!         .unwrap();
//!     assert_eq!(pdf.filename, "report.pdf");
//! }
//! ```

pub mod cli;
pub mod config;
pub mod converter;
pub mod error;
pub mod http;
pub mod invoker;
pub mod job;
pub mod registry;
pub mod request;
pub mod service;
pub mod telemetry;
pub mod template;
