//! Core utilities for Cinder.
//!
//! This crate provides foundational types shared by the syntax and runtime layers:
//! - `span`: Source location tracking and line/column lookup
//! - `diagnostics`: Error reporting

pub mod diagnostics;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticSeverity, Label};
pub use span::{LineCol, LineIndex, Span};
