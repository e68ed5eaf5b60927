//! Markdown to display-markup rendering.
//!
//! # Responsibility
//! - Convert raw note text into HTML that can be embedded without further
//!   escaping.

pub mod markup;
