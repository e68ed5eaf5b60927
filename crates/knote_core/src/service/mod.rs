//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate rendering, asset storage and note persistence into the
//!   publish/upload use-cases.
//! - Keep the HTTP collaborator decoupled from storage details.

pub mod publish_service;
