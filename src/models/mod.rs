//! Core data models for the presigned upload gateway.
//!
//! `UploadRecord` maps to the metadata table via `sqlx::FromRow`; fragments
//! and landing events are wire-only shapes carried through `serde`.

pub mod event;
pub mod fragment;
pub mod upload;
