//! Service layer: the upload-session manager, the completion reconciler,
//! and the collaborator contracts they are constructed over.

pub mod metadata_store;
pub mod notifier;
pub mod object_gateway;
pub mod reconciler;
pub mod upload_service;
