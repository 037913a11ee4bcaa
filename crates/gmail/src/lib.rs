//! Gmail REST API client
//!
//! A thin wrapper over the Gmail v1 endpoints used by Flow Mail: listing and
//! reading messages, sending, label changes, drafts and the mailbox profile.

pub mod client;
pub mod compose;
pub mod error;
pub mod normalize;
pub mod types;

pub use client::GmailClient;
pub use error::GmailError;
pub use normalize::{category_label, DraftSummary, EmailDetail, EmailSummary, Sender};
