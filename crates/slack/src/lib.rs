//! Slack Block Kit messages for procurement approvals
//!
//! This crate renders the messages the server posts to a Slack incoming
//! webhook:
//! - **Approval requests** - comparison summary, policy violations and
//!   Approve/Reject buttons keyed by comparison id
//! - **Decision notices** - outcome of a recorded approval, with the purchase
//!   order when one was issued
//!
//! `MessageTemplate` serializes directly to the webhook request body.

pub mod blocks;

pub use blocks::{
    approval_decision_message, comparison_approval_message, error_message, MessageBuilder,
    MessageTemplate,
};
