//! Reading transaction emails from a Gmail mailbox.

mod client;
mod message;

pub use client::{DEFAULT_GMAIL_BASE_URL, GmailClient, MailClient, MailError};
pub use message::{Message, MessageBody, MessageHeader, MessagePart, MessageRef};
