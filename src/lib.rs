//! Terminal chat client for a single request/reply endpoint.
//!
//! The [`controller::Controller`] drives each exchange: it renders the
//! user's message and a pending indicator into a [`transcript::ChatView`],
//! posts the text through a [`reply::ReplyService`] and replaces the
//! indicator with the reply, or with a fixed apology when the reply is
//! unavailable.

pub mod config;
pub mod controller;
pub mod markup;
pub mod render;
pub mod reply;
pub mod terminal;
pub mod transcript;
pub mod types;
