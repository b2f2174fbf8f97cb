//! Slack Integration - Socket Mode bot interface
//!
//! This crate provides the Slack interface for the EchoLab bots:
//! - **Socket Mode** (`socket`) - WebSocket connection to Slack (no public URL needed)
//! - **Commands** (`commands`) - `/summary`, `/reload`, `/status [log]`, `/help` and mentions
//! - **Events** (`events`) - envelope parsing and dispatch to the command router
//! - **Block Kit** (`blocks`) - message builders and the text tables the bot replies with
//! - **Web API** (`web`) - channel history, posting replies, file downloads
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and subscribe to the `app_mention` event
//! 3. Add slash commands: `/summary`, `/reload`, `/status`, `/help`
//! 4. Set env vars: `ECHOLAB_SLACK_APP_TOKEN`, `ECHOLAB_SLACK_BOT_TOKEN`
//!
//! # Architecture
//!
//! ```text
//! Slack Envelopes → EventDispatcher → CommandRouter → CommandService
//!                        ↓
//!                  chat.postMessage ← MessageTemplate
//! ```

pub mod blocks;
pub mod commands;
pub mod events;
pub mod socket;
pub mod web;
