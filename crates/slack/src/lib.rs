//! Slack Integration - Socket Mode bot interface
//!
//! This crate provides the Slack interface for redbridge:
//! - **Socket Mode** (`transport`) - WebSocket connection to Slack (no public URL needed)
//! - **Slash Commands** (`commands`) - `/issues`, `/help`, etc.
//! - **Events** (`events`) - App mentions and the wire envelope model
//! - **Reports** (`report`) - Assigned-issue report formatting
//! - **Attachments** (`attachment`) - Reply payloads with audit stamping
//! - **Web API** (`api`) - `auth.test`, `chat.postMessage`, `users.info`
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and subscribe to the `app_mention` event
//! 3. Add slash commands: `/issues`, `/help`
//! 4. Set env vars: `REDBRIDGE_SLACK_APP_TOKEN`, `REDBRIDGE_SLACK_BOT_TOKEN`
//!
//! # Architecture
//!
//! ```text
//! Slack Socket Mode → SocketModeTransport → SocketModeRunner → EventDispatcher
//!                                                                   ↓
//!                         chat.postMessage ← OutboundReply ← Handlers → Tracker
//! ```
//!
//! # Key Types
//!
//! - `SocketModeRunner` - Single-consumer event loop (ack, dispatch, reply)
//! - `SocketModeTransport` - WebSocket transport with reconnection
//! - `EventDispatcher` - Routes envelopes to the bound handlers
//! - `CommandRouter` - Maps slash verbs to replies
//! - `IssueReportService` - Trait bridging `/issues` to the tracker

pub mod api;
pub mod attachment;
pub mod commands;
pub mod events;
pub mod report;
pub mod socket;
pub mod transport;
