//! # Subscribers: receive capability and subscriber handles.
//!
//! A subscriber is two things kept apart on purpose:
//! - the [`Receive`] capability (what happens with a payload), and
//! - the [`Subscriber`] handle (id + membership bookkeeping around that capability).
//!
//! ## Architecture
//! ```text
//! Topic::publish(payload)
//!     └──► NotificationDispatcher ──► Subscriber::receive(&payload)
//!                                          │
//!                                          └──► Receive::on_payload(&payload)
//!                                                    │
//!                                      ┌─────────────┼──────────────┐
//!                                      ▼             ▼              ▼
//!                                  ReceiveFn     LogWriter     custom impl
//! ```
//!
//! ## Built-in receivers
//! - [`ReceiveFn`] closure adapter
//! - `LogWriter` (feature `logging`) logs every payload through `tracing`

mod receive;
mod receive_fn;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use receive::Receive;
pub use receive_fn::ReceiveFn;
pub use subscriber::Subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
