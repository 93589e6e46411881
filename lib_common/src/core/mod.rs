//! # Core Engine Module
//!
//! The push side of the service: subscriptions, wire frames and the broadcast
//! manager that ties them to the price list.
//!
//! ## Core Components:
//!
//! - **`broadcast_manager`**: owns the records and the subscriber set, and runs
//!   the jittered scheduler that updates one record per tick and fans the
//!   result out to every subscriber.
//!
//! - **`subscription`**: the [`EventSink`] seam between the manager and a
//!   transport, plus the id-tagged [`Subscription`] handle.
//!
//! - **`event_frame`**: encoding of records into `data: <json>\n\n` frames and
//!   the matching decoder for stream consumers.

pub mod broadcast_manager;
pub mod event_frame;
pub mod subscription;

pub use broadcast_manager::{
    BroadcastError, BroadcastManager, ManagerOptions, ManagerStats, SchedulerPolicy, SchedulerState,
    SubscriptionGuard, TickSchedule, DEFAULT_MAX_DELAY, DEFAULT_MIN_DELAY,
};
pub use event_frame::{encode_frame, parse_frame, FrameBuffer, FrameError};
pub use subscription::{EventSink, SinkError, Subscription, SubscriptionId};
