//! OpenConfig telemetry client: wire subset, typed notifications, and a
//! reconnecting subscriber.
//!
//! The wire structs in [`proto`] are maintained by hand in prost's
//! generated idiom so the crate carries no protoc requirement. Everything
//! downstream of the subscriber works with the typed [`Notification`]
//! model, never the raw wire messages.

pub mod client;
pub mod notification;
pub mod proto;
pub mod subscribe;

pub use notification::{Notification, TelemetryValue, Update};
pub use subscribe::{
    GrpcTransport, ResponseStream, SubscribeError, SubscribeOptions, SubscribeTransport,
    Subscriber,
};
