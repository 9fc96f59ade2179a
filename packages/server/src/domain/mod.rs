//! Domain layer: value objects, events, errors and the ports the use cases
//! depend on.
//!
//! Infrastructure implements the ports (`Authenticator`, `MessageGateway`,
//! `PresenceStore`, `BroadcastBus`); the domain never depends on a concrete
//! backend.

pub mod auth;
pub mod bus;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod presence;
pub mod registry;
pub mod value_object;

pub use auth::Authenticator;
pub use bus::{BroadcastBus, EventStream};
pub use entity::{ChatEvent, MessageRecord, PresenceCountEvent, RoomEvent};
pub use error::{AuthError, BusError, GatewayError, PresenceError, ProtocolError, ValueObjectError};
pub use gateway::MessageGateway;
pub use presence::PresenceStore;
pub use registry::{ConnectionHandle, ConnectionRegistry, EventReceiver, EventSender};
pub use value_object::{ConnectionId, MessageContent, NodeId, RoomId, Timestamp, UserId, Username};
