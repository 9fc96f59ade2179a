//! UseCase layer: the per-connection room session and the process-wide
//! presence and broadcast services it drives.

pub mod broadcast;
pub mod context;
pub mod error;
pub mod heartbeat;
pub mod presence;
pub mod relay;
pub mod room_session;

pub use broadcast::{Delivery, RoomBroadcaster};
pub use context::SessionContext;
pub use error::SessionError;
pub use heartbeat::spawn_presence_heartbeat;
pub use presence::{PresenceSnapshot, PresenceTracker};
pub use relay::RoomRelay;
pub use room_session::{RoomSession, SessionState};
