//! Integration layer - External system interfaces.
//!
//! This module contains the seams to the outside world:
//! - The transport contract implemented by `dotbot-transport`
//! - The connector contract implemented by the service adapters
//! - The shared session engine connectors embed
//! - The chatter tying a connector to a dispatcher

pub mod chatter;
pub mod connector;
pub mod session;
pub mod transport;

pub use chatter::Chatter;
pub use connector::{
    BoxedConnector, Connector, Delivery, MessageSink, SendHook, SessionParams, downcast_connector,
};
pub use session::{Link, LinkState, SessionHandler};
pub use transport::{BoxedTransport, Transport, TransportEvent, TransportHandle, TransportSession};
