//! Network transports that produce secure channels.

mod tcp;

pub use tcp::{ChannelListener, TcpTransport};
