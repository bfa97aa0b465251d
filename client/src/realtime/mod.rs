pub mod channel;
pub mod socket;

pub use channel::{ChannelEvent, ChannelSender};
pub use socket::RealtimeChannel;
