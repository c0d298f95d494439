pub mod packet;
pub mod receive;

pub use receive::AudioReceiver;

pub const DEFAULT_LISTEN_PORT: u16 = 5478;
