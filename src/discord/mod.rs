mod ipc;
mod transport;

pub use transport::DiscordTransport;
