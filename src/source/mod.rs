//! Network listeners feeding raw payloads into the router.

pub mod tcp;
pub mod udp;

pub use self::tcp::Tcp;
pub use self::udp::Udp;
