//! Library level constants.

/// Largest accepted UDP datagram, in bytes. Larger datagrams are truncated
/// by the receive call and the tail is lost.
pub const MAX_DATAGRAM_LENGTH: usize = 1024;

/// Exit code used when the configuration can not be loaded.
pub const EXIT_BAD_CONFIGURATION: i32 = 1;

/// Exit code used when a second terminate signal interrupts the shutdown
/// sequence.
pub const EXIT_FORCE_QUIT: i32 = 2;
