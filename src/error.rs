/// Errors returned by the relay board library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The relay index cannot be encoded into a one byte channel number.
    #[error("Value out of range")]
    RangeError,
    /// The relay index is outside of the channels reported by the board.
    #[error("Relay index {index} out of range, board has {count} relays")]
    IndexError { index: usize, count: usize },
    /// Relay access before the relay count is known.
    #[error("query_relay_status() has to be called at least once before")]
    Uninitialized,
    /// A status query reported a different number of relays than the first one.
    #[error("Board reported {reported} relays, expected {expected}")]
    ChannelCountMismatch { expected: usize, reported: usize },
    /// An I/O error, typically from the serial port communication.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// An error from the `serialport` crate while opening or configuring the port.
    #[cfg(feature = "serialport")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// A specialized `Result` type for the relay board library.
pub type Result<T> = std::result::Result<T, Error>;
