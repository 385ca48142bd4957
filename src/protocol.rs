use crate::{Error, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pause the board needs after every frame before it accepts further I/O.
pub const SETTLE_DELAY: std::time::Duration = std::time::Duration::from_millis(10);

/// First byte of a switch frame.
pub const START_ID: u8 = 0xa0;
/// First byte of the status query frame.
pub const QUERY_ID: u8 = 0xff;
/// CR LF closing every frame sent to the board.
pub const FRAME_TERMINATOR: [u8; 2] = [0x0d, 0x0a];

/// Start id, channel, state, checksum and the two terminator bytes.
pub const SET_RELAY_FRAME_LENGTH: usize = 6;

/// Frame asking the board for one status line per relay.
pub const QUERY_FRAME: [u8; 3] = [QUERY_ID, FRAME_TERMINATOR[0], FRAME_TERMINATOR[1]];

/// Marker contained in the status line of every closed relay.
const OFF_MARKER: &[u8] = b"OFF";

/// Additive checksum over the start id, channel number and state byte.
///
/// The state is reduced modulo 0xFF before the addition and the sum is truncated to a
/// byte. For all channel numbers below 95 this equals `(start + channel + state) % 0xFF`.
pub fn checksum(channel_number: u8, state: u8) -> u8 {
    START_ID
        .wrapping_add(channel_number)
        .wrapping_add(state % 0xff)
}

/// Switches a single relay.
pub struct SetRelay;

impl SetRelay {
    /// Builds the frame for the zero based relay `index`.
    ///
    /// The board counts channels from one. No check is made against the number of relays
    /// the board actually has, only that the channel number fits into one byte.
    pub fn request(index: usize, open: bool) -> Result<Vec<u8>> {
        let channel_number = index
            .checked_add(1)
            .and_then(|channel| u8::try_from(channel).ok())
            .ok_or(Error::RangeError)?;
        let state = u8::from(open);
        let mut tx_buffer = vec![0; SET_RELAY_FRAME_LENGTH];
        tx_buffer[0] = START_ID;
        tx_buffer[1] = channel_number;
        tx_buffer[2] = state;
        tx_buffer[3] = checksum(channel_number, state);
        tx_buffer[4..].copy_from_slice(&FRAME_TERMINATOR);
        Ok(tx_buffer)
    }
}

/// Reads the state of all relays.
pub struct QueryStatus;

impl QueryStatus {
    pub fn request() -> Vec<u8> {
        QUERY_FRAME.to_vec()
    }

    /// Maps the status lines to relay states, first line first.
    ///
    /// A relay is open unless its line contains `OFF`. Lines without any known token are
    /// therefore reported as open.
    pub fn decode<L: AsRef<[u8]>>(lines: &[L]) -> Vec<bool> {
        lines
            .iter()
            .map(|line| is_open(line.as_ref()))
            .collect()
    }

    pub fn report<L: AsRef<[u8]>>(lines: &[L]) -> Vec<RelayStatus> {
        lines
            .iter()
            .zip(1..)
            .map(|(line, channel)| {
                let line = line.as_ref().trim_ascii();
                RelayStatus {
                    channel,
                    open: is_open(line),
                    raw: String::from_utf8_lossy(line).into_owned(),
                }
            })
            .collect()
    }
}

fn is_open(line: &[u8]) -> bool {
    !line
        .trim_ascii()
        .windows(OFF_MARKER.len())
        .any(|window| window == OFF_MARKER)
}

/// One decoded line of the status dump.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RelayStatus {
    /// Channel number as counted by the board, starting at one.
    pub channel: u32,
    pub open: bool,
    pub raw: String,
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = if self.open { "open" } else { "closed" };
        write!(f, "Relay {}: {} ({})", self.channel, state, self.raw)
    }
}
