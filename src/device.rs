//! Controller for a relay board behind a [`Transport`].
//!
//! The board never acknowledges a switch command, so [`Device::set_relay`] records the
//! requested state as soon as the frame has been written. [`Device::query_relay_status`]
//! reads back what the board reports and overwrites the local view with it.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "serialport")]
//! # fn main() -> lcus_relay_lib::Result<()> {
//! use lcus_relay_lib::{serialport::SerialTransport, Device};
//! use std::time::Duration;
//!
//! let mut device = Device::new(SerialTransport::open("/dev/ttyUSB0", Duration::from_secs(2))?)?;
//! if !device.relay(0)? {
//!     device.set_relay(0, true)?;
//! }
//! device.set_all(false)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "serialport"))]
//! # fn main() {}
//! ```

use crate::protocol::*;
use crate::{ChannelState, Error, Result, Transport};
use std::time::Duration;

/// Upper bound of status lines collected by a single query.
///
/// The largest known board (LCUS-8) answers with eight lines, the bound only protects
/// against a board that keeps talking.
pub const DEFAULT_MAX_STATUS_LINES: usize = 32;

#[derive(Debug)]
pub struct Device<T> {
    transport: T,
    delay: Duration,
    max_status_lines: usize,
    // None until the first status query reported the number of relays
    channels: Option<ChannelState>,
}

impl<T: Transport> Device<T> {
    /// Creates the controller and queries the board once to learn the number of relays.
    pub fn new(transport: T) -> Result<Self> {
        let mut device = Self::lazy(transport);
        device.query_relay_status()?;
        Ok(device)
    }

    /// Creates the controller without talking to the board.
    ///
    /// Relay access fails with [`Error::Uninitialized`] until
    /// [`query_relay_status`](Self::query_relay_status) succeeded once.
    pub fn lazy(transport: T) -> Self {
        Self {
            transport,
            delay: SETTLE_DELAY,
            max_status_lines: DEFAULT_MAX_STATUS_LINES,
            channels: None,
        }
    }

    /// Sets the pause after every written frame.
    ///
    /// If the provided `delay` is less than [`SETTLE_DELAY`], `SETTLE_DELAY` will be used.
    pub fn set_delay(&mut self, delay: Duration) {
        if delay < SETTLE_DELAY {
            log::warn!("delay {delay:?} lower minimum {SETTLE_DELAY:?}, use minimum");
            self.delay = SETTLE_DELAY;
        } else {
            self.delay = delay;
        }
        log::trace!("set delay to {:?}", self.delay);
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Limits the number of status lines read per query, at least one.
    pub fn set_max_status_lines(&mut self, max_status_lines: usize) {
        if max_status_lines == 0 {
            log::warn!("max status lines 0 would hide every relay, use 1");
            self.max_status_lines = 1;
        } else {
            self.max_status_lines = max_status_lines;
        }
        log::trace!("set max status lines to {}", self.max_status_lines);
    }

    pub fn max_status_lines(&self) -> usize {
        self.max_status_lines
    }

    fn send_bytes(&mut self, tx_buffer: &[u8]) -> Result<()> {
        log::trace!("write bytes: {tx_buffer:02X?}");
        self.transport.write(tx_buffer)?;
        std::thread::sleep(self.delay);
        Ok(())
    }

    // Reads until the transport times out without data. Lines that are blank after
    // trimming are dropped and do not end the burst.
    fn receive_lines(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        loop {
            if lines.len() >= self.max_status_lines {
                log::warn!(
                    "Stop reading status after {} lines, remaining lines are ignored",
                    lines.len()
                );
                break;
            }
            let line = self.transport.read_line()?;
            if line.is_empty() {
                break;
            }
            let trimmed = line.trim_ascii();
            if trimmed.is_empty() {
                log::trace!("skip blank line");
                continue;
            }
            log::trace!("receive line: {:?}", String::from_utf8_lossy(trimmed));
            lines.push(trimmed.to_vec());
        }
        Ok(lines)
    }

    /// Asks the board for the state of all relays and updates the local view.
    ///
    /// Returns the trimmed lines as sent by the board, one per relay. The first successful
    /// call fixes the number of relays, later calls reporting a different number fail with
    /// [`Error::ChannelCountMismatch`] and leave the local view untouched.
    pub fn query_relay_status(&mut self) -> Result<Vec<Vec<u8>>> {
        log::trace!("query relay status");
        // leftovers of an earlier reply would shift every relay index
        self.transport.discard_input()?;
        self.send_bytes(&QueryStatus::request())?;
        let lines = self.receive_lines()?;
        let states = QueryStatus::decode(lines.as_slice());

        if let Some(channels) = &self.channels {
            if channels.len() != states.len() {
                return Err(Error::ChannelCountMismatch {
                    expected: channels.len(),
                    reported: states.len(),
                });
            }
        } else {
            log::debug!("Board reports {} relays", states.len());
        }

        let channels = self
            .channels
            .get_or_insert_with(|| ChannelState::new(states.len()));
        for (index, open) in states.into_iter().enumerate() {
            channels.set_silent(index, open)?;
        }
        Ok(lines)
    }

    fn channels(&self) -> Result<&ChannelState> {
        self.channels.as_ref().ok_or(Error::Uninitialized)
    }

    fn channels_mut(&mut self) -> Result<&mut ChannelState> {
        self.channels.as_mut().ok_or(Error::Uninitialized)
    }

    pub fn relay_count(&self) -> Result<usize> {
        Ok(self.channels()?.len())
    }

    /// Last known state of the relay, possibly stale until the next status query.
    pub fn relay(&self, index: usize) -> Result<bool> {
        self.channels()?.get(index)
    }

    pub fn relays(&self) -> Result<&[bool]> {
        Ok(self.channels()?.as_slice())
    }

    /// Switches the relay and records the new state once the frame has been written.
    ///
    /// If writing fails the local state keeps its previous value.
    pub fn set_relay(&mut self, index: usize, open: bool) -> Result<()> {
        self.channels()?.check_index(index)?;
        let tx_buffer = SetRelay::request(index, open)?;
        log::debug!(
            "set relay {} {}",
            index + 1,
            if open { "open" } else { "closed" }
        );
        self.send_bytes(&tx_buffer)?;
        self.channels_mut()?.set_silent(index, open)
    }

    /// Switches every relay, one frame per relay.
    pub fn set_all(&mut self, open: bool) -> Result<()> {
        for index in 0..self.relay_count()? {
            self.set_relay(index, open)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.transport.flush().map_err(Error::from)
    }

    /// Hands the transport back, e.g. to close it.
    pub fn into_inner(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Behaves like an LCUS board: applies switch frames and answers status queries.
    #[derive(Default)]
    struct SimulatedBoard {
        relays: Vec<bool>,
        // fixed answer to every query instead of the relay states
        script: Option<Vec<Vec<u8>>>,
        pending: VecDeque<Vec<u8>>,
        written: Vec<Vec<u8>>,
        fail_writes: bool,
        fail_reads: bool,
    }

    impl SimulatedBoard {
        fn with_relays(count: usize) -> Self {
            Self {
                relays: vec![false; count],
                ..Default::default()
            }
        }

        fn with_lines(lines: &[&str]) -> Self {
            Self {
                script: Some(lines.iter().map(|l| l.as_bytes().to_vec()).collect()),
                ..Default::default()
            }
        }
    }

    impl Transport for SimulatedBoard {
        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.written.push(bytes.to_vec());
            if bytes == QUERY_FRAME {
                let answer: Vec<Vec<u8>> = match &self.script {
                    Some(lines) => lines.clone(),
                    None => self
                        .relays
                        .iter()
                        .enumerate()
                        .map(|(i, open)| {
                            let state = if *open { "ON" } else { "OFF" };
                            format!("CH{}: {state}\r\n", i + 1).into_bytes()
                        })
                        .collect(),
                };
                // the receive buffer keeps whatever was not read before
                self.pending.extend(answer);
            } else if bytes.len() == SET_RELAY_FRAME_LENGTH && bytes[0] == START_ID {
                let channel = bytes[1] as usize;
                if (1..=self.relays.len()).contains(&channel) {
                    self.relays[channel - 1] = bytes[2] == 1;
                }
            }
            Ok(())
        }

        fn read_line(&mut self) -> io::Result<Vec<u8>> {
            if self.fail_reads {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "no answer"));
            }
            Ok(self.pending.pop_front().unwrap_or_default())
        }

        fn discard_input(&mut self) -> io::Result<()> {
            self.pending.clear();
            Ok(())
        }
    }

    #[test]
    fn new_queries_relay_count() {
        let device = Device::new(SimulatedBoard::with_relays(4)).unwrap();
        assert_eq!(device.relay_count().unwrap(), 4);
        assert_eq!(device.relays().unwrap(), &[false; 4]);
        assert_eq!(device.transport.written, vec![QUERY_FRAME.to_vec()]);
    }

    #[test]
    fn set_relay_writes_frame_and_records_state() {
        let mut device = Device::new(SimulatedBoard::with_relays(4)).unwrap();
        device.set_relay(0, true).unwrap();
        assert_eq!(
            device.transport.written.last().unwrap(),
            &vec![0xa0, 0x01, 0x01, 0xa2, 0x0d, 0x0a]
        );
        assert_eq!(device.transport.written.len(), 2);
        assert!(device.relay(0).unwrap());
        assert!(!device.relay(1).unwrap());
    }

    #[test]
    fn set_relay_twice_sends_same_frame() {
        let mut device = Device::new(SimulatedBoard::with_relays(2)).unwrap();
        device.set_relay(1, true).unwrap();
        assert!(device.relay(1).unwrap());
        device.set_relay(1, true).unwrap();
        assert!(device.relay(1).unwrap());
        let written = &device.transport.written;
        assert_eq!(written.len(), 3);
        assert_eq!(written[1], written[2]);
    }

    #[test]
    fn query_reconciles_reported_lines() {
        let mut device = Device::new(SimulatedBoard::with_lines(&["CH1: ON", "CH2: OFF"])).unwrap();
        assert!(device.relay(0).unwrap());
        assert!(!device.relay(1).unwrap());

        let lines = device.query_relay_status().unwrap();
        assert_eq!(lines, vec![b"CH1: ON".to_vec(), b"CH2: OFF".to_vec()]);
    }

    #[test]
    fn query_overrides_local_state_with_board_state() {
        let mut device = Device::new(SimulatedBoard::with_relays(3)).unwrap();
        device.set_relay(2, true).unwrap();
        // somebody else switched the board in the meantime
        device.transport.relays = vec![true, false, false];
        assert!(device.relay(2).unwrap());

        device.query_relay_status().unwrap();
        assert_eq!(device.relays().unwrap(), &[true, false, false]);
    }

    #[test]
    fn query_returns_trimmed_lines() {
        let mut device = Device::new(SimulatedBoard::with_relays(2)).unwrap();
        device.set_relay(1, true).unwrap();
        let lines = device.query_relay_status().unwrap();
        assert_eq!(lines, vec![b"CH1: OFF".to_vec(), b"CH2: ON".to_vec()]);
    }

    #[test]
    fn empty_response_gives_no_relays() {
        let mut device = Device::new(SimulatedBoard::with_relays(0)).unwrap();
        assert_eq!(device.relay_count().unwrap(), 0);
        assert!(matches!(device.relay(0), Err(Error::IndexError { .. })));
        assert!(matches!(
            device.set_relay(0, true),
            Err(Error::IndexError { index: 0, count: 0 })
        ));
        assert_eq!(device.transport.written.len(), 1);
    }

    #[test]
    fn set_relay_out_of_range_sends_nothing() {
        let mut device = Device::new(SimulatedBoard::with_relays(4)).unwrap();
        assert!(matches!(
            device.set_relay(4, true),
            Err(Error::IndexError { index: 4, count: 4 })
        ));
        assert_eq!(device.transport.written.len(), 1);
    }

    #[test]
    fn failed_write_keeps_state() {
        let mut device = Device::new(SimulatedBoard::with_relays(2)).unwrap();
        device.transport.fail_writes = true;
        assert!(matches!(device.set_relay(0, true), Err(Error::Io(_))));
        assert!(!device.relay(0).unwrap());
    }

    #[test]
    fn failed_read_propagates() {
        let mut board = SimulatedBoard::with_relays(2);
        board.fail_reads = true;
        assert!(matches!(Device::new(board), Err(Error::Io(_))));
    }

    #[test]
    fn lazy_device_is_uninitialized() {
        let mut device = Device::lazy(SimulatedBoard::with_relays(2));
        assert!(matches!(device.relay(0), Err(Error::Uninitialized)));
        assert!(matches!(device.relay_count(), Err(Error::Uninitialized)));
        assert!(matches!(
            device.set_relay(0, true),
            Err(Error::Uninitialized)
        ));
        assert!(device.transport.written.is_empty());

        device.query_relay_status().unwrap();
        assert_eq!(device.relay_count().unwrap(), 2);
    }

    #[test]
    fn changed_relay_count_is_rejected() {
        let mut device = Device::new(SimulatedBoard::with_lines(&["CH1: ON", "CH2: ON"])).unwrap();
        device.transport.script = Some(vec![b"CH1: OFF".to_vec()]);
        assert!(matches!(
            device.query_relay_status(),
            Err(Error::ChannelCountMismatch {
                expected: 2,
                reported: 1
            })
        ));
        assert_eq!(device.relays().unwrap(), &[true, true]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let device = Device::new(SimulatedBoard::with_lines(&[
            "\r\n",
            "CH1: OFF\r\n",
            "  \r\n",
            "CH2: ON\r\n",
        ]))
        .unwrap();
        assert_eq!(device.relays().unwrap(), &[false, true]);
    }

    #[test]
    fn status_lines_are_capped() {
        let mut device = Device::lazy(SimulatedBoard::with_relays(6));
        device.set_max_status_lines(4);
        let lines = device.query_relay_status().unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(device.relay_count().unwrap(), 4);
    }

    #[test]
    fn capped_reply_does_not_leak_into_next_query() {
        let mut board = SimulatedBoard::with_relays(6);
        board.relays[4] = true;
        let mut device = Device::lazy(board);
        device.set_max_status_lines(4);

        let first = device.query_relay_status().unwrap();
        assert_eq!(
            first,
            vec![
                b"CH1: OFF".to_vec(),
                b"CH2: OFF".to_vec(),
                b"CH3: OFF".to_vec(),
                b"CH4: OFF".to_vec()
            ]
        );
        assert_eq!(device.transport.pending.len(), 2);

        let second = device.query_relay_status().unwrap();
        assert_eq!(second, first);
        assert!(!device.relay(0).unwrap());
    }

    #[test]
    fn stale_input_is_discarded_before_query() {
        let mut board = SimulatedBoard::with_relays(2);
        board.pending.push_back(b"CH9: ON\r\n".to_vec());
        let device = Device::new(board).unwrap();
        assert_eq!(device.relay_count().unwrap(), 2);
        assert_eq!(device.relays().unwrap(), &[false, false]);
    }

    #[test]
    fn max_status_lines_is_at_least_one() {
        let mut device = Device::lazy(SimulatedBoard::with_relays(3));
        device.set_max_status_lines(0);
        assert_eq!(device.max_status_lines(), 1);
        device.query_relay_status().unwrap();
        assert_eq!(device.relay_count().unwrap(), 1);
    }

    #[test]
    fn set_all_switches_every_relay() {
        let mut device = Device::new(SimulatedBoard::with_relays(4)).unwrap();
        device.set_all(true).unwrap();
        assert_eq!(device.relays().unwrap(), &[true; 4]);
        assert_eq!(device.transport.relays, vec![true; 4]);
        assert_eq!(device.transport.written.len(), 5);

        device.set_all(false).unwrap();
        device.query_relay_status().unwrap();
        assert_eq!(device.relays().unwrap(), &[false; 4]);
    }

    #[test]
    fn delay_is_clamped_to_settle_delay() {
        let mut device = Device::lazy(SimulatedBoard::default());
        device.set_delay(Duration::from_millis(1));
        assert_eq!(device.delay(), SETTLE_DELAY);
        device.set_delay(Duration::from_millis(25));
        assert_eq!(device.delay(), Duration::from_millis(25));
    }

    #[test]
    fn into_inner_returns_transport() {
        let device = Device::new(SimulatedBoard::with_relays(1)).unwrap();
        let board = device.into_inner();
        assert_eq!(board.written.len(), 1);
    }
}
