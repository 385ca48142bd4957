use crate::{Error, Result};

/// Last known state of every relay, `true` meaning open.
///
/// The number of relays is fixed at construction. Updating a slot never talks to the
/// board, sending frames is the job of [`crate::Device::set_relay`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelState {
    states: Vec<bool>,
}

impl ChannelState {
    /// All relays start closed.
    pub fn new(count: usize) -> Self {
        Self {
            states: vec![false; count],
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn check_index(&self, index: usize) -> Result<()> {
        if index < self.states.len() {
            Ok(())
        } else {
            Err(Error::IndexError {
                index,
                count: self.states.len(),
            })
        }
    }

    pub fn get(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(self.states[index])
    }

    /// Updates the local state only.
    pub fn set_silent(&mut self, index: usize, open: bool) -> Result<()> {
        self.check_index(index)?;
        self.states[index] = open;
        Ok(())
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.states
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.states.iter().copied()
    }
}
