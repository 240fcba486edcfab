use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::transport::PulseOutput;

#[derive(Default)]
struct PwmState {
    pulses: HashMap<u8, u32>,
    history: Vec<(u8, u32)>,
    fail: bool,
    fail_channel: Option<u8>,
}

#[derive(Clone, Default)]
pub struct MockPulseOutput {
    state: Rc<RefCell<PwmState>>,
}

impl MockPulseOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last pulse width set on `channel`
    pub fn pulse(&self, channel: u8) -> Option<u32> {
        self.state.borrow().pulses.get(&channel).copied()
    }

    pub fn history(&self) -> Vec<(u8, u32)> {
        self.state.borrow().history.clone()
    }

    /// Fail every write, or clear all failures.
    pub fn fail(&self, fail: bool) {
        let mut state = self.state.borrow_mut();
        state.fail = fail;
        state.fail_channel = None;
    }

    /// Fail writes to `channel` only.
    pub fn fail_channel(&self, channel: u8) {
        self.state.borrow_mut().fail_channel = Some(channel);
    }
}

impl PulseOutput for MockPulseOutput {
    fn set_pulse(&mut self, channel: u8, micros: u32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail || state.fail_channel == Some(channel) {
            return Err(Error::WriteFailure(format!("mock GPIO {}", channel)));
        }
        state.pulses.insert(channel, micros);
        state.history.push((channel, micros));
        Ok(())
    }
}
