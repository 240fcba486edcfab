use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::transport::ByteStream;

#[derive(Default)]
struct StreamState {
    incoming: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    fail_writes: bool,
}

#[derive(Clone, Default)]
pub struct MockStream {
    state: Rc<RefCell<StreamState>>,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by the next read
    pub fn inject_read(&self, data: &[u8]) {
        self.state.borrow_mut().incoming.extend(data);
    }

    /// Every frame written, in order
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.borrow().written.clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }
}

impl ByteStream for MockStream {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(Error::WriteFailure("mock serial".to_string()));
        }
        state.written.push(bytes.to_vec());
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        Ok(self.state.borrow_mut().incoming.drain(..).collect())
    }
}
