//! Test and helper mocks for sorter_core

use std::collections::VecDeque;

use sorter_traits::{DeviceError, HostLink};

/// In-memory host link: inbound lines are queued by the test, outbound lines
/// are recorded in order.
#[derive(Debug, Default)]
pub struct ScriptedLink {
    inbound: VecDeque<String>,
    sent: Vec<String>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line for a later `poll_line`.
    pub fn push(&mut self, line: impl Into<String>) {
        self.inbound.push_back(line.into());
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Take every line sent so far.
    pub fn take_sent(&mut self) -> Vec<String> {
        std::mem::take(&mut self.sent)
    }

    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }
}

impl HostLink for ScriptedLink {
    fn poll_line(&mut self) -> Option<String> {
        self.inbound.pop_front()
    }

    fn send_line(&mut self, line: &str) -> Result<(), DeviceError> {
        self.sent.push(line.to_owned());
        Ok(())
    }
}
