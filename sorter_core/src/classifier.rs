//! Bench-top classifier stub.
//!
//! `AutoClassifier` sits between the controller and a real link and answers
//! every capture request itself, so the mechanics can be exercised without a
//! vision host. Admin commands still arrive from the wrapped link.

use std::collections::VecDeque;

use sorter_traits::{DeviceError, HostLink};
use tracing::debug;

use crate::protocol::Classification;

/// Verdict policy for synthetic results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubVerdict {
    AlwaysNormal,
    AlwaysDefect,
    /// Defect, Normal, Defect, ...
    Alternating,
}

pub struct AutoClassifier<L: HostLink> {
    inner: L,
    policy: StubVerdict,
    answered: u64,
    queued: VecDeque<String>,
}

impl<L: HostLink> AutoClassifier<L> {
    pub fn new(inner: L, policy: StubVerdict) -> Self {
        Self {
            inner,
            policy,
            answered: 0,
            queued: VecDeque::new(),
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn into_inner(self) -> L {
        self.inner
    }

    fn verdict(&mut self) -> Classification {
        let v = match self.policy {
            StubVerdict::AlwaysNormal => Classification::Normal,
            StubVerdict::AlwaysDefect => Classification::Defect,
            StubVerdict::Alternating if self.answered % 2 == 0 => Classification::Defect,
            StubVerdict::Alternating => Classification::Normal,
        };
        self.answered += 1;
        v
    }
}

impl<L: HostLink> HostLink for AutoClassifier<L> {
    fn poll_line(&mut self) -> Option<String> {
        self.queued.pop_front().or_else(|| self.inner.poll_line())
    }

    fn send_line(&mut self, line: &str) -> Result<(), DeviceError> {
        self.inner.send_line(line)?;
        if let ["CAP", id, _pos] = line.split_whitespace().collect::<Vec<_>>().as_slice() {
            let class = self.verdict();
            debug!(bean = %id, ?class, "stub verdict");
            self.queued.push_back(format!("RES {id} {}", class as u8));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedLink;

    #[test]
    fn answers_each_capture_once_and_forwards_it() {
        let mut link = AutoClassifier::new(ScriptedLink::new(), StubVerdict::AlwaysNormal);
        link.send_line("CAP 4 2").unwrap();
        link.send_line("move_complete").unwrap();
        assert_eq!(link.poll_line().as_deref(), Some("RES 4 1"));
        assert_eq!(link.poll_line(), None);
        assert_eq!(link.inner().sent(), ["CAP 4 2", "move_complete"]);
    }

    #[test]
    fn alternating_starts_with_defect() {
        let mut link = AutoClassifier::new(ScriptedLink::new(), StubVerdict::Alternating);
        for id in 1..=3 {
            link.send_line(&format!("CAP {id} 2")).unwrap();
        }
        let got: Vec<_> = std::iter::from_fn(|| link.poll_line()).collect();
        assert_eq!(got, ["RES 1 0", "RES 2 1", "RES 3 0"]);
    }

    #[test]
    fn synthetic_results_come_before_host_lines() {
        let mut inner = ScriptedLink::new();
        inner.push("HOME");
        let mut link = AutoClassifier::new(inner, StubVerdict::AlwaysDefect);
        link.send_line("CAP 1 2").unwrap();
        assert_eq!(link.poll_line().as_deref(), Some("RES 1 0"));
        assert_eq!(link.poll_line().as_deref(), Some("HOME"));
    }
}
