// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted peripherals for unit tests.

use std::{collections::VecDeque, vec::Vec};

use crate::hal::{BusDirection, Direction, Timer, Transport};

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    /// Lines that become readable one per `send`, like a device answering.
    pub replies: VecDeque<Vec<u8>>,
    /// Lines that are readable right away.
    pub incoming: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
}

impl MockTransport {
    pub fn with_replies(lines: &[&[u8]]) -> Self {
        Self {
            replies: lines.iter().map(|l| l.to_vec()).collect(),
            ..Default::default()
        }
    }

    pub fn with_incoming(lines: &[&[u8]]) -> Self {
        Self {
            incoming: lines.iter().map(|l| l.to_vec()).collect(),
            ..Default::default()
        }
    }
}

impl Transport for MockTransport {
    fn send(&mut self, line: &[u8]) {
        self.sent.push(line.to_vec());
        if let Some(reply) = self.replies.pop_front() {
            self.incoming.push_back(reply);
        }
    }

    fn has_complete_line(&mut self) -> bool {
        !self.incoming.is_empty()
    }

    fn read_line(&mut self, buf: &mut [u8]) -> usize {
        let Some(line) = self.incoming.pop_front() else {
            return 0;
        };
        let len = line.len().min(buf.len());
        buf[..len].copy_from_slice(&line[..len]);
        len
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockBus {
    pub history: Vec<Direction>,
}

impl MockBus {
    pub fn current(&self) -> Direction {
        self.history.last().copied().unwrap_or(Direction::Receive)
    }
}

impl BusDirection for MockBus {
    fn set_direction(&mut self, direction: Direction) {
        self.history.push(direction);
    }
}

/// Simulated clock, time only passes while delaying.
#[derive(Debug, Default)]
pub(crate) struct MockTimer {
    pub now_us: u64,
    pub delays: Vec<u32>,
}

impl Timer for MockTimer {
    fn now_ms(&self) -> u32 {
        (self.now_us / 1_000) as u32
    }

    fn delay_us(&mut self, us: u32) {
        self.delays.push(us);
        self.now_us += u64::from(us);
    }
}
