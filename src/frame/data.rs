// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use crate::error::*;

/// Modbus data (u16 values)
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Data<'d> {
    pub(crate) data: RawData<'d>,
    pub(crate) quantity: usize,
}

impl<'d> Data<'d> {
    /// Pack words (u16 values) into a byte buffer.
    pub fn from_words(words: &[u16], target: &'d mut [u8]) -> Result<Self, Error> {
        let len = words.len() * 2;
        if len > target.len() {
            return Err(Error::BufferOverflow);
        }
        for (i, w) in words.iter().enumerate() {
            BigEndian::write_u16(&mut target[i * 2..], *w);
        }
        let target: &'d [u8] = target;
        Ok(Data {
            data: &target[..len],
            quantity: words.len(),
        })
    }

    pub(crate) fn copy_to(&self, buf: &mut [u8]) {
        let cnt = self.quantity * 2;
        debug_assert!(buf.len() >= cnt);
        buf[..cnt].copy_from_slice(&self.data[..cnt]);
    }

    /// Quantity of words (u16 values)
    #[must_use]
    pub const fn len(&self) -> usize {
        self.quantity
    }

    ///  Returns `true` if the container has no items.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Get a specific word.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<Word> {
        if idx + 1 > self.quantity {
            return None;
        }
        let idx = idx * 2;
        Some(BigEndian::read_u16(&self.data[idx..idx + 2]))
    }

    #[must_use]
    pub const fn payload(&self) -> &[u8] {
        self.data
    }
}

/// Data iterator
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIter<'d> {
    cnt: usize,
    data: Data<'d>,
}

impl Iterator for DataIter<'_> {
    type Item = Word;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.data.get(self.cnt);
        self.cnt += 1;
        result
    }
}

impl<'d> IntoIterator for Data<'d> {
    type Item = Word;
    type IntoIter = DataIter<'d>;

    fn into_iter(self) -> Self::IntoIter {
        DataIter { cnt: 0, data: self }
    }
}
