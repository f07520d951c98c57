//! Button ids and the bitmask wire representation of button sets
//!
//! Buttons are numbered from 1. In a mask byte, bit `n - 1` set means
//! button `n` is a member, so `{1, 3}` travels as `0b0000_0101`.

use std::fmt;
use std::str::FromStr;

use boks_transport::protocol::PHOTODIODE_BUTTON;
use boks_transport::ProtocolRevision;
use serde::{Deserialize, Serialize};

use crate::error::BoksError;

/// Highest button id any revision can address
pub const MAX_BUTTON_ID: u8 = 8;

/// A single button (1-8, where 8 is the photodiode on current hardware)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ButtonId(u8);

impl ButtonId {
    /// The photodiode light-sensor channel
    pub const PHOTODIODE: ButtonId = ButtonId(PHOTODIODE_BUTTON);

    /// Create a button id, validating the range 1-8
    pub fn new(id: u8) -> Result<Self, BoksError> {
        if id == 0 || id > MAX_BUTTON_ID {
            return Err(BoksError::Validation(format!(
                "Expecting button numbers between 1 and {MAX_BUTTON_ID}, got {id}"
            )));
        }
        Ok(Self(id))
    }

    /// Button number
    pub fn get(self) -> u8 {
        self.0
    }

    /// Bit for this button in a mask byte
    pub fn bit(self) -> u8 {
        1 << (self.0 - 1)
    }

    pub fn is_photodiode(self) -> bool {
        self == Self::PHOTODIODE
    }

    /// Key name this button maps to for keyed input collaborators
    pub fn key_name(self) -> String {
        self.0.to_string()
    }
}

impl TryFrom<u8> for ButtonId {
    type Error = BoksError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<ButtonId> for u8 {
    fn from(id: ButtonId) -> u8 {
        id.0
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A set of buttons, stored as its wire bitmask
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct ButtonSet {
    mask: u8,
}

impl ButtonSet {
    pub const EMPTY: ButtonSet = ButtonSet { mask: 0 };

    /// Decode a mask byte (bit `i` → button `i + 1`)
    pub fn from_mask(mask: u8) -> Self {
        Self { mask }
    }

    /// Encode as a mask byte
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Build a set from raw, caller-supplied button numbers
    ///
    /// Fails on any id below 1 or on a mask that would not fit in one byte;
    /// never truncates.
    pub fn from_ids<I>(ids: I) -> Result<Self, BoksError>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut value: u64 = 0;
        for id in ids {
            if id < 1 {
                return Err(BoksError::Validation(format!(
                    "Expecting button numbers between 1 and {MAX_BUTTON_ID}, got {id}"
                )));
            }
            if id > 63 {
                return Err(BoksError::Validation(format!(
                    "Button {id} does not fit in a button mask"
                )));
            }
            value |= 1u64 << (id - 1);
        }
        let mask = u8::try_from(value).map_err(|_| {
            BoksError::Validation(format!(
                "Button mask {value:#b} exceeds 255; expecting button numbers between 1 and {MAX_BUTTON_ID}"
            ))
        })?;
        Ok(Self { mask })
    }

    /// Every button the revision has, photodiode included
    pub fn full_range(revision: ProtocolRevision) -> Self {
        Self::span(revision.max_button())
    }

    /// Every push-button the revision has (no photodiode)
    pub fn all_except_photodiode(revision: ProtocolRevision) -> Self {
        if revision.has_photodiode() {
            Self::span(PHOTODIODE_BUTTON - 1)
        } else {
            Self::full_range(revision)
        }
    }

    fn span(max: u8) -> Self {
        let mask = ((1u16 << max) - 1) as u8;
        Self { mask }
    }

    pub fn insert(&mut self, button: ButtonId) {
        self.mask |= button.bit();
    }

    pub fn remove(&mut self, button: ButtonId) {
        self.mask &= !button.bit();
    }

    pub fn contains(&self, button: ButtonId) -> bool {
        self.mask & button.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// Buttons in ascending order
    pub fn iter(&self) -> impl Iterator<Item = ButtonId> + '_ {
        (1..=MAX_BUTTON_ID)
            .map(ButtonId)
            .filter(move |b| self.contains(*b))
    }

    /// Button numbers in ascending order
    pub fn ids(&self) -> Vec<u8> {
        self.iter().map(ButtonId::get).collect()
    }

    /// Reject ids the given revision does not have
    pub fn check_revision(&self, revision: ProtocolRevision) -> Result<(), BoksError> {
        let max = revision.max_button();
        if let Some(b) = self.iter().find(|b| b.get() > max) {
            return Err(BoksError::Validation(format!(
                "Expecting button numbers between 1 and {max}, got {b}"
            )));
        }
        Ok(())
    }
}

impl FromIterator<ButtonId> for ButtonSet {
    fn from_iter<I: IntoIterator<Item = ButtonId>>(iter: I) -> Self {
        let mut set = ButtonSet::EMPTY;
        for b in iter {
            set.insert(b);
        }
        set
    }
}

impl TryFrom<Vec<u8>> for ButtonSet {
    type Error = BoksError;

    fn try_from(ids: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_ids(ids.into_iter().map(i64::from))
    }
}

impl From<ButtonSet> for Vec<u8> {
    fn from(set: ButtonSet) -> Vec<u8> {
        set.ids()
    }
}

impl fmt::Debug for ButtonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(ButtonId::get)).finish()
    }
}

impl fmt::Display for ButtonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.iter().map(|b| b.to_string()).collect();
        f.pad(&ids.join(";"))
    }
}

/// Parse an allowed-responses list such as `"1;2;3"`
///
/// Entries may be separated by `;`, `,` or whitespace. An empty string
/// parses to the empty set; callers treat that as "unspecified".
impl FromStr for ButtonSet {
    type Err = BoksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = ButtonSet::EMPTY;
        for entry in s
            .split(|c: char| c == ';' || c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            let id: i64 = entry.parse().map_err(|_| {
                BoksError::Validation(format!(
                    "'{entry}' is not a valid response. Expecting a number in the range 1 .. {MAX_BUTTON_ID}."
                ))
            })?;
            if !(1..=i64::from(MAX_BUTTON_ID)).contains(&id) {
                return Err(BoksError::Validation(format!(
                    "'{entry}' is not a valid response. Expecting a number in the range 1 .. {MAX_BUTTON_ID}."
                )));
            }
            set.mask |= 1 << (id - 1);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bit_order() {
        let set = ButtonSet::from_ids([1, 3]).unwrap();
        assert_eq!(set.mask(), 0b0000_0101);
        assert_eq!(ButtonSet::from_mask(0b1000_0001).ids(), vec![1, 8]);
    }

    #[test]
    fn test_every_subset_decodes_to_itself() {
        for mask in 0..=u8::MAX {
            let set = ButtonSet::from_mask(mask);
            let rebuilt = ButtonSet::from_ids(set.ids().into_iter().map(i64::from)).unwrap();
            assert_eq!(rebuilt, set);
            assert_eq!(rebuilt.mask(), mask);
        }
    }

    #[test]
    fn test_out_of_range_ids_rejected() {
        assert!(ButtonSet::from_ids([9]).unwrap_err().is_validation());
        assert!(ButtonSet::from_ids([0]).unwrap_err().is_validation());
        assert!(ButtonSet::from_ids([-1]).unwrap_err().is_validation());
        assert!(ButtonSet::from_ids([1, 2, 100]).unwrap_err().is_validation());
        assert!(ButtonId::new(0).is_err());
        assert!(ButtonId::new(9).is_err());
    }

    #[test]
    fn test_default_sets() {
        assert_eq!(
            ButtonSet::all_except_photodiode(ProtocolRevision::Current).mask(),
            0x7F
        );
        assert_eq!(ButtonSet::full_range(ProtocolRevision::Current).mask(), 0xFF);
        assert_eq!(
            ButtonSet::all_except_photodiode(ProtocolRevision::Legacy).mask(),
            0x0F
        );
        assert_eq!(ButtonSet::full_range(ProtocolRevision::Legacy).mask(), 0x0F);
    }

    #[test]
    fn test_revision_check() {
        let set = ButtonSet::from_ids([2, 5]).unwrap();
        assert!(set.check_revision(ProtocolRevision::Current).is_ok());
        assert!(set.check_revision(ProtocolRevision::Legacy).is_err());
    }

    #[test]
    fn test_parse_allowed_responses() {
        let set: ButtonSet = "1; 2;8".parse().unwrap();
        assert_eq!(set.ids(), vec![1, 2, 8]);
        assert!("".parse::<ButtonSet>().unwrap().is_empty());
        assert!("1;x".parse::<ButtonSet>().is_err());
        assert!("9".parse::<ButtonSet>().is_err());
        assert_eq!(set.to_string(), "1;2;8");
    }

    #[test]
    fn test_photodiode() {
        assert!(ButtonId::new(8).unwrap().is_photodiode());
        assert!(!ButtonId::new(7).unwrap().is_photodiode());
        assert_eq!(ButtonId::PHOTODIODE.bit(), 0x80);
    }

    #[test]
    fn test_debug_lists_ids() {
        let set: ButtonSet = [ButtonId::new(1).unwrap(), ButtonId::new(4).unwrap()]
            .into_iter()
            .collect();
        assert_eq!(format!("{set:?}"), "{1, 4}");
    }
}
