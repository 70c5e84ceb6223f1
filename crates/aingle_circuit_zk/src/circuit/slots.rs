//! Slotted message layout
//!
//! A message is `slots_per_msg` little-endian slots of `slot_size` bytes.
//! Inside a proven batch every slot holds 0 or 1, so a message is fully
//! described by one flag per slot. The same layout splits an aggregated
//! plaintext back into per-slot sums.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};

use crate::error::{Result, ZkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    slot_size: usize,
    slots_per_msg: usize,
}

impl SlotLayout {
    pub fn new(slot_size: usize, slots_per_msg: usize) -> Result<Self> {
        if slot_size == 0 || slots_per_msg == 0 {
            return Err(ZkError::invalid("slot size and slot count must be non-zero"));
        }
        Ok(Self {
            slot_size,
            slots_per_msg,
        })
    }

    /// Slot width in bytes
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn slots_per_msg(&self) -> usize {
        self.slots_per_msg
    }

    /// Slot width in bits
    pub fn slot_bits(&self) -> usize {
        8 * self.slot_size
    }

    /// Bits spanned by one message
    pub fn message_bits(&self) -> usize {
        self.slot_bits() * self.slots_per_msg
    }

    /// 2^(8·slot_size·r), the weight of slot `r`
    pub fn slot_weight(&self, r: usize) -> BigUint {
        BigUint::one() << (self.slot_bits() * r)
    }

    /// Message whose slot `r` is 1 exactly when `flags[r]`
    pub fn encode(&self, flags: &[bool]) -> Result<BigUint> {
        if flags.len() > self.slots_per_msg {
            return Err(ZkError::invalid(format!(
                "{} flags for {} slots",
                flags.len(),
                self.slots_per_msg
            )));
        }
        let mut msg = BigUint::zero();
        for (r, _) in flags.iter().enumerate().filter(|(_, set)| **set) {
            msg.set_bit((self.slot_bits() * r) as u64, true);
        }
        Ok(msg)
    }

    /// One flag per slot; rejects slots holding anything but 0 or 1
    pub fn decode(&self, msg: &BigUint) -> Result<Vec<bool>> {
        if msg.bits() as usize > self.message_bits() {
            return Err(ZkError::invalid(format!(
                "message has {} bits, layout holds {}",
                msg.bits(),
                self.message_bits()
            )));
        }
        self.split(msg)
            .into_iter()
            .enumerate()
            .map(|(r, slot)| match slot.to_u8() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(ZkError::invalid(format!("slot {r} holds {slot}, expected 0 or 1"))),
            })
            .collect()
    }

    /// Dense packing of several messages: flag `r` of message `j` becomes
    /// bit `j·slots_per_msg + r`
    pub fn pack(&self, messages: &[Vec<bool>]) -> BigUint {
        let mut packed = BigUint::zero();
        for (j, flags) in messages.iter().enumerate() {
            for (r, &set) in flags.iter().enumerate() {
                if set {
                    packed.set_bit((j * self.slots_per_msg + r) as u64, true);
                }
            }
        }
        packed
    }

    /// Per-slot values of `value`, slot 0 first
    pub fn split(&self, value: &BigUint) -> Vec<BigUint> {
        let mask = (BigUint::one() << self.slot_bits()) - 1u32;
        (0..self.slots_per_msg)
            .map(|r| (value >> (self.slot_bits() * r)) & &mask)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let layout = SlotLayout::new(2, 4).unwrap();
        let flags = vec![true, false, false, true];
        let msg = layout.encode(&flags).unwrap();
        assert_eq!(msg, BigUint::from(1u64 + (1u64 << 48)));
        assert_eq!(layout.decode(&msg).unwrap(), flags);
    }

    #[test]
    fn test_decode_rejects_wide_slots() {
        let layout = SlotLayout::new(1, 3).unwrap();
        assert!(layout.decode(&BigUint::from(2u32)).is_err());
        assert!(layout.decode(&BigUint::from(1u32 << 24)).is_err());
        assert!(layout.decode(&BigUint::from(0x01_01_00u32)).is_ok());
    }

    #[test]
    fn test_pack() {
        let layout = SlotLayout::new(1, 3).unwrap();
        let packed = layout.pack(&[vec![true, false, true], vec![false, true, false]]);
        assert_eq!(packed, BigUint::from(0b010_101u32));
    }

    #[test]
    fn test_split_sums() {
        let layout = SlotLayout::new(1, 2).unwrap();
        // slot 0 = 3, slot 1 = 200
        let v = BigUint::from(3u32 + (200u32 << 8));
        assert_eq!(layout.split(&v), vec![BigUint::from(3u32), BigUint::from(200u32)]);
        assert_eq!(layout.slot_weight(1), BigUint::from(256u32));
    }
}
