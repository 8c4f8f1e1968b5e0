//! Custom instruction encodings
//!
//! The firmware drives the contract through four fixed words on the
//! custom-1 major opcode; whatever intercepts them (hardware, emulator)
//! maps them to the primitives here. COREID and FORK deliver their
//! result in a0; the debug break is the standard `ebreak`, routed to
//! the trap dispatcher instead.

use bit_field::BitField;
use byteorder::{ByteOrder, LittleEndian};

/// custom-1 major opcode, low 7 bits of every word below.
const OPCODE: u32 = 0x2B;

/// funct3 selecting the COREID/EXIT pair; funct7 tells them apart.
const FUNCT3_SYS: u32 = 0;
const FUNCT3_FORK: u32 = 4;
const FUNCT3_JOIN: u32 = 5;
const FUNCT7_COREID: u32 = 1;
const FUNCT7_EXIT: u32 = 2;

/// a0, the result register.
const REG_A0: u32 = 10;

pub const COREID_WORD: u32 = 0x0200_052B;
pub const EXIT_WORD: u32 = 0x0400_002B;
pub const FORK_WORD: u32 = 0x0000_452B;
pub const JOIN_WORD: u32 = 0x0000_502B;

/// Standard breakpoint instruction; not a custom word, decode rejects it.
pub const EBREAK_WORD: u32 = 0x0010_0073;

/// FORK's a0 protocol: the freshly activated child wakes with
/// `FORK_CHILD`, a parent with no idle core left gets `FORK_EXHAUSTED`,
/// anything else is the claimed child's id. Core 0 boots Running and
/// can never be claimed, so 0 is free to mean "I am the child".
pub const FORK_CHILD: u32 = 0;
pub const FORK_EXHAUSTED: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    CoreId,
    Exit,
    Fork,
    Join,
}

pub fn encode(primitive: Primitive) -> u32 {
    let (funct3, funct7, rd) = match primitive {
        Primitive::CoreId => (FUNCT3_SYS, FUNCT7_COREID, REG_A0),
        Primitive::Exit => (FUNCT3_SYS, FUNCT7_EXIT, 0),
        Primitive::Fork => (FUNCT3_FORK, 0, REG_A0),
        Primitive::Join => (FUNCT3_JOIN, 0, 0),
    };
    let mut word = 0u32;
    word.set_bits(0..7, OPCODE);
    word.set_bits(7..12, rd);
    word.set_bits(12..15, funct3);
    word.set_bits(25..32, funct7);
    word
}

/// Recognize one of the four custom words. Anything else, including
/// other encodings on the custom-1 opcode, is `None`.
pub fn decode(word: u32) -> Option<Primitive> {
    if word.get_bits(0..7) != OPCODE {
        return None;
    }
    let rd = word.get_bits(7..12);
    match word.get_bits(12..15) {
        FUNCT3_SYS => match word.get_bits(25..32) {
            FUNCT7_COREID if rd == REG_A0 => Some(Primitive::CoreId),
            FUNCT7_EXIT if rd == 0 => Some(Primitive::Exit),
            _ => None,
        },
        FUNCT3_FORK if rd == REG_A0 => Some(Primitive::Fork),
        FUNCT3_JOIN if rd == 0 => Some(Primitive::Join),
        _ => None,
    }
}

/// Decode the word at `pc` in a little-endian memory image. `None` for
/// a pc past the image or a word that is not one of ours.
pub fn fetch(image: &[u8], pc: usize) -> Option<Primitive> {
    let bytes = image.get(pc..pc.checked_add(4)?)?;
    decode(LittleEndian::read_u32(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_four_firmware_words_decode() {
        assert_eq!(decode(COREID_WORD), Some(Primitive::CoreId));
        assert_eq!(decode(EXIT_WORD), Some(Primitive::Exit));
        assert_eq!(decode(FORK_WORD), Some(Primitive::Fork));
        assert_eq!(decode(JOIN_WORD), Some(Primitive::Join));
    }

    #[test]
    fn encode_reproduces_the_firmware_words() {
        assert_eq!(encode(Primitive::CoreId), COREID_WORD);
        assert_eq!(encode(Primitive::Exit), EXIT_WORD);
        assert_eq!(encode(Primitive::Fork), FORK_WORD);
        assert_eq!(encode(Primitive::Join), JOIN_WORD);
    }

    #[test]
    fn foreign_words_are_rejected() {
        assert_eq!(decode(EBREAK_WORD), None);
        assert_eq!(decode(0x0000_0013), None); // nop
        // Right opcode, wrong rd.
        assert_eq!(decode(COREID_WORD & !0x780), None);
        // Right opcode, unknown funct7.
        assert_eq!(decode(0x0600_052B), None);
    }

    #[test]
    fn fork_sentinels_never_collide_with_claimable_ids() {
        use crate::registry::{CoreId, CoreRegistry, MAX_CORES};

        // Core 0 boots Running, so even a maximally sized registry can
        // never hand FORK_CHILD's value out as a claimed id.
        let reg = CoreRegistry::new(MAX_CORES);
        let mut claimed = Vec::new();
        while let Ok(child) = reg.fork(CoreId(FORK_CHILD)) {
            claimed.push(child);
        }
        assert_eq!(claimed.len(), MAX_CORES - 1);
        assert!(claimed.iter().all(|c| c.0 != FORK_CHILD));
        // The no-capacity sentinel sits past any representable id.
        assert!(claimed.iter().all(|c| (c.0 as usize) < MAX_CORES));
        assert!(FORK_EXHAUSTED as usize >= MAX_CORES);
    }

    #[test]
    fn fetch_reads_little_endian_words() {
        let mut image = [0u8; 12];
        LittleEndian::write_u32(&mut image[4..8], FORK_WORD);
        assert_eq!(fetch(&image, 4), Some(Primitive::Fork));
        assert_eq!(fetch(&image, 0), None);
        assert_eq!(fetch(&image, 10), None);
        assert_eq!(fetch(&image, usize::MAX), None);
    }
}
