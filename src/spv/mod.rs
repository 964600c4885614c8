//! SPIR-V binary form: IDs, framing, encoding and decoding of words.

// NOTE: all the modules are declared here, but they're documented "inside"
// (i.e. using inner doc comments).
pub mod read;
pub mod spec;
pub mod write;

use serde::{Deserialize, Serialize};
use std::iter;
use std::num::NonZeroU32;
use std::string::FromUtf8Error;

/// SPIR-V ID.
pub type Id = NonZeroU32;

/// Semantic properties of a SPIR-V module (not tied to any IDs), used to fill
/// in the module header and the `OpMemoryModel` instruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dialect {
    pub version_major: u8,
    pub version_minor: u8,

    /// Magic number identifying the tool that generated the module
    /// (`0` means "unregistered").
    pub generator_magic: u32,

    pub addressing_model: spirv::AddressingModel,
    pub memory_model: spirv::MemoryModel,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            version_major: 1,
            version_minor: 0,
            generator_magic: 0,
            addressing_model: spirv::AddressingModel::Logical,
            memory_model: spirv::MemoryModel::GLSL450,
        }
    }
}

impl Dialect {
    /// The version word of the module header (`0 | major | minor | 0`).
    pub fn header_version(&self) -> u32 {
        (u32::from(self.version_major) << 16) | (u32::from(self.version_minor) << 8)
    }
}

/// Issuer of fresh, never-recycled [`Id`]s for a single module.
///
/// IDs start at `1` (`0` is not a valid SPIR-V ID) and increase by one each
/// time, so the "ID bound" of the module header is always one past the last
/// allocated ID.
pub struct IdAllocator {
    bound: Id,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { bound: Id::MIN }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh ID, distinct from all previously allocated ones.
    ///
    /// # Panics
    ///
    /// Exhausting the 32-bit ID space is fatal (the module is too large to be
    /// encoded at all), so it aborts module construction by panicking.
    #[track_caller]
    pub fn alloc(&mut self) -> Id {
        let id = self.bound;
        self.bound = self
            .bound
            .checked_add(1)
            .unwrap_or_else(|| panic!("ID bound of SPIR-V module doesn't fit in 32 bits"));
        id
    }

    /// One past the largest ID allocated so far (i.e. the header's "bound").
    pub fn bound(&self) -> u32 {
        self.bound.get()
    }
}

// FIXME: this shouldn't just panic when `s.contains('\0')`.
/// Encode `s` as a `LiteralString` (UTF-8, nul-terminated, zero-padded to a
/// multiple of 4 bytes, little-endian words).
pub(crate) fn encode_literal_string(s: &str) -> impl Iterator<Item = u32> + '_ {
    assert!(!s.contains('\0'), "`LiteralString` cannot contain NUL bytes: {s:?}");

    let bytes = s.as_bytes();

    // FIXME: replace with `array_chunks` once that is stabilized.
    let full_words = bytes.chunks_exact(4).map(|w| [w[0], w[1], w[2], w[3]]);

    let leftover_bytes = &bytes[full_words.len() * 4..];
    let mut last_word = [0; 4];
    last_word[..leftover_bytes.len()].copy_from_slice(leftover_bytes);

    full_words.chain(iter::once(last_word)).map(u32::from_le_bytes)
}

/// Number of words [`encode_literal_string`] would produce for `s`.
pub(crate) fn literal_string_word_count(s: &str) -> usize {
    // The nul terminator always needs room, even when `s` fills whole words.
    s.len() / 4 + 1
}

/// Decode the `LiteralString` at the start of `words`, returning the string
/// (if valid UTF-8) and the number of words it occupied, or `None` if no nul
/// terminator was found.
pub fn decode_literal_string(words: &[u32]) -> Option<(Result<String, FromUtf8Error>, usize)> {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    for (i, word) in words.iter().enumerate() {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                return Some((String::from_utf8(bytes), i + 1));
            }
            bytes.push(byte);
        }
    }
    None
}
