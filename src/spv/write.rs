//! Low-level emission of SPIR-V binary form.
//!
//! All instructions are written through [`WordStream::begin_inst`], which
//! computes the header word (and its word count) *up front*, and returns an
//! [`InstWriter`] guard that must be [`finish`](InstWriter::finish)ed once
//! exactly the announced number of operand words has been written.

use crate::spv::{self, spec};
use std::ops::Range;

/// Anything that can be appended to a [`WordStream`] as (part of) an operand.
pub trait Operand {
    /// Number of words [`Operand::write_words`] will push.
    fn word_count(&self) -> usize;

    fn write_words(&self, out: &mut Vec<u32>);
}

impl Operand for spv::Id {
    fn word_count(&self) -> usize {
        1
    }
    fn write_words(&self, out: &mut Vec<u32>) {
        out.push(self.get());
    }
}

/// Literal (single-word) integer.
impl Operand for u32 {
    fn word_count(&self) -> usize {
        1
    }
    fn write_words(&self, out: &mut Vec<u32>) {
        out.push(*self);
    }
}

/// Contiguous run of IDs, appended in order (order encodes positional arguments).
impl Operand for [spv::Id] {
    fn word_count(&self) -> usize {
        self.len()
    }
    fn write_words(&self, out: &mut Vec<u32>) {
        out.extend(self.iter().map(|id| id.get()));
    }
}

/// `LiteralString` (see [`spv::encode_literal_string`] for the encoding).
impl Operand for str {
    fn word_count(&self) -> usize {
        spv::literal_string_word_count(self)
    }
    fn write_words(&self, out: &mut Vec<u32>) {
        out.extend(spv::encode_literal_string(self));
    }
}

impl<T: Operand + ?Sized> Operand for &T {
    fn word_count(&self) -> usize {
        T::word_count(self)
    }
    fn write_words(&self, out: &mut Vec<u32>) {
        T::write_words(self, out);
    }
}

/// Append-only buffer of SPIR-V words (e.g. one section of a module).
#[derive(Clone, Default)]
pub struct WordStream {
    words: Vec<u32>,
}

impl WordStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Capacity hint for an upcoming instruction of `word_count` words
    /// (only amortizes reallocation, has no observable effect).
    pub fn reserve(&mut self, word_count: usize) {
        self.words.reserve(word_count);
    }

    /// Start an instruction with `operand_word_count` words following its
    /// header word (including any result type/result ID operands).
    ///
    /// The header is written immediately (with its final word count), and the
    /// returned [`InstWriter`] must be used to append exactly that many words.
    ///
    /// # Panics
    ///
    /// Panics if the total word count doesn't fit in 16 bits.
    #[track_caller]
    pub fn begin_inst(&mut self, opcode: spec::Opcode, operand_word_count: usize) -> InstWriter<'_> {
        let total_word_count = 1 + operand_word_count;
        let header = spec::inst_header_word(opcode, total_word_count);

        self.reserve(total_word_count);
        let start = self.words.len();
        self.words.push(header);

        InstWriter { stream: self, opcode, words: start..start + total_word_count, finished: false }
    }

    /// Emit a whole instruction from its operands (word count computed from them).
    #[track_caller]
    pub fn push_inst(&mut self, opcode: spec::Opcode, operands: &[&dyn Operand]) {
        let mut inst =
            self.begin_inst(opcode, operands.iter().map(|operand| operand.word_count()).sum());
        for operand in operands {
            inst.push(operand);
        }
        inst.finish();
    }

    /// Append all the words of `other` (which must consist of whole instructions).
    pub fn append(&mut self, other: &WordStream) {
        self.words.extend_from_slice(&other.words);
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }
}

/// In-progress instruction, created by [`WordStream::begin_inst`].
///
/// Dropping an `InstWriter` without calling [`InstWriter::finish`] (e.g. while
/// unwinding) truncates the stream back to before the instruction's header,
/// so that partially-framed instructions never remain in the output.
#[must_use = "instructions must be completed with `InstWriter::finish`"]
pub struct InstWriter<'a> {
    stream: &'a mut WordStream,
    opcode: spec::Opcode,

    /// Range of words (in `stream`) this instruction occupies once finished.
    words: Range<usize>,

    finished: bool,
}

impl InstWriter<'_> {
    pub fn push(&mut self, operand: impl Operand) -> &mut Self {
        operand.write_words(&mut self.stream.words);
        self
    }

    /// Complete the instruction, checking that the number of words written
    /// matches the word count announced in its header.
    #[track_caller]
    pub fn finish(mut self) {
        assert_eq!(
            self.stream.words.len(),
            self.words.end,
            "{:?}: wrong number of operand words (expected {})",
            self.opcode,
            self.words.len() - 1,
        );
        self.finished = true;
    }
}

impl Drop for InstWriter<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.stream.words.truncate(self.words.start);
        }
    }
}
