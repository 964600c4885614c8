//! Low-level parsing of SPIR-V binary form.
//!
//! Only framing (and a few structural properties, such as result ID and
//! extended instruction set import uniqueness) is checked, as there is no
//! full SPIR-V grammar available here to interpret arbitrary operands.

use crate::ext_inst::ExtInstDesc;
use crate::spv::{self, spec};
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::path::Path;
use std::{fmt, fs, io};

/// A SPIR-V instruction, with its result type/result ID split out (only for
/// opcodes known to [`spec::Opcode::def`], all words are operands otherwise).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawInst {
    pub opcode: spec::Opcode,

    pub result_type_id: Option<spv::Id>,
    pub result_id: Option<spv::Id>,

    // FIXME: change the inline size of this to fit most instructions.
    pub operands: SmallVec<[u32; 8]>,
}

impl RawInst {
    /// Total number of words this instruction was encoded as (header included).
    pub fn word_count(&self) -> usize {
        1 + (self.result_type_id.is_some() as usize)
            + (self.result_id.is_some() as usize)
            + self.operands.len()
    }
}

impl fmt::Display for RawInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.result_id {
            write!(f, "%{id} = ")?;
        }
        match (self.opcode.name(), self.opcode.to_spirv()) {
            (Some(name), _) => f.write_str(name)?,
            (None, Some(op)) => write!(f, "Op{op:?}")?,
            (None, None) => write!(f, "Op#{}", self.opcode.as_u16())?,
        }
        if let Some(type_id) = self.result_type_id {
            write!(f, " %{type_id}")?;
        }
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands.iter().format(" "))?;
        }
        Ok(())
    }
}

enum InstParseError {
    /// An instruction header with a word count of `0`.
    ZeroWordCount,

    /// Ran out of words while parsing an instruction.
    NotEnoughWords,

    /// An illegal ID of `0`.
    IdZero,

    /// The same ID was the result of more than one instruction.
    DuplicateResultId(spv::Id),

    /// `OpExtInstImport`'s name wasn't a valid `LiteralString`.
    MalformedImportName,

    /// The same extended instruction set was imported more than once.
    DuplicateImport(String),

    /// A known extended instruction was given the wrong number of operands.
    WrongExtInstArity { desc: &'static ExtInstDesc, found: usize },
}

impl InstParseError {
    // FIXME: improve messages and add more contextual information.
    fn message(&self) -> String {
        match self {
            Self::ZeroWordCount => "word count of 0".into(),
            Self::NotEnoughWords => "truncated instruction".into(),
            Self::IdZero => "ID %0 is illegal".into(),
            Self::DuplicateResultId(id) => format!("ID %{id} is a result of multiple instructions"),
            Self::MalformedImportName => "malformed extended instruction set name".into(),
            Self::DuplicateImport(name) => {
                format!("extended instruction set `{name}` imported multiple times")
            }
            Self::WrongExtInstArity { desc, found } => format!(
                "`{}` (from `{}`) expects {} operand(s), found {found}",
                desc.name, desc.set.name, desc.arity
            ),
        }
    }
}

pub struct ModuleParser {
    /// Copy of the header words (for convenience).
    pub header: [u32; spec::HEADER_LEN],

    /// The entire module's words (in native endianness).
    words: Vec<u32>,

    /// Next (instructions') word position in the module.
    next_word: usize,

    /// IDs defined so far in the module.
    defined_ids: FxHashSet<spv::Id>,

    /// Extended instruction sets imported so far in the module.
    ext_inst_imports: FxHashMap<spv::Id, String>,
}

// FIXME: stop abusing `io::Error` for error reporting.
fn invalid(reason: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("malformed SPIR-V ({reason})"))
}

impl ModuleParser {
    pub fn read_from_spv_file(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::read_from_spv_bytes(fs::read(path)?)
    }

    pub fn read_from_spv_bytes(spv_bytes: Vec<u8>) -> io::Result<Self> {
        if spv_bytes.len() % 4 != 0 {
            return Err(invalid("not a multiple of 4 bytes"));
        }
        let words = spv_bytes
            .chunks_exact(4)
            .map(|w| u32::from_ne_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        Self::from_owned_words(words)
    }

    pub fn read_from_spv_words(words: &[u32]) -> io::Result<Self> {
        Self::from_owned_words(words.to_vec())
    }

    fn from_owned_words(mut words: Vec<u32>) -> io::Result<Self> {
        if words.len() < spec::HEADER_LEN {
            return Err(invalid("truncated header"));
        }

        // Check the magic, and swap endianness of all words if we have to.
        let magic = words[0];
        if magic == spirv::MAGIC_NUMBER {
            // Nothing to do, all words already match native endianness.
        } else if magic.swap_bytes() == spirv::MAGIC_NUMBER {
            for word in &mut words {
                *word = word.swap_bytes();
            }
        } else {
            return Err(invalid("incorrect magic number"));
        }

        let mut header = [0; spec::HEADER_LEN];
        header.copy_from_slice(&words[..spec::HEADER_LEN]);

        Ok(Self {
            header,
            words,
            next_word: spec::HEADER_LEN,
            defined_ids: FxHashSet::default(),
            ext_inst_imports: FxHashMap::default(),
        })
    }

    /// The header's "bound" (one past the largest ID the module may use).
    pub fn id_bound(&self) -> u32 {
        self.header[3]
    }

    /// Name of the extended instruction set imported (so far) as `id`.
    pub fn ext_inst_set_name(&self, id: spv::Id) -> Option<&str> {
        self.ext_inst_imports.get(&id).map(|name| &name[..])
    }

    fn inst(&mut self, opcode: spec::Opcode, words: &[u32]) -> Result<RawInst, InstParseError> {
        use InstParseError as Error;

        let def = opcode.def().unwrap_or(spec::InstructionDef {
            has_result_type_id: false,
            has_result_id: false,
        });

        let mut words = words.iter().copied();
        let mut id = || -> Result<spv::Id, Error> {
            spv::Id::new(words.next().ok_or(Error::NotEnoughWords)?).ok_or(Error::IdZero)
        };
        let result_type_id = def.has_result_type_id.then(&mut id).transpose()?;
        let result_id = def.has_result_id.then(&mut id).transpose()?;

        let inst = RawInst { opcode, result_type_id, result_id, operands: words.collect() };

        if let Some(id) = inst.result_id {
            if !self.defined_ids.insert(id) {
                return Err(Error::DuplicateResultId(id));
            }
        }

        if opcode == spec::Opcode::OpExtInstImport {
            let name = match spv::decode_literal_string(&inst.operands) {
                Some((Ok(name), len)) if len == inst.operands.len() => name,
                _ => return Err(Error::MalformedImportName),
            };
            if self.ext_inst_imports.values().any(|existing| *existing == name) {
                return Err(Error::DuplicateImport(name));
            }
            // `result_id` is always present for `OpExtInstImport`.
            if let Some(id) = inst.result_id {
                self.ext_inst_imports.insert(id, name);
            }
        }

        if opcode == spec::Opcode::OpExtInst {
            let (set, number, operands) = match inst.operands[..] {
                [set, number, ref operands @ ..] => (set, number, operands),
                _ => return Err(Error::NotEnoughWords),
            };
            let desc = spv::Id::new(set)
                .and_then(|set| self.ext_inst_set_name(set))
                .and_then(|set_name| ExtInstDesc::lookup(set_name, number));
            if let Some(desc) = desc {
                if !desc.arity.accepts(operands.len()) {
                    return Err(Error::WrongExtInstArity { desc, found: operands.len() });
                }
            }
        }

        Ok(inst)
    }
}

impl Iterator for ModuleParser {
    type Item = io::Result<RawInst>;
    fn next(&mut self) -> Option<Self::Item> {
        let words = &self.words[self.next_word..];
        let &header_word = words.first()?;

        let (inst_len, opcode) = spec::split_inst_header_word(header_word);

        let inst_name = match opcode.name() {
            Some(name) => name.to_string(),
            None => format!("opcode {}", opcode.as_u16()),
        };
        let invalid = |e: InstParseError| invalid(&format!("in {inst_name}: {}", e.message()));

        let result = if inst_len == 0 {
            Err(InstParseError::ZeroWordCount)
        } else if words.len() < inst_len {
            Err(InstParseError::NotEnoughWords)
        } else {
            // HACK: copy out the words to avoid borrowing `self` twice.
            let inst_words: SmallVec<[u32; 16]> = words[1..inst_len].iter().copied().collect();
            self.inst(opcode, &inst_words)
        };

        match result {
            Ok(inst) => {
                self.next_word += inst_len;
                Some(Ok(inst))
            }
            Err(e) => {
                // Nothing after a malformed instruction can be trusted.
                self.next_word = self.words.len();
                Some(Err(invalid(e)))
            }
        }
    }
}
