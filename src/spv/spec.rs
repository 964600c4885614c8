//! SPIR-V binary format constants: header, opcodes and extended instruction sets.

use spirv::Op;
use std::fmt;

/// Number of words in the module header (magic, version, generator, bound, schema).
pub const HEADER_LEN: usize = 5;

/// Largest word count representable in an instruction's header word.
pub const MAX_INST_WORD_COUNT: usize = u16::MAX as usize;

/// Combine an instruction's total word count (including the header word itself)
/// and its opcode into the header word (`word_count << 16 | opcode`).
///
/// # Panics
///
/// Panics if `word_count` doesn't fit in 16 bits (fatal, as no valid encoding exists).
#[track_caller]
pub fn inst_header_word(opcode: Opcode, word_count: usize) -> u32 {
    let word_count = u16::try_from(word_count).unwrap_or_else(|_| {
        panic!(
            "word count of SPIR-V instruction {} doesn't fit in 16 bits: {word_count}",
            opcode.name().unwrap_or("<unknown>")
        )
    });
    (u32::from(word_count) << 16) | u32::from(opcode.as_u16())
}

/// Split an instruction header word into `(word_count, opcode)`.
pub fn split_inst_header_word(word: u32) -> (usize, Opcode) {
    ((word >> 16) as usize, Opcode(word as u16))
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Opcode(u16);

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => match self.to_spirv() {
                Some(op) => write!(f, "Op{op:?}"),
                None => write!(f, "Opcode({})", self.0),
            },
        }
    }
}

impl From<Op> for Opcode {
    fn from(op: Op) -> Self {
        Self(op as u16)
    }
}

/// Result operands an instruction starts with (before any other operands).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InstructionDef {
    pub has_result_type_id: bool,
    pub has_result_id: bool,
}

macro_rules! def_opcodes {
    ($($name:ident = $op:ident: ($result_type:literal, $result:literal)),+ $(,)?) => {
        #[allow(non_upper_case_globals)]
        impl Opcode {
            $(pub const $name: Self = Self(Op::$op as u16);)+
        }

        impl Opcode {
            /// Lookup the name & definition for this opcode, returning `None`
            /// if it's not one of the (few) opcodes whose result operands are
            /// known to this crate.
            pub fn name_and_def(self) -> Option<(&'static str, InstructionDef)> {
                match self {
                    $(Self::$name => Some((stringify!($name), InstructionDef {
                        has_result_type_id: $result_type,
                        has_result_id: $result,
                    })),)+
                    _ => None,
                }
            }
        }
    };
}

// FIXME: maybe sort some of these groups alphabetically.
def_opcodes! {
    OpNop = Nop: (false, false),
    OpUndef = Undef: (true, true),

    OpSourceExtension = SourceExtension: (false, false),
    OpName = Name: (false, false),
    OpString = String: (false, true),

    OpExtension = Extension: (false, false),
    OpExtInstImport = ExtInstImport: (false, true),
    OpExtInst = ExtInst: (true, true),

    OpMemoryModel = MemoryModel: (false, false),
    OpEntryPoint = EntryPoint: (false, false),
    OpExecutionMode = ExecutionMode: (false, false),
    OpCapability = Capability: (false, false),

    OpTypeVoid = TypeVoid: (false, true),
    OpTypeBool = TypeBool: (false, true),
    OpTypeInt = TypeInt: (false, true),
    OpTypeFloat = TypeFloat: (false, true),
    OpTypeVector = TypeVector: (false, true),

    OpConstant = Constant: (true, true),

    OpFunction = Function: (true, true),
    OpFunctionParameter = FunctionParameter: (true, true),
    OpFunctionEnd = FunctionEnd: (false, false),

    OpLabel = Label: (false, true),
    OpReturn = Return: (false, false),
}

impl Opcode {
    pub const fn from_u16(opcode: u16) -> Self {
        Self(opcode)
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// The `spirv` opcode, if this is any opcode from the SPIR-V grammar.
    pub fn to_spirv(self) -> Option<Op> {
        Op::from_u32(self.0.into())
    }

    #[inline]
    pub fn name(self) -> Option<&'static str> {
        self.name_and_def().map(|(name, _)| name)
    }

    #[inline]
    pub fn def(self) -> Option<InstructionDef> {
        self.name_and_def().map(|(_, def)| def)
    }
}

/// An extended instruction set, imported by name with `OpExtInstImport`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ExtInstSet {
    /// The literal name used by `OpExtInstImport` (e.g. `"GLSL.std.450"`).
    pub name: &'static str,

    /// The `OpExtension` a module must declare before using this set, if any.
    pub required_extension: Option<&'static str>,
}

impl ExtInstSet {
    pub const GLSL_STD_450: Self = Self { name: "GLSL.std.450", required_extension: None };

    pub const AMD_GCN_SHADER: Self =
        Self { name: "SPV_AMD_gcn_shader", required_extension: Some("SPV_AMD_gcn_shader") };

    pub const AMD_SHADER_EXPLICIT_VERTEX_PARAMETER: Self = Self {
        name: "SPV_AMD_shader_explicit_vertex_parameter",
        required_extension: Some("SPV_AMD_shader_explicit_vertex_parameter"),
    };

    pub const AMD_SHADER_TRINARY_MINMAX: Self = Self {
        name: "SPV_AMD_shader_trinary_minmax",
        required_extension: Some("SPV_AMD_shader_trinary_minmax"),
    };

    pub const NON_SEMANTIC_DEBUG_PRINTF: Self = Self {
        name: "NonSemantic.DebugPrintf",
        required_extension: Some("SPV_KHR_non_semantic_info"),
    };

    /// All the sets with dedicated [`crate::Module`] methods.
    pub const ALL: [Self; 5] = [
        Self::GLSL_STD_450,
        Self::AMD_GCN_SHADER,
        Self::AMD_SHADER_EXPLICIT_VERTEX_PARAMETER,
        Self::AMD_SHADER_TRINARY_MINMAX,
        Self::NON_SEMANTIC_DEBUG_PRINTF,
    ];
}
