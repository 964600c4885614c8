use crate::ext_inst::ExtInstImports;
use crate::spv::write::WordStream;
use crate::spv::{self, spec, IdAllocator};
use crate::FxIndexSet;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::path::Path;
use std::{fs, io};
use tracing::debug;

/// Key for deduplicating declarations (types and constants).
#[derive(PartialEq, Eq, Hash)]
struct DeclKey {
    opcode: spec::Opcode,
    result_type: Option<spv::Id>,
    operands: SmallVec<[u32; 2]>,
}

/// SPIR-V module being built, one instruction at a time.
///
/// Instructions are written into per-section [`WordStream`]s, which are only
/// concatenated (in SPIR-V's logical layout order) by [`Module::assemble`].
///
/// All methods take `&mut self`, so a `Module` has exactly one writer at a
/// time. Sharing one across threads requires external locking (e.g. a
/// `Mutex<Module>`), which then also covers ID allocation and the
/// "check-then-import" of [`ExtInstImports`].
pub struct Module {
    pub dialect: spv::Dialect,

    pub(crate) ids: IdAllocator,

    capabilities: FxIndexSet<spirv::Capability>,
    extensions: FxIndexSet<String>,

    pub(crate) ext_inst_imports: ExtInstImports,

    /// `OpString` (and other debug) instructions.
    debug: WordStream,

    /// Types and constants, deduplicated via `declared`.
    declarations: WordStream,
    declared: FxHashMap<DeclKey, spv::Id>,

    /// Function bodies (including all `OpExtInst`s).
    pub(crate) code: WordStream,
}

impl Default for Module {
    fn default() -> Self {
        Self::new(spv::Dialect::default())
    }
}

impl Module {
    pub fn new(dialect: spv::Dialect) -> Self {
        Self {
            dialect,

            ids: IdAllocator::new(),

            capabilities: FxIndexSet::default(),
            extensions: FxIndexSet::default(),

            ext_inst_imports: ExtInstImports::new(),

            debug: WordStream::new(),

            declarations: WordStream::new(),
            declared: FxHashMap::default(),

            code: WordStream::new(),
        }
    }

    /// Allocate a fresh ID (see [`IdAllocator::alloc`]), e.g. for instructions
    /// written directly through [`Module::code_mut`].
    pub fn alloc_id(&mut self) -> spv::Id {
        self.ids.alloc()
    }

    /// One past the largest ID allocated so far (i.e. the header's "bound").
    pub fn id_bound(&self) -> u32 {
        self.ids.bound()
    }

    /// Declare `capability` (with `OpCapability`), if not already declared.
    pub fn add_capability(&mut self, capability: spirv::Capability) {
        if self.capabilities.insert(capability) {
            debug!(?capability, "added capability");
        }
    }

    /// Declare `extension` (with `OpExtension`), if not already declared.
    pub fn add_extension(&mut self, extension: &str) {
        if !self.extensions.contains(extension) {
            self.extensions.insert(extension.to_string());
            debug!(extension, "added extension");
        }
    }

    pub fn capabilities(&self) -> impl ExactSizeIterator<Item = spirv::Capability> + '_ {
        self.capabilities.iter().copied()
    }

    pub fn extensions(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.extensions.iter().map(|ext| &ext[..])
    }

    pub fn code(&self) -> &WordStream {
        &self.code
    }

    /// Access to the code section, for emitting instructions this crate has
    /// no dedicated methods for (using IDs from [`Module::alloc_id`]).
    pub fn code_mut(&mut self) -> &mut WordStream {
        &mut self.code
    }

    /// `OpString`, for e.g. the format string of [`Module::debug_printf`].
    //
    // NOTE: not deduplicated, each call declares a new `OpString`.
    pub fn string(&mut self, text: &str) -> spv::Id {
        let id = self.ids.alloc();
        self.debug.push_inst(spec::Opcode::OpString, &[&id, &text]);
        id
    }

    /// Get the ID of a declaration (type or constant) with the given contents,
    /// emitting it (with a fresh ID) the first time it's requested.
    fn declare(
        &mut self,
        opcode: spec::Opcode,
        result_type: Option<spv::Id>,
        operands: &[u32],
    ) -> spv::Id {
        let key = DeclKey { opcode, result_type, operands: operands.iter().copied().collect() };
        if let Some(&id) = self.declared.get(&key) {
            return id;
        }

        let id = self.ids.alloc();
        let mut inst = self.declarations.begin_inst(
            opcode,
            (result_type.is_some() as usize) + 1 + operands.len(),
        );
        if let Some(result_type) = result_type {
            inst.push(result_type);
        }
        inst.push(id);
        for &operand in operands {
            inst.push(operand);
        }
        inst.finish();

        self.declared.insert(key, id);
        id
    }

    pub fn type_void(&mut self) -> spv::Id {
        self.declare(spec::Opcode::OpTypeVoid, None, &[])
    }

    pub fn type_bool(&mut self) -> spv::Id {
        self.declare(spec::Opcode::OpTypeBool, None, &[])
    }

    pub fn type_int(&mut self, width: u32, signed: bool) -> spv::Id {
        self.declare(spec::Opcode::OpTypeInt, None, &[width, signed as u32])
    }

    pub fn type_float(&mut self, width: u32) -> spv::Id {
        self.declare(spec::Opcode::OpTypeFloat, None, &[width])
    }

    pub fn type_vector(&mut self, component_type: spv::Id, component_count: u32) -> spv::Id {
        self.declare(spec::Opcode::OpTypeVector, None, &[component_type.get(), component_count])
    }

    /// `OpConstant` of a 32-bit (or narrower) scalar type.
    pub fn constant(&mut self, ty: spv::Id, value: u32) -> spv::Id {
        self.declare(spec::Opcode::OpConstant, Some(ty), &[value])
    }

    /// Concatenate the header and all sections into the final SPIR-V words.
    pub fn assemble(&self) -> Vec<u32> {
        let reserved_inst_schema = 0;
        let header = [
            spirv::MAGIC_NUMBER,
            self.dialect.header_version(),
            self.dialect.generator_magic,
            self.ids.bound(),
            reserved_inst_schema,
        ];

        let mut preamble = WordStream::new();
        for &capability in &self.capabilities {
            preamble.push_inst(spec::Opcode::OpCapability, &[&(capability as u32)]);
        }
        for extension in &self.extensions {
            preamble.push_inst(spec::Opcode::OpExtension, &[&&extension[..]]);
        }
        preamble.append(self.ext_inst_imports.section());
        let (addressing_model, memory_model) =
            (self.dialect.addressing_model as u32, self.dialect.memory_model as u32);
        preamble.push_inst(spec::Opcode::OpMemoryModel, &[&addressing_model, &memory_model]);

        let sections = [&preamble, &self.debug, &self.declarations, &self.code];

        let mut words = Vec::with_capacity(
            header.len() + sections.iter().map(|section| section.len()).sum::<usize>(),
        );
        words.extend(header);
        for section in sections {
            words.extend_from_slice(section.words());
        }

        debug!(
            words = words.len(),
            id_bound = self.ids.bound(),
            ext_inst_imports = self.ext_inst_imports.len(),
            "assembled SPIR-V module"
        );

        words
    }

    pub fn write_to_spv_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, bytemuck::cast_slice::<u32, u8>(&self.assemble()))
    }
}
