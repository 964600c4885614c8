//! # `spv-emit`: SPIR-V instruction emission
//!
//! This crate encodes individual SPIR-V instructions into a correctly framed
//! binary word stream, with a focus on calls into *extended instruction sets*
//! (`GLSL.std.450`, the AMD vendor sets, and `NonSemantic.DebugPrintf`).
//!
//! The main entry-point is [`Module`], which owns:
//! * the [`spv::IdAllocator`] that every result ID comes from
//! * one [`spv::write::WordStream`] per logical section of the module
//! * the [`ext_inst::ExtInstImports`] cache, guaranteeing that each extended
//!   instruction set is imported (via `OpExtInstImport`) at most once
//!
//! Extended instructions are emitted through a single dispatcher
//! ([`Module::op_ext_inst`]), with one convenience method per instruction
//! (e.g. [`Module::f_abs`], [`Module::f_clamp`], [`Module::debug_printf`]),
//! all generated from a declarative table (see [`ext_inst::FIXED_ARITY_EXT_INSTS`]).
//!
//! ```
//! let mut module = spv_emit::Module::default();
//! let f32_ty = module.type_float(32);
//! let x = module.constant(f32_ty, 1.5f32.to_bits());
//! let abs_x = module.f_abs(f32_ty, x);
//! let floor_x = module.floor(f32_ty, abs_x);
//! assert_ne!(abs_x, floor_x);
//!
//! let words = module.assemble();
//! assert_eq!(words[0], spv_emit::spirv::MAGIC_NUMBER);
//! ```
//!
//! Emitted words can be inspected with [`spv::read::ModuleParser`], which
//! also checks framing and import uniqueness.

// NOTE: modules are documented "inside" (i.e. using inner doc comments).
pub mod ext_inst;
mod module;
pub mod spv;

pub use module::Module;
pub use spv::{Dialect, Id};

// Capabilities, addressing/memory models etc. are all `spirv` types.
pub use spirv;

// HACK work around the lack of `FxIndex{Map,Set}` type aliases elsewhere.
#[doc(hidden)]
type FxIndexMap<K, V> =
    indexmap::IndexMap<K, V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
#[doc(hidden)]
type FxIndexSet<V> = indexmap::IndexSet<V, std::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
