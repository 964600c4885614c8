//! Extended instruction sets: import deduplication, and `OpExtInst` emission.
//!
//! Every extended instruction goes through [`Module::op_ext_inst`], with the
//! fixed-arity convenience methods (e.g. [`Module::f_abs`]) being generated
//! from a declarative table (see [`FIXED_ARITY_EXT_INSTS`]), and the only
//! variable-arity instruction ([`Module::debug_printf`]) written by hand.

use crate::spv::write::WordStream;
use crate::spv::{self, spec, IdAllocator};
use crate::{FxIndexMap, Module};
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use spirv::GLOp;
use std::fmt;
use tracing::{debug, trace};

/// Cache of `OpExtInstImport`s, mapping each extended instruction set name
/// to the one ID it was imported as (within a single module).
///
/// Importing the same set twice is invalid SPIR-V, so all imports must go
/// through [`ExtInstImports::get_or_import`], which emits each import
/// instruction (into its own section) only the first time a name is seen.
#[derive(Default)]
pub struct ExtInstImports {
    ids: FxIndexMap<String, spv::Id>,

    /// `OpExtInstImport` instructions, in the order the sets were first used.
    section: WordStream,
}

impl ExtInstImports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the ID `name` was imported as, importing it (with a fresh ID from
    /// `ids`) if this is the first time `name` is requested.
    pub fn get_or_import(&mut self, name: &str, ids: &mut IdAllocator) -> spv::Id {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }

        let id = ids.alloc();
        self.section.push_inst(spec::Opcode::OpExtInstImport, &[&id, &name]);
        self.ids.insert(name.to_string(), id);

        debug!(set = name, id = id.get(), "imported extended instruction set");

        id
    }

    /// Get the ID `name` was imported as, without importing it.
    pub fn get(&self, name: &str) -> Option<spv::Id> {
        self.ids.get(name).copied()
    }

    /// All imports so far, as `(name, id)` pairs, in import order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&str, spv::Id)> + '_ {
        self.ids.iter().map(|(name, &id)| (&name[..], id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The `OpExtInstImport` instructions emitted so far.
    pub fn section(&self) -> &WordStream {
        &self.section
    }
}

/// Number of operands an extended instruction takes (after the set ID and
/// instruction number, i.e. not counting any result type/ID).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),

    /// Some required operands, followed by any number of optional ones.
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, operand_count: usize) -> bool {
        match self {
            Self::Fixed(n) => operand_count == n,
            Self::AtLeast(n) => operand_count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Description of one instruction of an extended instruction set.
#[derive(Debug, PartialEq, Eq)]
pub struct ExtInstDesc {
    pub set: &'static spec::ExtInstSet,

    /// Name from the extended instruction set's grammar (e.g. `"FAbs"`).
    pub name: &'static str,

    /// The `LiteralExtInstInteger` identifying this instruction in its set.
    pub number: u32,

    pub arity: Arity,
}

impl ExtInstDesc {
    /// Find the instruction numbered `number` in the set named `set_name`,
    /// out of the ones [`Module`] has dedicated methods for.
    pub fn lookup(set_name: &str, number: u32) -> Option<&'static ExtInstDesc> {
        lazy_static! {
            static ref BY_SET_AND_NUMBER: FxHashMap<&'static str, FxHashMap<u32, &'static ExtInstDesc>> = {
                let mut by_set_and_number = FxHashMap::<_, FxHashMap<_, _>>::default();
                for desc in FIXED_ARITY_EXT_INSTS.iter().chain([&DEBUG_PRINTF]) {
                    by_set_and_number.entry(desc.set.name).or_default().insert(desc.number, desc);
                }
                by_set_and_number
            };
        }
        BY_SET_AND_NUMBER.get(set_name)?.get(&number).copied()
    }
}

/// `NonSemantic.DebugPrintf`'s only instruction (see [`Module::debug_printf`]).
pub static DEBUG_PRINTF: ExtInstDesc = ExtInstDesc {
    set: &spec::ExtInstSet::NON_SEMANTIC_DEBUG_PRINTF,
    name: "DebugPrintf",
    number: 1,
    arity: Arity::AtLeast(1),
};

impl Module {
    /// Get the ID the extended instruction set `name` is imported as,
    /// importing it first if necessary (see [`ExtInstImports::get_or_import`]).
    ///
    /// Unlike [`Module::import_ext_inst_set`], this doesn't declare any
    /// `OpExtension` the set may require.
    pub fn ext_inst_import(&mut self, name: &str) -> spv::Id {
        self.ext_inst_imports.get_or_import(name, &mut self.ids)
    }

    /// Like [`Module::ext_inst_import`], but also declaring the `OpExtension`
    /// required by `set` (if any).
    pub fn import_ext_inst_set(&mut self, set: &spec::ExtInstSet) -> spv::Id {
        if let Some(ext) = set.required_extension {
            self.add_extension(ext);
        }
        self.ext_inst_import(set.name)
    }

    pub fn ext_inst_imports(&self) -> &ExtInstImports {
        &self.ext_inst_imports
    }

    /// Emit (into the code section) `OpExtInst`, calling the instruction
    /// numbered `instruction` from the extended instruction set imported as
    /// `set`, with `operands` (in order), returning the fresh result ID.
    ///
    /// No arity checking is done here, the dedicated methods (e.g.
    /// [`Module::f_abs`]) should be preferred whenever available.
    pub fn op_ext_inst(
        &mut self,
        result_type: spv::Id,
        set: spv::Id,
        instruction: u32,
        operands: &[spv::Id],
    ) -> spv::Id {
        let result_id = self.ids.alloc();

        trace!(
            set = set.get(),
            instruction,
            operands = operands.len(),
            result_id = result_id.get(),
            "OpExtInst"
        );

        // Result type, result ID, set and instruction number, then operands.
        let mut inst = self.code.begin_inst(spec::Opcode::OpExtInst, 4 + operands.len());
        inst.push(result_type).push(result_id).push(set).push(instruction).push(operands);
        inst.finish();

        result_id
    }

    /// `NonSemantic.DebugPrintf` `DebugPrintf`, printing `format` (the result
    /// of an `OpString`, see [`Module::string`]) with `args` substituted in.
    ///
    /// The result (of type `OpTypeVoid`) is returned for completeness only.
    pub fn debug_printf(&mut self, format: spv::Id, args: &[spv::Id]) -> spv::Id {
        let void = self.type_void();
        let set = self.import_ext_inst_set(DEBUG_PRINTF.set);

        let operands: SmallVec<[spv::Id; 8]> =
            [format].into_iter().chain(args.iter().copied()).collect();
        self.op_ext_inst(void, set, DEBUG_PRINTF.number, &operands)
    }
}

// FIXME: the AMD numbers could be generated from the Khronos grammar JSON files
// instead (`spirv` only covers `GLSL.std.450` and `OpenCL.std`).
macro_rules! def_ext_insts {
    (@count) => { 0 };
    (@count $first:ident $($rest:ident)*) => { 1 + def_ext_insts!(@count $($rest)*) };

    ($($set:ident {
        $($method:ident($($operand:ident),*) = $name:ident($number:expr);)+
    })+) => {
        /// Every extended instruction with a fixed-arity [`Module`] method.
        pub static FIXED_ARITY_EXT_INSTS: &[ExtInstDesc] = &[$($(
            ExtInstDesc {
                set: &spec::ExtInstSet::$set,
                name: stringify!($name),
                number: $number,
                arity: Arity::Fixed(def_ext_insts!(@count $($operand)*)),
            },
        )+)+];

        impl Module {$($(
            #[doc = concat!("`", stringify!($set), "` `", stringify!($name), "`.")]
            pub fn $method(&mut self, result_type: spv::Id $(, $operand: spv::Id)*) -> spv::Id {
                let set = self.import_ext_inst_set(&spec::ExtInstSet::$set);
                self.op_ext_inst(result_type, set, $number, &[$($operand),*])
            }
        )+)+}
    };
}

def_ext_insts! {
    GLSL_STD_450 {
        round(x) = Round(GLOp::Round as u32);
        round_even(x) = RoundEven(GLOp::RoundEven as u32);
        trunc(x) = Trunc(GLOp::Trunc as u32);
        f_abs(x) = FAbs(GLOp::FAbs as u32);
        s_abs(x) = SAbs(GLOp::SAbs as u32);
        f_sign(x) = FSign(GLOp::FSign as u32);
        s_sign(x) = SSign(GLOp::SSign as u32);
        floor(x) = Floor(GLOp::Floor as u32);
        ceil(x) = Ceil(GLOp::Ceil as u32);
        fract(x) = Fract(GLOp::Fract as u32);

        radians(degrees) = Radians(GLOp::Radians as u32);
        degrees(radians) = Degrees(GLOp::Degrees as u32);
        sin(x) = Sin(GLOp::Sin as u32);
        cos(x) = Cos(GLOp::Cos as u32);
        tan(x) = Tan(GLOp::Tan as u32);
        asin(x) = Asin(GLOp::Asin as u32);
        acos(x) = Acos(GLOp::Acos as u32);
        atan(y_over_x) = Atan(GLOp::Atan as u32);
        sinh(x) = Sinh(GLOp::Sinh as u32);
        cosh(x) = Cosh(GLOp::Cosh as u32);
        tanh(x) = Tanh(GLOp::Tanh as u32);
        asinh(x) = Asinh(GLOp::Asinh as u32);
        acosh(x) = Acosh(GLOp::Acosh as u32);
        atanh(x) = Atanh(GLOp::Atanh as u32);
        atan2(y, x) = Atan2(GLOp::Atan2 as u32);

        pow(x, y) = Pow(GLOp::Pow as u32);
        exp(x) = Exp(GLOp::Exp as u32);
        log(x) = Log(GLOp::Log as u32);
        exp2(x) = Exp2(GLOp::Exp2 as u32);
        log2(x) = Log2(GLOp::Log2 as u32);
        sqrt(x) = Sqrt(GLOp::Sqrt as u32);
        inverse_sqrt(x) = InverseSqrt(GLOp::InverseSqrt as u32);

        determinant(x) = Determinant(GLOp::Determinant as u32);
        matrix_inverse(x) = MatrixInverse(GLOp::MatrixInverse as u32);

        modf(x, i) = Modf(GLOp::Modf as u32);
        modf_struct(x) = ModfStruct(GLOp::ModfStruct as u32);
        f_min(x, y) = FMin(GLOp::FMin as u32);
        u_min(x, y) = UMin(GLOp::UMin as u32);
        s_min(x, y) = SMin(GLOp::SMin as u32);
        f_max(x, y) = FMax(GLOp::FMax as u32);
        u_max(x, y) = UMax(GLOp::UMax as u32);
        s_max(x, y) = SMax(GLOp::SMax as u32);
        f_clamp(x, min_val, max_val) = FClamp(GLOp::FClamp as u32);
        u_clamp(x, min_val, max_val) = UClamp(GLOp::UClamp as u32);
        s_clamp(x, min_val, max_val) = SClamp(GLOp::SClamp as u32);
        f_mix(x, y, a) = FMix(GLOp::FMix as u32);
        step(edge, x) = Step(GLOp::Step as u32);
        smooth_step(edge0, edge1, x) = SmoothStep(GLOp::SmoothStep as u32);
        fma(a, b, c) = Fma(GLOp::Fma as u32);
        frexp(x, exp) = Frexp(GLOp::Frexp as u32);
        frexp_struct(x) = FrexpStruct(GLOp::FrexpStruct as u32);
        ldexp(x, exp) = Ldexp(GLOp::Ldexp as u32);

        pack_snorm4x8(v) = PackSnorm4x8(GLOp::PackSnorm4x8 as u32);
        pack_unorm4x8(v) = PackUnorm4x8(GLOp::PackUnorm4x8 as u32);
        pack_snorm2x16(v) = PackSnorm2x16(GLOp::PackSnorm2x16 as u32);
        pack_unorm2x16(v) = PackUnorm2x16(GLOp::PackUnorm2x16 as u32);
        pack_half2x16(v) = PackHalf2x16(GLOp::PackHalf2x16 as u32);
        pack_double2x32(v) = PackDouble2x32(GLOp::PackDouble2x32 as u32);
        unpack_snorm2x16(p) = UnpackSnorm2x16(GLOp::UnpackSnorm2x16 as u32);
        unpack_unorm2x16(p) = UnpackUnorm2x16(GLOp::UnpackUnorm2x16 as u32);
        unpack_half2x16(v) = UnpackHalf2x16(GLOp::UnpackHalf2x16 as u32);
        unpack_snorm4x8(p) = UnpackSnorm4x8(GLOp::UnpackSnorm4x8 as u32);
        unpack_unorm4x8(p) = UnpackUnorm4x8(GLOp::UnpackUnorm4x8 as u32);
        unpack_double2x32(v) = UnpackDouble2x32(GLOp::UnpackDouble2x32 as u32);

        length(x) = Length(GLOp::Length as u32);
        distance(p0, p1) = Distance(GLOp::Distance as u32);
        cross(x, y) = Cross(GLOp::Cross as u32);
        normalize(x) = Normalize(GLOp::Normalize as u32);
        face_forward(n, i, nref) = FaceForward(GLOp::FaceForward as u32);
        reflect(i, n) = Reflect(GLOp::Reflect as u32);
        refract(i, n, eta) = Refract(GLOp::Refract as u32);

        find_i_lsb(value) = FindILsb(GLOp::FindILsb as u32);
        find_s_msb(value) = FindSMsb(GLOp::FindSMsb as u32);
        find_u_msb(value) = FindUMsb(GLOp::FindUMsb as u32);

        interpolate_at_centroid(interpolant) = InterpolateAtCentroid(GLOp::InterpolateAtCentroid as u32);
        interpolate_at_sample(interpolant, sample) = InterpolateAtSample(GLOp::InterpolateAtSample as u32);
        interpolate_at_offset(interpolant, offset) = InterpolateAtOffset(GLOp::InterpolateAtOffset as u32);

        n_min(x, y) = NMin(GLOp::NMin as u32);
        n_max(x, y) = NMax(GLOp::NMax as u32);
        n_clamp(x, min_val, max_val) = NClamp(GLOp::NClamp as u32);
    }

    AMD_GCN_SHADER {
        cube_face_index_amd(p) = CubeFaceIndexAMD(1);
        cube_face_coord_amd(p) = CubeFaceCoordAMD(2);
        time_amd() = TimeAMD(3);
    }

    AMD_SHADER_EXPLICIT_VERTEX_PARAMETER {
        interpolate_at_vertex_amd(interpolant, vertex_idx) = InterpolateAtVertexAMD(1);
    }

    AMD_SHADER_TRINARY_MINMAX {
        f_min3_amd(x, y, z) = FMin3AMD(1);
        u_min3_amd(x, y, z) = UMin3AMD(2);
        s_min3_amd(x, y, z) = SMin3AMD(3);
        f_max3_amd(x, y, z) = FMax3AMD(4);
        u_max3_amd(x, y, z) = UMax3AMD(5);
        s_max3_amd(x, y, z) = SMax3AMD(6);
        f_mid3_amd(x, y, z) = FMid3AMD(7);
        u_mid3_amd(x, y, z) = UMid3AMD(8);
        s_mid3_amd(x, y, z) = SMid3AMD(9);
    }
}
