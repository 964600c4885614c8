use spv_emit::ext_inst::{Arity, FIXED_ARITY_EXT_INSTS};
use spv_emit::spv::read::{ModuleParser, RawInst};
use spirv::GLOp;
use spv_emit::spv::spec::{ExtInstSet, Opcode};
use spv_emit::{Dialect, Id, Module};

fn decode(module: &Module) -> Vec<RawInst> {
    ModuleParser::read_from_spv_words(&module.assemble())
        .unwrap()
        .collect::<std::io::Result<_>>()
        .unwrap()
}

fn with_opcode(insts: &[RawInst], opcode: Opcode) -> Vec<&RawInst> {
    insts.iter().filter(|inst| inst.opcode == opcode).collect()
}

fn import_name(inst: &RawInst) -> String {
    spv_emit::spv::decode_literal_string(&inst.operands).unwrap().0.unwrap()
}

#[test]
fn unary_call_end_to_end() {
    let mut module = Module::default();
    let f32_ty = module.type_float(32);
    let x = module.constant(f32_ty, 2.5f32.to_bits());
    let abs_x = module.f_abs(f32_ty, x);

    let insts = decode(&module);

    let imports = with_opcode(&insts, Opcode::OpExtInstImport);
    assert_eq!(imports.len(), 1);
    assert_eq!(import_name(imports[0]), "GLSL.std.450");
    let glsl = imports[0].result_id.unwrap();

    let calls = with_opcode(&insts, Opcode::OpExtInst);
    assert_eq!(calls.len(), 1);
    // Header, result type, result ID, set, instruction number, and `x`.
    assert_eq!(calls[0].word_count(), 6);
    assert_eq!(calls[0].result_type_id, Some(f32_ty));
    assert_eq!(calls[0].result_id, Some(abs_x));
    assert_eq!(&calls[0].operands[..], [glsl.get(), GLOp::FAbs as u32, x.get()]);

    // `GLSL.std.450` doesn't need any `OpExtension`.
    assert!(with_opcode(&insts, Opcode::OpExtension).is_empty());
}

#[test]
fn same_set_is_imported_once() {
    let mut module = Module::default();
    let f32_ty = module.type_float(32);
    let x = module.constant(f32_ty, 1.0f32.to_bits());

    let a = module.sin(f32_ty, x);
    let b = module.cos(f32_ty, a);
    let c = module.pow(f32_ty, a, b);
    assert_eq!(module.ext_inst_imports().len(), 1);

    let insts = decode(&module);
    assert_eq!(with_opcode(&insts, Opcode::OpExtInstImport).len(), 1);

    let calls = with_opcode(&insts, Opcode::OpExtInst);
    assert_eq!(calls.len(), 3);
    let set_ids: Vec<_> = calls.iter().map(|call| call.operands[0]).collect();
    assert!(set_ids.iter().all(|&set| set == set_ids[0]));
    assert_eq!(calls[2].result_id, Some(c));
}

#[test]
fn explicit_import_is_idempotent() {
    let mut module = Module::default();
    let first = module.ext_inst_import("GLSL.std.450");
    for _ in 0..10 {
        assert_eq!(module.ext_inst_import("GLSL.std.450"), first);
    }
    assert_eq!(module.import_ext_inst_set(&ExtInstSet::GLSL_STD_450), first);

    let insts = decode(&module);
    assert_eq!(with_opcode(&insts, Opcode::OpExtInstImport).len(), 1);
}

#[test]
fn distinct_sets_get_distinct_ids() {
    let mut module = Module::default();
    let f32_ty = module.type_float(32);
    let x = module.constant(f32_ty, 1.0f32.to_bits());

    module.f_min(f32_ty, x, x);
    module.f_min3_amd(f32_ty, x, x, x);

    let insts = decode(&module);
    let imports = with_opcode(&insts, Opcode::OpExtInstImport);
    assert_eq!(imports.len(), 2);
    assert_ne!(imports[0].result_id, imports[1].result_id);
    assert_eq!(
        imports.iter().map(|inst| import_name(inst)).collect::<Vec<_>>(),
        ["GLSL.std.450", "SPV_AMD_shader_trinary_minmax"]
    );

    let calls = with_opcode(&insts, Opcode::OpExtInst);
    assert_eq!(calls[0].operands[0], imports[0].result_id.unwrap().get());
    assert_eq!(calls[1].operands[0], imports[1].result_id.unwrap().get());

    assert_eq!(module.extensions().collect::<Vec<_>>(), ["SPV_AMD_shader_trinary_minmax"]);
}

#[test]
fn trinary_operand_order() {
    let mut module = Module::default();
    let f32_ty = module.type_float(32);
    let [a, b, c] = [1.0f32, 2.0, 3.0].map(|v| module.constant(f32_ty, v.to_bits()));

    let clamped = module.f_clamp(f32_ty, a, b, c);
    let glsl = module.ext_inst_imports().get("GLSL.std.450").unwrap();

    let words = module.code().words();
    assert_eq!(
        words,
        [
            (8 << 16) | u32::from(Opcode::OpExtInst.as_u16()),
            f32_ty.get(),
            clamped.get(),
            glsl.get(),
            GLOp::FClamp as u32,
            a.get(),
            b.get(),
            c.get(),
        ]
    );
}

#[test]
fn frame_integrity_for_all_arities() {
    let mut module = Module::default();
    let f32_ty = module.type_float(32);
    let x = module.constant(f32_ty, 0);
    let set = module.ext_inst_import("NonSemantic.Example");

    for arity in 0..=4 {
        module.op_ext_inst(f32_ty, set, 100 + arity as u32, &vec![x; arity]);
    }

    let fmt = module.string("%f %f %f");
    let args = [x, x, x];
    for arg_count in [0, 1, 3] {
        module.debug_printf(fmt, &args[..arg_count]);
    }

    let insts = decode(&module);
    let calls = with_opcode(&insts, Opcode::OpExtInst);
    let operand_counts: Vec<_> = calls.iter().map(|call| call.word_count() - 5).collect();
    assert_eq!(operand_counts, [0, 1, 2, 3, 4, 1, 2, 4]);
}

#[test]
fn debug_printf_end_to_end() {
    let mut module = Module::default();
    let u32_ty = module.type_int(32, false);
    let args: Vec<Id> = (1..=3).map(|v| module.constant(u32_ty, v)).collect();
    let fmt = module.string("a=%u b=%u c=%u");

    module.debug_printf(fmt, &args);
    module.debug_printf(fmt, &args);

    let insts = decode(&module);

    let imports = with_opcode(&insts, Opcode::OpExtInstImport);
    assert_eq!(imports.len(), 1);
    assert_eq!(import_name(imports[0]), "NonSemantic.DebugPrintf");

    let extensions = with_opcode(&insts, Opcode::OpExtension);
    assert_eq!(extensions.len(), 1);
    let (ext_name, _) = spv_emit::spv::decode_literal_string(&extensions[0].operands).unwrap();
    assert_eq!(ext_name.unwrap(), "SPV_KHR_non_semantic_info");

    let void = module.type_void();
    let calls = with_opcode(&insts, Opcode::OpExtInst);
    assert_eq!(calls.len(), 2);
    for call in calls {
        assert_eq!(call.result_type_id, Some(void));
        assert_eq!(call.operands[1], 1);

        // Format string, then the 3 arguments (no explicit count).
        let user_operands = &call.operands[2..];
        assert_eq!(user_operands.len(), 4);
        assert_eq!(user_operands[0], fmt.get());
        assert_eq!(user_operands[1..], args.iter().map(|id| id.get()).collect::<Vec<_>>()[..]);
    }
}

#[test]
fn nullary_and_vendor_calls() {
    let mut module = Module::default();
    let u64_ty = module.type_int(64, false);
    let f32_ty = module.type_float(32);
    let vec3 = module.type_vector(f32_ty, 3);
    let p = module.constant(f32_ty, 0);

    let time = module.time_amd(u64_ty);
    module.cube_face_index_amd(f32_ty, p);
    let u32_ty = module.type_int(32, false);
    let vertex = module.constant(u32_ty, 0);
    module.interpolate_at_vertex_amd(vec3, p, vertex);

    let insts = decode(&module);
    let calls = with_opcode(&insts, Opcode::OpExtInst);
    assert_eq!(calls[0].result_id, Some(time));
    assert_eq!(calls[0].word_count(), 5);
    assert_eq!(calls[1].word_count(), 6);
    assert_eq!(calls[2].word_count(), 7);

    assert_eq!(
        module.extensions().collect::<Vec<_>>(),
        ["SPV_AMD_gcn_shader", "SPV_AMD_shader_explicit_vertex_parameter"]
    );
}

#[test]
fn every_table_entry_decodes() {
    let mut module = Module::default();
    let f32_ty = module.type_float(32);
    let x = module.constant(f32_ty, 0);

    for desc in FIXED_ARITY_EXT_INSTS {
        let Arity::Fixed(arity) = desc.arity else {
            panic!("{} should have a fixed arity", desc.name);
        };
        let set = module.import_ext_inst_set(desc.set);
        module.op_ext_inst(f32_ty, set, desc.number, &vec![x; arity]);
    }

    let mut parser = ModuleParser::read_from_spv_words(&module.assemble()).unwrap();
    let mut calls = vec![];
    for inst in parser.by_ref() {
        let inst = inst.unwrap();
        if inst.opcode == Opcode::OpExtInst {
            calls.push(inst);
        }
    }
    assert_eq!(calls.len(), FIXED_ARITY_EXT_INSTS.len());

    for (call, desc) in calls.iter().zip(FIXED_ARITY_EXT_INSTS) {
        let set_name = parser.ext_inst_set_name(Id::new(call.operands[0]).unwrap());
        assert_eq!(set_name, Some(desc.set.name));
        assert_eq!(call.operands[1], desc.number);
        assert!(desc.arity.accepts(call.word_count() - 5), "{}", desc.name);
    }

    // One import per set, however many instructions were used from each.
    assert_eq!(module.ext_inst_imports().len(), 4);
}

#[test]
fn layout_and_id_bound() {
    let mut module = Module::default();
    module.add_capability(spirv::Capability::Shader);
    let f32_ty = module.type_float(32);
    let x = module.constant(f32_ty, 0);
    module.sqrt(f32_ty, x);
    let last = module.normalize(f32_ty, x);

    let words = module.assemble();
    assert_eq!(words[3], module.id_bound());
    assert_eq!(module.id_bound(), last.get() + 1);

    let opcodes: Vec<_> = decode(&module).iter().map(|inst| inst.opcode).collect();
    assert_eq!(
        opcodes,
        [
            Opcode::OpCapability,
            Opcode::OpExtInstImport,
            Opcode::OpMemoryModel,
            Opcode::OpTypeFloat,
            Opcode::OpConstant,
            Opcode::OpExtInst,
            Opcode::OpExtInst,
        ]
    );
}

#[test]
fn spv_file_roundtrip() {
    let mut module = Module::new(Dialect { version_minor: 3, ..Dialect::default() });
    let f32_ty = module.type_float(32);
    let x = module.constant(f32_ty, 0);
    module.fract(f32_ty, x);

    let path = std::env::temp_dir().join(format!("spv-emit-roundtrip-{}.spv", std::process::id()));
    module.write_to_spv_file(&path).unwrap();
    let parser = ModuleParser::read_from_spv_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(parser.header[1], 0x0001_0300);
    let insts: Vec<_> = parser.collect::<std::io::Result<_>>().unwrap();
    assert_eq!(insts, decode(&module));
}

#[test]
fn dialect_from_json() {
    let dialect: Dialect = serde_json::from_str(r#"{ "version_minor": 3 }"#).unwrap();
    assert_eq!(dialect, Dialect { version_minor: 3, ..Dialect::default() });

    let dialect: Dialect =
        serde_json::from_str(r#"{ "version_minor": 3, "memory_model": "Vulkan" }"#).unwrap();
    assert_eq!(dialect.memory_model, spirv::MemoryModel::Vulkan);
    assert_eq!(dialect.addressing_model, spirv::AddressingModel::Logical);

    let json = serde_json::to_string(&dialect).unwrap();
    assert_eq!(serde_json::from_str::<Dialect>(&json).unwrap(), dialect);
}
