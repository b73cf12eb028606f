//! Code generation context and the top-level pipeline (spec.md §4.11).
//!
//! `CodegenContext` bundles every stateful sub-component instruction
//! selection needs — assembly writer, label generator, value tracker,
//! source mapper, global layout, accumulated warnings, and the running
//! code-size counter — the same composition-over-threading-parameters shape
//! `cranelift-codegen`'s `Context` struct uses to carry `compile`'s working
//! state.

use crate::codegen::asm::{emit_acme, AssemblyModule, Directive};
use crate::codegen::basic_stub;
use crate::codegen::globals::GlobalAllocator;
use crate::codegen::labels::{LabelCategory, LabelGenerator};
use crate::codegen::prg::{package_prg, AssemblerInvoker};
use crate::codegen::select::{lower_block, resolve_phis};
use crate::codegen::sourcemap::{SourceMapEntry, SourceMapper};
use crate::codegen::target::TargetDescriptor;
use crate::codegen::tracking::ValueTracker;
use crate::ir::{BasicBlock, Module};
use crate::ssa;
use rustc_hash::{FxHashMap, FxHashSet};

/// Which artifact `generate` should produce.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Assembly source text only.
    Asm,
    /// Assemble to a `.prg` binary via an `AssemblerInvoker`.
    Prg,
    /// Both assembly text and the assembled `.prg` binary.
    Both,
    /// Cartridge image; declared but not implemented (spec.md §4.11 step 9).
    Crt,
}

/// Which debug artifacts to emit alongside the primary output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DebugMode {
    None,
    /// Annotate the assembly text itself with a comment naming the source
    /// span of each instruction, rather than producing a separate artifact.
    Inline,
    /// VICE `.lbl` symbol file.
    Vice,
    /// Symbol file and source map.
    Both,
}

/// Everything `generate` needs to know before it starts (spec.md §4.13).
#[derive(Clone, Debug)]
pub struct CodegenOptions {
    pub target: TargetDescriptor,
    pub format: OutputFormat,
    pub source_map: bool,
    pub debug: DebugMode,
    pub load_address: u16,
    pub basic_stub: bool,
    pub out_file: Option<String>,
}

/// The "End of Program" footer counts (spec.md §4.11 step 7-8).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodegenStats {
    pub code_size: u32,
    pub data_size: u32,
    pub zp_used: u16,
    pub function_count: usize,
    pub global_count: usize,
    pub total_size: u32,
}

/// Everything `generate` produces.
#[derive(Debug, Default)]
pub struct CodegenResult {
    pub asm_text: String,
    pub binary: Option<Vec<u8>>,
    pub symbol_file: Option<String>,
    pub source_map: Option<Vec<SourceMapEntry>>,
    pub stats: CodegenStats,
    pub warnings: Vec<String>,
}

/// The composition struct instruction selection and the pipeline driver
/// share for one `generate` call.
pub struct CodegenContext {
    pub asm: AssemblyModule,
    pub labels: LabelGenerator,
    pub tracker: ValueTracker,
    pub source_map: SourceMapper,
    pub globals: GlobalAllocator,
    pub options: CodegenOptions,
    pub warnings: Vec<String>,
    code_size: u32,
    call_arg_cursor: u16,
    block_labels: FxHashMap<(String, u32), String>,
    named_labels: FxHashMap<(LabelCategory, String), String>,
}

impl CodegenContext {
    pub fn new(options: CodegenOptions) -> Self {
        let source_map_enabled = options.source_map;
        CodegenContext {
            asm: AssemblyModule::new(),
            labels: LabelGenerator::new(),
            tracker: ValueTracker::new(),
            source_map: SourceMapper::new(source_map_enabled),
            globals: GlobalAllocator::new(),
            options,
            warnings: Vec::new(),
            code_size: 0,
            call_arg_cursor: 0,
            block_labels: FxHashMap::default(),
            named_labels: FxHashMap::default(),
        }
    }

    /// Clear every sub-component's accumulated state (spec.md §4.11, step 1:
    /// re-entrancy — `generate` must not leak state between invocations).
    fn reset(&mut self) {
        self.asm.reset();
        self.labels.reset();
        self.tracker.reset();
        self.source_map.reset(self.options.source_map);
        self.globals.reset();
        self.warnings.clear();
        self.code_size = 0;
        self.call_arg_cursor = 0;
        self.block_labels.clear();
        self.named_labels.clear();
    }

    /// The assembly program counter at the current point of emission.
    pub fn current_address(&self) -> u16 {
        self.options.target.code_start.wrapping_add(self.code_size as u16)
    }

    pub fn add_code_size(&mut self, bytes: u32) {
        self.code_size += bytes;
    }

    pub fn code_size(&self) -> u32 {
        self.code_size
    }

    /// The stable label for a function, allocated once and reused at every
    /// call site and at its own definition (spec.md §4.6: a label is
    /// allocated once per entity, not once per reference).
    pub fn function_label(&mut self, name: &str) -> String {
        let key = (LabelCategory::Function, name.to_string());
        if let Some(existing) = self.named_labels.get(&key) {
            return existing.clone();
        }
        let label = self.labels.make_named(LabelCategory::Function, name);
        self.named_labels.insert(key, label.clone());
        label
    }

    /// The stable label for a basic block, allocated once and reused by
    /// every `JUMP`/`BRANCH` that targets it and by its own definition.
    pub fn block_label(&mut self, func_name: &str, block: &BasicBlock) -> String {
        let key = (func_name.to_string(), block.id);
        if let Some(existing) = self.block_labels.get(&key) {
            return existing.clone();
        }
        let label = self.labels.make_block(Some(block.label_name.as_str()), block.id);
        self.block_labels.insert(key, label.clone());
        label
    }

    /// Hands out a fresh zero-page slot for spilling the third-and-later
    /// argument of a call (spec.md §4.10's reference calling convention).
    /// Slots are reused across separate calls; `reset_call_arg_slots` is
    /// called once per call before any argument is staged.
    pub fn allocate_call_arg_slot(&mut self) -> u16 {
        let base = self.options.target.zero_page_range.0 + self.globals.zp_bytes_used();
        let slot = base + self.call_arg_cursor;
        self.call_arg_cursor += 1;
        slot
    }

    pub fn reset_call_arg_slots(&mut self) {
        self.call_arg_cursor = 0;
    }

    /// Whether each instruction's source span should be annotated directly
    /// in the assembly text as a comment (spec.md §6.3 `debug: inline`).
    pub fn inline_debug_enabled(&self) -> bool {
        matches!(self.options.debug, DebugMode::Inline | DebugMode::Both)
    }
}

/// Emit the Zero Page / Data / RAM sections in that order (spec.md §4.11
/// step 4).
fn emit_globals_sections(ctx: &mut CodegenContext) {
    ctx.asm.section("Zero Page");
    for (name, addr, size) in ctx.globals.zero_page_entries().to_vec() {
        ctx.asm.comment(format!("{name} @ ${addr:02X} ({size} bytes)"));
    }

    ctx.asm.section("Data");
    ctx.asm.directive(Directive::SetOrigin(ctx.options.target.data_start));
    for entry in ctx.globals.data_entries().to_vec() {
        if let crate::codegen::globals::LayoutEntry::Data { name, address, bytes } = entry {
            ctx.asm.comment(format!("{name} @ ${address:04X}"));
            ctx.asm.directive(Directive::Byte(bytes));
        }
    }

    ctx.asm.section("RAM");
    ctx.asm.directive(Directive::SetOrigin(ctx.options.target.ram_start));
    for entry in ctx.globals.ram_entries().to_vec() {
        if let crate::codegen::globals::LayoutEntry::Reserve { name, address, size } = entry {
            ctx.asm.comment(format!("{name} @ ${address:04X}"));
            ctx.asm.directive(Directive::Reserve { count: size as u32 });
        }
    }

    ctx.asm.directive(Directive::SetOrigin(ctx.options.target.code_start));
}

/// Lower one function's body: every block in block-id order, after SSA phi
/// resolution (spec.md §4.11 step 6).
fn lower_function(ctx: &mut CodegenContext, module: &Module, func: &crate::ir::Function, next_phi_slot: &mut u16) {
    log::trace!("lowering function `{}` ({} blocks)", func.name, func.blocks.len());
    let label = ctx.function_label(&func.name);
    ctx.asm.label(label);
    ctx.asm.comment(format!("function {}", func.name));

    let phi_res = resolve_phis(func, next_phi_slot);
    for block in func.blocks_in_order() {
        lower_block(ctx, module, func, block, &phi_res);
    }
}

/// Run the SSA construction pass over every function's promotable locals.
/// All declared locals are treated as promotable: Blend65 as implemented
/// here has no address-of-local operation that would require keeping one
/// resident in memory across its whole lifetime.
fn promote_locals(module: &mut Module, warnings: &mut Vec<String>) {
    for func in module.functions.iter_mut() {
        let promotable: FxHashSet<String> = func.locals.keys().cloned().collect();
        let result = ssa::construct(func, &promotable);
        warnings.extend(result.warnings);
    }
}

/// The top-level code generator entry point (spec.md §4.11).
pub fn generate(module: &mut Module, options: CodegenOptions, assembler: &dyn AssemblerInvoker) -> CodegenResult {
    let mut ctx = CodegenContext::new(options);
    ctx.reset();
    log::debug!(
        "generate: module=`{}` target={} format={:?}",
        module.source_name,
        ctx.options.target.name,
        ctx.options.format
    );

    promote_locals(module, &mut ctx.warnings);

    // Step 2: header.
    ctx.asm.comment(format!(
        "{} -- compiled for {}",
        module.source_name, ctx.options.target.name
    ));
    ctx.asm.directive(Directive::SetOrigin(ctx.options.load_address));
    ctx.asm.section("Configuration");
    ctx.asm.comment(format!("target: {}", ctx.options.target.name));

    // Step 3: BASIC stub.
    if ctx.options.basic_stub && ctx.options.load_address == ctx.options.target.basic_start {
        let code_start = ctx.options.target.code_start;
        match basic_stub::generate(ctx.options.load_address, 10, code_start as i64) {
            Ok(bytes) => {
                ctx.asm.directive(Directive::Byte(bytes));
                ctx.asm.directive(Directive::SetOrigin(code_start));
            }
            Err(e) => {
                log::warn!("BASIC stub generation failed: {e}");
                ctx.warnings.push(format!("BASIC stub generation failed: {e}"));
            }
        }
    }

    // Step 4: globals.
    ctx.globals.allocate_all(&module.globals, &ctx.options.target.clone());
    emit_globals_sections(&mut ctx);
    for w in ctx.globals.warnings().to_vec() {
        ctx.warnings.push(w);
    }

    // Step 5: program entry point.
    ctx.asm.section("Program Entry Point");
    ctx.asm.label("_start");
    if module.main_function().is_some() {
        let main_label = ctx.function_label("main");
        ctx.asm.instruction("JSR", Some(main_label), None, 3);
        ctx.add_code_size(3);
    } else {
        ctx.asm.comment("No main function");
    }
    ctx.asm.label(".end");
    ctx.asm.instruction("JMP", Some(".end".to_string()), None, 3);
    ctx.add_code_size(3);

    // Step 6: functions, in declaration order. SSA construction already
    // mutated every function above; nothing past this point needs `&mut
    // Module`, so the rest of the pipeline holds only a shared borrow.
    let module: &Module = module;
    let mut next_phi_slot = ctx.options.target.phi_start;
    let function_count = module.functions.len();
    for func in module.functions.iter() {
        lower_function(&mut ctx, module, func, &mut next_phi_slot);
    }

    // Step 7: footer.
    ctx.asm.section("End of Program");
    ctx.asm.comment(format!("Code size: {}", ctx.code_size()));
    ctx.asm.comment(format!("Data size: {}", ctx.globals.data_size()));
    ctx.asm.comment(format!("ZP used: {}", ctx.globals.zp_bytes_used()));
    ctx.asm.comment(format!("Functions: {}", function_count));
    ctx.asm.comment(format!("Globals: {}", module.globals.len()));

    // Step 8: stats.
    let stats = CodegenStats {
        code_size: ctx.code_size(),
        data_size: ctx.globals.data_size(),
        zp_used: ctx.globals.zp_bytes_used(),
        function_count,
        global_count: module.globals.len(),
        total_size: ctx.code_size() + ctx.globals.data_size(),
    };

    let asm_text = emit_acme(&ctx.asm);

    // Step 9: format.
    let binary = match ctx.options.format {
        OutputFormat::Asm => None,
        OutputFormat::Prg | OutputFormat::Both => match assembler.assemble(&asm_text) {
            Ok(bytes) => Some(package_prg(ctx.options.load_address, &bytes)),
            Err(e) => {
                log::warn!("external assembler invocation failed: {e}");
                ctx.warnings.push(format!("external assembler invocation failed: {e}"));
                None
            }
        },
        OutputFormat::Crt => {
            log::warn!("crt output format requested but not implemented");
            ctx.warnings.push("crt output format is not implemented".to_string());
            None
        }
    };

    // Step 10: debug artifacts.
    let symbol_file = match ctx.options.debug {
        DebugMode::Vice | DebugMode::Both => Some(ctx.labels.export_vice_symbols()),
        DebugMode::None => None,
    };
    let source_map = match ctx.options.debug {
        DebugMode::Both if ctx.options.source_map => Some(ctx.source_map.entries().to_vec()),
        _ if ctx.options.source_map => Some(ctx.source_map.entries().to_vec()),
        _ => None,
    };

    CodegenResult {
        asm_text,
        binary,
        symbol_file,
        source_map,
        stats,
        warnings: ctx.warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::prg::MockAssembler;
    use crate::instructions::{InstId, Opcode};
    use crate::ir::function::StorageClass as FnStorageClass;
    use crate::ir::{Function, Global};
    use crate::types::Type;
    use crate::value::{Constant, Value};

    fn options(format: OutputFormat) -> CodegenOptions {
        CodegenOptions {
            target: TargetDescriptor::c64(),
            format,
            source_map: false,
            debug: DebugMode::None,
            load_address: 0x0801,
            basic_stub: true,
            out_file: None,
        }
    }

    fn demo_module() -> Module {
        let mut module = Module::new("demo.b65");
        module.add_global(Global {
            name: "borderColor".to_string(),
            ty: Type::Byte,
            storage: FnStorageClass::Map(0xD020),
            initial_value: None,
            address: None,
            is_constant: false,
        });
        let mut func = Function::new("main", Type::Void);
        func.block_mut(0).push(instruction_hardware_write());
        func.block_mut(0)
            .push(crate::instructions::Instruction::new(InstId(1), Opcode::ReturnVoid, None));
        module.add_function(func);
        module
    }

    fn instruction_hardware_write() -> crate::instructions::Instruction {
        crate::instructions::Instruction::new(
            InstId(0),
            Opcode::HardwareWrite {
                address: 0xD020,
                value: Value::Constant(Constant::new(1, Type::Byte)),
            },
            None,
        )
    }

    /// spec.md §8, scenario S1.
    #[test]
    fn full_pipeline_includes_stub_globals_and_main_call() {
        let mut module = demo_module();
        let result = generate(&mut module, options(OutputFormat::Asm), &MockAssembler::unavailable());
        assert!(result.asm_text.contains("* = $0801"));
        assert!(result.asm_text.contains("!byte"));
        assert!(result.asm_text.contains("JSR"));
        assert!(result.asm_text.contains("RTS"));
        assert!(result.binary.is_none());
    }

    #[test]
    fn prg_format_packages_assembler_output() {
        let mut module = demo_module();
        let assembler = MockAssembler::returning(vec![0xA9, 0x01]);
        let result = generate(&mut module, options(OutputFormat::Prg), &assembler);
        assert_eq!(result.binary, Some(vec![0x01, 0x08, 0xA9, 0x01]));
    }

    #[test]
    fn repeated_generate_calls_do_not_accumulate_state() {
        let mut module = demo_module();
        let mut opts = options(OutputFormat::Asm);
        opts.debug = DebugMode::Vice;
        let first = generate(&mut module, opts.clone(), &MockAssembler::unavailable());
        let mut module2 = demo_module();
        let second = generate(&mut module2, opts, &MockAssembler::unavailable());
        assert_eq!(first.stats, second.stats);
        assert_eq!(first.asm_text, second.asm_text);
    }
}
