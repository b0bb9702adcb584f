//! Go emitter: a cgo package.
//!
//! Three files are produced. `pkg.h` declares the C side: the entry-point table, one call
//! helper per function and the per-slot trampolines. `pkg.go` holds the Go API. The exported
//! dispatch functions live in `pkg_export.go`, because cgo forbids C definitions in the
//! preamble of a file that uses `//export`.

use super::{Context, Files, quote};
use crate::abi::{AbiType, CStyle, Slot, c_params, c_type};
use crate::classes::Receiver;
use crate::error::GenResult;
use crate::target::Target;
use crate::types;
use plugify_gen_manifest::{CallbackId, FloatWidth, Ownership, SharedType, TypeRef};

pub(super) fn generate(ctx: &Context<'_>) -> GenResult<Files> {
    let module = ctx.module();
    let prefix = format!("{module}_");
    let style = CStyle {
        named_enums: false,
        prefix: &prefix,
    };

    let mut files = Files::new();
    files.insert(format!("{module}.h"), header(ctx, style));
    files.insert(format!("{module}.go"), package(ctx)?);
    if !ctx.pkg.callbacks.is_empty() {
        for name in Target::Golang.optional_files(module) {
            files.insert(name, exports(ctx)?);
        }
    }
    Ok(files)
}

fn generated_line(ctx: &Context<'_>) -> String {
    format!(
        "// Code generated by plugify-gen {} from {} {}. DO NOT EDIT.\n",
        super::VERSION,
        ctx.pkg.name,
        ctx.pkg.version
    )
}

fn declarations_guard(ctx: &Context<'_>) -> String {
    format!("{}_DECLARATIONS_ONLY", ctx.module().to_uppercase())
}

/// Drop `const` qualifiers; cgo exports cannot spell them.
fn mutable(c: &str) -> String {
    c.replace("const ", "")
}

fn header(ctx: &Context<'_>, style: CStyle<'_>) -> String {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let guard = format!("{}_GO_H", module.to_uppercase());
    let count = ctx.table_symbols().len();
    let mut code = generated_line(ctx);

    code.push_str(&format!("\n#ifndef {guard}\n#define {guard}\n\n"));
    code.push_str("#include <stdbool.h>\n#include <stddef.h>\n#include <stdint.h>\n#include <stdlib.h>\n");

    if !pkg.shared_types.is_empty() {
        code.push('\n');
        for shared in &pkg.shared_types {
            code.push_str(&super::c::shared_struct(*shared, true));
        }
    }

    if !ctx.callback_order.is_empty() {
        code.push('\n');
        for id in &ctx.callback_order {
            let names = ctx.callback_names(*id);
            let sig = &ctx.callback_abi[id.0];
            code.push_str(&format!(
                "typedef {} (*{prefix}{})({});\n",
                c_type(&sig.ret, pkg, &ctx.symbols, style),
                names.name,
                c_params(sig, names, pkg, &ctx.symbols, style),
                prefix = style.prefix,
            ));
        }
    }

    code.push_str(&format!("\n#ifndef {}\n\n", declarations_guard(ctx)));
    code.push_str(&format!("static void* {module}_table[{}];\n\n", count.max(1)));
    code.push_str(&format!(
        "static inline void {module}_set(int index, void* ptr) {{\n    {module}_table[index] = ptr;\n}}\n"
    ));
    if pkg.needs_free() {
        code.push_str(&format!(
            "\nstatic inline void {module}_free(void* ptr) {{\n    ((void (*)(void*)){module}_table[{}])(ptr);\n}}\n",
            ctx.free_index()
        ));
    }

    for index in 0..pkg.functions.len() {
        let names = ctx.function_names(index);
        let sig = &ctx.function_abi[index];
        let ret = c_type(&sig.ret, pkg, &ctx.symbols, style);
        let params = c_params(sig, names, pkg, &ctx.symbols, style);
        let types: Vec<String> = sig
            .params
            .iter()
            .map(|p| c_type(&p.ty, pkg, &ctx.symbols, style))
            .collect();
        let pointer_params = if types.is_empty() {
            "void".to_string()
        } else {
            types.join(", ")
        };
        let args: Vec<&str> = sig.params.iter().map(|p| p.slot.name(names)).collect();
        let call = format!(
            "(({ret} (*)({pointer_params})){module}_table[{index}])({})",
            args.join(", ")
        );
        code.push_str(&format!(
            "\nstatic inline {ret} {module}_call_{}({params}) {{\n",
            names.name
        ));
        if sig.ret == AbiType::Void {
            code.push_str(&format!("    {call};\n}}\n"));
        } else {
            code.push_str(&format!("    return {call};\n}}\n"));
        }
    }

    for id in &ctx.callback_order {
        let names = ctx.callback_names(*id);
        let name = &names.name;
        let sig = &ctx.callback_abi[id.0];
        let ret = c_type(&sig.ret, pkg, &ctx.symbols, style);
        let params = c_params(sig, names, pkg, &ctx.symbols, style);
        let mut dispatch_params = vec!["int slot".to_string()];
        let mut forwarded = Vec::new();
        for p in &sig.params {
            let ty = c_type(&p.ty, pkg, &ctx.symbols, style);
            let arg = p.slot.name(names);
            dispatch_params.push(format!("{} {arg}", mutable(&ty)));
            if ty.contains("const ") {
                forwarded.push(format!("({}){arg}", mutable(&ty)));
            } else {
                forwarded.push(arg.to_string());
            }
        }
        let keyword = if sig.ret == AbiType::Void { "" } else { "return " };

        code.push_str(&format!(
            "\nextern {} {module}_{name}_dispatch({});\n\n",
            mutable(&ret),
            dispatch_params.join(", ")
        ));
        for slot in 0..ctx.slots {
            let mut args = vec![slot.to_string()];
            args.extend(forwarded.iter().cloned());
            code.push_str(&format!(
                "static {ret} {module}_{name}_trampoline{slot}({params}) {{ {keyword}{module}_{name}_dispatch({}); }}\n",
                args.join(", ")
            ));
        }
        code.push_str(&format!(
            "\nstatic inline {module}_{name} {module}_{name}_trampoline(int slot) {{\n"
        ));
        code.push_str(&format!("    static const {module}_{name} trampolines[] = {{\n"));
        for slot in 0..ctx.slots {
            code.push_str(&format!("        {module}_{name}_trampoline{slot},\n"));
        }
        code.push_str("    };\n");
        code.push_str(&format!(
            "    return slot >= 0 && slot < {} ? trampolines[slot] : NULL;\n}}\n",
            ctx.slots
        ));
    }

    code.push_str(&format!("\n#endif /* {} */\n", declarations_guard(ctx)));
    code.push_str(&format!("\n#endif /* {guard} */\n"));
    code
}

/// cgo spelling of a lowered C type.
fn cgo_type(ctx: &Context<'_>, ty: &AbiType) -> String {
    match ty {
        AbiType::Void => String::new(),
        AbiType::Bool => "C.bool".to_string(),
        AbiType::Int(repr) => format!("C.{}", crate::abi::C_INTS[repr.table_index()]),
        AbiType::Float(FloatWidth::F32) => "C.float".to_string(),
        AbiType::Float(FloatWidth::F64) => "C.double".to_string(),
        AbiType::Size => "C.size_t".to_string(),
        AbiType::CStr => "*C.char".to_string(),
        AbiType::Shared(shared) => format!("C.{}", shared.name()),
        AbiType::Enum(id) => format!(
            "C.{}",
            crate::abi::C_INTS[ctx.pkg.enum_type(*id).repr.table_index()]
        ),
        AbiType::Callback(id) => format!("C.{}_{}", ctx.module(), ctx.symbols.callback_name(*id)),
        AbiType::Ptr(inner) | AbiType::PtrMut(inner) => format!("*{}", cgo_type(ctx, inner)),
    }
}

/// Go expression converting Go `value` of type `ty` to its cgo form.
fn to_c(ctx: &Context<'_>, ty: &TypeRef, value: &str) -> String {
    match ty {
        TypeRef::Shared(shared) => format!("*(*C.{})(unsafe.Pointer(&{value}))", shared.name()),
        TypeRef::Callback(id) => format!(
            "C.{}_{}(unsafe.Pointer({value}))",
            ctx.module(),
            ctx.symbols.callback_name(*id)
        ),
        TypeRef::Bool => format!("C.bool({value})"),
        TypeRef::Int(repr) => format!("C.{}({value})", crate::abi::C_INTS[repr.table_index()]),
        TypeRef::Handle(width) => {
            format!("C.{}({value})", crate::abi::C_INTS[width.repr().table_index()])
        }
        TypeRef::Enum(id) => format!(
            "C.{}({value})",
            crate::abi::C_INTS[ctx.pkg.enum_type(*id).repr.table_index()]
        ),
        TypeRef::Float(FloatWidth::F32) => format!("C.float({value})"),
        TypeRef::Float(FloatWidth::F64) => format!("C.double({value})"),
        _ => value.to_string(),
    }
}

/// Go expression converting cgo `value` of type `ty` to its Go form.
fn from_c(ctx: &Context<'_>, ty: &TypeRef, value: &str) -> GenResult<String> {
    Ok(match ty {
        TypeRef::Shared(shared) => format!("*(*{})(unsafe.Pointer(&{value}))", go_shared(*shared)),
        TypeRef::Str(_) => format!("C.GoString({value})"),
        TypeRef::Callback(_) => format!("{}(unsafe.Pointer({value}))", ctx.decl_type(ty)?),
        _ => format!("{}({value})", ctx.decl_type(ty)?),
    })
}

fn go_shared(shared: SharedType) -> &'static str {
    types::table(Target::Golang).shared_name(shared)
}

fn go_shared_struct(shared: SharedType) -> String {
    let fields = match shared {
        SharedType::Mat4x4 => "\tM [16]float32\n".to_string(),
        other => other
            .fields()
            .iter()
            .map(|f| format!("\t{} float32\n", f.to_uppercase()))
            .collect(),
    };
    format!("type {} struct {{\n{fields}}}\n", go_shared(shared))
}

fn push_doc(code: &mut String, indent: &str, lines: &[String]) {
    super::push_comment(code, indent, "//", lines);
}

fn package(ctx: &Context<'_>) -> GenResult<String> {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let symbols = ctx.table_symbols();
    let mut code = generated_line(ctx);

    code.push('\n');
    match pkg.description.as_deref() {
        Some(description) => {
            push_doc(&mut code, "", &super::doc_lines(Some(description)));
        }
        None => code.push_str(&format!("// Package {module} binds the {} plugin.\n", pkg.name)),
    }
    code.push_str(&format!("package {module}\n\n"));
    code.push_str(&format!("/*\n#include \"{module}.h\"\n*/\nimport \"C\"\n\n"));
    if pkg.callbacks.is_empty() {
        code.push_str("import \"unsafe\"\n");
    } else {
        code.push_str("import (\n\t\"sync\"\n\t\"unsafe\"\n)\n");
    }

    for shared in &pkg.shared_types {
        code.push('\n');
        code.push_str(&go_shared_struct(*shared));
    }

    for (e, names) in pkg.enums.iter().zip(&ctx.symbols.enums) {
        let repr = types::table(Target::Golang).ints[e.repr.table_index()];
        code.push('\n');
        push_doc(&mut code, "", &super::doc_lines(e.doc.as_deref()));
        code.push_str(&format!("type {} {repr}\n", names.name));
        if !e.members.is_empty() {
            code.push_str("\nconst (\n");
            for (member, member_name) in e.members.iter().zip(&names.members) {
                push_doc(&mut code, "\t", &super::doc_lines(member.doc.as_deref()));
                code.push_str(&format!(
                    "\t{member_name} {} = {}\n",
                    names.name, member.value
                ));
            }
            code.push_str(")\n");
        }
    }

    for id in &ctx.callback_order {
        let cb = pkg.callback(*id);
        let names = ctx.callback_names(*id);
        let mut params = Vec::with_capacity(cb.params.len());
        for (p, pname) in cb.params.iter().zip(&names.params) {
            params.push(format!("{pname} {}", ctx.param_type(p)?));
        }
        let ret = match &cb.ret.ty {
            TypeRef::Void => String::new(),
            other => format!(" {}", ctx.decl_type(other)?),
        };
        code.push('\n');
        let mut doc = super::doc_lines(cb.doc.as_deref());
        if cb.params.iter().any(|p| matches!(p.ty, TypeRef::Array(_))) {
            if !doc.is_empty() {
                doc.push(String::new());
            }
            doc.push("Slice arguments alias native memory and are only valid during the call.".to_string());
        }
        push_doc(&mut code, "", &doc);
        code.push_str(&format!("type {} func({}){ret}\n\n", names.name, params.join(", ")));
        code.push_str(&format!(
            "// Native{0} is a native function pointer obtained from Register{0}.\n",
            names.name
        ));
        code.push_str(&format!("type Native{} unsafe.Pointer\n", names.name));
    }

    code.push_str("\nvar symbols = [...]string{\n");
    for symbol in &symbols {
        code.push_str(&format!("\t{},\n", quote(symbol)));
    }
    code.push_str("}\n\n");
    code.push_str(&format!("var resolved [{}]bool\n\n", symbols.len()));
    code.push_str(
        "// Init resolves every entry point through resolve and returns the symbols that could\n\
         // not be resolved. Calling a function whose symbol is missing panics.\n",
    );
    code.push_str("func Init(resolve func(symbol string) unsafe.Pointer) []string {\n");
    code.push_str("\tvar missing []string\n");
    code.push_str("\tfor index, symbol := range symbols {\n");
    code.push_str("\t\tptr := resolve(symbol)\n");
    code.push_str("\t\tresolved[index] = ptr != nil\n");
    code.push_str("\t\tif ptr == nil {\n\t\t\tmissing = append(missing, symbol)\n\t\t}\n");
    code.push_str(&format!("\t\tC.{module}_set(C.int(index), ptr)\n"));
    code.push_str("\t}\n\treturn missing\n}\n\n");
    code.push_str("func mustResolve(index int) {\n");
    code.push_str("\tif !resolved[index] {\n");
    code.push_str("\t\tpanic(symbols[index] + \" is not resolved; call Init first\")\n\t}\n}\n");

    for index in 0..pkg.functions.len() {
        function(ctx, index, &mut code)?;
    }

    for id in &ctx.callback_order {
        registry(ctx, *id, &mut code);
    }

    for k in 0..ctx.classes.len() {
        class(ctx, k, &mut code)?;
    }
    Ok(code)
}

fn function(ctx: &Context<'_>, index: usize, code: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let f = &pkg.functions[index];
    let names = ctx.function_names(index);
    let sig = &ctx.function_abi[index];

    let mut params = Vec::with_capacity(f.params.len());
    for (p, name) in f.params.iter().zip(&names.params) {
        params.push(format!("{name} {}", ctx.param_type(p)?));
    }
    let ret = match &f.ret.ty {
        TypeRef::Void => String::new(),
        other => format!(" {}", ctx.decl_type(other)?),
    };

    let mut doc = ctx.function_doc(f, false);
    if let Some(note) = &f.deprecated {
        if !doc.is_empty() {
            doc.push(String::new());
        }
        doc.push(format!("Deprecated: {note}"));
    }
    code.push('\n');
    push_doc(code, "", &doc);
    code.push_str(&format!("func {}({}){ret} {{\n", names.name, params.join(", ")));
    code.push_str(&format!("\tmustResolve({index})\n"));

    let mut args = Vec::with_capacity(sig.params.len());
    for abi in &sig.params {
        args.push(match abi.slot {
            Slot::Value(i) => {
                let name = &names.params[i];
                let p = &f.params[i];
                match &p.ty {
                    _ if p.by_ref => format!("({})(unsafe.Pointer({name}))", cgo_type(ctx, &abi.ty)),
                    TypeRef::Str(_) => {
                        code.push_str(&format!("\t{name}C := C.CString({name})\n"));
                        code.push_str(&format!("\tdefer C.free(unsafe.Pointer({name}C))\n"));
                        format!("{name}C")
                    }
                    other => to_c(ctx, other, name),
                }
            }
            Slot::Data(i) => {
                let name = &names.params[i];
                format!(
                    "({})(unsafe.Pointer(unsafe.SliceData({name})))",
                    cgo_type(ctx, &abi.ty)
                )
            }
            Slot::Len(i) => format!("C.size_t(len({}))", names.params[i]),
            Slot::OutLen => {
                let out_len = abi.slot.name(names);
                code.push_str(&format!("\tvar {out_len} C.size_t\n"));
                format!("&{out_len}")
            }
        });
    }
    let call = format!("C.{module}_call_{}({})", names.name, args.join(", "));

    match &f.ret.ty {
        TypeRef::Void => code.push_str(&format!("\t{call}\n")),
        TypeRef::Str(ownership) => {
            code.push_str(&format!("\traw := {call}\n"));
            code.push_str("\tif raw == nil {\n\t\treturn \"\"\n\t}\n");
            if *ownership == Ownership::Owned {
                code.push_str(&format!("\tdefer C.{module}_free(unsafe.Pointer(raw))\n"));
            }
            code.push_str("\treturn C.GoString(raw)\n");
        }
        TypeRef::Array(inner) => {
            let out_len = names.out_len.as_deref().unwrap_or("outLen");
            let element = ctx.decl_type(inner)?;
            code.push_str(&format!("\traw := {call}\n"));
            code.push_str("\tif raw == nil {\n\t\treturn nil\n\t}\n");
            code.push_str(&format!("\tdefer C.{module}_free(unsafe.Pointer(raw))\n"));
            code.push_str(&format!(
                "\treturn append([]{element}(nil), unsafe.Slice((*{element})(unsafe.Pointer(raw)), int({out_len}))...)\n"
            ));
        }
        TypeRef::Shared(_) => {
            code.push_str(&format!("\traw := {call}\n"));
            code.push_str(&format!("\treturn {}\n", from_c(ctx, &f.ret.ty, "raw")?));
        }
        other => code.push_str(&format!("\treturn {}\n", from_c(ctx, other, &call)?)),
    }
    code.push_str("}\n");
    Ok(())
}

fn registry(ctx: &Context<'_>, id: CallbackId, code: &mut String) {
    let module = ctx.module();
    let name = &ctx.callback_names(id).name;
    let slots = format!("{name}Slots");
    let state = format!("registry{name}");

    code.push_str(&format!(
        "\n// {slots} is the number of {name} closures that can be registered at once.\n"
    ));
    code.push_str(&format!("const {slots} = {}\n\n", ctx.slots));
    code.push_str(&format!("var {state} struct {{\n"));
    code.push_str("\tsync.Mutex\n");
    code.push_str(&format!("\tentries [{slots}]{name}\n"));
    code.push_str("\tfree    []int\n\tready   bool\n}\n\n");

    code.push_str(&format!(
        "// Register{name} binds fn to a free slot and returns the slot with its native pointer.\n\
         // ok is false when every slot is taken.\n"
    ));
    code.push_str(&format!(
        "func Register{name}(fn {name}) (slot int, native Native{name}, ok bool) {{\n"
    ));
    code.push_str(&format!("\tr := &{state}\n\tr.Lock()\n\tdefer r.Unlock()\n"));
    code.push_str("\tif !r.ready {\n");
    code.push_str(&format!(
        "\t\tfor i := {slots} - 1; i >= 0; i-- {{\n\t\t\tr.free = append(r.free, i)\n\t\t}}\n"
    ));
    code.push_str("\t\tr.ready = true\n\t}\n");
    code.push_str("\tif fn == nil || len(r.free) == 0 {\n\t\treturn 0, nil, false\n\t}\n");
    code.push_str("\tslot = r.free[len(r.free)-1]\n");
    code.push_str("\tr.free = r.free[:len(r.free)-1]\n");
    code.push_str("\tr.entries[slot] = fn\n");
    code.push_str(&format!(
        "\treturn slot, Native{name}(unsafe.Pointer(C.{module}_{name}_trampoline(C.int(slot)))), true\n}}\n\n"
    ));

    code.push_str(&format!(
        "// Unregister{name} releases slot. It returns false if the slot was not registered.\n"
    ));
    code.push_str(&format!("func Unregister{name}(slot int) bool {{\n"));
    code.push_str(&format!("\tr := &{state}\n\tr.Lock()\n\tdefer r.Unlock()\n"));
    code.push_str(&format!(
        "\tif slot < 0 || slot >= {slots} || r.entries[slot] == nil {{\n\t\treturn false\n\t}}\n"
    ));
    code.push_str("\tr.entries[slot] = nil\n");
    code.push_str("\tr.free = append(r.free, slot)\n\treturn true\n}\n\n");

    code.push_str(&format!("func lookup{name}(slot int) {name} {{\n"));
    code.push_str(&format!("\tr := &{state}\n\tr.Lock()\n\tdefer r.Unlock()\n"));
    code.push_str(&format!(
        "\tif slot < 0 || slot >= {slots} {{\n\t\treturn nil\n\t}}\n\treturn r.entries[slot]\n}}\n"
    ));
}

fn exports(ctx: &Context<'_>) -> GenResult<String> {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let mut body = String::new();
    let mut uses_unsafe = false;

    for id in &ctx.callback_order {
        let cb = pkg.callback(*id);
        let names = ctx.callback_names(*id);
        let name = &names.name;
        let sig = &ctx.callback_abi[id.0];

        let mut params = vec!["slot C.int".to_string()];
        params.extend(
            sig.params
                .iter()
                .map(|p| format!("{} {}", p.slot.name(names), cgo_type(ctx, &p.ty))),
        );
        let ret = match &sig.ret {
            AbiType::Void => String::new(),
            other => format!(" {}", cgo_type(ctx, other)),
        };

        let mut args = Vec::with_capacity(cb.params.len());
        for (i, (p, pname)) in cb.params.iter().zip(&names.params).enumerate() {
            args.push(match &p.ty {
                _ if p.by_ref => {
                    uses_unsafe = true;
                    format!("({})(unsafe.Pointer({pname}))", ctx.param_type(p)?)
                }
                TypeRef::Array(inner) => {
                    uses_unsafe = true;
                    let len = names.lens[i].as_deref().unwrap_or("len");
                    let element = ctx.decl_type(inner)?;
                    format!("unsafe.Slice((*{element})(unsafe.Pointer({pname})), int({len}))")
                }
                other => {
                    uses_unsafe |= matches!(other, TypeRef::Shared(_));
                    from_c(ctx, other, pname)?
                }
            });
        }
        let call = format!("fn({})", args.join(", "));

        body.push_str(&format!("\n//export {module}_{name}_dispatch\n"));
        body.push_str(&format!(
            "func {module}_{name}_dispatch({}){ret} {{\n",
            params.join(", ")
        ));
        // panics must not unwind into native frames; results stay zero
        body.push_str(
            "\tdefer func() {\n\t\tif recovered := recover(); recovered != nil {\n\t\t\tfmt.Fprintln(os.Stderr, recovered)\n\t\t}\n\t}()\n",
        );
        body.push_str(&format!("\tfn := lookup{name}(int(slot))\n"));
        match &cb.ret.ty {
            TypeRef::Void => {
                body.push_str("\tif fn == nil {\n\t\treturn\n\t}\n");
                body.push_str(&format!("\t{call}\n"));
            }
            TypeRef::Shared(_) => {
                uses_unsafe = true;
                body.push_str(&format!(
                    "\tif fn == nil {{\n\t\tvar zero{ret}\n\t\treturn zero\n\t}}\n"
                ));
                body.push_str(&format!("\tresult := {call}\n"));
                body.push_str(&format!("\treturn {}\n", to_c(ctx, &cb.ret.ty, "result")));
            }
            other => {
                body.push_str(&format!(
                    "\tif fn == nil {{\n\t\tvar zero{ret}\n\t\treturn zero\n\t}}\n"
                ));
                body.push_str(&format!("\treturn {}\n", to_c(ctx, other, &call)));
            }
        }
        body.push_str("}\n");
    }

    let mut code = generated_line(ctx);
    code.push_str(&format!("\npackage {module}\n\n"));
    code.push_str(&format!(
        "/*\n#define {}\n#include \"{module}.h\"\n*/\nimport \"C\"\n",
        declarations_guard(ctx)
    ));
    code.push_str("\nimport (\n\t\"fmt\"\n\t\"os\"\n");
    if uses_unsafe {
        code.push_str("\t\"unsafe\"\n");
    }
    code.push_str(")\n");
    code.push_str(&body);
    Ok(code)
}

fn class(ctx: &Context<'_>, k: usize, code: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let model = &ctx.classes[k];
    let names = &ctx.symbols.classes[k];
    let name = &names.name;
    let handle = ctx.decl_type(&model.handle)?;
    let invalid = model.invalid_value;

    code.push('\n');
    push_doc(code, "", &super::doc_lines(model.doc.as_deref()));
    code.push_str(&format!("type {name} struct {{\n\thandle {handle}\n}}\n\n"));
    code.push_str(&format!("// {name}FromHandle wraps an existing handle.\n"));
    code.push_str(&format!(
        "func {name}FromHandle(handle {handle}) *{name} {{\n\treturn &{name}{{handle: handle}}\n}}\n\n"
    ));
    code.push_str(&format!(
        "// Handle returns the underlying handle.\nfunc (r *{name}) Handle() {handle} {{\n\treturn r.handle\n}}\n"
    ));

    code.push_str(&format!(
        "\n// IsValid reports whether the wrapper holds a handle.\nfunc (r *{name}) IsValid() bool {{\n\treturn r.handle != {invalid}\n}}\n"
    ));

    if model.receiver == Receiver::Owned
        && let Some(dtor) = model.destructor
    {
        code.push_str("\n// Close destroys the handle. Further calls do nothing.\n");
        code.push_str(&format!("func (r *{name}) Close() {{\n"));
        code.push_str(&format!(
            "\tif r.handle != {invalid} {{\n\t\t{}(r.handle)\n\t\tr.handle = {invalid}\n\t}}\n}}\n",
            ctx.function_names(dtor).name
        ));
        code.push_str("\n// Release gives up ownership of the handle without destroying it.\n");
        code.push_str(&format!(
            "func (r *{name}) Release() {handle} {{\n\treleased := r.handle\n\tr.handle = {invalid}\n\treturn released\n}}\n"
        ));
    }

    let single = model.constructors.len() == 1;
    for (ctor, ctor_name) in model.constructors.iter().zip(&names.constructors) {
        let f = &pkg.functions[*ctor];
        let fnames = ctx.function_names(*ctor);
        let mut params = Vec::new();
        for (p, pname) in f.params.iter().zip(&fnames.params) {
            params.push(format!("{pname} {}", ctx.param_type(p)?));
        }
        let func = if single {
            format!("New{name}")
        } else {
            format!("New{name}{ctor_name}")
        };
        code.push('\n');
        let mut doc = vec![format!("{func} creates a {name} through {}.", fnames.name)];
        doc.extend(super::doc_lines(f.doc.as_deref()));
        push_doc(code, "", &doc);
        code.push_str(&format!(
            "func {func}({}) *{name} {{\n\treturn &{name}{{handle: {}({})}}\n}}\n",
            params.join(", "),
            fnames.name,
            fnames.params.join(", ")
        ));
    }

    for (method, method_name) in model.methods.iter().zip(&names.methods) {
        let f = &pkg.functions[method.function];
        let fnames = ctx.function_names(method.function);
        let skip = usize::from(method.bind_self);
        let mut params = Vec::new();
        let mut args = Vec::new();
        if method.bind_self {
            args.push("r.handle".to_string());
        }
        for (j, (p, pname)) in f.params.iter().zip(&fnames.params).skip(skip).enumerate() {
            match method.param_alias(j) {
                Some(alias) => {
                    params.push(format!("{pname} *{}", ctx.alias_class(alias)));
                    let member = if alias.owner { "Release" } else { "Handle" };
                    args.push(format!("{pname}.{member}()"));
                }
                None => {
                    params.push(format!("{pname} {}", ctx.param_type(p)?));
                    args.push(pname.clone());
                }
            }
        }
        let call = format!("{}({})", fnames.name, args.join(", "));
        let (ret, body) = match (method.ret_alias, &f.ret.ty) {
            (Some(alias), _) => {
                let class = ctx.alias_class(alias);
                (format!(" *{class}"), format!("return &{class}{{handle: {call}}}"))
            }
            (None, TypeRef::Void) => (String::new(), call),
            (None, other) => (format!(" {}", ctx.decl_type(other)?), format!("return {call}")),
        };

        code.push('\n');
        push_doc(code, "", &super::doc_lines(f.doc.as_deref()));
        if method.bind_self {
            code.push_str(&format!(
                "func (r *{name}) {method_name}({}){ret} {{\n\t{body}\n}}\n",
                params.join(", ")
            ));
        } else {
            code.push_str(&format!(
                "func {name}{method_name}({}){ret} {{\n\t{body}\n}}\n",
                params.join(", ")
            ));
        }
    }
    Ok(())
}
