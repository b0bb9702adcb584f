//! C emitter: a header plus a translation unit holding the entry-point table.
//!
//! C has no closures, so registry handlers are `(handler, user_data)` pairs and the caller must
//! serialize `Register`/`Unregister` calls. Returned strings and arrays are handed to the caller,
//! who releases them with `<pkg>_Free`.

use super::{Context, Files, push_block_doc};
use crate::abi::{AbiType, CStyle, c_params, c_type};
use crate::error::GenResult;
use plugify_gen_manifest::{IntRepr, Ownership, SharedType, TypeRef};

pub(super) fn generate(ctx: &Context<'_>) -> GenResult<Files> {
    let module = ctx.module();
    let mut files = Files::new();
    files.insert(format!("{module}.h"), header(ctx));
    files.insert(format!("{module}.c"), source(ctx));
    Ok(files)
}

/// Integer literal of `value` typed for `repr`.
pub(super) fn c_int_literal(value: i64, repr: IntRepr) -> String {
    match (repr.width, repr.signed) {
        (64, true) if value == i64::MIN => "(-9223372036854775807LL - 1)".to_string(),
        (64, true) => format!("{value}LL"),
        (64, false) => format!("{value}ULL"),
        (32, false) => format!("{value}U"),
        _ => value.to_string(),
    }
}

/// C struct definition of a shared value type.
pub(super) fn shared_struct(shared: SharedType, typedef: bool) -> String {
    let fields = match shared {
        SharedType::Mat4x4 => "float m[16];".to_string(),
        other => other
            .fields()
            .iter()
            .map(|f| format!("float {f};"))
            .collect::<Vec<_>>()
            .join(" "),
    };
    let name = shared.name();
    if typedef {
        format!("typedef struct {name} {{ {fields} }} {name};\n")
    } else {
        format!("struct {name} {{ {fields} }};\n")
    }
}

fn return_type(ctx: &Context<'_>, index: usize) -> String {
    match ctx.pkg.functions[index].ret.ty {
        TypeRef::Str(Ownership::Owned) => "char*".to_string(),
        _ => c_type(&ctx.function_abi[index].ret, ctx.pkg, &ctx.symbols, CStyle::NAMED),
    }
}

fn prototype(ctx: &Context<'_>, index: usize, name: &str) -> String {
    let params = c_params(
        &ctx.function_abi[index],
        ctx.function_names(index),
        ctx.pkg,
        &ctx.symbols,
        CStyle::NAMED,
    );
    format!("{} {name}({params})", return_type(ctx, index))
}

fn header(ctx: &Context<'_>) -> String {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let guard = format!("{}_H", module.to_uppercase());
    let mut code = String::new();

    code.push_str("/*\n");
    for line in ctx.header_lines() {
        super::push_comment_line(&mut code, "", " *", &super::block_comment_text(&line));
    }
    code.push_str(" */\n\n");
    code.push_str(&format!("#ifndef {guard}\n#define {guard}\n\n"));
    code.push_str("#include <stdbool.h>\n#include <stddef.h>\n#include <stdint.h>\n\n");
    code.push_str("#ifdef __cplusplus\nextern \"C\" {\n#endif\n");

    if !pkg.shared_types.is_empty() {
        code.push('\n');
        for shared in &pkg.shared_types {
            code.push_str(&shared_struct(*shared, true));
        }
    }

    for (e, names) in pkg.enums.iter().zip(&ctx.symbols.enums) {
        code.push('\n');
        push_block_doc(&mut code, "", &super::doc_lines(e.doc.as_deref()));
        code.push_str(&format!(
            "typedef {} {};\n",
            crate::abi::C_INTS[e.repr.table_index()],
            names.name
        ));
        for (member, member_name) in e.members.iter().zip(&names.members) {
            if let Some(doc) = &member.doc {
                code.push_str(&format!("/** {} */\n", super::block_comment_text(doc)));
            }
            code.push_str(&format!(
                "#define {member_name} (({}){})\n",
                names.name,
                c_int_literal(member.value, e.repr)
            ));
        }
    }

    for id in &ctx.callback_order {
        let cb = pkg.callback(*id);
        let names = ctx.callback_names(*id);
        let sig = &ctx.callback_abi[id.0];
        let ret = c_type(&sig.ret, pkg, &ctx.symbols, CStyle::NAMED);
        let params = c_params(sig, names, pkg, &ctx.symbols, CStyle::NAMED);
        code.push('\n');
        push_block_doc(&mut code, "", &super::doc_lines(cb.doc.as_deref()));
        code.push_str(&format!("typedef {ret} (*{})({params});\n", names.name));
        let handler_params = if sig.params.is_empty() {
            "void* user_data".to_string()
        } else {
            format!("void* user_data, {params}")
        };
        code.push_str(&format!(
            "/** Closure half of {0}: receives the user_data given to {0}_Register. */\n",
            names.name
        ));
        code.push_str(&format!(
            "typedef {ret} (*{}_Handler)({handler_params});\n",
            names.name
        ));
    }

    code.push_str(&format!(
        "\n/** Looks up a plugin entry point by name, or returns NULL. */\n\
         typedef void* (*{module}_Resolver)(const char* name);\n\n"
    ));
    code.push_str(&format!(
        "/**\n * Resolve every entry point through `resolve`.\n * \
         Returns the number of symbols that could not be resolved.\n */\n\
         int {module}_Init({module}_Resolver resolve);\n"
    ));
    if pkg.needs_free() {
        code.push_str(&format!(
            "\n/** Release a string or array returned by this package. */\n\
             void {module}_Free(void* ptr);\n"
        ));
    }

    for (index, f) in pkg.functions.iter().enumerate() {
        let names = ctx.function_names(index);
        let mut doc = ctx.function_doc(f, true);
        let params_doc: Vec<String> = f
            .params
            .iter()
            .zip(&names.params)
            .filter_map(|(p, n)| p.doc.as_ref().map(|d| format!("@param {n} {d}")))
            .collect();
        if !params_doc.is_empty() || f.ret.doc.is_some() {
            if !doc.is_empty() {
                doc.push(String::new());
            }
            doc.extend(params_doc);
            if let Some(ret) = &f.ret.doc {
                doc.push(format!("@return {ret}"));
            }
        }
        if ctx.function_abi[index].returns_array()
            || matches!(f.ret.ty, TypeRef::Str(Ownership::Owned))
        {
            doc.push(format!("Release the result with {module}_Free."));
        }
        code.push('\n');
        push_block_doc(&mut code, "", &doc);
        code.push_str(&format!("{};\n", prototype(ctx, index, &names.name)));
    }

    if !pkg.callbacks.is_empty() {
        code.push_str(
            "\n/*\n * Callback registries. Each slot binds one handler to one native trampoline.\n \
             * Not thread-safe: serialize Register and Unregister calls.\n */\n",
        );
        for id in &ctx.callback_order {
            let name = &ctx.callback_names(*id).name;
            code.push_str(&format!("\n#define {name}_SLOTS {}\n\n", ctx.slots));
            code.push_str(&format!(
                "/**\n * Bind `handler` to a free slot and store its trampoline in `out_fn`.\n \
                 * Returns the slot, or -1 when every slot is taken.\n */\n\
                 int {name}_Register({name}_Handler handler, void* user_data, {name}* out_fn);\n\n"
            ));
            code.push_str(&format!(
                "/** Release `slot`. Unknown or free slots are ignored. */\n\
                 void {name}_Unregister(int slot);\n"
            ));
        }
    }

    code.push_str("\n#ifdef __cplusplus\n}\n#endif\n\n");
    code.push_str(&format!("#endif /* {guard} */\n"));
    code
}

fn table_field(ctx: &Context<'_>, index: usize, name: &str) -> String {
    let params = c_params(
        &ctx.function_abi[index],
        ctx.function_names(index),
        ctx.pkg,
        &ctx.symbols,
        CStyle::NAMED,
    );
    format!("{} (*{name})({params});", return_type(ctx, index))
}

fn source(ctx: &Context<'_>) -> String {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let mut code = String::new();

    code.push_str("/*\n");
    for line in ctx.header_lines() {
        super::push_comment_line(&mut code, "", " *", &super::block_comment_text(&line));
    }
    code.push_str(" */\n\n");
    code.push_str(&format!("#include \"{module}.h\"\n\n"));

    code.push_str("static struct {\n");
    for (index, _) in pkg.functions.iter().enumerate() {
        let name = &ctx.function_names(index).name;
        code.push_str(&format!("    {}\n", table_field(ctx, index, name)));
    }
    if pkg.needs_free() {
        code.push_str("    void (*Free)(void* ptr);\n");
    }
    if pkg.functions.is_empty() {
        code.push_str("    int unused;\n");
    }
    code.push_str(&format!("}} {module}_table;\n\n"));

    code.push_str(&format!("int {module}_Init({module}_Resolver resolve) {{\n"));
    code.push_str("    int missing = 0;\n");
    for (index, f) in pkg.functions.iter().enumerate() {
        let name = &ctx.function_names(index).name;
        code.push_str(&format!(
            "    *(void**)(&{module}_table.{name}) = resolve({});\n",
            super::quote(&ctx.symbol(f))
        ));
        code.push_str(&format!("    if (!{module}_table.{name}) ++missing;\n"));
    }
    if pkg.needs_free() {
        code.push_str(&format!(
            "    *(void**)(&{module}_table.Free) = resolve({});\n",
            super::quote(&ctx.free_symbol())
        ));
        code.push_str(&format!("    if (!{module}_table.Free) ++missing;\n"));
    }
    code.push_str("    return missing;\n}\n");

    if pkg.needs_free() {
        code.push_str(&format!(
            "\nvoid {module}_Free(void* ptr) {{\n    {module}_table.Free(ptr);\n}}\n"
        ));
    }

    for (index, _) in pkg.functions.iter().enumerate() {
        let names = ctx.function_names(index);
        let sig = &ctx.function_abi[index];
        let args = sig
            .params
            .iter()
            .map(|p| p.slot.name(names))
            .collect::<Vec<_>>()
            .join(", ");
        let call = format!("{module}_table.{}({args})", names.name);
        code.push_str(&format!("\n{} {{\n", prototype(ctx, index, &names.name)));
        if sig.ret == AbiType::Void {
            code.push_str(&format!("    {call};\n"));
        } else {
            code.push_str(&format!("    return {call};\n"));
        }
        code.push_str("}\n");
    }

    for id in &ctx.callback_order {
        registry(ctx, *id, &mut code);
    }
    code
}

fn registry(ctx: &Context<'_>, id: plugify_gen_manifest::CallbackId, code: &mut String) {
    let names = ctx.callback_names(id);
    let name = &names.name;
    let sig = &ctx.callback_abi[id.0];
    let ret = c_type(&sig.ret, ctx.pkg, &ctx.symbols, CStyle::NAMED);
    let params = c_params(sig, names, ctx.pkg, &ctx.symbols, CStyle::NAMED);
    let args: Vec<&str> = sig.params.iter().map(|p| p.slot.name(names)).collect();
    let is_void = sig.ret == AbiType::Void;

    code.push_str(&format!("\n/* {name} registry */\n\n"));
    code.push_str(&format!(
        "static struct {{\n    {name}_Handler handler;\n    void* user_data;\n}} {name}_slots[{name}_SLOTS];\n"
    ));
    code.push_str(&format!("static int {name}_free[{name}_SLOTS];\n"));
    code.push_str(&format!("static int {name}_free_count = -1;\n\n"));

    let dispatch_params = if args.is_empty() {
        "int slot".to_string()
    } else {
        format!("int slot, {params}")
    };
    let mut handler_args = vec![format!("{name}_slots[slot].user_data")];
    handler_args.extend(args.iter().map(|a| a.to_string()));
    code.push_str(&format!("static {ret} {name}_Dispatch({dispatch_params}) {{\n"));
    code.push_str(&format!("    if ({name}_slots[slot].handler == NULL) {{\n"));
    if is_void {
        code.push_str("        return;\n");
    } else {
        code.push_str(&format!("        return ({ret}){{0}};\n"));
    }
    code.push_str("    }\n");
    let call = format!("{name}_slots[slot].handler({})", handler_args.join(", "));
    if is_void {
        code.push_str(&format!("    {call};\n}}\n\n"));
    } else {
        code.push_str(&format!("    return {call};\n}}\n\n"));
    }

    for slot in 0..ctx.slots {
        let mut forwarded = vec![slot.to_string()];
        forwarded.extend(args.iter().map(|a| a.to_string()));
        let keyword = if is_void { "" } else { "return " };
        code.push_str(&format!(
            "static {ret} {name}_Trampoline{slot}({params}) {{ {keyword}{name}_Dispatch({}); }}\n",
            forwarded.join(", ")
        ));
    }

    code.push_str(&format!("\nstatic const {name} {name}_trampolines[{name}_SLOTS] = {{\n"));
    for slot in 0..ctx.slots {
        code.push_str(&format!("    {name}_Trampoline{slot},\n"));
    }
    code.push_str("};\n\n");

    code.push_str(&format!(
        "int {name}_Register({name}_Handler handler, void* user_data, {name}* out_fn) {{\n"
    ));
    code.push_str(&format!("    if ({name}_free_count < 0) {{\n"));
    code.push_str(&format!("        for (int i = 0; i < {name}_SLOTS; ++i) {{\n"));
    code.push_str(&format!("            {name}_free[i] = {name}_SLOTS - 1 - i;\n"));
    code.push_str("        }\n");
    code.push_str(&format!("        {name}_free_count = {name}_SLOTS;\n    }}\n"));
    code.push_str(&format!(
        "    if (handler == NULL || out_fn == NULL || {name}_free_count == 0) {{\n        return -1;\n    }}\n"
    ));
    code.push_str(&format!("    int slot = {name}_free[--{name}_free_count];\n"));
    code.push_str(&format!("    {name}_slots[slot].handler = handler;\n"));
    code.push_str(&format!("    {name}_slots[slot].user_data = user_data;\n"));
    code.push_str(&format!("    *out_fn = {name}_trampolines[slot];\n"));
    code.push_str("    return slot;\n}\n\n");

    code.push_str(&format!("void {name}_Unregister(int slot) {{\n"));
    code.push_str(&format!(
        "    if (slot < 0 || slot >= {name}_SLOTS || {name}_slots[slot].handler == NULL) {{\n        return;\n    }}\n"
    ));
    code.push_str(&format!("    {name}_slots[slot].handler = NULL;\n"));
    code.push_str(&format!("    {name}_slots[slot].user_data = NULL;\n"));
    code.push_str(&format!("    {name}_free[{name}_free_count++] = slot;\n}}\n"));
}
