//! D emitter: one module with `extern (C)` function pointer aliases over a resolved table.

use super::{Context, Files, quote};
use crate::abi::{AbiType, Slot};
use crate::classes::Receiver;
use crate::error::GenResult;
use crate::target::Target;
use crate::types;
use plugify_gen_manifest::{
    CallbackId, FloatWidth, Ownership, ParamDescriptor, SharedType, TypeRef,
};

pub(super) fn generate(ctx: &Context<'_>) -> GenResult<Files> {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let mut code = ctx.header("//");

    code.push_str(&format!("\nmodule {module};\n\n"));
    if !pkg.callbacks.is_empty() {
        code.push_str("import core.sync.mutex : Mutex;\n");
    }
    code.push_str("import std.string : fromStringz, toStringz;\n");

    for shared in &pkg.shared_types {
        code.push('\n');
        code.push_str(&shared_struct(*shared));
    }

    for (e, names) in pkg.enums.iter().zip(&ctx.symbols.enums) {
        let repr = types::table(ctx.target).ints[e.repr.table_index()];
        code.push('\n');
        super::push_comment(&mut code, "", "///", &super::doc_lines(e.doc.as_deref()));
        code.push_str(&format!("enum {} : {repr}\n{{\n", names.name));
        for (member, member_name) in e.members.iter().zip(&names.members) {
            super::push_comment(&mut code, "    ", "///", &super::doc_lines(member.doc.as_deref()));
            code.push_str(&format!("    {member_name} = {},\n", member.value));
        }
        code.push_str("}\n");
    }

    for id in &ctx.callback_order {
        let cb = pkg.callback(*id);
        let names = ctx.callback_names(*id);
        let sig = &ctx.callback_abi[id.0];
        code.push('\n');
        super::push_comment(&mut code, "", "///", &super::doc_lines(cb.doc.as_deref()));
        code.push_str(&format!(
            "alias {} = {};\n",
            names.name,
            fn_pointer(ctx, &sig.params.iter().map(|p| p.ty.clone()).collect::<Vec<_>>(), &sig.ret)
        ));
    }

    table(ctx, &mut code);

    for index in 0..pkg.functions.len() {
        function(ctx, index, &mut code)?;
    }

    for id in &ctx.callback_order {
        registry(ctx, *id, &mut code)?;
    }

    for k in 0..ctx.classes.len() {
        class(ctx, k, &mut code)?;
    }

    let mut files = Files::new();
    files.insert(format!("{module}.d"), code);
    Ok(files)
}

fn shared_struct(shared: SharedType) -> String {
    let name = types::table(Target::DLang).shared_name(shared);
    let mut code = format!("struct {name}\n{{\n");
    if shared == SharedType::Mat4x4 {
        code.push_str("    float[16] m = 0;\n");
    } else {
        for field in shared.fields() {
            code.push_str(&format!("    float {field} = 0;\n"));
        }
    }
    code.push_str("}\n");
    code
}

fn abi_type(ctx: &Context<'_>, ty: &AbiType) -> String {
    let table = types::table(ctx.target);
    match ty {
        AbiType::Void => "void".to_string(),
        AbiType::Bool => "bool".to_string(),
        AbiType::Int(repr) => table.ints[repr.table_index()].to_string(),
        AbiType::Float(FloatWidth::F32) => "float".to_string(),
        AbiType::Float(FloatWidth::F64) => "double".to_string(),
        AbiType::Size => "size_t".to_string(),
        AbiType::CStr => "const(char)*".to_string(),
        AbiType::Shared(shared) => table.shared_name(*shared).to_string(),
        AbiType::Enum(id) => ctx.symbols.enum_name(*id).to_string(),
        AbiType::Callback(id) => ctx.symbols.callback_name(*id).to_string(),
        AbiType::Ptr(inner) => format!("const({})*", abi_type(ctx, inner)),
        AbiType::PtrMut(inner) => format!("{}*", abi_type(ctx, inner)),
    }
}

fn fn_pointer(ctx: &Context<'_>, params: &[AbiType], ret: &AbiType) -> String {
    let params: Vec<String> = params.iter().map(|t| abi_type(ctx, t)).collect();
    format!(
        "extern (C) {} function({})",
        abi_type(ctx, ret),
        params.join(", ")
    )
}

/// Literal for the zero value of `ty`.
fn zero(ctx: &Context<'_>, ty: &AbiType) -> String {
    match ty {
        AbiType::Void => String::new(),
        AbiType::Bool => "false".to_string(),
        AbiType::Int(_) | AbiType::Float(_) | AbiType::Size => "0".to_string(),
        AbiType::Shared(shared) => format!("{}.init", types::table(ctx.target).shared_name(*shared)),
        AbiType::Enum(id) => format!("cast({}) 0", ctx.symbols.enum_name(*id)),
        AbiType::CStr | AbiType::Callback(_) | AbiType::Ptr(_) | AbiType::PtrMut(_) => {
            "null".to_string()
        }
    }
}

fn table(ctx: &Context<'_>, code: &mut String) {
    let symbols = ctx.table_symbols();
    let quoted: Vec<String> = symbols.iter().map(|s| quote(s)).collect();

    code.push_str(&format!(
        "\nprivate immutable string[{}] symbols = [{}];\n",
        symbols.len(),
        quoted.join(", ")
    ));
    code.push_str(&format!(
        "private __gshared void*[{}] table;\n\n",
        symbols.len()
    ));

    code.push_str("/// Resolve every entry point through `resolve`, which returns null for unknown symbols.\n");
    code.push_str("/// Returns: the symbols that could not be resolved.\n");
    code.push_str("string[] initialize(scope void* delegate(string) resolve)\n{\n");
    code.push_str("    string[] missing;\n");
    code.push_str("    foreach (i, symbol; symbols)\n    {\n");
    code.push_str("        table[i] = resolve(symbol);\n");
    code.push_str("        if (table[i] is null)\n            missing ~= symbol;\n");
    code.push_str("    }\n    return missing;\n}\n\n");

    code.push_str("private void* entry(size_t index)\n{\n");
    code.push_str("    auto ptr = table[index];\n");
    code.push_str("    if (ptr is null)\n");
    code.push_str("        throw new Error(symbols[index] ~ \" is not resolved; call initialize first\");\n");
    code.push_str("    return ptr;\n}\n");

    if ctx.pkg.needs_free() {
        code.push_str("\nprivate void releaseNative(void* ptr)\n{\n");
        code.push_str("    alias Fn = extern (C) void function(void*);\n");
        code.push_str(&format!(
            "    (cast(Fn) entry({}))(ptr);\n}}\n",
            ctx.free_index()
        ));
    }
}

fn function(ctx: &Context<'_>, index: usize, code: &mut String) -> GenResult<()> {
    let f = &ctx.pkg.functions[index];
    let names = ctx.function_names(index);
    let sig = &ctx.function_abi[index];

    let mut params = Vec::with_capacity(f.params.len());
    for (p, name) in f.params.iter().zip(&names.params) {
        params.push(param_decl(ctx, p, name)?);
    }
    let ret = ctx.decl_type(&f.ret.ty)?;

    code.push('\n');
    super::push_comment(code, "", "///", &ctx.function_doc(f, false));
    let documented: Vec<(&String, &String)> = f
        .params
        .iter()
        .zip(&names.params)
        .filter_map(|(p, name)| p.doc.as_ref().map(|d| (name, d)))
        .collect();
    if !documented.is_empty() {
        code.push_str("/// Params:\n");
        for (name, d) in documented {
            code.push_str(&format!("///     {name} = {d}\n"));
        }
    }
    if let Some(d) = &f.ret.doc {
        code.push_str(&format!("/// Returns: {d}\n"));
    }
    if let Some(note) = &f.deprecated {
        code.push_str(&format!("deprecated({})\n", quote(note)));
    }
    code.push_str(&format!("{ret} {}({})\n{{\n", names.name, params.join(", ")));

    let abi_types: Vec<AbiType> = sig.params.iter().map(|p| p.ty.clone()).collect();
    code.push_str(&format!(
        "    alias Fn = {};\n",
        fn_pointer(ctx, &abi_types, &sig.ret)
    ));
    code.push_str(&format!("    auto fn = cast(Fn) entry({index});\n"));

    let mut args = Vec::with_capacity(sig.params.len());
    for abi in &sig.params {
        args.push(match abi.slot {
            Slot::Value(i) => {
                let name = &names.params[i];
                let p = &f.params[i];
                match &p.ty {
                    _ if p.by_ref => format!("&{name}"),
                    TypeRef::Str(Ownership::Owned) => format!("toStringz({name})"),
                    _ => name.clone(),
                }
            }
            Slot::Data(i) => format!("{}.ptr", names.params[i]),
            Slot::Len(i) => format!("{}.length", names.params[i]),
            Slot::OutLen => {
                let out_len = Slot::OutLen.name(names);
                code.push_str(&format!("    size_t {out_len};\n"));
                format!("&{out_len}")
            }
        });
    }
    let call = format!("fn({})", args.join(", "));

    match &f.ret.ty {
        TypeRef::Void => code.push_str(&format!("    {call};\n")),
        TypeRef::Str(Ownership::Owned) => {
            code.push_str(&format!("    auto raw = {call};\n"));
            code.push_str("    if (raw is null)\n        return null;\n");
            code.push_str("    scope (exit) releaseNative(cast(void*) raw);\n");
            code.push_str("    return fromStringz(raw).idup;\n");
        }
        TypeRef::Array(_) => {
            let out_len = Slot::OutLen.name(names);
            code.push_str(&format!("    auto raw = {call};\n"));
            code.push_str("    if (raw is null)\n        return null;\n");
            code.push_str("    scope (exit) releaseNative(raw);\n");
            code.push_str(&format!("    return raw[0 .. {out_len}].dup;\n"));
        }
        _ => code.push_str(&format!("    return {call};\n")),
    }
    code.push_str("}\n");
    Ok(())
}

fn registry(ctx: &Context<'_>, id: CallbackId, code: &mut String) -> GenResult<()> {
    let cb = ctx.pkg.callback(id);
    let names = ctx.callback_names(id);
    let name = &names.name;
    let sig = &ctx.callback_abi[id.0];
    let ret = abi_type(ctx, &sig.ret);
    let zero = zero(ctx, &sig.ret);
    let bail = if zero.is_empty() {
        "return;".to_string()
    } else {
        format!("return {zero};")
    };

    let mut handler_params = Vec::with_capacity(cb.params.len());
    for (p, pname) in cb.params.iter().zip(&names.params) {
        handler_params.push(format!("{} {pname}", ctx.param_type(p)?));
    }
    let params: Vec<String> = sig
        .params
        .iter()
        .map(|p| format!("{} {}", abi_type(ctx, &p.ty), p.slot.name(names)))
        .collect();

    let mut decoded = Vec::with_capacity(cb.params.len());
    for (i, (p, pname)) in cb.params.iter().zip(&names.params).enumerate() {
        decoded.push(match &p.ty {
            _ if p.by_ref => format!("*{pname}"),
            TypeRef::Str(Ownership::Owned) => format!("fromStringz({pname}).idup"),
            TypeRef::Array(_) => format!("{pname}[0 .. {}]", Slot::Len(i).name(names)),
            _ => pname.clone(),
        });
    }
    let call = format!("handler({})", decoded.join(", "));

    code.push('\n');
    code.push_str(&format!(
        "/// Binds `{name}` handlers to native function pointers, one trampoline per slot.\n"
    ));
    code.push_str(&format!("final class {name}Registry\n{{\n"));
    code.push_str(&format!(
        "    alias Handler = {} delegate({});\n",
        ctx.decl_type(&cb.ret.ty)?,
        handler_params.join(", ")
    ));
    code.push_str(&format!("    enum size_t slots = {};\n\n", ctx.slots));
    code.push_str("    private __gshared Handler[slots] entries;\n");
    code.push_str("    private __gshared size_t[] freeSlots;\n");
    code.push_str("    private __gshared bool ready;\n");
    code.push_str("    private __gshared Mutex gate;\n\n");

    let trampolines: Vec<String> = (0..ctx.slots).map(|n| format!("&trampoline!{n}")).collect();
    code.push_str(&format!(
        "    private static immutable {name}[slots] trampolines = [{}];\n\n",
        trampolines.join(", ")
    ));

    code.push_str("    shared static this()\n    {\n        gate = new Mutex;\n    }\n\n");

    code.push_str("    /// Bind `handler` to a free slot.\n");
    code.push_str("    /// Returns: false when every slot is taken.\n");
    code.push_str(&format!(
        "    static bool register(Handler handler, out size_t slot, out {name} native)\n    {{\n"
    ));
    code.push_str("        synchronized (gate)\n        {\n");
    code.push_str("            prepare();\n");
    code.push_str("            if (freeSlots.length == 0)\n                return false;\n");
    code.push_str("            slot = freeSlots[$ - 1];\n");
    code.push_str("            freeSlots = freeSlots[0 .. $ - 1];\n");
    code.push_str("            entries[slot] = handler;\n");
    code.push_str("            native = trampolines[slot];\n");
    code.push_str("            return true;\n        }\n    }\n\n");

    code.push_str("    /// Release `slot`.\n");
    code.push_str("    /// Returns: false if the slot was not registered.\n");
    code.push_str("    static bool unregister(size_t slot)\n    {\n");
    code.push_str("        synchronized (gate)\n        {\n");
    code.push_str("            prepare();\n");
    code.push_str("            if (slot >= slots || entries[slot] is null)\n                return false;\n");
    code.push_str("            entries[slot] = null;\n");
    code.push_str("            freeSlots ~= slot;\n");
    code.push_str("            return true;\n        }\n    }\n\n");

    code.push_str("    private static void prepare()\n    {\n");
    code.push_str("        if (ready)\n            return;\n");
    code.push_str("        foreach_reverse (i; 0 .. slots)\n            freeSlots ~= i;\n");
    code.push_str("        ready = true;\n    }\n\n");

    code.push_str("    private static Handler lookup(size_t slot)\n    {\n");
    code.push_str("        synchronized (gate)\n        {\n            return entries[slot];\n        }\n    }\n\n");

    code.push_str(&format!(
        "    private static extern (C) {ret} trampoline(size_t N)({})\n    {{\n",
        params.join(", ")
    ));
    code.push_str("        auto handler = lookup(N);\n");
    code.push_str(&format!("        if (handler is null)\n            {bail}\n"));
    code.push_str("        try\n        {\n");
    if sig.ret == AbiType::Void {
        code.push_str(&format!("            {call};\n"));
    } else {
        code.push_str(&format!("            return {call};\n"));
    }
    code.push_str("        }\n");
    code.push_str("        catch (Exception)\n        {\n");
    code.push_str("            // exceptions must not unwind into native frames\n");
    code.push_str(&format!("            {bail}\n"));
    code.push_str("        }\n    }\n}\n");
    Ok(())
}

fn param_decl(ctx: &Context<'_>, p: &ParamDescriptor, name: &str) -> GenResult<String> {
    let ty = ctx.param_type(p)?;
    Ok(match (p.default, &p.ty) {
        (None, _) => format!("{ty} {name}"),
        (Some(value), TypeRef::Bool) => format!("{ty} {name} = {}", value != 0),
        (Some(value), TypeRef::Enum(id)) => {
            format!("{ty} {name} = cast({}) {value}", ctx.symbols.enum_name(*id))
        }
        (Some(value), _) => format!("{ty} {name} = {value}"),
    })
}

fn class(ctx: &Context<'_>, k: usize, code: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let model = &ctx.classes[k];
    let names = &ctx.symbols.classes[k];
    let name = &names.name;
    let handle = ctx.decl_type(&model.handle)?;
    let invalid = model.invalid_value;

    code.push('\n');
    super::push_comment(code, "", "///", &super::doc_lines(model.doc.as_deref()));
    code.push_str(&format!("struct {name}\n{{\n"));
    code.push_str(&format!("    {handle} handle = {invalid};\n\n"));
    code.push_str(&format!(
        "    static {name} fromHandle({handle} handle)\n    {{\n        return {name}(handle);\n    }}\n"
    ));
    code.push_str(&format!(
        "\n    bool opCast(T : bool)() const\n    {{\n        return handle != {invalid};\n    }}\n"
    ));

    if model.receiver == Receiver::Owned
        && let Some(dtor) = model.destructor
    {
        let f = &pkg.functions[dtor];
        code.push_str("\n    @disable this(this);\n\n");
        if let Some(note) = &f.deprecated {
            code.push_str(&format!("    deprecated({})\n", quote(note)));
        }
        code.push_str("    ~this()\n    {\n");
        code.push_str(&format!("        if (handle != {invalid})\n        {{\n"));
        code.push_str(&format!(
            "            .{}(handle);\n            handle = {invalid};\n        }}\n    }}\n",
            ctx.function_names(dtor).name
        ));
        code.push_str("\n    /// Give up ownership of the handle without destroying it.\n");
        code.push_str(&format!(
            "    {handle} release()\n    {{\n        auto released = handle;\n        handle = {invalid};\n        return released;\n    }}\n"
        ));
    }

    for (ctor, ctor_name) in model.constructors.iter().zip(&names.constructors) {
        let f = &pkg.functions[*ctor];
        let fnames = ctx.function_names(*ctor);
        let mut params = Vec::new();
        for (p, pname) in f.params.iter().zip(&fnames.params) {
            params.push(param_decl(ctx, p, pname)?);
        }
        code.push('\n');
        super::push_comment(code, "    ", "///", &super::doc_lines(f.doc.as_deref()));
        if let Some(note) = &f.deprecated {
            code.push_str(&format!("    deprecated({})\n", quote(note)));
        }
        code.push_str(&format!(
            "    static {name} {ctor_name}({})\n    {{\n        return {name}(.{}({}));\n    }}\n",
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
            args.push("handle".to_string());
        }
        for (j, (p, pname)) in f.params.iter().zip(&fnames.params).skip(skip).enumerate() {
            match method.param_alias(j) {
                Some(alias) if alias.owner => {
                    params.push(format!("{} {pname}", ctx.alias_class(alias)));
                    args.push(format!("{pname}.release()"));
                }
                Some(alias) => {
                    params.push(format!("ref {} {pname}", ctx.alias_class(alias)));
                    args.push(format!("{pname}.handle"));
                }
                None => {
                    params.push(param_decl(ctx, p, pname)?);
                    args.push(pname.clone());
                }
            }
        }
        let call = format!(".{}({})", fnames.name, args.join(", "));
        let (ret, body) = match method.ret_alias {
            Some(alias) => {
                let class = ctx.alias_class(alias);
                (class.to_string(), format!("{class}({call})"))
            }
            None => (ctx.decl_type(&f.ret.ty)?, call),
        };
        let modifier = if method.bind_self { "" } else { "static " };

        code.push('\n');
        super::push_comment(code, "    ", "///", &super::doc_lines(f.doc.as_deref()));
        if let Some(note) = &f.deprecated {
            code.push_str(&format!("    deprecated({})\n", quote(note)));
        }
        code.push_str(&format!(
            "    {modifier}{ret} {method_name}({})\n    {{\n        return {body};\n    }}\n",
            params.join(", ")
        ));
    }
    code.push_str("}\n");
    Ok(())
}
