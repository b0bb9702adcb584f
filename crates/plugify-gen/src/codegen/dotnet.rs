//! C# emitter: unmanaged function pointers over a resolved entry-point table.
//!
//! Shared value types map onto `System.Numerics`, whose layouts match the C structs. `bool`
//! crosses the boundary as a byte at the top level of a signature.

use super::{Context, Files, quote};
use crate::abi::{AbiType, Slot};
use crate::classes::Receiver;
use crate::error::GenResult;
use crate::naming::to_pascal_case;
use crate::types;
use plugify_gen_manifest::{CallbackId, FloatWidth, Ownership, ParamDescriptor, TypeRef};

pub(super) fn generate(ctx: &Context<'_>) -> GenResult<Files> {
    let pkg = ctx.pkg;
    let namespace = match to_pascal_case(&pkg.name) {
        name if name.is_empty() => ctx.module().to_string(),
        name => name,
    };
    let mut code = ctx.header("//");

    code.push_str("\n#nullable enable\n\n");
    for using in [
        "System",
        "System.Collections.Generic",
        "System.Numerics",
        "System.Runtime.CompilerServices",
        "System.Runtime.InteropServices",
        "System.Text",
    ] {
        code.push_str(&format!("using {using};\n"));
    }
    code.push_str(&format!("\nnamespace {namespace};\n"));

    for (e, names) in pkg.enums.iter().zip(&ctx.symbols.enums) {
        let repr = types::table(ctx.target).ints[e.repr.table_index()];
        code.push('\n');
        push_summary(&mut code, "", &super::doc_lines(e.doc.as_deref()));
        code.push_str(&format!("public enum {} : {repr}\n{{\n", names.name));
        for (member, member_name) in e.members.iter().zip(&names.members) {
            push_summary(&mut code, "    ", &super::doc_lines(member.doc.as_deref()));
            code.push_str(&format!("    {member_name} = {},\n", member.value));
        }
        code.push_str("}\n");
    }

    for id in &ctx.callback_order {
        let cb = pkg.callback(*id);
        let names = ctx.callback_names(*id);
        let mut params = Vec::with_capacity(cb.params.len());
        for (p, pname) in cb.params.iter().zip(&names.params) {
            params.push(format!("{} {pname}", ctx.param_type(p)?));
        }
        code.push('\n');
        push_summary(&mut code, "", &super::doc_lines(cb.doc.as_deref()));
        code.push_str(&format!(
            "public delegate {} {}({});\n",
            ctx.decl_type(&cb.ret.ty)?,
            names.name,
            params.join(", ")
        ));
    }

    api(ctx, &mut code)?;

    for id in &ctx.callback_order {
        registry(ctx, *id, &mut code)?;
    }

    for k in 0..ctx.classes.len() {
        class(ctx, k, &mut code)?;
    }

    let mut files = Files::new();
    files.insert(format!("{namespace}.cs"), code);
    Ok(files)
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn push_summary(code: &mut String, indent: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    code.push_str(&format!("{indent}/// <summary>\n"));
    for line in lines {
        super::push_comment_line(code, indent, "///", &xml_escape(line));
    }
    code.push_str(&format!("{indent}/// </summary>\n"));
}

/// C# spelling of a lowered C type. `top` marks a value passed or returned directly, where
/// `bool` has to travel as a byte.
fn abi_type(ctx: &Context<'_>, ty: &AbiType, top: bool) -> String {
    let table = types::table(ctx.target);
    match ty {
        AbiType::Void => "void".to_string(),
        AbiType::Bool if top => "byte".to_string(),
        AbiType::Bool => "bool".to_string(),
        AbiType::Int(repr) => table.ints[repr.table_index()].to_string(),
        AbiType::Float(FloatWidth::F32) => "float".to_string(),
        AbiType::Float(FloatWidth::F64) => "double".to_string(),
        AbiType::Size => "nuint".to_string(),
        AbiType::CStr => "byte*".to_string(),
        AbiType::Shared(shared) => table.shared_name(*shared).to_string(),
        AbiType::Enum(id) => ctx.symbols.enum_name(*id).to_string(),
        AbiType::Callback(_) => "nint".to_string(),
        AbiType::Ptr(inner) | AbiType::PtrMut(inner) => format!("{}*", abi_type(ctx, inner, false)),
    }
}

fn fn_pointer(ctx: &Context<'_>, params: &[AbiType], ret: &AbiType) -> String {
    let mut types: Vec<String> = params.iter().map(|t| abi_type(ctx, t, true)).collect();
    types.push(abi_type(ctx, ret, true));
    format!("delegate* unmanaged[Cdecl]<{}>", types.join(", "))
}

fn api(ctx: &Context<'_>, code: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let symbols = ctx.table_symbols();

    code.push_str("\n/// <summary>\n/// Entry points of the plugin. Call <see cref=\"Init\"/> before anything else.\n/// </summary>\n");
    code.push_str("public static unsafe class Api\n{\n");
    code.push_str("    private static readonly string[] Symbols =\n    {\n");
    for symbol in &symbols {
        code.push_str(&format!("        {},\n", quote(symbol)));
    }
    code.push_str("    };\n\n");
    code.push_str(&format!(
        "    private static readonly nint[] Table = new nint[{}];\n\n",
        symbols.len()
    ));

    code.push_str("    /// <summary>\n    /// Resolve every entry point through <paramref name=\"resolve\"/>, which returns 0 for\n    /// unknown symbols.\n    /// </summary>\n");
    code.push_str("    /// <returns>The symbols that could not be resolved.</returns>\n");
    code.push_str("    public static IReadOnlyList<string> Init(Func<string, nint> resolve)\n    {\n");
    code.push_str("        var missing = new List<string>();\n");
    code.push_str("        for (var i = 0; i < Symbols.Length; i++)\n        {\n");
    code.push_str("            Table[i] = resolve(Symbols[i]);\n");
    code.push_str("            if (Table[i] == 0)\n            {\n                missing.Add(Symbols[i]);\n            }\n");
    code.push_str("        }\n        return missing;\n    }\n\n");

    code.push_str("    private static nint Entry(int index)\n    {\n");
    code.push_str("        var ptr = Table[index];\n");
    code.push_str("        if (ptr == 0)\n        {\n");
    code.push_str("            throw new InvalidOperationException($\"{Symbols[index]} is not resolved; call Init first\");\n");
    code.push_str("        }\n        return ptr;\n    }\n");

    if pkg.needs_free() {
        code.push_str(&format!(
            "\n    private static void Free(void* ptr) => ((delegate* unmanaged[Cdecl]<void*, void>)Entry({}))(ptr);\n",
            ctx.free_index()
        ));
    }
    code.push_str("\n    private static byte[] Utf8(string value)\n    {\n");
    code.push_str("        var bytes = new byte[Encoding.UTF8.GetByteCount(value) + 1];\n");
    code.push_str("        Encoding.UTF8.GetBytes(value, 0, value.Length, bytes, 0);\n");
    code.push_str("        return bytes;\n    }\n");

    for index in 0..pkg.functions.len() {
        function(ctx, index, code)?;
    }
    code.push_str("}\n");
    Ok(())
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
    push_summary(code, "    ", &ctx.function_doc(f, false));
    for (p, name) in f.params.iter().zip(&names.params) {
        if let Some(d) = &p.doc {
            code.push_str(&format!("    /// <param name=\"{name}\">{}</param>\n", xml_escape(d)));
        }
    }
    if let Some(d) = &f.ret.doc {
        code.push_str(&format!("    /// <returns>{}</returns>\n", xml_escape(d)));
    }
    if let Some(note) = &f.deprecated {
        code.push_str(&format!("    [Obsolete({})]\n", quote(note)));
    }
    code.push_str(&format!(
        "    public static {ret} {}({})\n    {{\n",
        names.name,
        params.join(", ")
    ));

    let abi_types: Vec<AbiType> = sig.params.iter().map(|p| p.ty.clone()).collect();
    code.push_str(&format!(
        "        var fn = ({})Entry({index});\n",
        fn_pointer(ctx, &abi_types, &sig.ret)
    ));

    let mut pins = Vec::new();
    let mut args = Vec::with_capacity(sig.params.len());
    for abi in &sig.params {
        args.push(match abi.slot {
            Slot::Value(i) => {
                let name = &names.params[i];
                let p = &f.params[i];
                match &p.ty {
                    _ if p.by_ref => {
                        pins.push(format!("fixed ({} {name}Ptr = &{name})", abi_type(ctx, &abi.ty, false)));
                        format!("{name}Ptr")
                    }
                    TypeRef::Str(_) => {
                        pins.push(format!("fixed (byte* {name}Ptr = Utf8({name}))"));
                        format!("{name}Ptr")
                    }
                    TypeRef::Bool => format!("{name} ? (byte)1 : (byte)0"),
                    _ => name.clone(),
                }
            }
            Slot::Data(i) => {
                let name = &names.params[i];
                pins.push(format!("fixed ({} {name}Ptr = {name})", abi_type(ctx, &abi.ty, false)));
                format!("{name}Ptr")
            }
            Slot::Len(i) => format!("(nuint){}.Length", names.params[i]),
            Slot::OutLen => {
                let out_len = abi.slot.name(names);
                code.push_str(&format!("        nuint {out_len} = 0;\n"));
                format!("&{out_len}")
            }
        });
    }

    let indent = if pins.is_empty() { "        " } else { "            " };
    for pin in &pins {
        code.push_str(&format!("        {pin}\n"));
    }
    if !pins.is_empty() {
        code.push_str("        {\n");
    }

    let call = format!("fn({})", args.join(", "));
    match &f.ret.ty {
        TypeRef::Void => code.push_str(&format!("{indent}{call};\n")),
        TypeRef::Bool => code.push_str(&format!("{indent}return {call} != 0;\n")),
        TypeRef::Str(ownership) => {
            code.push_str(&format!("{indent}var raw = {call};\n"));
            let read = "raw == null ? string.Empty : Marshal.PtrToStringUTF8((nint)raw) ?? string.Empty";
            if *ownership == Ownership::Owned {
                code.push_str(&format!("{indent}try\n{indent}{{\n"));
                code.push_str(&format!("{indent}    return {read};\n"));
                code.push_str(&format!("{indent}}}\n{indent}finally\n{indent}{{\n"));
                code.push_str(&format!("{indent}    if (raw != null)\n{indent}    {{\n"));
                code.push_str(&format!("{indent}        Free(raw);\n{indent}    }}\n{indent}}}\n"));
            } else {
                code.push_str(&format!("{indent}return {read};\n"));
            }
        }
        TypeRef::Array(inner) => {
            let element = ctx.decl_type(inner)?;
            let out_len = Slot::OutLen.name(names);
            code.push_str(&format!("{indent}var raw = {call};\n"));
            code.push_str(&format!(
                "{indent}if (raw == null)\n{indent}{{\n{indent}    return Array.Empty<{element}>();\n{indent}}}\n"
            ));
            code.push_str(&format!("{indent}try\n{indent}{{\n"));
            code.push_str(&format!(
                "{indent}    return new ReadOnlySpan<{element}>(raw, checked((int){out_len})).ToArray();\n"
            ));
            code.push_str(&format!("{indent}}}\n{indent}finally\n{indent}{{\n"));
            code.push_str(&format!("{indent}    Free(raw);\n{indent}}}\n"));
        }
        _ => code.push_str(&format!("{indent}return {call};\n")),
    }

    if !pins.is_empty() {
        code.push_str("        }\n");
    }
    code.push_str("    }\n");
    Ok(())
}

fn registry(ctx: &Context<'_>, id: CallbackId, code: &mut String) -> GenResult<()> {
    let cb = ctx.pkg.callback(id);
    let names = ctx.callback_names(id);
    let name = &names.name;
    let sig = &ctx.callback_abi[id.0];
    let abi_types: Vec<AbiType> = sig.params.iter().map(|p| p.ty.clone()).collect();
    let pointer = fn_pointer(ctx, &abi_types, &sig.ret);
    let params: Vec<String> = sig
        .params
        .iter()
        .map(|p| format!("{} {}", abi_type(ctx, &p.ty, true), p.slot.name(names)))
        .collect();
    let ret = abi_type(ctx, &sig.ret, true);
    let is_void = sig.ret == AbiType::Void;

    let mut decoded = Vec::with_capacity(cb.params.len());
    for (i, (p, pname)) in cb.params.iter().zip(&names.params).enumerate() {
        decoded.push(match &p.ty {
            _ if p.by_ref => format!("ref *{pname}"),
            TypeRef::Bool => format!("{pname} != 0"),
            TypeRef::Str(_) => format!(
                "{pname} == null ? string.Empty : Marshal.PtrToStringUTF8((nint){pname}) ?? string.Empty"
            ),
            TypeRef::Array(inner) => {
                let len = Slot::Len(i).name(names);
                format!(
                    "new ReadOnlySpan<{}>({pname}, checked((int){len}))",
                    ctx.decl_type(inner)?
                )
            }
            _ => pname.clone(),
        });
    }
    let call = format!("handler({})", decoded.join(", "));

    let mut forwarded = vec!["slot".to_string()];
    forwarded.extend(sig.params.iter().map(|p| p.slot.name(names).to_string()));
    let mut dispatch_params = vec!["int slot".to_string()];
    dispatch_params.extend(params.iter().cloned());

    code.push('\n');
    code.push_str(&format!(
        "/// <summary>\n/// Binds <see cref=\"{name}\"/> delegates to native function pointers, one trampoline per slot.\n/// </summary>\n"
    ));
    code.push_str(&format!("public static unsafe class {name}Registry\n{{\n"));
    code.push_str(&format!("    public const int Slots = {};\n\n", ctx.slots));
    code.push_str("    private static readonly object Gate = new();\n");
    code.push_str(&format!(
        "    private static readonly {name}?[] Entries = new {name}?[Slots];\n"
    ));
    code.push_str("    private static readonly Stack<int> FreeSlots = CreateFreeSlots();\n");
    code.push_str("    private static readonly nint[] Pointers =\n    {\n");
    for slot in 0..ctx.slots {
        code.push_str(&format!("        (nint)({pointer})&Trampoline{slot},\n"));
    }
    code.push_str("    };\n\n");

    code.push_str("    /// <summary>Bind <paramref name=\"handler\"/> to a free slot.</summary>\n");
    code.push_str("    /// <returns>False when every slot is taken.</returns>\n");
    code.push_str(&format!(
        "    public static bool Register({name} handler, out int slot, out nint native)\n    {{\n"
    ));
    code.push_str("        lock (Gate)\n        {\n");
    code.push_str("            if (FreeSlots.Count == 0)\n            {\n");
    code.push_str("                slot = -1;\n                native = 0;\n                return false;\n            }\n");
    code.push_str("            slot = FreeSlots.Pop();\n");
    code.push_str("            Entries[slot] = handler;\n");
    code.push_str("            native = Pointers[slot];\n");
    code.push_str("            return true;\n        }\n    }\n\n");

    code.push_str("    /// <summary>Release <paramref name=\"slot\"/>.</summary>\n");
    code.push_str("    /// <returns>False if the slot was not registered.</returns>\n");
    code.push_str("    public static bool Unregister(int slot)\n    {\n");
    code.push_str("        lock (Gate)\n        {\n");
    code.push_str("            if (slot < 0 || slot >= Slots || Entries[slot] is null)\n            {\n                return false;\n            }\n");
    code.push_str("            Entries[slot] = null;\n");
    code.push_str("            FreeSlots.Push(slot);\n");
    code.push_str("            return true;\n        }\n    }\n\n");

    code.push_str("    private static Stack<int> CreateFreeSlots()\n    {\n");
    code.push_str("        var free = new Stack<int>(Slots);\n");
    code.push_str("        for (var i = Slots - 1; i >= 0; i--)\n        {\n            free.Push(i);\n        }\n");
    code.push_str("        return free;\n    }\n\n");

    code.push_str(&format!("    private static {name}? Lookup(int slot)\n    {{\n"));
    code.push_str("        lock (Gate)\n        {\n            return Entries[slot];\n        }\n    }\n\n");

    code.push_str(&format!(
        "    private static {ret} Dispatch({})\n    {{\n",
        dispatch_params.join(", ")
    ));
    code.push_str("        var handler = Lookup(slot);\n");
    code.push_str("        if (handler is null)\n        {\n");
    code.push_str(if is_void { "            return;\n" } else { "            return default;\n" });
    code.push_str("        }\n");
    code.push_str("        try\n        {\n");
    match &cb.ret.ty {
        TypeRef::Void => code.push_str(&format!("            {call};\n")),
        TypeRef::Bool => code.push_str(&format!("            return {call} ? (byte)1 : (byte)0;\n")),
        _ => code.push_str(&format!("            return {call};\n")),
    }
    code.push_str("        }\n");
    code.push_str("        catch (Exception)\n        {\n");
    code.push_str("            // exceptions must not unwind into native frames\n");
    code.push_str(if is_void { "            return;\n" } else { "            return default;\n" });
    code.push_str("        }\n    }\n");

    for slot in 0..ctx.slots {
        let mut args = vec![slot.to_string()];
        args.extend(forwarded.iter().skip(1).cloned());
        code.push_str("\n    [UnmanagedCallersOnly(CallConvs = new[] { typeof(CallConvCdecl) })]\n");
        code.push_str(&format!(
            "    private static {ret} Trampoline{slot}({}) => Dispatch({});\n",
            params.join(", "),
            args.join(", ")
        ));
    }
    code.push_str("}\n");
    Ok(())
}

fn param_decl(ctx: &Context<'_>, p: &ParamDescriptor, name: &str) -> GenResult<String> {
    let ty = ctx.param_type(p)?;
    Ok(match (p.default, &p.ty) {
        (None, _) => format!("{ty} {name}"),
        (Some(value), TypeRef::Bool) => format!("{ty} {name} = {}", value != 0),
        (Some(value), TypeRef::Enum(id)) => {
            format!("{ty} {name} = ({}){value}", ctx.symbols.enum_name(*id))
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
    let dtor = match model.receiver {
        Receiver::Owned => model.destructor,
        Receiver::Borrowed => None,
    };

    code.push('\n');
    push_summary(code, "", &super::doc_lines(model.doc.as_deref()));
    if dtor.is_some() {
        code.push_str(&format!("public sealed class {name} : IDisposable\n{{\n"));
    } else {
        code.push_str(&format!("public sealed class {name}\n{{\n"));
    }
    code.push_str(&format!(
        "    public {name}({handle} handle)\n    {{\n        Handle = handle;\n    }}\n\n"
    ));
    code.push_str(&format!("    public {handle} Handle {{ get; private set; }}\n\n"));
    code.push_str(&format!("    public bool IsValid => Handle != {invalid};\n\n"));
    code.push_str(&format!(
        "    public static {name} FromHandle({handle} handle) => new(handle);\n"
    ));
    if let Some(dtor) = dtor {
        code.push_str("\n    /// <summary>Destroy the handle. Further calls do nothing.</summary>\n");
        code.push_str("    public void Dispose()\n    {\n");
        code.push_str(&format!("        if (Handle != {invalid})\n        {{\n"));
        code.push_str(&format!(
            "            Api.{}(Handle);\n            Handle = {invalid};\n        }}\n    }}\n",
            ctx.function_names(dtor).name
        ));
        code.push_str(
            "\n    /// <summary>Give up ownership of the handle without destroying it.</summary>\n",
        );
        code.push_str(&format!("    public {handle} Release()\n    {{\n"));
        code.push_str(&format!(
            "        var released = Handle;\n        Handle = {invalid};\n        return released;\n    }}\n"
        ));
    }

    for (ctor, ctor_name) in model.constructors.iter().zip(&names.constructors) {
        let f = &pkg.functions[*ctor];
        let fnames = ctx.function_names(*ctor);
        let mut params = Vec::new();
        let mut args = Vec::new();
        for (p, pname) in f.params.iter().zip(&fnames.params) {
            params.push(param_decl(ctx, p, pname)?);
            args.push(forward(p.by_ref, pname));
        }
        code.push('\n');
        push_summary(code, "    ", &super::doc_lines(f.doc.as_deref()));
        code.push_str(&format!(
            "    public static {name} {ctor_name}({}) => new(Api.{}({}));\n",
            params.join(", "),
            fnames.name,
            args.join(", ")
        ));
    }

    for (method, method_name) in model.methods.iter().zip(&names.methods) {
        let f = &pkg.functions[method.function];
        let fnames = ctx.function_names(method.function);
        let skip = usize::from(method.bind_self);
        let mut params = Vec::new();
        let mut args = Vec::new();
        if method.bind_self {
            args.push("Handle".to_string());
        }
        for (j, (p, pname)) in f.params.iter().zip(&fnames.params).skip(skip).enumerate() {
            match method.param_alias(j) {
                Some(alias) => {
                    params.push(format!("{} {pname}", ctx.alias_class(alias)));
                    let member = if alias.owner { "Release()" } else { "Handle" };
                    args.push(format!("{pname}.{member}"));
                }
                None => {
                    params.push(param_decl(ctx, p, pname)?);
                    args.push(forward(p.by_ref, pname));
                }
            }
        }
        let call = format!("Api.{}({})", fnames.name, args.join(", "));
        let (ret, body) = match method.ret_alias {
            Some(alias) => (ctx.alias_class(alias).to_string(), format!("new({call})")),
            None => (ctx.decl_type(&f.ret.ty)?, call),
        };
        let modifier = if method.bind_self { "" } else { "static " };

        code.push('\n');
        push_summary(code, "    ", &super::doc_lines(f.doc.as_deref()));
        if let Some(note) = &f.deprecated {
            code.push_str(&format!("    [Obsolete({})]\n", quote(note)));
        }
        code.push_str(&format!(
            "    public {modifier}{ret} {method_name}({}) => {body};\n",
            params.join(", ")
        ));
    }
    code.push_str("}\n");
    Ok(())
}

fn forward(by_ref: bool, name: &str) -> String {
    if by_ref {
        format!("ref {name}")
    } else {
        name.to_string()
    }
}
