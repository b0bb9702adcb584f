//! LuaJIT emitter: one module built on the `ffi` library.
//!
//! Callback typedefs are declared with the module name as a prefix because `ffi.cdef`
//! declarations are global to the LuaJIT state.

use super::{Context, Files, quote};
use crate::abi::{AbiSignature, AbiType, CStyle, Slot, c_params, c_type};
use crate::classes::Receiver;
use crate::error::GenResult;
use crate::symbols::SignatureNames;
use plugify_gen_manifest::{CallbackId, IntRepr, Ownership, TypeRef};

/// Largest magnitude a Lua number holds exactly.
const EXACT_NUMBER: i64 = 1 << 53;

pub(super) fn generate(ctx: &Context<'_>) -> GenResult<Files> {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let prefix = format!("{module}_");
    let style = CStyle {
        named_enums: false,
        prefix: &prefix,
    };
    let mut code = ctx.header("--");

    code.push_str("\nlocal ffi = require(\"ffi\")\n");

    if !pkg.shared_types.is_empty() {
        code.push_str("\n-- shared value types may already be declared by another module\n");
        for shared in &pkg.shared_types {
            code.push_str(&format!(
                "pcall(ffi.cdef, [[{}]])\n",
                super::c::shared_struct(*shared, true).trim_end()
            ));
        }
    }

    if !ctx.callback_order.is_empty() {
        code.push_str("\nffi.cdef[[\n");
        for id in &ctx.callback_order {
            let names = ctx.callback_names(*id);
            let sig = &ctx.callback_abi[id.0];
            code.push_str(&format!(
                "typedef {} (*{prefix}{})({});\n",
                c_type(&sig.ret, pkg, &ctx.symbols, style),
                names.name,
                c_params(sig, names, pkg, &ctx.symbols, style)
            ));
        }
        code.push_str("]]\n");
    }

    code.push_str("\nlocal M = {}\n");

    for (e, names) in pkg.enums.iter().zip(&ctx.symbols.enums) {
        code.push('\n');
        push_doc(&mut code, "", &super::doc_lines(e.doc.as_deref()));
        code.push_str(&format!("---@enum {}\n", names.name));
        code.push_str(&format!("M.{} = {{\n", names.name));
        for (member, member_name) in e.members.iter().zip(&names.members) {
            push_doc(&mut code, "    ", &super::doc_lines(member.doc.as_deref()));
            code.push_str(&format!(
                "    {member_name} = {},\n",
                number_literal(member.value, e.repr)
            ));
        }
        code.push_str("}\n");
    }

    entry_points(ctx, style, &mut code);

    for index in 0..pkg.functions.len() {
        function(ctx, index, &mut code)?;
    }

    for id in &ctx.callback_order {
        registry(ctx, *id, &prefix, &mut code)?;
    }

    for k in 0..ctx.classes.len() {
        class(ctx, k, &mut code)?;
    }

    code.push_str("\nreturn M\n");

    let mut files = Files::new();
    files.insert(format!("{module}.lua"), code);
    Ok(files)
}

fn push_doc(code: &mut String, indent: &str, lines: &[String]) {
    super::push_comment(code, indent, "---", lines);
}

/// Lua literal for an enum value; 64-bit values outside the exact range become cdata.
fn number_literal(value: i64, repr: IntRepr) -> String {
    if repr.width < 64 || (-EXACT_NUMBER..=EXACT_NUMBER).contains(&value) {
        return value.to_string();
    }
    if repr.signed {
        if value == i64::MIN {
            "(-9223372036854775807LL - 1)".to_string()
        } else {
            format!("{value}LL")
        }
    } else {
        format!("{value}ULL")
    }
}

fn fn_pointer(
    ctx: &Context<'_>,
    sig: &AbiSignature,
    names: &SignatureNames,
    style: CStyle<'_>,
) -> String {
    format!(
        "{} (*)({})",
        c_type(&sig.ret, ctx.pkg, &ctx.symbols, style),
        c_params(sig, names, ctx.pkg, &ctx.symbols, style)
    )
}

fn entry_points(ctx: &Context<'_>, style: CStyle<'_>, code: &mut String) {
    let pkg = ctx.pkg;
    code.push_str("\nlocal symbols = {\n");
    for symbol in ctx.table_symbols() {
        code.push_str(&format!("    {},\n", quote(&symbol)));
    }
    code.push_str("}\n\nlocal signatures = {\n");
    for (index, f) in pkg.functions.iter().enumerate() {
        code.push_str(&format!(
            "    [{}] = {},\n",
            quote(&ctx.symbol(f)),
            quote(&fn_pointer(ctx, &ctx.function_abi[index], ctx.function_names(index), style))
        ));
    }
    if pkg.needs_free() {
        code.push_str(&format!(
            "    [{}] = \"void (*)(void* ptr)\",\n",
            quote(&ctx.free_symbol())
        ));
    }
    code.push_str("}\n\nlocal entries = {}\n\n");

    code.push_str("--- Resolve every entry point through `resolve`, which returns an address or nil.\n");
    code.push_str("---@param resolve fun(name: string): any\n");
    code.push_str("---@return string[] missing symbols that could not be resolved\n");
    code.push_str("function M.init(resolve)\n");
    code.push_str("    local missing = {}\n");
    code.push_str("    for _, symbol in ipairs(symbols) do\n");
    code.push_str("        local address = resolve(symbol)\n");
    code.push_str("        if address == nil or address == 0 then\n");
    code.push_str("            missing[#missing + 1] = symbol\n");
    code.push_str("            entries[symbol] = nil\n");
    code.push_str("        else\n");
    code.push_str("            entries[symbol] = ffi.cast(signatures[symbol], address)\n");
    code.push_str("        end\n    end\n    return missing\nend\n\n");

    code.push_str("local function entry(symbol)\n");
    code.push_str("    local fn = entries[symbol]\n");
    code.push_str("    if fn == nil then\n");
    code.push_str("        error(symbol .. \" is not resolved; call init first\", 3)\n");
    code.push_str("    end\n    return fn\nend\n");
}

fn function(ctx: &Context<'_>, index: usize, code: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let f = &pkg.functions[index];
    let names = ctx.function_names(index);
    let sig = &ctx.function_abi[index];
    let repr = CStyle::REPR;

    let mut doc = ctx.function_doc(f, true);
    for (p, name) in f.params.iter().zip(&names.params) {
        let ty = ctx.param_type(p)?;
        match &p.doc {
            Some(d) => doc.push(format!("@param {name} {ty} {d}")),
            None => doc.push(format!("@param {name} {ty}")),
        }
    }
    if !f.ret.ty.is_void() {
        let ty = ctx.decl_type(&f.ret.ty)?;
        match &f.ret.doc {
            Some(d) => doc.push(format!("@return {ty} # {d}")),
            None => doc.push(format!("@return {ty}")),
        }
    }
    for (p, name) in f.params.iter().zip(&names.params) {
        if p.by_ref {
            doc.push(format!("@return {} {name}", ctx.decl_type(&p.ty)?));
        }
    }
    if f.deprecated.is_some() {
        doc.push("@deprecated".to_string());
    }

    code.push('\n');
    push_doc(code, "", &doc);
    code.push_str(&format!(
        "function M.{}({})\n",
        names.name,
        names.params.join(", ")
    ));
    for (p, name) in f.params.iter().zip(&names.params) {
        let Some(value) = p.default else { continue };
        let literal = match p.ty {
            TypeRef::Bool => (value != 0).to_string(),
            _ => value.to_string(),
        };
        code.push_str(&format!("    if {name} == nil then\n        {name} = {literal}\n    end\n"));
    }

    let mut args = Vec::with_capacity(sig.params.len());
    let mut extra = Vec::new();
    for abi in &sig.params {
        args.push(match abi.slot {
            Slot::Value(i) if f.params[i].by_ref => {
                let name = &names.params[i];
                let AbiType::PtrMut(inner) = &abi.ty else {
                    continue;
                };
                code.push_str(&format!(
                    "    local {name}_ref = ffi.new(\"{}[1]\", {name})\n",
                    c_type(inner, pkg, &ctx.symbols, repr)
                ));
                extra.push(format!("{name}_ref[0]"));
                format!("{name}_ref")
            }
            Slot::Value(i) => names.params[i].clone(),
            Slot::Data(i) => {
                let name = &names.params[i];
                let AbiType::Ptr(inner) = &abi.ty else {
                    continue;
                };
                code.push_str(&format!(
                    "    local {name}_buf = ffi.new(\"{}[?]\", #{name}, {name})\n",
                    c_type(inner, pkg, &ctx.symbols, repr)
                ));
                format!("{name}_buf")
            }
            Slot::Len(i) => format!("#{}", names.params[i]),
            Slot::OutLen => {
                let out_len = abi.slot.name(names);
                code.push_str(&format!("    local {out_len} = ffi.new(\"size_t[1]\")\n"));
                out_len.to_string()
            }
        });
    }
    let call = format!("entry({})({})", quote(&ctx.symbol(f)), args.join(", "));
    let free = format!("entry({})", quote(&ctx.free_symbol()));

    let mut returned = Vec::new();
    match &f.ret.ty {
        TypeRef::Void => code.push_str(&format!("    {call}\n")),
        TypeRef::Str(ownership) => {
            code.push_str(&format!("    local raw = {call}\n"));
            code.push_str("    local result = \"\"\n");
            code.push_str("    if raw ~= nil then\n        result = ffi.string(raw)\n");
            if *ownership == Ownership::Owned {
                code.push_str(&format!("        {free}(ffi.cast(\"void*\", raw))\n"));
            }
            code.push_str("    end\n");
            returned.push("result".to_string());
        }
        TypeRef::Array(inner) => {
            let out_len = names.out_len.as_deref().unwrap_or("out_len");
            let element = match inner.as_ref() {
                TypeRef::Shared(shared) => format!("ffi.new(\"{}\", raw[i])", shared.name()),
                _ => "raw[i]".to_string(),
            };
            code.push_str(&format!("    local raw = {call}\n"));
            code.push_str("    local result = {}\n");
            code.push_str("    if raw ~= nil then\n");
            code.push_str(&format!(
                "        for i = 0, tonumber({out_len}[0]) - 1 do\n            result[i + 1] = {element}\n        end\n"
            ));
            code.push_str(&format!("        {free}(raw)\n    end\n"));
            returned.push("result".to_string());
        }
        _ => {
            code.push_str(&format!("    local result = {call}\n"));
            returned.push("result".to_string());
        }
    }
    returned.extend(extra);
    if !returned.is_empty() {
        code.push_str(&format!("    return {}\n", returned.join(", ")));
    }
    code.push_str("end\n");
    Ok(())
}

fn zero(ty: &TypeRef) -> &'static str {
    match ty {
        TypeRef::Void => "",
        TypeRef::Bool => " false",
        _ => " 0",
    }
}

fn registry(ctx: &Context<'_>, id: CallbackId, prefix: &str, code: &mut String) -> GenResult<()> {
    let cb = ctx.pkg.callback(id);
    let names = ctx.callback_names(id);
    let name = &names.name;
    let sig = &ctx.callback_abi[id.0];
    let abi_names: Vec<&str> = sig.params.iter().map(|p| p.slot.name(names)).collect();

    let mut decoded = Vec::with_capacity(cb.params.len());
    for (i, (p, pname)) in cb.params.iter().zip(&names.params).enumerate() {
        decoded.push(match &p.ty {
            TypeRef::Str(_) => format!("{pname} ~= nil and ffi.string({pname}) or \"\""),
            TypeRef::Array(_) => {
                let len = names.lens[i].as_deref().unwrap_or("len");
                format!("copy_array({pname}, {len})")
            }
            _ => pname.clone(),
        });
    }
    let copies_arrays = cb.params.iter().any(|p| matches!(p.ty, TypeRef::Array(_)));
    let mut handler_doc = Vec::with_capacity(cb.params.len());
    for (p, pname) in cb.params.iter().zip(&names.params) {
        let ty = match &p.ty {
            TypeRef::Str(_) => "string".to_string(),
            other => ctx.decl_type(other)?,
        };
        handler_doc.push(format!("{pname}: {ty}"));
    }
    let handler_ret = match &cb.ret.ty {
        TypeRef::Void => String::new(),
        other => format!(": {}", ctx.decl_type(other)?),
    };

    code.push_str(&format!(
        "\n--- Binds Lua functions to native `{name}` pointers, one trampoline per slot.\n\
         --- Trampolines are created on first use. LuaJIT states are single-threaded.\n"
    ));
    code.push_str(&format!("M.{name} = {{ SLOTS = {} }}\n\ndo\n", ctx.slots));
    code.push_str("    local handlers = {}\n    local thunks = {}\n    local free = {}\n");
    code.push_str(&format!(
        "    for slot = M.{name}.SLOTS - 1, 0, -1 do\n        free[#free + 1] = slot\n    end\n"
    ));
    if copies_arrays {
        code.push_str("\n    local function copy_array(ptr, len)\n");
        code.push_str("        local values = {}\n");
        code.push_str("        if ptr ~= nil then\n");
        code.push_str("            for i = 0, tonumber(len) - 1 do\n                values[i + 1] = ptr[i]\n            end\n");
        code.push_str("        end\n        return values\n    end\n");
    }
    code.push_str("\n    local function thunk(slot)\n");
    code.push_str(&format!(
        "        return ffi.cast(\"{prefix}{name}\", function({})\n",
        abi_names.join(", ")
    ));
    code.push_str("            local handler = handlers[slot]\n");
    code.push_str(&format!(
        "            if handler == nil then\n                return{}\n            end\n",
        zero(&cb.ret.ty)
    ));
    // errors must not unwind into native frames
    code.push_str(&format!(
        "            local ok, result = pcall(function()\n                return handler({})\n            end)\n",
        decoded.join(", ")
    ));
    code.push_str("            if not ok then\n");
    code.push_str("                io.stderr:write(tostring(result), \"\\n\")\n");
    code.push_str(&format!("                return{}\n            end\n", zero(&cb.ret.ty)));
    if cb.ret.ty != TypeRef::Void {
        code.push_str("            return result\n");
    }
    code.push_str("        end)\n    end\n\n");

    code.push_str("    --- Bind `handler` to a free slot.\n");
    code.push_str(&format!(
        "    ---@param handler fun({}){handler_ret}\n",
        handler_doc.join(", ")
    ));
    code.push_str("    ---@return integer? slot nil when every slot is taken\n");
    code.push_str("    ---@return ffi.cdata* native\n");
    code.push_str(&format!("    function M.{name}.register(handler)\n"));
    code.push_str("        local slot = table.remove(free)\n");
    code.push_str("        if slot == nil then\n            return nil\n        end\n");
    code.push_str("        handlers[slot] = handler\n");
    code.push_str("        if thunks[slot] == nil then\n            thunks[slot] = thunk(slot)\n        end\n");
    code.push_str("        return slot, thunks[slot]\n    end\n\n");
    code.push_str("    --- Release `slot`. Returns false if it was not registered.\n");
    code.push_str(&format!("    function M.{name}.unregister(slot)\n"));
    code.push_str("        if handlers[slot] == nil then\n            return false\n        end\n");
    code.push_str("        handlers[slot] = nil\n");
    code.push_str("        free[#free + 1] = slot\n");
    code.push_str("        return true\n    end\nend\n");
    Ok(())
}

fn class(ctx: &Context<'_>, k: usize, code: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let model = &ctx.classes[k];
    let names = &ctx.symbols.classes[k];
    let name = &names.name;
    let invalid = model.invalid_value;

    code.push('\n');
    push_doc(code, "", &super::doc_lines(model.doc.as_deref()));
    code.push_str(&format!("---@class {name}\n---@field handle {}\n", ctx.decl_type(&model.handle)?));
    code.push_str(&format!("local {name} = {{}}\n{name}.__index = {name}\nM.{name} = {name}\n\n"));
    code.push_str(&format!(
        "function {name}.new(handle)\n    return setmetatable({{ handle = handle }}, {name})\nend\n"
    ));
    code.push_str(&format!(
        "\nfunction {name}:is_valid()\n    return self.handle ~= nil and self.handle ~= {invalid}\nend\n"
    ));

    if model.receiver == Receiver::Owned
        && let Some(dtor) = model.destructor
    {
        code.push_str("\n--- Destroy the handle. Further calls do nothing.\n");
        code.push_str(&format!("function {name}:close()\n"));
        code.push_str("    if self:is_valid() then\n");
        code.push_str(&format!(
            "        M.{}(self.handle)\n        self.handle = {invalid}\n    end\nend\n",
            ctx.function_names(dtor).name
        ));
        code.push_str("\n--- Give up ownership of the handle without destroying it.\n");
        code.push_str(&format!(
            "function {name}:release()\n    local released = self.handle\n    self.handle = {invalid}\n    return released\nend\n"
        ));
    }

    for (ctor, ctor_name) in model.constructors.iter().zip(&names.constructors) {
        let f = &pkg.functions[*ctor];
        let fnames = ctx.function_names(*ctor);
        let params = fnames.params.join(", ");
        code.push('\n');
        push_doc(code, "", &super::doc_lines(f.doc.as_deref()));
        code.push_str(&format!(
            "function {name}.{ctor_name}({params})\n    return {name}.new(M.{}({params}))\nend\n",
            fnames.name
        ));
    }

    for (method, method_name) in model.methods.iter().zip(&names.methods) {
        let f = &pkg.functions[method.function];
        let fnames = ctx.function_names(method.function);
        let skip = usize::from(method.bind_self);
        let params: Vec<&str> = fnames.params.iter().skip(skip).map(String::as_str).collect();
        let mut args = Vec::new();
        if method.bind_self {
            args.push("self.handle".to_string());
        }
        for (j, param) in params.iter().enumerate() {
            args.push(match method.param_alias(j) {
                Some(alias) if alias.owner => format!("{param}:release()"),
                Some(_) => format!("{param}.handle"),
                None => param.to_string(),
            });
        }
        let call = format!("M.{}({})", fnames.name, args.join(", "));
        let body = match method.ret_alias {
            // resolved through M at call time; the class may be defined further down
            Some(alias) => format!("M.{}.new({call})", ctx.alias_class(alias)),
            None => call,
        };
        let separator = if method.bind_self { ":" } else { "." };

        code.push('\n');
        push_doc(code, "", &super::doc_lines(f.doc.as_deref()));
        code.push_str(&format!(
            "function {name}{separator}{method_name}({})\n    return {body}\nend\n",
            params.join(", ")
        ));
    }
    Ok(())
}
