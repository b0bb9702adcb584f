//! C++17 emitter: one header-only file.

use super::{Context, Files, push_block_doc, quote};
use crate::abi::{AbiType, CStyle, Slot, c_params, c_type};
use crate::classes::Receiver;
use crate::error::GenResult;
use crate::types::Strategy;
use plugify_gen_manifest::{CallbackId, Ownership, ParamDescriptor, TypeRef};

pub(super) fn generate(ctx: &Context<'_>) -> GenResult<Files> {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let mut code = ctx.header("//");

    code.push_str("\n#pragma once\n\n");
    let mut includes = vec!["cstddef", "cstdint", "utility"];
    if ctx.uses(Strategy::OwnedString) || ctx.uses(Strategy::BorrowedString) {
        includes.extend(["string", "string_view"]);
    }
    if ctx.uses(Strategy::Sequence) {
        includes.extend(["algorithm", "memory", "vector"]);
    }
    if !pkg.callbacks.is_empty() {
        includes.extend(["array", "functional", "memory", "mutex", "optional", "vector"]);
    }
    includes.sort_unstable();
    includes.dedup();
    for include in includes {
        code.push_str(&format!("#include <{include}>\n"));
    }
    code.push_str(&format!("\nnamespace {module} {{\n"));

    if !pkg.shared_types.is_empty() {
        code.push('\n');
        for shared in &pkg.shared_types {
            code.push_str(&super::c::shared_struct(*shared, false));
        }
    }

    for (e, names) in pkg.enums.iter().zip(&ctx.symbols.enums) {
        code.push('\n');
        push_block_doc(&mut code, "", &super::doc_lines(e.doc.as_deref()));
        code.push_str(&format!(
            "enum class {} : {} {{\n",
            names.name,
            crate::abi::C_INTS[e.repr.table_index()]
        ));
        for (member, member_name) in e.members.iter().zip(&names.members) {
            if let Some(doc) = &member.doc {
                code.push_str(&format!("    /** {} */\n", super::block_comment_text(doc)));
            }
            code.push_str(&format!(
                "    {member_name} = {},\n",
                super::c::c_int_literal(member.value, e.repr)
            ));
        }
        code.push_str("};\n");
    }

    for id in &ctx.callback_order {
        let cb = pkg.callback(*id);
        let names = ctx.callback_names(*id);
        let sig = &ctx.callback_abi[id.0];
        code.push('\n');
        push_block_doc(&mut code, "", &super::doc_lines(cb.doc.as_deref()));
        code.push_str(&format!(
            "using {} = {} (*)({});\n",
            names.name,
            c_type(&sig.ret, pkg, &ctx.symbols, CStyle::NAMED),
            c_params(sig, names, pkg, &ctx.symbols, CStyle::NAMED)
        ));
    }

    code.push_str("\n/** Looks up a plugin entry point by name, or returns nullptr. */\n");
    code.push_str("using Resolver = void* (*)(const char* name);\n\n");

    code.push_str("namespace detail {\n\nstruct Table {\n");
    for index in 0..pkg.functions.len() {
        let names = ctx.function_names(index);
        let sig = &ctx.function_abi[index];
        code.push_str(&format!(
            "    {} (*{})({}) = nullptr;\n",
            c_type(&sig.ret, pkg, &ctx.symbols, CStyle::NAMED),
            names.name,
            c_params(sig, names, pkg, &ctx.symbols, CStyle::NAMED)
        ));
    }
    if pkg.needs_free() {
        code.push_str("    void (*Free)(void* ptr) = nullptr;\n");
    }
    code.push_str("};\n\ninline Table& table() {\n    static Table instance;\n    return instance;\n}\n\n");
    code.push_str("} // namespace detail\n\n");

    code.push_str(
        "/**\n * Resolve every entry point through `resolve`.\n \
         * Returns the number of symbols that could not be resolved.\n */\n",
    );
    code.push_str("inline int Init(Resolver resolve) {\n");
    code.push_str("    auto& table = detail::table();\n    int missing = 0;\n");
    let mut fields: Vec<(String, String)> = pkg
        .functions
        .iter()
        .enumerate()
        .map(|(i, f)| (ctx.function_names(i).name.clone(), ctx.symbol(f)))
        .collect();
    if pkg.needs_free() {
        fields.push(("Free".to_string(), ctx.free_symbol()));
    }
    for (field, symbol) in &fields {
        code.push_str(&format!(
            "    table.{field} = reinterpret_cast<decltype(table.{field})>(resolve({}));\n",
            quote(symbol)
        ));
        code.push_str(&format!("    if (!table.{field}) ++missing;\n"));
    }
    code.push_str("    return missing;\n}\n");

    for index in 0..pkg.functions.len() {
        function(ctx, index, &mut code)?;
    }

    for id in &ctx.callback_order {
        registry(ctx, *id, &mut code)?;
    }

    if !ctx.classes.is_empty() {
        code.push('\n');
        for names in &ctx.symbols.classes {
            code.push_str(&format!("class {};\n", names.name));
        }
    }
    let mut deferred = String::new();
    for k in 0..ctx.classes.len() {
        class(ctx, k, &mut code, &mut deferred)?;
    }
    code.push_str(&deferred);

    code.push_str(&format!("\n}} // namespace {module}\n"));

    let mut files = Files::new();
    files.insert(format!("{module}.hpp"), code);
    Ok(files)
}

fn function(ctx: &Context<'_>, index: usize, code: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let f = &pkg.functions[index];
    let names = ctx.function_names(index);
    let sig = &ctx.function_abi[index];

    let mut doc = ctx.function_doc(f, false);
    for (p, name) in f.params.iter().zip(&names.params) {
        if let Some(d) = &p.doc {
            doc.push(format!("@param {name} {d}"));
        }
    }
    if let Some(d) = &f.ret.doc {
        doc.push(format!("@return {d}"));
    }

    let mut params = Vec::with_capacity(f.params.len());
    for (p, name) in f.params.iter().zip(&names.params) {
        params.push(param_decl(ctx, p, name)?);
    }
    let ret = ctx.decl_type(&f.ret.ty)?;

    code.push('\n');
    push_block_doc(code, "", &doc);
    if let Some(note) = &f.deprecated {
        code.push_str(&format!("[[deprecated({})]]\n", quote(note)));
    }
    code.push_str(&format!("inline {ret} {}({}) {{\n", names.name, params.join(", ")));
    code.push_str("    auto& table = detail::table();\n");

    let mut args = Vec::with_capacity(sig.params.len());
    for abi in &sig.params {
        let arg = match abi.slot {
            Slot::Value(i) => {
                let name = &names.params[i];
                let p = &f.params[i];
                match &p.ty {
                    _ if p.by_ref => format!("&{name}"),
                    TypeRef::Str(Ownership::Owned) => format!("{name}.c_str()"),
                    _ => name.clone(),
                }
            }
            Slot::Data(i) => {
                let name = &names.params[i];
                if matches!(&f.params[i].ty, TypeRef::Array(inner) if **inner == TypeRef::Bool) {
                    // std::vector<bool> is bit-packed
                    code.push_str(&format!(
                        "    auto {name}_buf = std::make_unique<bool[]>({name}.size());\n"
                    ));
                    code.push_str(&format!(
                        "    std::copy({name}.begin(), {name}.end(), {name}_buf.get());\n"
                    ));
                    format!("{name}_buf.get()")
                } else {
                    format!("{name}.data()")
                }
            }
            Slot::Len(i) => format!("{}.size()", names.params[i]),
            Slot::OutLen => format!("&{}", abi.slot.name(names)),
        };
        args.push(arg);
    }
    let call = format!("table.{}({})", names.name, args.join(", "));

    match &f.ret.ty {
        TypeRef::Void => code.push_str(&format!("    {call};\n")),
        TypeRef::Str(Ownership::Owned) => {
            code.push_str(&format!("    const char* raw = {call};\n"));
            code.push_str("    if (!raw) return {};\n");
            code.push_str("    std::string result(raw);\n");
            code.push_str("    table.Free(const_cast<char*>(raw));\n");
            code.push_str("    return result;\n");
        }
        TypeRef::Str(Ownership::Borrowed) => {
            code.push_str(&format!("    const char* raw = {call};\n"));
            code.push_str("    return raw ? std::string_view(raw) : std::string_view();\n");
        }
        TypeRef::Array(_) => {
            let out_len = sig
                .params
                .iter()
                .find(|p| p.slot == Slot::OutLen)
                .map(|p| p.slot.name(names))
                .unwrap_or("out_len");
            code.push_str(&format!("    size_t {out_len} = 0;\n"));
            code.push_str(&format!("    auto* raw = {call};\n"));
            code.push_str(&format!("    {ret} result;\n"));
            code.push_str("    if (raw) {\n");
            code.push_str(&format!("        result.assign(raw, raw + {out_len});\n"));
            code.push_str("        table.Free(raw);\n    }\n    return result;\n");
        }
        _ => code.push_str(&format!("    return {call};\n")),
    }
    code.push_str("}\n");
    Ok(())
}

/// Closure parameter type seen by a registered handler.
fn handler_param(ctx: &Context<'_>, ty: &TypeRef, by_ref: bool) -> GenResult<String> {
    Ok(match ty {
        _ if by_ref => format!("{}&", ctx.decl_type(ty)?),
        TypeRef::Str(_) => "std::string_view".to_string(),
        TypeRef::Array(inner) => format!("std::vector<{}>", ctx.decl_type(inner)?),
        other => ctx.decl_type(other)?,
    })
}

fn registry(ctx: &Context<'_>, id: CallbackId, code: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let cb = pkg.callback(id);
    let names = ctx.callback_names(id);
    let name = &names.name;
    let sig = &ctx.callback_abi[id.0];
    let ret = c_type(&sig.ret, pkg, &ctx.symbols, CStyle::NAMED);
    let is_void = sig.ret == AbiType::Void;

    let mut handler_params = Vec::with_capacity(cb.params.len());
    for p in &cb.params {
        handler_params.push(handler_param(ctx, &p.ty, p.by_ref)?);
    }

    let mut decoded = Vec::with_capacity(cb.params.len());
    for (i, (p, pname)) in cb.params.iter().zip(&names.params).enumerate() {
        decoded.push(match &p.ty {
            _ if p.by_ref => format!("*{pname}"),
            TypeRef::Str(_) => format!("{pname} ? std::string_view({pname}) : std::string_view()"),
            TypeRef::Array(inner) => {
                let len = names.lens[i].as_deref().unwrap_or("len");
                format!(
                    "std::vector<{}>({pname}, {pname} + ({pname} ? {len} : 0))",
                    ctx.decl_type(inner)?
                )
            }
            _ => pname.clone(),
        });
    }

    code.push('\n');
    code.push_str(&format!(
        "/**\n * Binds closures to native `{name}` pointers, one trampoline per slot.\n \
         * Register and Unregister may be called from any thread.\n */\n"
    ));
    code.push_str(&format!("class {name}Registry {{\npublic:\n"));
    code.push_str(&format!(
        "    using Handler = std::function<{ret}({})>;\n",
        handler_params.join(", ")
    ));
    code.push_str(&format!("    static constexpr size_t Slots = {};\n\n", ctx.slots));
    code.push_str(
        "    /** Returns the slot and its native pointer, or std::nullopt when every slot is taken. */\n",
    );
    code.push_str(&format!(
        "    static std::optional<std::pair<size_t, {name}>> Register(Handler handler) {{\n"
    ));
    code.push_str("        auto& s = state();\n");
    code.push_str("        std::lock_guard<std::mutex> lock(s.mutex);\n");
    code.push_str("        s.init();\n");
    code.push_str("        if (!handler || s.free.empty()) return std::nullopt;\n");
    code.push_str("        size_t slot = s.free.back();\n");
    code.push_str("        s.free.pop_back();\n");
    code.push_str("        s.entries[slot] = std::make_shared<Handler>(std::move(handler));\n");
    code.push_str("        return std::make_pair(slot, Trampolines()[slot]);\n    }\n\n");
    code.push_str("    /** Release `slot`. Returns false if it was not registered. */\n");
    code.push_str("    static bool Unregister(size_t slot) {\n");
    code.push_str("        auto& s = state();\n");
    code.push_str("        std::lock_guard<std::mutex> lock(s.mutex);\n");
    code.push_str("        if (slot >= s.entries.size() || !s.entries[slot]) return false;\n");
    code.push_str("        s.entries[slot].reset();\n");
    code.push_str("        s.free.push_back(slot);\n");
    code.push_str("        return true;\n    }\n\n");
    code.push_str("private:\n");
    code.push_str("    struct State {\n");
    code.push_str("        std::mutex mutex;\n");
    code.push_str("        std::vector<std::shared_ptr<Handler>> entries;\n");
    code.push_str("        std::vector<size_t> free;\n\n");
    code.push_str("        void init() {\n");
    code.push_str("            if (entries.size() == Slots) return;\n");
    code.push_str("            entries.resize(Slots);\n");
    code.push_str("            for (size_t i = Slots; i > 0; --i) free.push_back(i - 1);\n");
    code.push_str("        }\n    };\n\n");
    code.push_str("    static State& state() {\n        static State instance;\n        return instance;\n    }\n\n");
    code.push_str("    static std::shared_ptr<Handler> Lookup(size_t slot) {\n");
    code.push_str("        auto& s = state();\n");
    code.push_str("        std::lock_guard<std::mutex> lock(s.mutex);\n");
    code.push_str("        return slot < s.entries.size() ? s.entries[slot] : nullptr;\n    }\n\n");

    code.push_str("    template <size_t N>\n");
    code.push_str(&format!(
        "    static {ret} Trampoline({}) {{\n",
        if sig.params.is_empty() {
            String::new()
        } else {
            c_params(sig, names, pkg, &ctx.symbols, CStyle::NAMED)
        }
    ));
    let bail = if is_void { "return;" } else { "return {};" };
    code.push_str("        try {\n");
    code.push_str("            auto handler = Lookup(N);\n");
    code.push_str(&format!("            if (!handler) {bail}\n"));
    if is_void {
        code.push_str(&format!("            (*handler)({});\n", decoded.join(", ")));
    } else {
        code.push_str(&format!("            return (*handler)({});\n", decoded.join(", ")));
    }
    code.push_str("        } catch (...) {\n");
    code.push_str("            // exceptions must not unwind into native frames\n");
    code.push_str(&format!("            {bail}\n        }}\n    }}\n\n"));

    code.push_str("    template <size_t... N>\n");
    code.push_str(&format!(
        "    static constexpr std::array<{name}, Slots> MakeTrampolines(std::index_sequence<N...>) {{\n"
    ));
    code.push_str("        return {{&Trampoline<N>...}};\n    }\n\n");
    code.push_str(&format!(
        "    static const std::array<{name}, Slots>& Trampolines() {{\n"
    ));
    code.push_str(
        "        static constexpr auto table = MakeTrampolines(std::make_index_sequence<Slots>{});\n",
    );
    code.push_str("        return table;\n    }\n};\n");
    Ok(())
}

/// `type name`, with the default argument when the parameter has one.
fn param_decl(ctx: &Context<'_>, p: &ParamDescriptor, name: &str) -> GenResult<String> {
    let ty = ctx.param_type(p)?;
    Ok(match p.default {
        None => format!("{ty} {name}"),
        Some(value) => format!("{ty} {name} = {}", default_literal(ctx, &p.ty, value)),
    })
}

fn default_literal(ctx: &Context<'_>, ty: &TypeRef, value: i64) -> String {
    match ty {
        TypeRef::Bool => (value != 0).to_string(),
        TypeRef::Enum(id) => format!("static_cast<{}>({value})", ctx.symbols.enum_name(*id)),
        _ => value.to_string(),
    }
}

fn class(ctx: &Context<'_>, k: usize, code: &mut String, deferred: &mut String) -> GenResult<()> {
    let pkg = ctx.pkg;
    let module = ctx.module();
    let model = &ctx.classes[k];
    let names = &ctx.symbols.classes[k];
    let name = &names.name;
    let handle = ctx.decl_type(&model.handle)?;
    let owned = model.receiver == Receiver::Owned;
    let invalid = model.invalid_value;

    code.push('\n');
    push_block_doc(code, "", &super::doc_lines(model.doc.as_deref()));
    code.push_str(&format!("class {name} {{\npublic:\n"));
    code.push_str(&format!(
        "    explicit {name}({handle} handle) noexcept : handle_(handle) {{}}\n"
    ));
    if owned && let Some(dtor) = model.destructor {
        let dtor_name = &ctx.function_names(dtor).name;
        code.push_str(&format!(
            "\n    ~{name}() {{\n        if (handle_ != {invalid}) ::{module}::{dtor_name}(handle_);\n    }}\n\n"
        ));
        code.push_str(&format!("    {name}(const {name}&) = delete;\n"));
        code.push_str(&format!("    {name}& operator=(const {name}&) = delete;\n"));
        code.push_str(&format!(
            "    {name}({name}&& other) noexcept : handle_(std::exchange(other.handle_, {invalid})) {{}}\n"
        ));
        code.push_str(&format!("    {name}& operator=({name}&& other) noexcept {{\n"));
        code.push_str("        if (this != &other) {\n");
        code.push_str(&format!(
            "            if (handle_ != {invalid}) ::{module}::{dtor_name}(handle_);\n"
        ));
        code.push_str(&format!(
            "            handle_ = std::exchange(other.handle_, {invalid});\n"
        ));
        code.push_str("        }\n        return *this;\n    }\n\n");
        code.push_str("    /** Give up ownership of the handle without destroying it. */\n");
        code.push_str(&format!(
            "    {handle} Release() noexcept {{ return std::exchange(handle_, {invalid}); }}\n"
        ));
    }
    code.push_str(&format!(
        "    {handle} handle() const noexcept {{ return handle_; }}\n"
    ));
    code.push_str(&format!(
        "    explicit operator bool() const noexcept {{ return handle_ != {invalid}; }}\n"
    ));

    for (ctor, ctor_name) in model.constructors.iter().zip(&names.constructors) {
        let f = &pkg.functions[*ctor];
        let fnames = ctx.function_names(*ctor);
        let mut params = Vec::new();
        for (p, pname) in f.params.iter().zip(&fnames.params) {
            params.push(param_decl(ctx, p, pname)?);
        }
        code.push('\n');
        push_block_doc(code, "    ", &super::doc_lines(f.doc.as_deref()));
        code.push_str(&format!(
            "    static {name} {ctor_name}({}) {{\n        return {name}(::{module}::{}({}));\n    }}\n",
            params.join(", "),
            fnames.name,
            fnames.params.join(", ")
        ));
    }

    for (method, method_name) in model.methods.iter().zip(&names.methods) {
        let f = &pkg.functions[method.function];
        let fnames = ctx.function_names(method.function);
        let skip = usize::from(method.bind_self);
        // `params` carry default arguments, `plain` is for out-of-line definitions
        let mut params = Vec::new();
        let mut plain = Vec::new();
        let mut args = Vec::new();
        if method.bind_self {
            args.push("handle_".to_string());
        }
        for (j, (p, pname)) in f.params.iter().zip(&fnames.params).skip(skip).enumerate() {
            let (param, arg) = match method.param_alias(j) {
                Some(alias) if alias.owner => (
                    format!("{} {pname}", ctx.alias_class(alias)),
                    format!("{pname}.Release()"),
                ),
                Some(alias) => (
                    format!("const {}& {pname}", ctx.alias_class(alias)),
                    format!("{pname}.handle()"),
                ),
                None => (format!("{} {pname}", ctx.param_type(p)?), pname.clone()),
            };
            params.push(match (method.param_alias(j), p.default) {
                (None, Some(_)) => param_decl(ctx, p, pname)?,
                _ => param.clone(),
            });
            plain.push(param);
            args.push(arg);
        }
        let call = format!("::{module}::{}({})", fnames.name, args.join(", "));
        let (ret, body) = match method.ret_alias {
            Some(alias) => {
                let class = ctx.alias_class(alias);
                (class.to_string(), format!("return {class}({call});"))
            }
            None if f.ret.ty.is_void() => (ctx.decl_type(&f.ret.ty)?, format!("{call};")),
            None => (ctx.decl_type(&f.ret.ty)?, format!("return {call};")),
        };

        code.push('\n');
        push_block_doc(code, "    ", &super::doc_lines(f.doc.as_deref()));
        if let Some(note) = &f.deprecated {
            code.push_str(&format!("    [[deprecated({})]]\n", quote(note)));
        }
        let (prefix, suffix) = if method.bind_self { ("", " const") } else { ("static ", "") };
        let aliased = method.ret_alias.is_some() || method.param_aliases.iter().any(Option::is_some);
        if aliased {
            // other classes are incomplete here; the body follows the last class
            code.push_str(&format!(
                "    {prefix}{ret} {method_name}({}){suffix};\n",
                params.join(", ")
            ));
            deferred.push_str(&format!(
                "\ninline {ret} {name}::{method_name}({}){suffix} {{\n    {body}\n}}\n",
                plain.join(", ")
            ));
        } else {
            code.push_str(&format!(
                "    {prefix}{ret} {method_name}({}){suffix} {{\n        {body}\n    }}\n",
                params.join(", ")
            ));
        }
    }

    code.push_str(&format!("\nprivate:\n    {handle} handle_;\n}};\n"));
    Ok(())
}
