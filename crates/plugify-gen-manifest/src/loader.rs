//! Manifest text → validated [`Package`].

use crate::error::{ManifestError, ManifestResult};
use crate::model::{
    BindingDecl, CallbackId, CallbackType, ClassAlias, ClassDecl, EnumId, EnumMember, EnumType, FloatWidth,
    FunctionDescriptor, HandleWidth, IntRepr, Ownership, Package, ParamDescriptor,
    ReturnDescriptor, SharedType, TypeRef, is_identifier,
};
use crate::schema::{
    RawAlias, RawCallback, RawClass, RawEnum, RawManifest, RawParam, RawReturn,
};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, trace};

/// Parse and validate manifest text.
///
/// Every type reference in the returned package is resolved. Inline enum and prototype
/// definitions are hoisted into [`Package::enums`] and [`Package::callbacks`] after the
/// explicitly declared ones, in first-use order.
pub fn load(text: &str) -> ManifestResult<Package> {
    let raw: RawManifest = serde_json::from_str(text)?;
    Loader::default().build(raw)
}

#[derive(Debug, Clone, Copy)]
enum TypeName {
    Enum(usize),
    Callback(usize),
}

#[derive(Default)]
struct Loader {
    enums: Vec<EnumType>,
    callbacks: Vec<RawCallback>,
    callback_paths: Vec<String>,
    type_names: HashMap<String, TypeName>,
}

impl Loader {
    fn build(mut self, raw: RawManifest) -> ManifestResult<Package> {
        let name = validate_package_name(&raw.name)?;
        let version = parse_version(raw.version.as_ref())?;

        for (i, e) in raw.enums.iter().enumerate() {
            let path = format!("enums[{i}]");
            let repr = e.ty.as_deref().unwrap_or("int32");
            let converted = convert_enum(e, repr, &path)?;
            if self.type_names.contains_key(&converted.name) {
                return Err(ManifestError::validation(
                    format!("{path}.name"),
                    format!("duplicate type name `{}`", converted.name),
                ));
            }
            self.push_enum(converted);
        }

        for (i, c) in raw.callbacks.iter().enumerate() {
            let path = format!("callbacks[{i}]");
            if self.type_names.contains_key(&c.name) {
                return Err(ManifestError::validation(
                    format!("{path}.name"),
                    format!("duplicate type name `{}`", c.name),
                ));
            }
            self.push_callback(c.clone(), path)?;
        }

        for (i, c) in raw.callbacks.iter().enumerate() {
            let path = format!("callbacks[{i}]");
            self.hoist_signature(&c.params, c.ret.as_ref(), &path)?;
        }
        for (i, f) in raw.functions.iter().enumerate() {
            let path = format!("functions[{i}]");
            self.hoist_signature(&f.params, f.ret.as_ref(), &path)?;
        }

        let callbacks = self.resolve_callbacks()?;
        check_callback_cycles(&callbacks)?;

        let mut functions = Vec::with_capacity(raw.functions.len());
        let mut function_index = HashMap::new();
        for (i, f) in raw.functions.iter().enumerate() {
            let path = format!("functions[{i}]");
            check_identifier(&f.name, &format!("{path}.name"), "function")?;
            if function_index.insert(f.name.clone(), i).is_some() {
                return Err(ManifestError::validation(
                    format!("{path}.name"),
                    format!("duplicate function `{}`", f.name),
                ));
            }
            functions.push(FunctionDescriptor {
                name: f.name.clone(),
                params: self.resolve_params(&f.params, &path)?,
                ret: self.resolve_return(f.ret.as_ref(), &path)?,
                doc: f.doc.clone(),
                deprecated: f.deprecated.clone(),
                group: f.group.clone(),
                order: i,
            });
        }

        // aliases may name classes declared further down
        let mut class_index = HashMap::new();
        for (i, c) in raw.classes.iter().enumerate() {
            if class_index.insert(c.name.as_str(), i).is_some() {
                return Err(ManifestError::validation(
                    format!("classes[{i}].name"),
                    format!("duplicate class `{}`", c.name),
                ));
            }
        }
        let scope = ClassScope {
            raw: &raw.classes,
            index: &class_index,
            functions: &functions,
            function_index: &function_index,
        };
        let mut classes = Vec::with_capacity(raw.classes.len());
        for (i, c) in raw.classes.iter().enumerate() {
            classes.push(self.resolve_class(c, &format!("classes[{i}]"), &scope)?);
        }

        let mut shared_types = BTreeSet::new();
        let signatures = functions
            .iter()
            .map(|f| (&f.params, &f.ret))
            .chain(callbacks.iter().map(|c| (&c.params, &c.ret)));
        for (params, ret) in signatures {
            for ty in params.iter().map(|p| &p.ty).chain(std::iter::once(&ret.ty)) {
                ty.walk(&mut |t| {
                    if let TypeRef::Shared(shared) = t {
                        shared_types.insert(*shared);
                    }
                });
            }
        }

        debug!(
            package = %name,
            enums = self.enums.len(),
            callbacks = callbacks.len(),
            functions = functions.len(),
            classes = classes.len(),
            "manifest loaded"
        );

        Ok(Package {
            name,
            version,
            description: raw.description,
            author: raw.author,
            website: raw.website,
            license: raw.license,
            enums: self.enums,
            callbacks,
            functions,
            classes,
            shared_types,
        })
    }

    fn push_enum(&mut self, e: EnumType) {
        self.type_names
            .insert(e.name.clone(), TypeName::Enum(self.enums.len()));
        self.enums.push(e);
    }

    fn push_callback(&mut self, c: RawCallback, path: String) -> ManifestResult<()> {
        check_identifier(&c.name, &format!("{path}.name"), "callback")?;
        self.type_names
            .insert(c.name.clone(), TypeName::Callback(self.callbacks.len()));
        self.callbacks.push(c);
        self.callback_paths.push(path);
        Ok(())
    }

    fn hoist_signature(
        &mut self,
        params: &[RawParam],
        ret: Option<&RawReturn>,
        path: &str,
    ) -> ManifestResult<()> {
        for (j, p) in params.iter().enumerate() {
            let param_path = format!("{path}.params[{j}]");
            self.hoist_inline(
                &p.ty,
                p.inline_enum.as_ref(),
                p.prototype.as_deref(),
                &param_path,
            )?;
        }
        if let Some(r) = ret {
            let ret_path = format!("{path}.return");
            self.hoist_inline(&r.ty, r.inline_enum.as_ref(), r.prototype.as_deref(), &ret_path)?;
        }
        Ok(())
    }

    fn hoist_inline(
        &mut self,
        ty: &str,
        inline_enum: Option<&RawEnum>,
        prototype: Option<&RawCallback>,
        path: &str,
    ) -> ManifestResult<()> {
        if let Some(e) = inline_enum {
            let enum_path = format!("{path}.enum");
            let (base, _) = split_array(ty);
            let repr = e.ty.as_deref().unwrap_or(base);
            let converted = convert_enum(e, repr, &enum_path)?;
            match self.type_names.get(&converted.name).copied() {
                Some(TypeName::Enum(idx)) if same_enum(&self.enums[idx], &converted) => {}
                Some(_) => {
                    return Err(ManifestError::validation(
                        enum_path,
                        format!("conflicting definitions of `{}`", converted.name),
                    ));
                }
                None => {
                    trace!(name = %converted.name, path = %enum_path, "hoisting inline enum");
                    self.push_enum(converted);
                }
            }
        }

        if let Some(proto) = prototype {
            let proto_path = format!("{path}.prototype");
            match self.type_names.get(&proto.name).copied() {
                Some(TypeName::Callback(idx)) => {
                    if signature_key(&self.callbacks[idx]) != signature_key(proto) {
                        return Err(ManifestError::validation(
                            proto_path,
                            format!("conflicting definitions of `{}`", proto.name),
                        ));
                    }
                }
                Some(TypeName::Enum(_)) => {
                    return Err(ManifestError::validation(
                        proto_path,
                        format!("conflicting definitions of `{}`", proto.name),
                    ));
                }
                None => {
                    trace!(name = %proto.name, path = %proto_path, "hoisting inline prototype");
                    self.push_callback(proto.clone(), proto_path.clone())?;
                    self.hoist_signature(&proto.params, proto.ret.as_ref(), &proto_path)?;
                }
            }
        }
        Ok(())
    }

    fn resolve_callbacks(&self) -> ManifestResult<Vec<CallbackType>> {
        self.callbacks
            .iter()
            .zip(&self.callback_paths)
            .map(|(c, path)| {
                Ok(CallbackType {
                    name: c.name.clone(),
                    params: self.resolve_params(&c.params, path)?,
                    ret: self.resolve_return(c.ret.as_ref(), path)?,
                    doc: c.doc.clone(),
                })
            })
            .collect()
    }

    fn resolve_params(
        &self,
        params: &[RawParam],
        path: &str,
    ) -> ManifestResult<Vec<ParamDescriptor>> {
        let mut seen = HashSet::new();
        let mut resolved: Vec<ParamDescriptor> = Vec::with_capacity(params.len());
        for (j, p) in params.iter().enumerate() {
            let param_path = format!("{path}.params[{j}]");
            check_identifier(&p.name, &format!("{param_path}.name"), "parameter")?;
            if !seen.insert(p.name.as_str()) {
                return Err(ManifestError::validation(
                    format!("{param_path}.name"),
                    format!("duplicate parameter `{}`", p.name),
                ));
            }
            let ty = self.resolve_type(
                &p.ty,
                p.inline_enum.as_ref(),
                p.prototype.as_deref(),
                p.ownership.as_deref(),
                &param_path,
            )?;
            if ty.is_void() {
                return Err(ManifestError::validation(
                    param_path,
                    format!("parameter `{}` cannot be void", p.name),
                ));
            }
            if let Some(value) = p.default {
                check_default(&ty, p.by_ref, value, &param_path, &self.enums)?;
            } else if let Some(previous) = resolved.iter().rfind(|r| r.default.is_some()) {
                return Err(ManifestError::validation(
                    param_path,
                    format!(
                        "parameter `{}` follows `{}`, which has a default, so it needs one too",
                        p.name, previous.name
                    ),
                ));
            }
            resolved.push(ParamDescriptor {
                name: p.name.clone(),
                ty,
                by_ref: p.by_ref,
                doc: p.doc.clone(),
                default: p.default,
            });
        }
        Ok(resolved)
    }

    fn resolve_return(
        &self,
        ret: Option<&RawReturn>,
        path: &str,
    ) -> ManifestResult<ReturnDescriptor> {
        let Some(r) = ret else {
            return Ok(ReturnDescriptor::void());
        };
        let ret_path = format!("{path}.return");
        Ok(ReturnDescriptor {
            ty: self.resolve_type(
                &r.ty,
                r.inline_enum.as_ref(),
                r.prototype.as_deref(),
                r.ownership.as_deref(),
                &ret_path,
            )?,
            doc: r.doc.clone(),
        })
    }

    fn resolve_type(
        &self,
        ty: &str,
        inline_enum: Option<&RawEnum>,
        prototype: Option<&RawCallback>,
        ownership: Option<&str>,
        path: &str,
    ) -> ManifestResult<TypeRef> {
        let (base, dims) = split_array(ty);

        let mut resolved = if let Some(e) = inline_enum {
            self.lookup(&e.name, path)?
        } else if let Some(proto) = prototype {
            self.lookup(&proto.name, path)?
        } else {
            self.resolve_base(base, path)?
        };

        if let Some(ownership) = ownership {
            let ownership = match ownership {
                "owned" => Ownership::Owned,
                "borrowed" => Ownership::Borrowed,
                other => {
                    return Err(ManifestError::validation(
                        format!("{path}.ownership"),
                        format!("unknown ownership `{other}`, expected `owned` or `borrowed`"),
                    ));
                }
            };
            match &mut resolved {
                TypeRef::Str(slot) => *slot = ownership,
                _ => {
                    return Err(ManifestError::validation(
                        format!("{path}.ownership"),
                        format!("ownership only applies to strings, not `{base}`"),
                    ));
                }
            }
        }

        if dims > 0 && resolved.is_void() {
            return Err(ManifestError::validation(path, "arrays of void are not allowed"));
        }
        for _ in 0..dims {
            resolved = TypeRef::array(resolved);
        }
        Ok(resolved)
    }

    fn resolve_base(&self, base: &str, path: &str) -> ManifestResult<TypeRef> {
        if let Some(prim) = primitive(base) {
            return Ok(prim);
        }
        if base == "function" {
            return Err(ManifestError::validation(
                path,
                "`function` type requires a `prototype`",
            ));
        }
        self.lookup(base, path)
    }

    fn lookup(&self, name: &str, path: &str) -> ManifestResult<TypeRef> {
        match self.type_names.get(name) {
            Some(TypeName::Enum(idx)) => Ok(TypeRef::Enum(EnumId(*idx))),
            Some(TypeName::Callback(idx)) => Ok(TypeRef::Callback(CallbackId(*idx))),
            None => Err(ManifestError::validation(
                path,
                format!("unknown type `{name}`"),
            )),
        }
    }

    fn class_handle(&self, c: &RawClass, path: &str) -> ManifestResult<TypeRef> {
        let handle_path = format!("{path}.handleType");
        let handle = self.resolve_base(c.handle_type.as_deref().unwrap_or("ptr64"), &handle_path)?;
        if !matches!(handle, TypeRef::Handle(_) | TypeRef::Int(IntRepr { width: 64, .. })) {
            return Err(ManifestError::validation(
                handle_path,
                "class handle must be a pointer-sized handle or a 64-bit integer",
            ));
        }
        Ok(handle)
    }

    /// Resolve a `{ "name": ..., "owner": ... }` alias against the declared classes.
    fn resolve_alias(
        &self,
        alias: &RawAlias,
        expected: &TypeRef,
        at: &str,
        scope: &ClassScope<'_>,
    ) -> ManifestResult<ClassAlias> {
        let class = scope.index.get(alias.name.as_str()).copied().ok_or_else(|| {
            ManifestError::validation(
                format!("{at}.name"),
                format!("unknown class `{}`", alias.name),
            )
        })?;
        let target = &scope.raw[class];
        let handle = self.class_handle(target, &format!("classes[{class}]"))?;
        if handle != *expected {
            return Err(ManifestError::validation(
                at,
                format!("class `{}` does not wrap this value's type", alias.name),
            ));
        }
        if alias.owner && target.destructor.is_none() {
            return Err(ManifestError::validation(
                format!("{at}.owner"),
                format!("class `{}` has no destructor and cannot take ownership", alias.name),
            ));
        }
        Ok(ClassAlias {
            class,
            owner: alias.owner,
        })
    }

    fn resolve_class(
        &self,
        c: &RawClass,
        path: &str,
        scope: &ClassScope<'_>,
    ) -> ManifestResult<ClassDecl> {
        let functions = scope.functions;
        check_identifier(&c.name, &format!("{path}.name"), "class")?;
        let handle = self.class_handle(c, path)?;
        let invalid_value = parse_invalid_value(c.invalid_value.as_ref(), &handle, path)?;

        let find = |name: &str, at: String| {
            scope
                .function_index
                .get(name)
                .copied()
                .ok_or_else(|| ManifestError::validation(at, format!("unknown function `{name}`")))
        };
        let takes_receiver = |idx: usize| {
            functions[idx]
                .params
                .first()
                .is_some_and(|p| p.ty == handle && !p.by_ref)
        };

        let mut constructors = Vec::with_capacity(c.constructors.len());
        for (k, ctor) in c.constructors.iter().enumerate() {
            let at = format!("{path}.constructors[{k}]");
            let idx = find(ctor, at.clone())?;
            if functions[idx].ret.ty != handle {
                return Err(ManifestError::validation(
                    at,
                    format!("constructor `{ctor}` must return the class handle"),
                ));
            }
            constructors.push(idx);
        }

        let destructor = match &c.destructor {
            Some(dtor) => {
                let at = format!("{path}.destructor");
                let idx = find(dtor, at.clone())?;
                if !takes_receiver(idx) || functions[idx].params.len() != 1 {
                    return Err(ManifestError::validation(
                        at,
                        format!("destructor `{dtor}` must take only the class handle"),
                    ));
                }
                Some(idx)
            }
            None => None,
        };

        let mut bindings = Vec::with_capacity(c.bindings.len());
        for (k, b) in c.bindings.iter().enumerate() {
            let at = format!("{path}.bindings[{k}]");
            let idx = find(&b.method, format!("{at}.method"))?;
            let name = if b.name.is_empty() {
                b.method.clone()
            } else {
                b.name.clone()
            };
            check_identifier(&name, &format!("{at}.name"), "binding")?;
            if b.bind_self && !takes_receiver(idx) {
                return Err(ManifestError::validation(
                    at,
                    format!("`{}` does not take the class handle as its first parameter", b.method),
                ));
            }
            let method_params = &functions[idx].params[usize::from(b.bind_self)..];
            if b.param_aliases.len() > method_params.len() {
                return Err(ManifestError::validation(
                    format!("{at}.paramAliases"),
                    format!(
                        "{} aliases for {} parameters",
                        b.param_aliases.len(),
                        method_params.len()
                    ),
                ));
            }
            let mut param_aliases = vec![None; method_params.len()];
            for (j, alias) in b.param_aliases.iter().enumerate() {
                let Some(alias) = alias else { continue };
                let alias_path = format!("{at}.paramAliases[{j}]");
                if method_params[j].by_ref {
                    return Err(ManifestError::validation(
                        alias_path,
                        "by-reference parameters cannot be aliased",
                    ));
                }
                param_aliases[j] =
                    Some(self.resolve_alias(alias, &method_params[j].ty, &alias_path, scope)?);
            }
            let ret_alias = match &b.ret_alias {
                Some(alias) => {
                    let alias_path = format!("{at}.retAlias");
                    let ret = &functions[idx].ret.ty;
                    let resolved = self.resolve_alias(alias, ret, &alias_path, scope)?;
                    // a wrapper always destroys the handle it holds when the class has a destructor
                    let destroys = scope.raw[resolved.class].destructor.is_some();
                    if resolved.owner != destroys {
                        return Err(ManifestError::validation(
                            format!("{alias_path}.owner"),
                            format!("`owner` must be {destroys} for class `{}`", alias.name),
                        ));
                    }
                    Some(resolved)
                }
                None => None,
            };
            bindings.push(BindingDecl {
                name,
                function: idx,
                bind_self: b.bind_self,
                param_aliases,
                ret_alias,
            });
        }

        Ok(ClassDecl {
            name: c.name.clone(),
            doc: c.doc.clone(),
            handle,
            invalid_value,
            constructors,
            destructor,
            bindings,
        })
    }
}

fn validate_package_name(name: &str) -> ManifestResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ManifestError::validation("name", "package name is empty"));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid || !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return Err(ManifestError::validation(
            "name",
            format!("invalid package name `{name}`"),
        ));
    }
    Ok(name.to_string())
}

fn parse_version(version: Option<&Value>) -> ManifestResult<String> {
    match version {
        None | Some(Value::Null) => Ok("0.0.0".to_string()),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Ok("0.0.0".to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(ManifestError::validation(
            "version",
            format!("version must be a string, found `{other}`"),
        )),
    }
}

/// What a class declaration may refer to.
struct ClassScope<'a> {
    raw: &'a [RawClass],
    index: &'a HashMap<&'a str, usize>,
    functions: &'a [FunctionDescriptor],
    function_index: &'a HashMap<String, usize>,
}

/// `invalidValue` as a number or a string. `nullptr`, `NULL` and `null` mean zero.
fn parse_invalid_value(
    value: Option<&Value>,
    handle: &TypeRef,
    path: &str,
) -> ManifestResult<i64> {
    let at = format!("{path}.invalidValue");
    let parsed = match value {
        None | Some(Value::Null) => Some(0),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => match s.trim() {
            "" | "nullptr" | "NULL" | "null" => Some(0),
            text => match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                Some(hex) => i64::from_str_radix(hex, 16).ok(),
                None => text.parse().ok(),
            },
        },
        Some(_) => None,
    };
    let Some(parsed) = parsed else {
        return Err(ManifestError::validation(at, "invalid value must be an integer"));
    };
    let signed = matches!(handle, TypeRef::Int(IntRepr { signed: true, .. }));
    if parsed < 0 && !signed {
        return Err(ManifestError::validation(
            at,
            format!("{parsed} does not fit the unsigned class handle"),
        ));
    }
    Ok(parsed)
}

fn check_default(
    ty: &TypeRef,
    by_ref: bool,
    value: i64,
    path: &str,
    enums: &[EnumType],
) -> ManifestResult<()> {
    let at = format!("{path}.default");
    if by_ref {
        return Err(ManifestError::validation(
            at,
            "by-reference parameters cannot have a default",
        ));
    }
    let fits = match ty {
        TypeRef::Int(repr) => repr.contains(value),
        TypeRef::Enum(id) => enums[id.0].repr.contains(value),
        TypeRef::Bool => matches!(value, 0 | 1),
        _ => {
            return Err(ManifestError::validation(
                at,
                "only integer, enum and bool parameters can have a default",
            ));
        }
    };
    if !fits {
        return Err(ManifestError::validation(at, format!("default {value} is out of range")));
    }
    Ok(())
}

fn check_identifier(name: &str, path: &str, what: &str) -> ManifestResult<()> {
    if name.is_empty() {
        return Err(ManifestError::validation(path, format!("{what} name is empty")));
    }
    if !is_identifier(name) {
        return Err(ManifestError::validation(
            path,
            format!("{what} name `{name}` is not a valid identifier"),
        ));
    }
    Ok(())
}

/// Strip trailing `[]` pairs, returning the base name and the array depth.
fn split_array(ty: &str) -> (&str, usize) {
    let mut base = ty.trim();
    let mut dims = 0;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped.trim_end();
        dims += 1;
    }
    (base, dims)
}

fn primitive(name: &str) -> Option<TypeRef> {
    let ty = match name {
        "void" => TypeRef::Void,
        "bool" => TypeRef::Bool,
        "float" => TypeRef::Float(FloatWidth::F32),
        "double" => TypeRef::Float(FloatWidth::F64),
        "string" => TypeRef::Str(Ownership::Owned),
        "ptr32" => TypeRef::Handle(HandleWidth::W32),
        "ptr64" | "handle" => TypeRef::Handle(HandleWidth::W64),
        "vec2" => TypeRef::Shared(SharedType::Vec2),
        "vec3" => TypeRef::Shared(SharedType::Vec3),
        "vec4" => TypeRef::Shared(SharedType::Vec4),
        "mat4x4" => TypeRef::Shared(SharedType::Mat4x4),
        other => return int_repr(other).map(TypeRef::Int),
    };
    Some(ty)
}

fn int_repr(name: &str) -> Option<IntRepr> {
    let repr = match name {
        "int8" | "char8" => IntRepr::new(8, true),
        "int16" => IntRepr::new(16, true),
        "int32" => IntRepr::new(32, true),
        "int64" => IntRepr::new(64, true),
        "uint8" => IntRepr::new(8, false),
        "uint16" | "char16" => IntRepr::new(16, false),
        "uint32" => IntRepr::new(32, false),
        "uint64" => IntRepr::new(64, false),
        _ => return None,
    };
    Some(repr)
}

fn convert_enum(raw: &RawEnum, repr_name: &str, path: &str) -> ManifestResult<EnumType> {
    check_identifier(&raw.name, &format!("{path}.name"), "enum")?;
    let repr = int_repr(repr_name).ok_or_else(|| {
        ManifestError::validation(
            format!("{path}.type"),
            format!("enum `{}` must have an integer type, found `{repr_name}`", raw.name),
        )
    })?;
    if raw.members.is_empty() {
        return Err(ManifestError::validation(
            format!("{path}.members"),
            format!("enum `{}` has no members", raw.name),
        ));
    }

    let mut names = HashSet::new();
    let mut members = Vec::with_capacity(raw.members.len());
    let mut next: i128 = 0;
    for (k, m) in raw.members.iter().enumerate() {
        let member_path = format!("{path}.members[{k}]");
        check_identifier(&m.name, &format!("{member_path}.name"), "enum member")?;
        if !names.insert(m.name.as_str()) {
            return Err(ManifestError::validation(
                format!("{member_path}.name"),
                format!("duplicate member `{}` in enum `{}`", m.name, raw.name),
            ));
        }
        let value = match &m.value {
            Some(n) => n.as_i64().ok_or_else(|| {
                ManifestError::validation(
                    format!("{member_path}.value"),
                    format!("value `{n}` is not a 64-bit signed integer"),
                )
            })?,
            None => i64::try_from(next).map_err(|_| {
                ManifestError::validation(
                    format!("{member_path}.value"),
                    "implicit value overflows a 64-bit integer",
                )
            })?,
        };
        if !repr.contains(value) {
            return Err(ManifestError::validation(
                format!("{member_path}.value"),
                format!("value {value} does not fit in {repr}"),
            ));
        }
        next = i128::from(value) + 1;
        members.push(EnumMember {
            name: m.name.clone(),
            value,
            doc: m.doc.clone(),
        });
    }

    Ok(EnumType {
        name: raw.name.clone(),
        repr,
        members,
        doc: raw.doc.clone(),
    })
}

fn same_enum(a: &EnumType, b: &EnumType) -> bool {
    a.repr == b.repr
        && a.members.len() == b.members.len()
        && a
            .members
            .iter()
            .zip(&b.members)
            .all(|(x, y)| x.name == y.name && x.value == y.value)
}

/// Structural identity of a prototype, ignoring names and docs.
fn signature_key(c: &RawCallback) -> String {
    let describe = |ty: &str, e: Option<&RawEnum>, p: Option<&RawCallback>, o: Option<&str>| {
        let target = e
            .map(|e| e.name.as_str())
            .or(p.map(|p| p.name.as_str()))
            .unwrap_or("");
        format!("{}:{}:{}", ty.trim(), target, o.unwrap_or("owned"))
    };
    let params: Vec<String> = c
        .params
        .iter()
        .map(|p| {
            let mut key = describe(
                &p.ty,
                p.inline_enum.as_ref(),
                p.prototype.as_deref(),
                p.ownership.as_deref(),
            );
            if p.by_ref {
                key.push('&');
            }
            key
        })
        .collect();
    let ret = c
        .ret
        .as_ref()
        .map(|r| {
            describe(
                &r.ty,
                r.inline_enum.as_ref(),
                r.prototype.as_deref(),
                r.ownership.as_deref(),
            )
        })
        .unwrap_or_else(|| "void".to_string());
    format!("({}) -> {}", params.join(", "), ret)
}

fn check_callback_cycles(callbacks: &[CallbackType]) -> ManifestResult<()> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    fn edges(c: &CallbackType) -> Vec<usize> {
        let mut out = Vec::new();
        for ty in c.params.iter().map(|p| &p.ty).chain(std::iter::once(&c.ret.ty)) {
            ty.walk(&mut |t| {
                if let TypeRef::Callback(id) = t {
                    out.push(id.0);
                }
            });
        }
        out
    }

    fn visit(idx: usize, callbacks: &[CallbackType], marks: &mut [Mark]) -> Option<usize> {
        match marks[idx] {
            Mark::Done => return None,
            Mark::Active => return Some(idx),
            Mark::New => {}
        }
        marks[idx] = Mark::Active;
        for next in edges(&callbacks[idx]) {
            if let Some(cycle) = visit(next, callbacks, marks) {
                return Some(cycle);
            }
        }
        marks[idx] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::New; callbacks.len()];
    for idx in 0..callbacks.len() {
        if let Some(cycle) = visit(idx, callbacks, &mut marks) {
            return Err(ManifestError::validation(
                format!("callbacks[{cycle}]"),
                format!(
                    "callback `{}` refers to itself through its own signature",
                    callbacks[cycle].name
                ),
            ));
        }
    }
    Ok(())
}
