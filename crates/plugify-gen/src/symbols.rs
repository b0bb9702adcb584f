//! Identifier resolution per target.
//!
//! Every manifest identifier is converted to the target's casing convention and then
//! claimed in a [`Scope`]. A name that is reserved or already taken gets `_` appended, then
//! `_2`, `_3`, ... so independent collisions always receive distinct, reproducible names.

use crate::classes::ClassModel;
use crate::error::{GenError, GenResult};
use crate::naming::{
    sanitize_identifier, to_camel_case, to_pascal_case, to_screaming_snake_case, to_snake_case,
};
use crate::reserved::is_reserved;
use crate::target::Target;
use crate::types;
use plugify_gen_manifest::{CallbackId, EnumId, Package, ParamDescriptor, TypeRef};
use std::collections::HashSet;
use tracing::trace;

/// Upper bound on numbered suffixes tried before giving up.
pub const MAX_RENAMES: usize = 64;

/// A namespace in which every claimed identifier is unique.
#[derive(Debug)]
pub struct Scope {
    target: Target,
    label: String,
    taken: HashSet<String>,
}

impl Scope {
    pub fn new(target: Target, label: impl Into<String>) -> Self {
        Self {
            target,
            label: label.into(),
            taken: HashSet::new(),
        }
    }

    /// Mark `name` as used without renaming it.
    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    fn is_free(&self, name: &str) -> bool {
        !self.taken.contains(name) && !is_reserved(self.target, name)
    }

    /// Claim `wanted`, renaming it when it is reserved or taken.
    pub fn claim(&mut self, wanted: &str) -> GenResult<String> {
        let base = if wanted.is_empty() { "_" } else { wanted };
        let mut candidate = base.to_string();
        if !self.is_free(&candidate) {
            candidate = format!("{base}_");
            let mut n = 2;
            while !self.is_free(&candidate) {
                if n > MAX_RENAMES {
                    return Err(GenError::NameCollision {
                        target: self.target.to_string(),
                        scope: self.label.clone(),
                        name: wanted.to_string(),
                    });
                }
                candidate = format!("{base}_{n}");
                n += 1;
            }
            trace!(target = %self.target, scope = %self.label, from = wanted, to = %candidate, "renamed identifier");
        }
        self.taken.insert(candidate.clone());
        Ok(candidate)
    }
}

/// Casing applied to one kind of identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    Preserve,
    Snake,
    Camel,
    Pascal,
    Screaming,
}

impl Case {
    pub fn apply(self, s: &str) -> String {
        let converted = match self {
            Case::Preserve => s.to_string(),
            Case::Snake => to_snake_case(s),
            Case::Camel => to_camel_case(s),
            Case::Pascal => to_pascal_case(s),
            Case::Screaming => to_screaming_snake_case(s),
        };
        if converted.is_empty() {
            s.to_string()
        } else {
            converted
        }
    }
}

/// Naming conventions of one target.
#[derive(Debug, Clone, Copy)]
pub struct Conventions {
    pub types: Case,
    pub functions: Case,
    pub params: Case,
    pub members: Case,
    pub methods: Case,
    /// Enum members live in the global namespace, prefixed with the enum name and this
    /// separator.
    pub member_prefix: Option<&'static str>,
    /// Names every generated class already defines.
    pub class_members: &'static [&'static str],
}

pub fn conventions(target: Target) -> Conventions {
    match target {
        Target::C => Conventions {
            types: Case::Preserve,
            functions: Case::Preserve,
            params: Case::Preserve,
            members: Case::Preserve,
            methods: Case::Preserve,
            member_prefix: Some("_"),
            class_members: &[],
        },
        Target::Cpp => Conventions {
            types: Case::Preserve,
            functions: Case::Preserve,
            params: Case::Preserve,
            members: Case::Preserve,
            methods: Case::Pascal,
            member_prefix: None,
            class_members: &["handle", "Release"],
        },
        Target::DLang => Conventions {
            types: Case::Pascal,
            functions: Case::Camel,
            params: Case::Camel,
            members: Case::Camel,
            methods: Case::Camel,
            member_prefix: None,
            class_members: &["handle", "fromHandle", "release", "opCast"],
        },
        Target::DotNet => Conventions {
            types: Case::Pascal,
            functions: Case::Pascal,
            params: Case::Camel,
            members: Case::Pascal,
            methods: Case::Pascal,
            member_prefix: None,
            class_members: &["Handle", "Dispose", "FromHandle", "Release", "IsValid"],
        },
        Target::Golang => Conventions {
            types: Case::Pascal,
            functions: Case::Pascal,
            params: Case::Camel,
            members: Case::Pascal,
            methods: Case::Pascal,
            member_prefix: Some(""),
            class_members: &["Handle", "Close", "Release", "IsValid"],
        },
        Target::Lua => Conventions {
            types: Case::Preserve,
            functions: Case::Preserve,
            params: Case::Snake,
            members: Case::Preserve,
            methods: Case::Preserve,
            member_prefix: None,
            class_members: &["new", "handle", "close", "release", "is_valid"],
        },
        Target::Python => Conventions {
            types: Case::Pascal,
            functions: Case::Snake,
            params: Case::Snake,
            members: Case::Screaming,
            methods: Case::Snake,
            member_prefix: None,
            class_members: &["handle", "close", "from_handle", "release"],
        },
        Target::Rust => Conventions {
            types: Case::Pascal,
            functions: Case::Snake,
            params: Case::Snake,
            members: Case::Screaming,
            methods: Case::Snake,
            member_prefix: None,
            class_members: &["handle", "from_handle", "into_handle", "is_valid"],
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumNames {
    pub name: String,
    pub members: Vec<String>,
}

/// Names inside one function or callback signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureNames {
    pub name: String,
    pub params: Vec<String>,
    /// Length companion of each array parameter.
    pub lens: Vec<Option<String>>,
    /// Out-parameter receiving the element count of an array return.
    pub out_len: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames {
    pub name: String,
    pub constructors: Vec<String>,
    pub methods: Vec<String>,
}

/// Every identifier of a package, resolved for one target.
#[derive(Debug, Clone)]
pub struct Symbols {
    pub target: Target,
    /// Package name usable as a file, module or prefix identifier.
    pub module: String,
    pub enums: Vec<EnumNames>,
    pub callbacks: Vec<SignatureNames>,
    pub functions: Vec<SignatureNames>,
    pub classes: Vec<ClassNames>,
}

impl Symbols {
    pub fn resolve(pkg: &Package, classes: &[ClassModel], target: Target) -> GenResult<Self> {
        let conv = conventions(target);
        let mut global = Scope::new(target, "global scope");
        for shared in plugify_gen_manifest::SharedType::ALL {
            global.reserve(types::table(target).shared_name(shared));
        }

        let mut enums = Vec::with_capacity(pkg.enums.len());
        for e in &pkg.enums {
            let name = global.claim(&conv.types.apply(&e.name))?;
            let mut members_scope = Scope::new(target, format!("enum {}", e.name));
            let mut members = Vec::with_capacity(e.members.len());
            for m in &e.members {
                let member = match conv.member_prefix {
                    Some(sep) => {
                        global.claim(&format!("{name}{sep}{}", conv.members.apply(&m.name)))?
                    }
                    None => members_scope.claim(&conv.members.apply(&m.name))?,
                };
                members.push(member);
            }
            enums.push(EnumNames { name, members });
        }

        let mut callbacks = Vec::with_capacity(pkg.callbacks.len());
        for c in &pkg.callbacks {
            let name = global.claim(&conv.types.apply(&c.name))?;
            let label = format!("callback {}", c.name);
            callbacks.push(signature_names(target, conv, name, &c.params, &c.ret.ty, label)?);
        }

        let mut functions = Vec::with_capacity(pkg.functions.len());
        for f in &pkg.functions {
            let name = global.claim(&conv.functions.apply(&f.name))?;
            let label = format!("function {}", f.name);
            functions.push(signature_names(target, conv, name, &f.params, &f.ret.ty, label)?);
        }

        let mut class_names = Vec::with_capacity(classes.len());
        for class in classes {
            let name = global.claim(&conv.types.apply(&class.name))?;
            let mut scope = Scope::new(target, format!("class {}", class.name));
            for fixed in conv.class_members {
                scope.reserve(fixed);
            }
            let constructors = class
                .constructors
                .iter()
                .map(|idx| scope.claim(&conv.methods.apply(&pkg.functions[*idx].name)))
                .collect::<GenResult<Vec<_>>>()?;
            let methods = class
                .methods
                .iter()
                .map(|m| scope.claim(&conv.methods.apply(&m.name)))
                .collect::<GenResult<Vec<_>>>()?;
            class_names.push(ClassNames {
                name,
                constructors,
                methods,
            });
        }

        Ok(Self {
            target,
            module: sanitize_identifier(&pkg.name),
            enums,
            callbacks,
            functions,
            classes: class_names,
        })
    }

    pub fn enum_name(&self, id: EnumId) -> &str {
        &self.enums[id.0].name
    }

    pub fn callback_name(&self, id: CallbackId) -> &str {
        &self.callbacks[id.0].name
    }
}

fn signature_names(
    target: Target,
    conv: Conventions,
    name: String,
    params: &[ParamDescriptor],
    ret: &TypeRef,
    label: String,
) -> GenResult<SignatureNames> {
    let mut scope = Scope::new(target, label);
    let names = params
        .iter()
        .map(|p| scope.claim(&conv.params.apply(&p.name)))
        .collect::<GenResult<Vec<_>>>()?;
    let lens = params
        .iter()
        .zip(&names)
        .map(|(p, n)| match p.ty {
            TypeRef::Array(_) => scope.claim(&conv.params.apply(&format!("{n}_len"))).map(Some),
            _ => Ok(None),
        })
        .collect::<GenResult<Vec<_>>>()?;
    let out_len = match ret {
        TypeRef::Array(_) => Some(scope.claim(&conv.params.apply("out_len"))?),
        _ => None,
    };
    Ok(SignatureNames {
        name,
        params: names,
        lens,
        out_len,
    })
}

#[cfg(test)]
#[path = "symbols/symbols_tests.rs"]
mod symbols_tests;
