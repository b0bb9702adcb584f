//! Class synthesis.
//!
//! Flat plugin APIs usually pass an entity handle as the first argument of a family of
//! functions (`GetEntityHealth(entity)`, `SetEntityHealth(entity, hp)`). This stage groups such
//! families into classes whose methods take the handle implicitly.
//!
//! The policy is fixed and depends only on names, parameter types and declaration order:
//!
//! 1. Receiver-eligible first parameters are handles and 64-bit integers passed by value.
//!    Functions are bucketed by that type.
//! 2. A name is split into words and a leading verb from [`VERBS`] is separated from the
//!    subject (`Get` + `Entity Health`).
//! 3. Candidate class names are the word prefixes of the subject that leave at least one word
//!    for the method name. Destructor verbs may also use the whole subject (`DestroyEntity`).
//! 4. A candidate is supported when at least two functions of the same bucket produce it.
//! 5. Each function joins its longest supported candidate. Equal lengths go to the candidate
//!    whose earliest supporter was declared first.
//! 6. Functions matching several supported candidates produce a warning.
//!
//! Classes declared in the manifest come first and their functions are not regrouped.

use crate::naming::{capitalize, split_words};
use plugify_gen_manifest::{
    ClassAlias, ClassDecl, FunctionDescriptor, IntRepr, Package, TypeRef,
};
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Leading words treated as verbs.
pub const VERBS: &[&str] = &[
    "Get", "Set", "Is", "Has", "Can", "Add", "Remove", "Create", "Destroy", "Delete", "Find",
    "Clear", "Reset", "Update", "Enable", "Disable", "Start", "Stop", "Open", "Close",
    "Release", "Free", "Load", "Unload", "Register", "Unregister", "Insert", "Erase", "Push",
    "Pop", "Count", "Spawn", "Kill", "Apply", "Attach", "Detach", "Send", "Toggle", "Print",
];

/// Verbs that mark a single-argument function as the receiver's destructor.
pub const DESTRUCTOR_VERBS: &[&str] = &["Destroy", "Delete", "Release", "Free", "Close"];

/// Whether a class releases its handle when the wrapper goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// The class has a destructor and owns the handle.
    Owned,
    /// The handle is only borrowed.
    Borrowed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMethod {
    pub name: String,
    /// Index into [`Package::functions`].
    pub function: usize,
    /// The function's first parameter is the receiver.
    pub bind_self: bool,
    /// Per method parameter, receiver excluded. Shorter than the parameter list when the
    /// trailing parameters are plain.
    pub param_aliases: Vec<Option<ClassAlias>>,
    pub ret_alias: Option<ClassAlias>,
}

impl ClassMethod {
    /// Alias of the `j`-th method parameter (receiver excluded).
    pub fn param_alias(&self, j: usize) -> Option<ClassAlias> {
        self.param_aliases.get(j).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassModel {
    pub name: String,
    pub doc: Option<String>,
    pub handle: TypeRef,
    /// Handle value that means "no object".
    pub invalid_value: i64,
    pub receiver: Receiver,
    pub constructors: Vec<usize>,
    pub destructor: Option<usize>,
    pub methods: Vec<ClassMethod>,
    pub synthesized: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    pub classes: Vec<ClassModel>,
    pub warnings: Vec<String>,
}

struct Parsed {
    function: usize,
    order: usize,
    verb: Option<String>,
    subject: Vec<String>,
}

impl Parsed {
    fn new(function: usize, f: &FunctionDescriptor) -> Self {
        let words: Vec<String> = split_words(&f.name).iter().map(|w| capitalize(w)).collect();
        let (verb, subject) = match words.split_first() {
            Some((first, rest)) if !rest.is_empty() && VERBS.contains(&first.as_str()) => {
                (Some(first.clone()), rest.to_vec())
            }
            _ => (None, words),
        };
        Self {
            function,
            order: f.order,
            verb,
            subject,
        }
    }

    fn is_destructor_verb(&self) -> bool {
        self.verb
            .as_deref()
            .is_some_and(|v| DESTRUCTOR_VERBS.contains(&v))
    }

    /// Candidate class names, shortest first.
    fn candidates(&self) -> Vec<String> {
        let n = self.subject.len();
        let max = if self.is_destructor_verb() { n } else { n.saturating_sub(1) };
        (1..=max).map(|len| self.subject[..len].concat()).collect()
    }

    fn method_name(&self, class_name: &str) -> String {
        let mut consumed = 0;
        let mut joined = String::new();
        for word in &self.subject {
            if joined == class_name {
                break;
            }
            joined.push_str(word);
            consumed += 1;
        }
        let mut name = self.verb.clone().unwrap_or_default();
        for word in &self.subject[consumed..] {
            name.push_str(word);
        }
        name
    }
}

fn receiver_type(f: &FunctionDescriptor) -> Option<&TypeRef> {
    let first = f.params.first()?;
    let eligible = matches!(
        first.ty,
        TypeRef::Handle(_) | TypeRef::Int(IntRepr { width: 64, .. })
    );
    (eligible && !first.by_ref).then_some(&first.ty)
}

/// Build class models: declared classes first, then synthesized ones.
pub fn synthesize(pkg: &Package) -> Synthesis {
    let mut synthesis = Synthesis::default();
    let mut bound = vec![false; pkg.functions.len()];

    for decl in &pkg.classes {
        for idx in decl
            .constructors
            .iter()
            .chain(decl.destructor.iter())
            .chain(decl.bindings.iter().map(|b| &b.function))
        {
            bound[*idx] = true;
        }
        synthesis.classes.push(declared_class(decl));
    }

    let mut buckets: Vec<(&TypeRef, Vec<Parsed>)> = Vec::new();
    for (idx, f) in pkg.functions.iter().enumerate() {
        if bound[idx] {
            continue;
        }
        let Some(ty) = receiver_type(f) else {
            continue;
        };
        let parsed = Parsed::new(idx, f);
        match buckets.iter_mut().find(|(t, _)| *t == ty) {
            Some((_, members)) => members.push(parsed),
            None => buckets.push((ty, vec![parsed])),
        }
    }

    for (_, members) in &mut buckets {
        members.sort_by_key(|p| p.order);
    }
    buckets.sort_by_key(|(_, members)| members.first().map_or(usize::MAX, |p| p.order));

    let mut groups: Vec<(String, &TypeRef, Vec<&Parsed>)> = Vec::new();
    for (ty, members) in &buckets {
        // candidate -> (supporters, earliest supporter order)
        let mut support: HashMap<String, (usize, usize)> = HashMap::new();
        for p in members {
            for candidate in p.candidates() {
                let entry = support.entry(candidate).or_insert((0, p.order));
                entry.0 += 1;
                entry.1 = entry.1.min(p.order);
            }
        }

        for p in members {
            let mut supported: Vec<(String, usize)> = p
                .candidates()
                .into_iter()
                .filter_map(|c| {
                    let (count, first) = support[&c];
                    (count >= 2).then_some((c, first))
                })
                .collect();
            if supported.is_empty() {
                continue;
            }
            // candidates of one function are nested prefixes, so length orders them
            supported.sort_by_key(|(c, first)| (Reverse(c.len()), *first));
            let chosen = supported[0].0.clone();

            if supported.len() > 1 {
                let mut names: Vec<&str> = supported.iter().map(|(c, _)| c.as_str()).collect();
                names.sort_by_key(|c| c.len());
                let message = format!(
                    "`{}` matches classes {}; assigned to `{}`",
                    pkg.functions[p.function].name,
                    names
                        .iter()
                        .map(|n| format!("`{n}`"))
                        .collect::<Vec<_>>()
                        .join(", "),
                    chosen
                );
                warn!(function = %pkg.functions[p.function].name, "{message}");
                synthesis.warnings.push(message);
            }

            match groups
                .iter_mut()
                .find(|(name, t, _)| *name == chosen && *t == *ty)
            {
                Some((_, _, group)) => group.push(p),
                None => groups.push((chosen, *ty, vec![p])),
            }
        }
    }

    for (_, _, group) in &mut groups {
        group.sort_by_key(|p| p.order);
    }
    groups.sort_by_key(|(_, _, group)| group.first().map_or(usize::MAX, |p| p.order));

    for (name, ty, group) in groups {
        let destructor = group
            .iter()
            .find(|p| p.is_destructor_verb() && pkg.functions[p.function].params.len() == 1)
            .map(|p| p.function);

        let mut methods: Vec<ClassMethod> = Vec::new();
        for p in &group {
            if Some(p.function) == destructor {
                continue;
            }
            let mut method = p.method_name(&name);
            let unusable = method.is_empty() || method.starts_with(|c: char| c.is_ascii_digit());
            if unusable || methods.iter().any(|m| m.name == method) {
                method = pkg.functions[p.function].name.clone();
            }
            methods.push(ClassMethod {
                name: method,
                function: p.function,
                bind_self: true,
                param_aliases: Vec::new(),
                ret_alias: None,
            });
        }

        debug!(class = %name, methods = methods.len(), owned = destructor.is_some(), "synthesized class");
        synthesis.classes.push(ClassModel {
            name,
            doc: None,
            handle: ty.clone(),
            invalid_value: 0,
            receiver: if destructor.is_some() {
                Receiver::Owned
            } else {
                Receiver::Borrowed
            },
            constructors: Vec::new(),
            destructor,
            methods,
            synthesized: true,
        });
    }

    synthesis
}

fn declared_class(decl: &ClassDecl) -> ClassModel {
    ClassModel {
        name: decl.name.clone(),
        doc: decl.doc.clone(),
        handle: decl.handle.clone(),
        invalid_value: decl.invalid_value,
        receiver: if decl.destructor.is_some() {
            Receiver::Owned
        } else {
            Receiver::Borrowed
        },
        constructors: decl.constructors.clone(),
        destructor: decl.destructor,
        methods: decl
            .bindings
            .iter()
            .map(|b| ClassMethod {
                name: b.name.clone(),
                function: b.function,
                bind_self: b.bind_self,
                param_aliases: b.param_aliases.clone(),
                ret_alias: b.ret_alias,
            })
            .collect(),
        synthesized: false,
    }
}

#[cfg(test)]
#[path = "classes/classes_tests.rs"]
mod classes_tests;
