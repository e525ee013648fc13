//! Type system: interned types, the variable store, and the registries
//! of datatypes, constructors, and exception constructors.
//!
//! A `TypeSystem` is session-scoped and passed explicitly to every
//! phase that needs it; there is no process-global state.

pub mod error;
pub mod infer;
pub mod subst;
pub mod ty;
pub mod unify;

use std::collections::{HashMap, HashSet};

use lachs::Span;

use crate::ast;

use error::TypeError;
use subst::Substitution;
use ty::{PrimitiveType, SchemeVar, Type, TypeKind, TypeScheme, TypeVar};
use unify::VarStore;

/// Base id for datatype template variables. Template variables never
/// enter the unification store; a store access with one of these ids is
/// a bug and fails loudly.
const TEMPLATE_VAR_BASE: usize = 1 << 32;

/// A declared data type: its arity, template parameters, and
/// constructors with payloads expressed over the template parameters.
#[derive(Debug, Clone)]
pub struct DataTypeDef {
    pub name: String,
    pub params: Vec<TypeVar>,
    /// Constructor names in declaration order.
    pub ctors: Vec<String>,
}

/// A value constructor of a datatype, or an exception constructor
/// (whose `datatype` is `"exn"`).
#[derive(Debug, Clone)]
pub struct CtorDef {
    pub name: String,
    pub datatype: String,
    pub params: Vec<TypeVar>,
    /// Payload type over the template parameters, if unary.
    pub arg: Option<Type>,
    /// Tag within the datatype; for exceptions, a session-unique
    /// identity that survives shadowing.
    pub ordinal: usize,
}

#[derive(Debug, Clone)]
struct AliasDef {
    params: Vec<String>,
    body: ast::Ty,
}

pub struct TypeSystem {
    /// Interned ground composite types, keyed by moniker.
    interned: HashMap<String, Type>,
    pub vars: VarStore,
    datatypes: HashMap<String, DataTypeDef>,
    ctors: HashMap<String, CtorDef>,
    aliases: HashMap<String, AliasDef>,
    next_exn_ordinal: usize,
}

impl TypeSystem {
    pub fn new() -> Self {
        let mut ts = TypeSystem {
            interned: HashMap::new(),
            vars: VarStore::new(),
            datatypes: HashMap::new(),
            ctors: HashMap::new(),
            aliases: HashMap::new(),
            next_exn_ordinal: 0,
        };
        ts.register_builtin_datatypes();
        ts
    }

    fn register_builtin_datatypes(&mut self) {
        // datatype 'a option = NONE | SOME of 'a
        let a = TypeVar::new(TEMPLATE_VAR_BASE);
        self.datatypes.insert(
            "option".to_string(),
            DataTypeDef {
                name: "option".to_string(),
                params: vec![a],
                ctors: vec!["NONE".to_string(), "SOME".to_string()],
            },
        );
        self.ctors.insert(
            "NONE".to_string(),
            CtorDef {
                name: "NONE".to_string(),
                datatype: "option".to_string(),
                params: vec![a],
                arg: None,
                ordinal: 0,
            },
        );
        self.ctors.insert(
            "SOME".to_string(),
            CtorDef {
                name: "SOME".to_string(),
                datatype: "option".to_string(),
                params: vec![a],
                arg: Some(Type::new(TypeKind::Var(a))),
                ordinal: 1,
            },
        );
    }

    // --- construction ---

    pub fn primitive(&mut self, p: PrimitiveType) -> Type {
        self.intern(TypeKind::Prim(p))
    }

    pub fn int(&mut self) -> Type {
        self.primitive(PrimitiveType::Int)
    }

    pub fn real(&mut self) -> Type {
        self.primitive(PrimitiveType::Real)
    }

    pub fn string(&mut self) -> Type {
        self.primitive(PrimitiveType::String)
    }

    pub fn char(&mut self) -> Type {
        self.primitive(PrimitiveType::Char)
    }

    pub fn bool(&mut self) -> Type {
        self.primitive(PrimitiveType::Bool)
    }

    pub fn unit(&mut self) -> Type {
        self.primitive(PrimitiveType::Unit)
    }

    pub fn fn_type(&mut self, a: Type, b: Type) -> Type {
        self.intern(TypeKind::Fn(a, b))
    }

    pub fn tuple_type(&mut self, items: Vec<Type>) -> Type {
        debug_assert!(items.len() >= 2);
        self.intern(TypeKind::Tuple(items))
    }

    /// Record type; labels are sorted here, their canonical order.
    pub fn record_type(&mut self, mut fields: Vec<(String, Type)>) -> Type {
        fields.sort_by(|(a, _), (b, _)| a.cmp(b));
        self.intern(TypeKind::Record(fields))
    }

    pub fn list_type(&mut self, elem: Type) -> Type {
        self.intern(TypeKind::List(elem))
    }

    pub fn data_type(&mut self, name: impl Into<String>, args: Vec<Type>) -> Type {
        self.intern(TypeKind::Data {
            name: name.into(),
            args,
        })
    }

    pub fn exn_type(&mut self) -> Type {
        self.data_type("exn", vec![])
    }

    /// Intern ground types by moniker. Types containing variables are
    /// not cached: distinct variables can share a moniker.
    fn intern(&mut self, kind: TypeKind) -> Type {
        let ty = Type::new(kind);
        if !ty.vars_in_order().is_empty() {
            return ty;
        }
        let moniker = ty.moniker();
        if let Some(existing) = self.interned.get(&moniker) {
            return existing.clone();
        }
        self.interned.insert(moniker, ty.clone());
        ty
    }

    // --- variables and unification ---

    pub fn fresh_var(&mut self, eq: bool) -> Type {
        Type::new(TypeKind::Var(self.vars.fresh(eq)))
    }

    pub fn fresh_numeric_var(&mut self) -> Type {
        Type::new(TypeKind::Var(self.vars.fresh_numeric()))
    }

    pub fn fresh_ordered_var(&mut self) -> Type {
        Type::new(TypeKind::Var(self.vars.fresh_ordered()))
    }

    pub fn unify(&mut self, t1: &Type, t2: &Type, span: &Span) -> Result<(), TypeError> {
        self.vars.unify(t1, t2, span)
    }

    pub fn resolve(&mut self, ty: &Type) -> Type {
        self.vars.resolve(ty)
    }

    // --- schemes ---

    /// Quantify the free variables of `ty` that do not occur free in
    /// the environment. Numeric variables default to `int` first; the
    /// equality flag of each quantified variable is preserved.
    pub fn generalize(&mut self, env_free: &HashSet<TypeVar>, ty: &Type) -> TypeScheme {
        self.vars.default_numeric(ty);
        let resolved = self.vars.resolve(ty);
        let mut quantified = Vec::new();
        for v in resolved.vars_in_order() {
            if !env_free.contains(&v) {
                quantified.push(SchemeVar {
                    var: v,
                    eq: self.vars.is_eq(v),
                });
            }
        }
        TypeScheme::polymorphic(quantified, resolved)
    }

    /// A scheme quantifying nothing; the type is still resolved so the
    /// binding shows its final shape.
    pub fn monomorphic(&mut self, ty: &Type) -> TypeScheme {
        self.vars.default_numeric(ty);
        TypeScheme::monomorphic(self.vars.resolve(ty))
    }

    /// Replace each quantified variable with a fresh one inheriting the
    /// equality flag.
    pub fn instantiate(&mut self, scheme: &TypeScheme) -> Type {
        if scheme.vars.is_empty() {
            return scheme.ty.clone();
        }
        let mut subst = Substitution::empty();
        for sv in &scheme.vars {
            subst.insert(sv.var, self.fresh_var(sv.eq));
        }
        subst.apply(&scheme.ty)
    }

    // --- datatypes, constructors, exceptions ---

    pub fn lookup_datatype(&self, name: &str) -> Option<&DataTypeDef> {
        self.datatypes.get(name)
    }

    pub fn lookup_ctor(&self, name: &str) -> Option<&CtorDef> {
        self.ctors.get(name)
    }

    pub fn is_ctor(&self, name: &str) -> bool {
        self.ctors.contains_key(name)
    }

    /// Register a surface `datatype` declaration. Returns the schemes
    /// of its constructors for binding into the environment.
    pub fn declare_datatype(
        &mut self,
        decl: &ast::statement::DatatypeDecl,
    ) -> Result<Vec<(String, TypeScheme)>, TypeError> {
        let params: Vec<TypeVar> = (0..decl.params.len())
            .map(|i| TypeVar::new(TEMPLATE_VAR_BASE + i))
            .collect();
        let mut param_map = HashMap::new();
        for (name, var) in decl.params.iter().zip(&params) {
            param_map.insert(name.clone(), Type::new(TypeKind::Var(*var)));
        }

        let mut ctor_names = Vec::new();
        let mut ctor_defs = Vec::new();
        for (ordinal, (cname, payload)) in decl.ctors.iter().enumerate() {
            let arg = match payload {
                Some(ty) => Some(self.resolve_ty_with(ty, &mut param_map, false)?),
                None => None,
            };
            ctor_names.push(cname.clone());
            ctor_defs.push(CtorDef {
                name: cname.clone(),
                datatype: decl.name.clone(),
                params: params.clone(),
                arg,
                ordinal,
            });
        }

        self.datatypes.insert(
            decl.name.clone(),
            DataTypeDef {
                name: decl.name.clone(),
                params: params.clone(),
                ctors: ctor_names,
            },
        );

        let mut schemes = Vec::new();
        for def in ctor_defs {
            let scheme = self.ctor_scheme(&def);
            self.ctors.insert(def.name.clone(), def.clone());
            schemes.push((def.name, scheme));
        }
        Ok(schemes)
    }

    /// Register an `exception` declaration; the constructor gets a
    /// fresh identity so rebinding the same name yields a distinct
    /// exception.
    pub fn declare_exception(
        &mut self,
        name: &str,
        param: Option<&ast::Ty>,
    ) -> Result<TypeScheme, TypeError> {
        let arg = match param {
            Some(ty) => {
                // Exception payloads must be closed types.
                let mut no_vars = HashMap::new();
                Some(self.resolve_ty_with(ty, &mut no_vars, false)?)
            }
            None => None,
        };
        let ordinal = self.next_exn_ordinal;
        self.next_exn_ordinal += 1;
        let def = CtorDef {
            name: name.to_string(),
            datatype: "exn".to_string(),
            params: vec![],
            arg,
            ordinal,
        };
        let scheme = self.ctor_scheme(&def);
        self.ctors.insert(name.to_string(), def);
        Ok(scheme)
    }

    /// Scheme of a constructor bound as a value, by name.
    pub fn ctor_scheme_by_name(&mut self, name: &str) -> Option<TypeScheme> {
        let def = self.ctors.get(name)?.clone();
        Some(self.ctor_scheme(&def))
    }

    /// The scheme of a constructor as a value: either the datatype
    /// instance itself (nullary) or a function from the payload.
    fn ctor_scheme(&mut self, def: &CtorDef) -> TypeScheme {
        let result = if def.datatype == "exn" {
            self.exn_type()
        } else {
            let args: Vec<Type> = def.params.iter().map(|v| Type::new(TypeKind::Var(*v))).collect();
            self.data_type(def.datatype.clone(), args)
        };
        let ty = match &def.arg {
            Some(arg) => self.fn_type(arg.clone(), result),
            None => result,
        };
        let vars = def
            .params
            .iter()
            .map(|v| SchemeVar { var: *v, eq: false })
            .collect();
        TypeScheme::polymorphic(vars, ty)
    }

    /// Instantiate a constructor with fresh variables: the instance
    /// type of its datatype and, if unary, its payload type.
    pub fn instantiate_ctor(&mut self, name: &str) -> Option<(Type, Option<Type>)> {
        let def = self.ctors.get(name)?.clone();
        let mut subst = Substitution::empty();
        for v in &def.params {
            let fresh = self.fresh_var(false);
            subst.insert(*v, fresh);
        }
        let result = if def.datatype == "exn" {
            self.exn_type()
        } else {
            let args: Vec<Type> = def
                .params
                .iter()
                .map(|v| subst.apply(&Type::new(TypeKind::Var(*v))))
                .collect();
            self.data_type(def.datatype.clone(), args)
        };
        let arg = def.arg.as_ref().map(|t| subst.apply(t));
        Some((result, arg))
    }

    pub fn declare_alias(&mut self, decl: &ast::statement::TypeAliasDecl) {
        self.aliases.insert(
            decl.name.clone(),
            AliasDef {
                params: decl.params.clone(),
                body: decl.ty.clone(),
            },
        );
    }

    // --- surface type resolution ---

    /// Resolve a surface type expression. `tyvars` maps source type
    /// variable names (with quotes) to semantic types; unseen names
    /// allocate fresh variables when `open_vars` is set, and are errors
    /// otherwise (datatype payloads must use declared parameters).
    pub fn resolve_ty(
        &mut self,
        ty: &ast::Ty,
        tyvars: &mut HashMap<String, Type>,
    ) -> Result<Type, TypeError> {
        self.resolve_ty_with(ty, tyvars, true)
    }

    fn resolve_ty_with(
        &mut self,
        ty: &ast::Ty,
        tyvars: &mut HashMap<String, Type>,
        open_vars: bool,
    ) -> Result<Type, TypeError> {
        match ty {
            ast::Ty::Var(name, span) => {
                if let Some(t) = tyvars.get(name) {
                    return Ok(t.clone());
                }
                if !open_vars {
                    return Err(TypeError::unbound(name.clone(), span.clone()));
                }
                let eq = name.starts_with("''");
                let fresh = self.fresh_var(eq);
                tyvars.insert(name.clone(), fresh.clone());
                Ok(fresh)
            }
            ast::Ty::Named {
                args,
                name,
                position,
            } => {
                let resolved: Vec<Type> = args
                    .iter()
                    .map(|a| self.resolve_ty_with(a, tyvars, open_vars))
                    .collect::<Result<_, _>>()?;
                match name.as_str() {
                    "int" | "real" | "string" | "char" | "bool" | "unit" | "exn" | "list"
                        if !resolved.is_empty() && name != "list" =>
                    {
                        Err(TypeError::arity_mismatch(name.clone(), 0, resolved.len(), position.clone()))
                    }
                    "int" => Ok(self.int()),
                    "real" => Ok(self.real()),
                    "string" => Ok(self.string()),
                    "char" => Ok(self.char()),
                    "bool" => Ok(self.bool()),
                    "unit" => Ok(self.unit()),
                    "exn" => Ok(self.exn_type()),
                    "list" => {
                        if resolved.len() != 1 {
                            return Err(TypeError::arity_mismatch(
                                "list",
                                1,
                                resolved.len(),
                                position.clone(),
                            ));
                        }
                        let elem = resolved.into_iter().next().expect("one argument");
                        Ok(self.list_type(elem))
                    }
                    _ => {
                        if let Some(alias) = self.aliases.get(name).cloned() {
                            if alias.params.len() != resolved.len() {
                                return Err(TypeError::arity_mismatch(
                                    name.clone(),
                                    alias.params.len(),
                                    resolved.len(),
                                    position.clone(),
                                ));
                            }
                            let mut inner: HashMap<String, Type> = alias
                                .params
                                .iter()
                                .cloned()
                                .zip(resolved)
                                .collect();
                            return self.resolve_ty_with(&alias.body, &mut inner, false);
                        }
                        let def = self
                            .datatypes
                            .get(name)
                            .ok_or_else(|| TypeError::unbound(name.clone(), position.clone()))?;
                        if def.params.len() != resolved.len() {
                            return Err(TypeError::arity_mismatch(
                                name.clone(),
                                def.params.len(),
                                resolved.len(),
                                position.clone(),
                            ));
                        }
                        Ok(self.data_type(name.clone(), resolved))
                    }
                }
            }
            ast::Ty::Tuple(items, _) => {
                let resolved: Vec<Type> = items
                    .iter()
                    .map(|t| self.resolve_ty_with(t, tyvars, open_vars))
                    .collect::<Result<_, _>>()?;
                Ok(self.tuple_type(resolved))
            }
            ast::Ty::Record(fields, _) => {
                let resolved: Vec<(String, Type)> = fields
                    .iter()
                    .map(|(l, t)| Ok((l.clone(), self.resolve_ty_with(t, tyvars, open_vars)?)))
                    .collect::<Result<_, TypeError>>()?;
                Ok(self.record_type(resolved))
            }
            ast::Ty::Fn(a, b, _) => {
                let a = self.resolve_ty_with(a, tyvars, open_vars)?;
                let b = self.resolve_ty_with(b, tyvars, open_vars)?;
                Ok(self.fn_type(a, b))
            }
        }
    }
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_ground_types_are_pointer_equal() {
        let mut ts = TypeSystem::new();
        let a = ts.int();
        let b = ts.int();
        assert!(std::rc::Rc::ptr_eq(&a.0, &b.0));
        let i = ts.int();
        let f1 = ts.fn_type(i.clone(), i.clone());
        let f2 = ts.fn_type(i.clone(), i);
        assert!(std::rc::Rc::ptr_eq(&f1.0, &f2.0));
    }

    #[test]
    fn var_types_are_not_interned() {
        let mut ts = TypeSystem::new();
        let v1 = ts.fresh_var(false);
        let v2 = ts.fresh_var(false);
        let f1 = ts.fn_type(v1.clone(), v1);
        let f2 = ts.fn_type(v2.clone(), v2);
        // Same moniker, different variables.
        assert_eq!(f1.moniker(), f2.moniker());
        assert_ne!(f1, f2);
    }

    #[test]
    fn record_labels_are_canonicalized() {
        let mut ts = TypeSystem::new();
        let i = ts.int();
        let r = ts.record_type(vec![("b".to_string(), i.clone()), ("a".to_string(), i)]);
        assert_eq!(r.moniker(), "{a:int, b:int}");
    }

    #[test]
    fn generalize_quantifies_only_non_env_vars() {
        let mut ts = TypeSystem::new();
        let a = ts.fresh_var(false);
        let b = ts.fresh_var(false);
        let ty = ts.fn_type(a.clone(), b.clone());
        let mut env_free = HashSet::new();
        if let TypeKind::Var(v) = &*a {
            env_free.insert(*v);
        }
        let scheme = ts.generalize(&env_free, &ty);
        assert_eq!(scheme.vars.len(), 1);
    }

    #[test]
    fn instantiate_refreshes_vars() {
        let mut ts = TypeSystem::new();
        let a = ts.fresh_var(false);
        let ty = ts.fn_type(a.clone(), a);
        let free = HashSet::new();
        let scheme = ts.generalize(&free, &ty);
        let t1 = ts.instantiate(&scheme);
        let t2 = ts.instantiate(&scheme);
        assert_ne!(t1, t2);
        assert_eq!(t1.moniker(), t2.moniker());
    }

    #[test]
    fn builtin_option_constructors() {
        let mut ts = TypeSystem::new();
        assert!(ts.is_ctor("NONE"));
        let (result, arg) = ts.instantiate_ctor("SOME").unwrap();
        let arg = arg.unwrap();
        assert_eq!(result.moniker(), "'a option");
        // the payload is exactly the instance argument
        match &*result {
            TypeKind::Data { args, .. } => assert_eq!(args[0], arg),
            _ => panic!("expected datatype instance"),
        }
    }

    #[test]
    fn exception_identity_is_fresh_per_declaration() {
        let mut ts = TypeSystem::new();
        let s1 = ts.declare_exception("E", None).unwrap();
        let o1 = ts.lookup_ctor("E").unwrap().ordinal;
        let _s2 = ts.declare_exception("E", None).unwrap();
        let o2 = ts.lookup_ctor("E").unwrap().ordinal;
        assert_ne!(o1, o2);
        assert_eq!(s1.ty.moniker(), "exn");
    }
}
