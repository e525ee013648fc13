use rusml::env::Environment;
use rusml::eval::value::Value;
use rusml::types::ty::{PrimitiveType, Type, TypeKind, TypeScheme};

fn int_scheme() -> TypeScheme {
    TypeScheme::monomorphic(Type::new(TypeKind::Prim(PrimitiveType::Int)))
}

fn str_scheme() -> TypeScheme {
    TypeScheme::monomorphic(Type::new(TypeKind::Prim(PrimitiveType::String)))
}

fn distinct_values(env: &Environment) -> usize {
    env.value_map().len()
}

#[test]
fn empty_environment_has_the_boolean_bindings() {
    let env = Environment::empty();
    assert!(env.is_map());
    assert!(env.lookup("true").is_some());
    assert!(env.lookup("false").is_some());
    assert_eq!(env.chain_length(), 2);
}

#[test]
fn binding_layers_shadow() {
    let env = Environment::empty()
        .bind("x", int_scheme(), Some(Value::Int(1)))
        .bind("y", int_scheme(), Some(Value::Int(2)))
        .bind("x", str_scheme(), Some(Value::String("s".into())));
    let binding = env.lookup("x").expect("x is bound");
    assert!(matches!(binding.value, Some(Value::String(_))));
    // the shape of the environment is not observable through lookup
    assert_eq!(env.lookup("y").and_then(|b| match &b.value {
        Some(Value::Int(i)) => Some(*i),
        _ => None,
    }), Some(2));
}

/// The documented chain-length scenario: starting from `{a, b, c}`,
/// successive binds of `true, true, foo, true` give distinct-value
/// counts 5,5,6,6 and chain lengths 6,6,7,8.
#[test]
fn rebind_does_not_shorten_the_chain() {
    let e0 = Environment::empty()
        .bind("a", int_scheme(), Some(Value::Int(0)))
        .bind("b", int_scheme(), Some(Value::Int(1)))
        .bind("c", int_scheme(), Some(Value::Int(2)));
    assert!(e0.is_sub());
    assert_eq!(distinct_values(&e0), 5);
    assert_eq!(e0.chain_length(), 5);

    let e1 = e0.bind("true", str_scheme(), Some(Value::String("yes".into())));
    assert_eq!(distinct_values(&e1), 5);
    assert_eq!(e1.chain_length(), 6);

    let e2 = e1.bind("true", str_scheme(), Some(Value::String("no".into())));
    assert_eq!(distinct_values(&e2), 5);
    assert_eq!(e2.chain_length(), 6);

    let e3 = e2.bind("foo", str_scheme(), Some(Value::String("baz".into())));
    assert_eq!(distinct_values(&e3), 6);
    assert_eq!(e3.chain_length(), 7);

    // Rebinding "true" after the newer "foo" grows the chain: we do
    // not look past "foo" for the older "true".
    let e4 = e3.bind("true", str_scheme(), Some(Value::String("yes".into())));
    assert_eq!(distinct_values(&e4), 6);
    assert_eq!(e4.chain_length(), 8);
}

#[test]
fn the_flattened_environment_behaves_identically() {
    let e0 = Environment::empty()
        .bind("a", int_scheme(), Some(Value::Int(0)))
        .bind("b", int_scheme(), Some(Value::Int(1)))
        .bind("c", int_scheme(), Some(Value::Int(2)));
    let flat = e0.bind_all(e0.value_map().into_values());
    assert!(flat.is_map());
    assert_eq!(distinct_values(&flat), 5);
    assert_eq!(flat.chain_length(), 5);

    let f1 = flat.bind("true", str_scheme(), Some(Value::String("yes".into())));
    assert_eq!(distinct_values(&f1), 5);
    assert_eq!(f1.chain_length(), 6);

    let f2 = f1.bind("true", str_scheme(), Some(Value::String("no".into())));
    assert_eq!(distinct_values(&f2), 5);
    assert_eq!(f2.chain_length(), 6);
}

#[test]
fn visit_is_innermost_first() {
    let env = Environment::empty()
        .bind("a", int_scheme(), Some(Value::Int(0)))
        .bind("b", int_scheme(), Some(Value::Int(1)));
    let mut names = Vec::new();
    env.visit(&mut |binding| names.push(binding.name.clone()));
    assert_eq!(&names[0], "b");
    assert_eq!(&names[1], "a");
    assert_eq!(names.len(), 4);
}
