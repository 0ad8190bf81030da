//! Type System for Carbide
//!
//! The closed set of semantic type values the analyzer works with, plus the
//! permissive equality used everywhere a type check happens. Equality trades
//! soundness for error recovery: `unknown` and `any` compare equal to
//! everything so one mistake does not cascade into dozens of diagnostics.
#![allow(dead_code)]

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    F64,
    String,
    Bool,
    Void,
    Any,
    I8,
    Null,
    File,
}

impl Primitive {
    /// The surface-syntax name of this primitive
    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::F64 => "f64",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Void => "void",
            Self::Any => "any",
            Self::I8 => "i8",
            Self::Null => "null",
            Self::File => "File",
        }
    }

    /// Parse a surface-syntax primitive name
    pub fn from_name(name: &str) -> Option<Primitive> {
        match name {
            "int" => Some(Self::Int),
            "f64" => Some(Self::F64),
            "string" => Some(Self::String),
            "bool" => Some(Self::Bool),
            "void" => Some(Self::Void),
            "any" => Some(Self::Any),
            "i8" => Some(Self::I8),
            "null" => Some(Self::Null),
            "File" => Some(Self::File),
            _ => None,
        }
    }

    /// Check if this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::F64 | Self::I8)
    }
}

/// A declared enum variant. The tag is the 0-based declaration index,
/// which later lowering stages rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    pub fields: Vec<Type>,
    pub tag: usize,
}

/// A declared struct field
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
}

/// Resolved semantic type
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Primitive(Primitive),
    Pointer(Box<Type>),
    Function { params: Vec<Type>, ret: Box<Type> },
    Result { ok: Box<Type>, err: Box<Type> },
    Option(Box<Type>),
    /// Generic type instantiation (e.g. Vec<int>)
    GenericInst { name: String, args: Vec<Type> },
    /// Generic type parameter in scope (e.g. T in fn id<T>)
    GenericParam(String),
    Enum { name: String, variants: Vec<EnumVariant> },
    Struct {
        name: String,
        type_params: Vec<String>,
        fields: Vec<StructField>,
    },
    /// Placeholder for any unresolved or error state
    Unknown,
}

impl Type {
    pub const INT: Self = Self::Primitive(Primitive::Int);
    pub const F64: Self = Self::Primitive(Primitive::F64);
    pub const STRING: Self = Self::Primitive(Primitive::String);
    pub const BOOL: Self = Self::Primitive(Primitive::Bool);
    pub const VOID: Self = Self::Primitive(Primitive::Void);
    pub const ANY: Self = Self::Primitive(Primitive::Any);
    pub const I8: Self = Self::Primitive(Primitive::I8);
    pub const NULL: Self = Self::Primitive(Primitive::Null);
    pub const FILE: Self = Self::Primitive(Primitive::File);

    /// Create a pointer type
    pub fn ptr(inner: Type) -> Self {
        Self::Pointer(Box::new(inner))
    }

    /// Create a function type
    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Self::Function {
            params,
            ret: Box::new(ret),
        }
    }

    /// Create a Result type
    pub fn result(ok: Type, err: Type) -> Self {
        Self::Result {
            ok: Box::new(ok),
            err: Box::new(err),
        }
    }

    /// Create an Option type
    pub fn option(inner: Type) -> Self {
        Self::Option(Box::new(inner))
    }

    /// Create a generic instantiation
    pub fn generic(name: impl Into<String>, args: Vec<Type>) -> Self {
        Self::GenericInst {
            name: name.into(),
            args,
        }
    }

    /// Check if this type is a universal wildcard (`unknown` or `any`)
    pub fn is_wildcard(&self) -> bool {
        matches!(
            self,
            Type::Unknown | Type::Primitive(Primitive::Any)
        )
    }

    /// The nominal name of this type, as used for trait-impl targets
    pub fn display_name(&self) -> String {
        match self {
            Type::Primitive(p) => p.name().to_string(),
            Type::GenericInst { name, .. } => name.clone(),
            Type::Enum { name, .. } => name.clone(),
            Type::Struct { name, .. } => name.clone(),
            Type::GenericParam(name) => name.clone(),
            other => other.to_string(),
        }
    }
}

/// Permissive structural/nominal type equality.
///
/// `unknown` and `any` compare equal to everything, as does a generic
/// parameter (bound checking happens at call sites, not through equality).
/// `null` is compatible with any pointer. Enums and structs are nominal.
pub fn types_equal(a: &Type, b: &Type) -> bool {
    if a.is_wildcard() || b.is_wildcard() {
        return true;
    }
    if matches!(a, Type::GenericParam(_)) || matches!(b, Type::GenericParam(_)) {
        return true;
    }
    match (a, b) {
        (Type::Primitive(Primitive::Null), Type::Pointer(_))
        | (Type::Pointer(_), Type::Primitive(Primitive::Null)) => true,
        (Type::Primitive(pa), Type::Primitive(pb)) => pa == pb,
        (Type::Pointer(ea), Type::Pointer(eb)) => types_equal(ea, eb),
        (
            Type::Function {
                params: pa,
                ret: ra,
            },
            Type::Function {
                params: pb,
                ret: rb,
            },
        ) => {
            pa.len() == pb.len()
                && pa.iter().zip(pb.iter()).all(|(x, y)| types_equal(x, y))
                && types_equal(ra, rb)
        }
        (Type::Result { ok: oa, err: ea }, Type::Result { ok: ob, err: eb }) => {
            types_equal(oa, ob) && types_equal(ea, eb)
        }
        (Type::Option(ia), Type::Option(ib)) => types_equal(ia, ib),
        (
            Type::GenericInst { name: na, args: aa },
            Type::GenericInst { name: nb, args: ab },
        ) => {
            na == nb
                && aa.len() == ab.len()
                && aa.iter().zip(ab.iter()).all(|(x, y)| types_equal(x, y))
        }
        (Type::Enum { name: na, .. }, Type::Enum { name: nb, .. }) => na == nb,
        (Type::Struct { name: na, .. }, Type::Struct { name: nb, .. }) => na == nb,
        _ => false,
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p.name()),
            Type::Pointer(elem) => write!(f, "*{}", elem),
            Type::Function { params, ret } => {
                let rendered: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "fn({}) -> {}", rendered.join(", "), ret)
            }
            Type::Result { ok, err } => write!(f, "Result<{}, {}>", ok, err),
            Type::Option(inner) => write!(f, "Option<{}>", inner),
            Type::GenericInst { name, args } => {
                if args.is_empty() {
                    write!(f, "{}", name)
                } else {
                    let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    write!(f, "{}<{}>", name, rendered.join(", "))
                }
            }
            Type::GenericParam(name) => write!(f, "{}", name),
            Type::Enum { name, .. } => write!(f, "{}", name),
            Type::Struct { name, .. } => write!(f, "{}", name),
            Type::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn all_primitives() -> Vec<Type> {
        [
            Primitive::Int,
            Primitive::F64,
            Primitive::String,
            Primitive::Bool,
            Primitive::Void,
            Primitive::I8,
            Primitive::Null,
            Primitive::File,
        ]
        .iter()
        .map(|p| Type::Primitive(*p))
        .collect()
    }

    #[test]
    fn wildcards_equal_everything() {
        for ty in all_primitives() {
            assert!(types_equal(&Type::Unknown, &ty));
            assert!(types_equal(&ty, &Type::Unknown));
            assert!(types_equal(&Type::ANY, &ty));
            assert!(types_equal(&ty, &Type::ANY));
        }
        assert!(types_equal(&Type::Unknown, &Type::ptr(Type::INT)));
        assert!(types_equal(&Type::ANY, &Type::generic("Vec", vec![Type::INT])));
    }

    #[test]
    fn equality_reflexive_and_symmetric() {
        let samples = vec![
            Type::INT,
            Type::ptr(Type::I8),
            Type::generic("Vec", vec![Type::INT]),
            Type::result(Type::INT, Type::STRING),
            Type::option(Type::BOOL),
            Type::Enum {
                name: "Color".into(),
                variants: vec![],
            },
            Type::Struct {
                name: "Point".into(),
                type_params: vec![],
                fields: vec![],
            },
            Type::function(vec![Type::INT], Type::BOOL),
        ];
        for a in &samples {
            assert!(types_equal(a, a), "not reflexive: {}", a);
            for b in &samples {
                assert_eq!(types_equal(a, b), types_equal(b, a), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn null_is_compatible_with_pointers() {
        assert!(types_equal(&Type::NULL, &Type::ptr(Type::INT)));
        assert!(types_equal(&Type::ptr(Type::F64), &Type::NULL));
        assert!(!types_equal(&Type::NULL, &Type::INT));
    }

    #[test]
    fn generic_inst_requires_matching_args() {
        let vec_int = Type::generic("Vec", vec![Type::INT]);
        let vec_str = Type::generic("Vec", vec![Type::STRING]);
        let map = Type::generic("HashMap", vec![Type::STRING, Type::INT]);
        assert!(types_equal(&vec_int, &vec_int.clone()));
        assert!(!types_equal(&vec_int, &vec_str));
        assert!(!types_equal(&vec_int, &map));
        // Wildcard argument still unifies
        let vec_unknown = Type::generic("Vec", vec![Type::Unknown]);
        assert!(types_equal(&vec_int, &vec_unknown));
    }

    #[test]
    fn enums_and_structs_are_nominal() {
        let a = Type::Enum {
            name: "Shape".into(),
            variants: vec![EnumVariant {
                name: "Circle".into(),
                fields: vec![Type::F64],
                tag: 0,
            }],
        };
        let b = Type::Enum {
            name: "Shape".into(),
            variants: vec![],
        };
        assert!(types_equal(&a, &b));
        let c = Type::Enum {
            name: "Color".into(),
            variants: vec![],
        };
        assert!(!types_equal(&a, &c));
    }

    #[test]
    fn display_forms() {
        assert_eq!(Type::generic("Vec", vec![Type::INT]).to_string(), "Vec<int>");
        assert_eq!(Type::ptr(Type::INT).to_string(), "*int");
        assert_eq!(
            Type::result(Type::INT, Type::STRING).to_string(),
            "Result<int, string>"
        );
        assert_eq!(
            Type::function(vec![Type::INT, Type::F64], Type::BOOL).to_string(),
            "fn(int, f64) -> bool"
        );
        assert_eq!(
            Type::generic("Box", vec![Type::GenericParam("T".into())]).to_string(),
            "Box<T>"
        );
    }
}
