//! The tinsel type universe and the operator typing rules.
//!
//! The universe mirrors GLSL ES 3.00: scalars, vectors, float matrices and
//! fixed-size arrays, plus [`Type::Undecided`], a sentinel for "could not
//! be determined because of an earlier error". Undecided is compatible
//! with everything and every operator applied to it yields Undecided, so
//! one mistake produces one diagnostic instead of a cascade.

use core::fmt;
use core::str::FromStr;

use crate::ast::{BinOp, UnaryOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float,
    Int,
    Uint,
    Bool,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Float => "float",
            ScalarKind::Int => "int",
            ScalarKind::Uint => "uint",
            ScalarKind::Bool => "bool",
        }
    }

    /// Prefix used by the vector type of this kind (`vec`, `ivec`, ...).
    pub fn vector_prefix(self) -> &'static str {
        match self {
            ScalarKind::Float => "vec",
            ScalarKind::Int => "ivec",
            ScalarKind::Uint => "uvec",
            ScalarKind::Bool => "bvec",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Uint)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, ScalarKind::Bool)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar(ScalarKind),
    /// Vector of 2, 3 or 4 components.
    Vector(ScalarKind, u8),
    /// Float matrix, `cols` columns by `rows` rows (GLSL `matCxR`).
    Matrix { cols: u8, rows: u8 },
    /// Fixed-size array; size 0 means "not yet known".
    Array(Box<Type>, usize),
    Undecided,
}

impl Type {
    pub const FLOAT: Type = Type::Scalar(ScalarKind::Float);
    pub const INT: Type = Type::Scalar(ScalarKind::Int);
    pub const UINT: Type = Type::Scalar(ScalarKind::Uint);
    pub const BOOL: Type = Type::Scalar(ScalarKind::Bool);
    pub const VEC2: Type = Type::Vector(ScalarKind::Float, 2);
    pub const VEC4: Type = Type::Vector(ScalarKind::Float, 4);

    pub fn is_undecided(&self) -> bool {
        matches!(self, Type::Undecided)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Type::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Type::Vector(..))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Type::Matrix { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    /// Scalar kind of a scalar, vector or matrix.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Type::Scalar(kind) | Type::Vector(kind, _) => Some(*kind),
            Type::Matrix { .. } => Some(ScalarKind::Float),
            _ => None,
        }
    }

    /// Number of scalar components (1 for scalars); arrays have none.
    pub fn component_count(&self) -> Option<usize> {
        match self {
            Type::Scalar(_) => Some(1),
            Type::Vector(_, size) => Some(*size as usize),
            Type::Matrix { cols, rows } => Some(*cols as usize * *rows as usize),
            _ => None,
        }
    }

    /// Scalar or vector of `kind` with `size` components.
    pub fn with_size(kind: ScalarKind, size: u8) -> Type {
        if size == 1 {
            Type::Scalar(kind)
        } else {
            Type::Vector(kind, size)
        }
    }

    /// Whether the type is an int or uint scalar or vector.
    pub fn is_integer_based(&self) -> bool {
        matches!(self, Type::Scalar(k) | Type::Vector(k, _) if k.is_integer())
    }

    fn is_numeric_non_array(&self) -> bool {
        match self {
            Type::Scalar(k) | Type::Vector(k, _) => k.is_numeric(),
            Type::Matrix { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(kind) => f.write_str(kind.name()),
            Type::Vector(kind, size) => write!(f, "{}{}", kind.vector_prefix(), size),
            Type::Matrix { cols, rows } if cols == rows => write!(f, "mat{cols}"),
            Type::Matrix { cols, rows } => write!(f, "mat{cols}x{rows}"),
            Type::Array(elem, 0) => write!(f, "{elem}[]"),
            Type::Array(elem, size) => write!(f, "{elem}[{size}]"),
            Type::Undecided => f.write_str("undecided"),
        }
    }
}

impl FromStr for Type {
    type Err = String;

    /// Parse a type spelling such as `vec3`, `mat2x4` or `float[3]`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if let Some(open) = text.find('[') {
            let elem: Type = text[..open].parse()?;
            let size_text = text[open + 1..]
                .strip_suffix(']')
                .ok_or_else(|| format!("malformed array type '{text}'"))?;
            let size = if size_text.is_empty() {
                0
            } else {
                size_text
                    .parse::<usize>()
                    .map_err(|_| format!("malformed array size in '{text}'"))?
            };
            return Ok(Type::Array(Box::new(elem), size));
        }

        let dim = |d: &str| match d {
            "2" => Some(2u8),
            "3" => Some(3),
            "4" => Some(4),
            _ => None,
        };
        let unknown = || format!("unknown type '{text}'");
        match text {
            "float" => return Ok(Type::FLOAT),
            "int" => return Ok(Type::INT),
            "uint" => return Ok(Type::UINT),
            "bool" => return Ok(Type::BOOL),
            _ => {}
        }
        for kind in [
            ScalarKind::Float,
            ScalarKind::Int,
            ScalarKind::Uint,
            ScalarKind::Bool,
        ] {
            if let Some(rest) = text.strip_prefix(kind.vector_prefix()) {
                return dim(rest).map(|n| Type::Vector(kind, n)).ok_or_else(unknown);
            }
        }
        if let Some(rest) = text.strip_prefix("mat") {
            let (cols, rows) = match rest.split_once('x') {
                Some((c, r)) => (dim(c), dim(r)),
                None => (dim(rest), dim(rest)),
            };
            if let (Some(cols), Some(rows)) = (cols, rows) {
                return Ok(Type::Matrix { cols, rows });
            }
        }
        Err(unknown())
    }
}

/// Whether a value of type `right` may be used where `left` is expected.
///
/// This single rule serves assignment, argument passing, declaration
/// initialisers and return-type inference:
/// * Undecided is compatible with everything, in either position.
/// * Otherwise types must be identical, except that an array of unknown
///   size accepts any size of the same element type.
pub fn compatible(left: &Type, right: &Type) -> bool {
    if left.is_undecided() || right.is_undecided() {
        return true;
    }
    if left == right {
        return true;
    }
    match (left, right) {
        (Type::Array(le, 0), Type::Array(re, _)) => compatible(le, re),
        _ => false,
    }
}

/// Result type of a binary operator, following GLSL ES 3.00 exactly.
///
/// Errors are returned as plain messages; the caller attaches a position.
pub fn binary_typing(op: BinOp, left: &Type, right: &Type) -> Result<Type, String> {
    if left.is_undecided() || right.is_undecided() {
        return Ok(Type::Undecided);
    }
    let sym = op.symbol();

    match op {
        BinOp::And | BinOp::Or | BinOp::Xor => {
            if *left == Type::BOOL && *right == Type::BOOL {
                Ok(Type::BOOL)
            } else {
                Err(format!(
                    "logical operator '{sym}' requires bool operands, found {left} and {right}"
                ))
            }
        }
        BinOp::Eq | BinOp::NotEq => {
            if left == right {
                Ok(Type::BOOL)
            } else {
                Err(format!(
                    "equality operator '{sym}' requires both sides to have the same type, found {left} and {right}"
                ))
            }
        }
        BinOp::Less | BinOp::Greater | BinOp::LessEq | BinOp::GreaterEq => {
            match (left, right) {
                (Type::Scalar(l), Type::Scalar(r)) if l == r && l.is_numeric() => Ok(Type::BOOL),
                (Type::Scalar(_), Type::Scalar(_)) if left != right => Err(format!(
                    "relational operator '{sym}' requires operands of the same type, found {left} and {right}"
                )),
                (Type::Vector(..), _) | (_, Type::Vector(..)) => Err(format!(
                    "relational operator '{sym}' is not defined for vectors, found {left} and {right}; use lessThan, greaterThan, lessThanEqual or greaterThanEqual instead"
                )),
                _ => Err(format!(
                    "relational operator '{sym}' requires int, uint or float scalars, found {left} and {right}"
                )),
            }
        }
        BinOp::Shl | BinOp::Shr => shift_typing(sym, left, right),
        BinOp::Mod | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
            if !left.is_integer_based() || !right.is_integer_based() {
                return Err(format!(
                    "operator '{sym}' requires int or uint operands, found {left} and {right}"
                ));
            }
            componentwise(sym, left, right)
        }
        BinOp::Add | BinOp::Sub | BinOp::Div => arithmetic(sym, left, right, false),
        BinOp::Mul => arithmetic(sym, left, right, true),
    }
}

fn shift_typing(sym: &str, left: &Type, right: &Type) -> Result<Type, String> {
    if !left.is_integer_based() || !right.is_integer_based() {
        return Err(format!(
            "bit shift '{sym}' requires int or uint operands, found {left} and {right}"
        ));
    }
    match (left, right) {
        (Type::Scalar(_), Type::Scalar(_)) => Ok(left.clone()),
        (Type::Vector(..), Type::Scalar(_)) => Ok(left.clone()),
        (Type::Vector(_, l), Type::Vector(_, r)) if l == r => Ok(left.clone()),
        _ => Err(format!(
            "bit shift '{sym}' requires the right operand to be a scalar or a vector of the same length as the left operand (a scalar left operand needs a scalar right operand), found {left} and {right}"
        )),
    }
}

/// Scalar/vector component-wise typing with scalar broadcast.
fn componentwise(sym: &str, left: &Type, right: &Type) -> Result<Type, String> {
    let (Some(lk), Some(rk)) = (left.scalar_kind(), right.scalar_kind()) else {
        return Err(format!(
            "operator '{sym}' cannot be applied to {left} and {right}"
        ));
    };
    if lk != rk {
        return Err(format!(
            "operator '{sym}' requires operands of the same base type, found {left} and {right}"
        ));
    }
    match (left, right) {
        (Type::Scalar(_), _) => Ok(right.clone()),
        (_, Type::Scalar(_)) => Ok(left.clone()),
        (Type::Vector(_, l), Type::Vector(_, r)) if l != r => Err(format!(
            "vector dimension mismatch for '{sym}': {left} has {l} components but {right} has {r}"
        )),
        _ if left == right => Ok(left.clone()),
        _ => Err(format!(
            "operator '{sym}' cannot be applied to {left} and {right}"
        )),
    }
}

fn arithmetic(sym: &str, left: &Type, right: &Type, is_mul: bool) -> Result<Type, String> {
    if !left.is_numeric_non_array() || !right.is_numeric_non_array() {
        return Err(format!(
            "arithmetic operator '{sym}' requires numeric operands, found {left} and {right}"
        ));
    }
    match (left, right) {
        (Type::Matrix { .. }, Type::Matrix { .. }) if is_mul => matrix_product(left, right),
        (Type::Matrix { cols, rows }, Type::Vector(ScalarKind::Float, size)) if is_mul => {
            if cols == size {
                Ok(Type::Vector(ScalarKind::Float, *rows))
            } else {
                Err(format!(
                    "matrix-vector dimension mismatch: {left} has {cols} columns but {right} has {size} components"
                ))
            }
        }
        (Type::Vector(ScalarKind::Float, size), Type::Matrix { cols, rows }) if is_mul => {
            if rows == size {
                Ok(Type::Vector(ScalarKind::Float, *cols))
            } else {
                Err(format!(
                    "vector-matrix dimension mismatch: {left} has {size} components but {right} has {rows} rows"
                ))
            }
        }
        (Type::Matrix { .. }, Type::Matrix { .. }) => {
            if left == right {
                Ok(left.clone())
            } else {
                Err(format!(
                    "matrix dimension mismatch for '{sym}': {left} and {right}"
                ))
            }
        }
        (Type::Matrix { .. }, Type::Scalar(ScalarKind::Float)) => Ok(left.clone()),
        (Type::Scalar(ScalarKind::Float), Type::Matrix { .. }) => Ok(right.clone()),
        (Type::Matrix { .. }, _) | (_, Type::Matrix { .. }) => Err(format!(
            "operator '{sym}' cannot combine {left} and {right}"
        )),
        _ => componentwise(sym, left, right),
    }
}

fn matrix_product(left: &Type, right: &Type) -> Result<Type, String> {
    let (Type::Matrix { cols: lc, rows: lr }, Type::Matrix { cols: rc, rows: rr }) = (left, right)
    else {
        return Err(format!("cannot multiply {left} and {right}"));
    };
    if lc != rr {
        return Err(format!(
            "matrix dimension mismatch: {left} has {lc} columns but {right} has {rr} rows"
        ));
    }
    Ok(Type::Matrix {
        cols: *rc,
        rows: *lr,
    })
}

/// Result type of a prefix or postfix unary operator.
pub fn unary_typing(op: UnaryOp, operand: &Type) -> Result<Type, String> {
    if operand.is_undecided() {
        return Ok(Type::Undecided);
    }
    let sym = op.symbol();
    let ok = match op {
        UnaryOp::Neg | UnaryOp::Plus => operand.is_numeric_non_array(),
        UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
            operand.is_numeric_non_array()
        }
        UnaryOp::Not => *operand == Type::BOOL,
        UnaryOp::BitNot => operand.is_integer_based(),
    };
    if ok {
        Ok(operand.clone())
    } else {
        let wanted = match op {
            UnaryOp::Not => "a bool",
            UnaryOp::BitNot => "an int or uint scalar or vector",
            _ => "a numeric scalar, vector or matrix",
        };
        Err(format!(
            "unary operator '{sym}' requires {wanted} operand, found {operand}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(text: &str) -> Type {
        text.parse().expect("type")
    }

    fn typing(op: &str, l: &str, r: &str) -> Result<Type, String> {
        binary_typing(BinOp::from_symbol(op).expect("op"), &ty(l), &ty(r))
    }

    #[test]
    fn parses_and_displays_types() {
        for text in ["float", "ivec3", "bvec2", "mat2", "mat2x3", "float[3]", "int[]"] {
            assert_eq!(ty(text).to_string(), text);
        }
        assert_eq!(ty("mat3x3"), ty("mat3"));
        assert!("vec5".parse::<Type>().is_err());
    }

    #[test]
    fn matrix_times_vector() {
        assert_eq!(typing("*", "mat2x3", "vec2"), Ok(ty("vec3")));
        assert_eq!(typing("*", "vec3", "mat2x3"), Ok(ty("vec2")));
        assert_eq!(typing("*", "mat2x3", "mat4x2"), Ok(ty("mat4x3")));
        assert!(typing("*", "mat2x3", "vec3").is_err());
    }

    #[test]
    fn vector_dimension_mismatch() {
        let err = typing("*", "vec2", "vec3").unwrap_err();
        assert!(err.contains("dimension mismatch"), "{err}");
    }

    #[test]
    fn scalar_broadcasts() {
        assert_eq!(typing("+", "float", "vec3"), Ok(ty("vec3")));
        assert_eq!(typing("*", "mat3", "float"), Ok(ty("mat3")));
        assert!(typing("+", "int", "vec3").is_err());
        assert!(typing("+", "int", "float").is_err());
    }

    #[test]
    fn integer_only_operators() {
        assert_eq!(typing("%", "ivec2", "int"), Ok(ty("ivec2")));
        assert_eq!(typing("&", "uint", "uint"), Ok(ty("uint")));
        assert!(typing("%", "float", "float").is_err());
        assert!(typing("|", "int", "uint").is_err());
    }

    #[test]
    fn bit_shift_rules() {
        let err = typing("<<", "ivec2", "uvec3").unwrap_err();
        assert!(err.contains("scalar or a vector of the same length"), "{err}");
        assert_eq!(typing("<<", "ivec2", "uint"), Ok(ty("ivec2")));
        assert_eq!(typing(">>", "uvec3", "ivec3"), Ok(ty("uvec3")));
        assert!(typing("<<", "int", "ivec2").is_err());
        assert!(typing("<<", "float", "int").is_err());
    }

    #[test]
    fn relational_and_equality() {
        assert_eq!(typing("<", "float", "float"), Ok(Type::BOOL));
        let err = typing("<", "vec2", "vec2").unwrap_err();
        assert!(err.contains("lessThan"), "{err}");
        assert!(typing("<", "int", "float").is_err());
        assert_eq!(typing("==", "vec3", "vec3"), Ok(Type::BOOL));
        assert!(typing("==", "vec3", "vec4").is_err());
    }

    #[test]
    fn logical_requires_bool() {
        assert_eq!(typing("&&", "bool", "bool"), Ok(Type::BOOL));
        assert!(typing("||", "bool", "int").is_err());
    }

    #[test]
    fn undecided_never_errors() {
        assert_eq!(
            binary_typing(BinOp::Mul, &Type::Undecided, &ty("vec3")),
            Ok(Type::Undecided)
        );
        assert_eq!(unary_typing(UnaryOp::Not, &Type::Undecided), Ok(Type::Undecided));
        assert!(compatible(&Type::Undecided, &ty("mat4")));
        assert!(compatible(&ty("float"), &Type::Undecided));
    }

    #[test]
    fn unsized_arrays_accept_any_size() {
        assert!(compatible(&ty("float[]"), &ty("float[3]")));
        assert!(!compatible(&ty("float[2]"), &ty("float[3]")));
        assert!(!compatible(&ty("float[]"), &ty("int[3]")));
    }

    #[test]
    fn unary_rules() {
        assert_eq!(unary_typing(UnaryOp::Neg, &ty("vec2")), Ok(ty("vec2")));
        assert!(unary_typing(UnaryOp::Neg, &Type::BOOL).is_err());
        assert!(unary_typing(UnaryOp::Not, &ty("bvec2")).is_err());
        assert_eq!(unary_typing(UnaryOp::BitNot, &ty("uvec2")), Ok(ty("uvec2")));
    }
}
