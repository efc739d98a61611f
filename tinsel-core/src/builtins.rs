//! Built-in GLSL ES 3.00 functions visible from tinsel.
//!
//! Every function is described by one or more prototypes written in a
//! small generic vocabulary: `genType` (float scalar or vector),
//! `genIType`/`genUType`/`genBType` for the other scalar kinds,
//! `vec`/`ivec`/`uvec`/`bvec` for vectors only, `mat` for any matrix, and
//! fully concrete slots. The table is plain static data.

use crate::types::{ScalarKind, Type};

/// One parameter or return slot of a prototype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// A concrete scalar.
    Scalar(ScalarKind),
    /// A concrete vector.
    Vector(ScalarKind, u8),
    /// A concrete matrix.
    Matrix(u8, u8),
    /// `genType` & friends: scalar or vector of the kind.
    Gen(ScalarKind),
    /// `vec` & friends: vector of the kind, any size.
    AnyVec(ScalarKind),
    /// `mat`: any matrix.
    AnyMat,
}

use ScalarKind::{Bool as B, Float as F, Int as I, Uint as U};
use Slot::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prototype {
    pub ret: Slot,
    pub params: &'static [Slot],
}

const fn p(ret: Slot, params: &'static [Slot]) -> Prototype {
    Prototype { ret, params }
}

/// Metadata about a single builtin function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinDescriptor {
    pub name: &'static str,
    /// Candidate prototypes, tried in order.
    pub prototypes: &'static [Prototype],
}

const fn b(name: &'static str, prototypes: &'static [Prototype]) -> BuiltinDescriptor {
    BuiltinDescriptor { name, prototypes }
}

const GEN1: &[Prototype] = &[p(Gen(F), &[Gen(F)])];
const GEN2: &[Prototype] = &[p(Gen(F), &[Gen(F), Gen(F)])];
const REL: &[Prototype] = &[
    p(AnyVec(B), &[AnyVec(F), AnyVec(F)]),
    p(AnyVec(B), &[AnyVec(I), AnyVec(I)]),
    p(AnyVec(B), &[AnyVec(U), AnyVec(U)]),
];
const EQ_REL: &[Prototype] = &[
    p(AnyVec(B), &[AnyVec(F), AnyVec(F)]),
    p(AnyVec(B), &[AnyVec(I), AnyVec(I)]),
    p(AnyVec(B), &[AnyVec(U), AnyVec(U)]),
    p(AnyVec(B), &[AnyVec(B), AnyVec(B)]),
];
const MIN_MAX: &[Prototype] = &[
    p(Gen(F), &[Gen(F), Gen(F)]),
    p(Gen(F), &[Gen(F), Scalar(F)]),
    p(Gen(I), &[Gen(I), Gen(I)]),
    p(Gen(I), &[Gen(I), Scalar(I)]),
    p(Gen(U), &[Gen(U), Gen(U)]),
    p(Gen(U), &[Gen(U), Scalar(U)]),
];

/// The complete list of builtins known to the compiler.
pub const BUILTINS: &[BuiltinDescriptor] = &[
    // angle and trigonometry
    b("radians", GEN1),
    b("degrees", GEN1),
    b("sin", GEN1),
    b("cos", GEN1),
    b("tan", GEN1),
    b("asin", GEN1),
    b("acos", GEN1),
    b("atan", &[p(Gen(F), &[Gen(F), Gen(F)]), p(Gen(F), &[Gen(F)])]),
    b("sinh", GEN1),
    b("cosh", GEN1),
    b("tanh", GEN1),
    b("asinh", GEN1),
    b("acosh", GEN1),
    b("atanh", GEN1),
    // exponential
    b("pow", GEN2),
    b("exp", GEN1),
    b("log", GEN1),
    b("exp2", GEN1),
    b("log2", GEN1),
    b("sqrt", GEN1),
    b("inversesqrt", GEN1),
    // common
    b("abs", &[p(Gen(F), &[Gen(F)]), p(Gen(I), &[Gen(I)])]),
    b("sign", &[p(Gen(F), &[Gen(F)]), p(Gen(I), &[Gen(I)])]),
    b("floor", GEN1),
    b("trunc", GEN1),
    b("round", GEN1),
    b("roundEven", GEN1),
    b("ceil", GEN1),
    b("fract", GEN1),
    b("mod", &[p(Gen(F), &[Gen(F), Scalar(F)]), p(Gen(F), &[Gen(F), Gen(F)])]),
    b("min", MIN_MAX),
    b("max", MIN_MAX),
    b(
        "clamp",
        &[
            p(Gen(F), &[Gen(F), Gen(F), Gen(F)]),
            p(Gen(F), &[Gen(F), Scalar(F), Scalar(F)]),
            p(Gen(I), &[Gen(I), Gen(I), Gen(I)]),
            p(Gen(I), &[Gen(I), Scalar(I), Scalar(I)]),
            p(Gen(U), &[Gen(U), Gen(U), Gen(U)]),
            p(Gen(U), &[Gen(U), Scalar(U), Scalar(U)]),
        ],
    ),
    b(
        "mix",
        &[
            p(Gen(F), &[Gen(F), Gen(F), Gen(F)]),
            p(Gen(F), &[Gen(F), Gen(F), Scalar(F)]),
            p(Gen(F), &[Gen(F), Gen(F), Gen(B)]),
        ],
    ),
    b("step", &[p(Gen(F), &[Gen(F), Gen(F)]), p(Gen(F), &[Scalar(F), Gen(F)])]),
    b(
        "smoothstep",
        &[
            p(Gen(F), &[Gen(F), Gen(F), Gen(F)]),
            p(Gen(F), &[Scalar(F), Scalar(F), Gen(F)]),
        ],
    ),
    b("isnan", &[p(Gen(B), &[Gen(F)])]),
    b("isinf", &[p(Gen(B), &[Gen(F)])]),
    b("floatBitsToInt", &[p(Gen(I), &[Gen(F)])]),
    b("floatBitsToUint", &[p(Gen(U), &[Gen(F)])]),
    b("intBitsToFloat", &[p(Gen(F), &[Gen(I)])]),
    b("uintBitsToFloat", &[p(Gen(F), &[Gen(U)])]),
    // packing
    b("packSnorm2x16", &[p(Scalar(U), &[Vector(F, 2)])]),
    b("unpackSnorm2x16", &[p(Vector(F, 2), &[Scalar(U)])]),
    b("packUnorm2x16", &[p(Scalar(U), &[Vector(F, 2)])]),
    b("unpackUnorm2x16", &[p(Vector(F, 2), &[Scalar(U)])]),
    b("packHalf2x16", &[p(Scalar(U), &[Vector(F, 2)])]),
    b("unpackHalf2x16", &[p(Vector(F, 2), &[Scalar(U)])]),
    // geometric
    b("length", &[p(Scalar(F), &[Gen(F)])]),
    b("distance", &[p(Scalar(F), &[Gen(F), Gen(F)])]),
    b("dot", &[p(Scalar(F), &[Gen(F), Gen(F)])]),
    b("cross", &[p(Vector(F, 3), &[Vector(F, 3), Vector(F, 3)])]),
    b("normalize", GEN1),
    b("faceforward", &[p(Gen(F), &[Gen(F), Gen(F), Gen(F)])]),
    b("reflect", GEN2),
    b("refract", &[p(Gen(F), &[Gen(F), Gen(F), Scalar(F)])]),
    // matrix
    b("matrixCompMult", &[p(AnyMat, &[AnyMat, AnyMat])]),
    b(
        "outerProduct",
        &[
            p(Matrix(2, 2), &[Vector(F, 2), Vector(F, 2)]),
            p(Matrix(3, 3), &[Vector(F, 3), Vector(F, 3)]),
            p(Matrix(4, 4), &[Vector(F, 4), Vector(F, 4)]),
            p(Matrix(2, 3), &[Vector(F, 3), Vector(F, 2)]),
            p(Matrix(3, 2), &[Vector(F, 2), Vector(F, 3)]),
            p(Matrix(2, 4), &[Vector(F, 4), Vector(F, 2)]),
            p(Matrix(4, 2), &[Vector(F, 2), Vector(F, 4)]),
            p(Matrix(3, 4), &[Vector(F, 4), Vector(F, 3)]),
            p(Matrix(4, 3), &[Vector(F, 3), Vector(F, 4)]),
        ],
    ),
    b(
        "transpose",
        &[
            p(Matrix(2, 2), &[Matrix(2, 2)]),
            p(Matrix(3, 3), &[Matrix(3, 3)]),
            p(Matrix(4, 4), &[Matrix(4, 4)]),
            p(Matrix(3, 2), &[Matrix(2, 3)]),
            p(Matrix(2, 3), &[Matrix(3, 2)]),
            p(Matrix(4, 2), &[Matrix(2, 4)]),
            p(Matrix(2, 4), &[Matrix(4, 2)]),
            p(Matrix(4, 3), &[Matrix(3, 4)]),
            p(Matrix(3, 4), &[Matrix(4, 3)]),
        ],
    ),
    b(
        "determinant",
        &[
            p(Scalar(F), &[Matrix(2, 2)]),
            p(Scalar(F), &[Matrix(3, 3)]),
            p(Scalar(F), &[Matrix(4, 4)]),
        ],
    ),
    b(
        "inverse",
        &[
            p(Matrix(2, 2), &[Matrix(2, 2)]),
            p(Matrix(3, 3), &[Matrix(3, 3)]),
            p(Matrix(4, 4), &[Matrix(4, 4)]),
        ],
    ),
    // vector relational
    b("lessThan", REL),
    b("lessThanEqual", REL),
    b("greaterThan", REL),
    b("greaterThanEqual", REL),
    b("equal", EQ_REL),
    b("notEqual", EQ_REL),
    b("any", &[p(Scalar(B), &[AnyVec(B)])]),
    b("all", &[p(Scalar(B), &[AnyVec(B)])]),
    b("not", &[p(AnyVec(B), &[AnyVec(B)])]),
    // derivatives
    b("dFdx", GEN1),
    b("dFdy", GEN1),
    b("fwidth", GEN1),
];

/// Look up a builtin by name.
///
/// The search is linear over `BUILTINS` because the table is small.
pub fn find_builtin(name: &str) -> Option<&'static BuiltinDescriptor> {
    BUILTINS.iter().find(|builtin| builtin.name == name)
}

/// Identity of a generic tag; each distinct generic slot locks separately.
fn tag(slot: Slot) -> Option<Slot> {
    match slot {
        Gen(_) | AnyVec(_) | AnyMat => Some(slot),
        _ => None,
    }
}

fn slot_accepts(slot: Slot, ty: &Type) -> bool {
    match (slot, ty) {
        (Scalar(k), Type::Scalar(t)) => k == *t,
        (Vector(k, n), Type::Vector(t, m)) => k == *t && n == *m,
        (Matrix(c, r), Type::Matrix { cols, rows }) => c == *cols && r == *rows,
        (Gen(k), Type::Scalar(t)) | (Gen(k), Type::Vector(t, _)) => k == *t,
        (AnyVec(k), Type::Vector(t, _)) => k == *t,
        (AnyMat, Type::Matrix { .. }) => true,
        _ => false,
    }
}

fn concrete(slot: Slot) -> Option<Type> {
    match slot {
        Scalar(k) => Some(Type::Scalar(k)),
        Vector(k, n) => Some(Type::Vector(k, n)),
        Matrix(cols, rows) => Some(Type::Matrix { cols, rows }),
        _ => None,
    }
}

fn vector_size(ty: &Type) -> Option<u8> {
    match ty {
        Type::Scalar(_) => Some(1),
        Type::Vector(_, n) => Some(*n),
        _ => None,
    }
}

impl Prototype {
    /// Try to match concrete argument types against this prototype,
    /// returning the resolved return type.
    ///
    /// A generic slot locks to the type of its first occurrence and every
    /// later occurrence of the same tag must match it exactly. All generic
    /// scalar/vector slots must also agree on component count, as they do
    /// in every GLSL built-in.
    pub fn resolve(&self, args: &[Type]) -> Option<Type> {
        if args.len() != self.params.len() {
            return None;
        }
        let mut locks: Vec<(Slot, Type)> = Vec::new();
        let mut size: Option<u8> = None;
        for (slot, arg) in self.params.iter().zip(args) {
            if !slot_accepts(*slot, arg) {
                return None;
            }
            let Some(tag) = tag(*slot) else {
                continue;
            };
            if let Some((_, locked)) = locks.iter().find(|(t, _)| *t == tag) {
                if locked != arg {
                    return None;
                }
                continue;
            }
            if let Some(n) = vector_size(arg) {
                match size {
                    Some(expected) if expected != n => return None,
                    _ => size = Some(n),
                }
            }
            locks.push((tag, arg.clone()));
        }

        if let Some(ty) = concrete(self.ret) {
            return Some(ty);
        }
        if let Some((_, locked)) = locks.iter().find(|(t, _)| *t == self.ret) {
            return Some(locked.clone());
        }
        match self.ret {
            Gen(kind) | AnyVec(kind) => size.map(|n| Type::with_size(kind, n)),
            _ => None,
        }
    }
}

impl BuiltinDescriptor {
    /// Pick the first prototype accepting `args`.
    pub fn resolve(&self, args: &[Type]) -> Option<Type> {
        self.prototypes.iter().find_map(|proto| proto.resolve(args))
    }
}
