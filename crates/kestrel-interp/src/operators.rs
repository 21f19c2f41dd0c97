//! Built-in operator precedence and primitive arithmetic/comparison
//! evaluation. spec.md leaves the reduction order of an `expressionsSequence`
//! an open question (its own worked example only pins the *result*: `1 + 2 *
//! 3` evaluates to `7`, which only standard precedence -- not pure
//! left-to-right -- produces). `eval.rs`'s precedence-climbing reducer
//! consults this table; `as`/`in`/`is` are handled separately since they're
//! subsequential, not precedence-climbed.

use kestrel_types::{PredefinedKind, PrimitiveKind, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// Precedence tiers, highest-binds-tightest first. Mirrors the common C-like
/// ladder: multiplicative > additive > comparison > equality > logical-and >
/// logical-or > null-coalescing > assignment.
pub fn precedence_of(op: &str) -> Option<(u8, Associativity)> {
    use Associativity::*;
    Some(match op {
        "*" | "/" | "%" => (9, Left),
        "+" | "-" => (8, Left),
        "<" | ">" | "<=" | ">=" => (7, Left),
        "==" | "!=" => (6, Left),
        "&&" => (5, Left),
        "||" => (4, Left),
        "??" => (3, Right),
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" => (1, Right),
        _ => return None,
    })
}

fn as_int(v: &Type) -> Option<i64> {
    match v {
        Type::Primitive(PrimitiveKind::Integer(Some(n))) => Some(*n),
        _ => None,
    }
}

fn as_float(v: &Type) -> Option<f64> {
    match v {
        Type::Primitive(PrimitiveKind::Float(Some(n))) => Some(*n),
        Type::Primitive(PrimitiveKind::Integer(Some(n))) => Some(*n as f64),
        _ => None,
    }
}

fn as_string(v: &Type) -> Option<String> {
    match v {
        Type::Primitive(PrimitiveKind::String(Some(s))) => Some(s.clone()),
        _ => None,
    }
}

fn as_bool(v: &Type) -> bool {
    match v {
        Type::Primitive(PrimitiveKind::Boolean(Some(b))) => *b,
        Type::Predefined(PredefinedKind::Void) => false,
        _ => true,
    }
}

fn int(n: i64) -> Type {
    Type::Primitive(PrimitiveKind::Integer(Some(n)))
}
fn float(n: f64) -> Type {
    Type::Primitive(PrimitiveKind::Float(Some(n)))
}
fn string(s: impl Into<String>) -> Type {
    Type::Primitive(PrimitiveKind::String(Some(s.into())))
}
fn boolean(b: bool) -> Type {
    Type::Primitive(PrimitiveKind::Boolean(Some(b)))
}

/// Evaluates a built-in binary operator over two already-reduced values.
/// String `+` concatenates; `==`/`!=` fall back to canonical-string
/// comparison so composites and dictionaries compare structurally rather
/// than only primitives. Returns `Err(message)` for a type mismatch the
/// caller should report as an interpreter diagnostic (spec.md's `Report`
/// event, level `Error`).
pub fn eval_binary(op: &str, lhs: &Type, rhs: &Type) -> Result<Type, String> {
    match op {
        "+" => {
            if let (Some(a), Some(b)) = (as_string(lhs), as_string(rhs)) {
                return Ok(string(a + &b));
            }
            numeric(lhs, rhs, |a, b| a + b, |a, b| a.wrapping_add(b))
        }
        "-" => numeric(lhs, rhs, |a, b| a - b, |a, b| a.wrapping_sub(b)),
        "*" => numeric(lhs, rhs, |a, b| a * b, |a, b| a.wrapping_mul(b)),
        "/" => {
            if let (Some(a), Some(b)) = (as_int(lhs), as_int(rhs)) {
                if b == 0 {
                    return Err("division by zero".into());
                }
                return Ok(int(a / b));
            }
            numeric(lhs, rhs, |a, b| a / b, |a, b| a / b.max(1))
        }
        "%" => {
            if let (Some(a), Some(b)) = (as_int(lhs), as_int(rhs)) {
                if b == 0 {
                    return Err("division by zero".into());
                }
                return Ok(int(a % b));
            }
            numeric(lhs, rhs, |a, b| a % b, |a, b| a % b.max(1))
        }
        "<" => compare(lhs, rhs, |o| o == std::cmp::Ordering::Less),
        ">" => compare(lhs, rhs, |o| o == std::cmp::Ordering::Greater),
        "<=" => compare(lhs, rhs, |o| o != std::cmp::Ordering::Greater),
        ">=" => compare(lhs, rhs, |o| o != std::cmp::Ordering::Less),
        "==" => Ok(boolean(lhs.normalize().canonical_string() == rhs.normalize().canonical_string())),
        "!=" => Ok(boolean(lhs.normalize().canonical_string() != rhs.normalize().canonical_string())),
        "&&" => Ok(boolean(as_bool(lhs) && as_bool(rhs))),
        "||" => Ok(boolean(as_bool(lhs) || as_bool(rhs))),
        "??" => Ok(if lhs.is_void() { rhs.clone() } else { lhs.clone() }),
        _ => Err(format!("unsupported operator '{op}'")),
    }
}

fn numeric(lhs: &Type, rhs: &Type, on_float: impl Fn(f64, f64) -> f64, on_int: impl Fn(i64, i64) -> i64) -> Result<Type, String> {
    match (as_int(lhs), as_int(rhs)) {
        (Some(a), Some(b)) => return Ok(int(on_int(a, b))),
        _ => {}
    }
    match (as_float(lhs), as_float(rhs)) {
        (Some(a), Some(b)) => Ok(float(on_float(a, b))),
        _ => Err("operands are not numeric".into()),
    }
}

fn compare(lhs: &Type, rhs: &Type, accept: impl Fn(std::cmp::Ordering) -> bool) -> Result<Type, String> {
    if let (Some(a), Some(b)) = (as_int(lhs), as_int(rhs)) {
        return Ok(boolean(accept(a.cmp(&b))));
    }
    if let (Some(a), Some(b)) = (as_float(lhs), as_float(rhs)) {
        return Ok(boolean(accept(a.partial_cmp(&b).ok_or("unordered comparison")?)));
    }
    if let (Some(a), Some(b)) = (as_string(lhs), as_string(rhs)) {
        return Ok(boolean(accept(a.cmp(&b))));
    }
    Err("operands are not comparable".into())
}

/// Evaluates a built-in unary operator.
pub fn eval_unary(op: &str, operand: &Type) -> Result<Type, String> {
    match op {
        "-" => match operand {
            Type::Primitive(PrimitiveKind::Integer(Some(n))) => Ok(int(-n)),
            Type::Primitive(PrimitiveKind::Float(Some(n))) => Ok(float(-n)),
            _ => Err("'-' requires a numeric operand".into()),
        },
        "!" => Ok(boolean(!as_bool(operand))),
        "+" => Ok(operand.clone()),
        _ => Err(format!("unsupported prefix operator '{op}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_orders_multiplicative_above_additive() {
        let (mul, _) = precedence_of("*").unwrap();
        let (add, _) = precedence_of("+").unwrap();
        assert!(mul > add);
    }

    #[test]
    fn integer_arithmetic_follows_precedence_result() {
        // 1 + 2 * 3 => 7 under precedence climbing, matching the worked
        // example's expected interpreter result.
        let two_times_three = eval_binary("*", &int(2), &int(3)).unwrap();
        let total = eval_binary("+", &int(1), &two_times_three).unwrap();
        assert_eq!(as_int(&total), Some(7));
    }

    #[test]
    fn string_plus_concatenates() {
        let r = eval_binary("+", &string("x="), &string("3")).unwrap();
        assert_eq!(as_string(&r).as_deref(), Some("x=3"));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(eval_binary("/", &int(1), &int(0)).is_err());
    }

    #[test]
    fn nil_coalescing_prefers_lhs_when_present() {
        let r = eval_binary("??", &int(5), &int(9)).unwrap();
        assert_eq!(as_int(&r), Some(5));
        let r2 = eval_binary("??", &Type::void(), &int(9)).unwrap();
        assert_eq!(as_int(&r2), Some(9));
    }
}
