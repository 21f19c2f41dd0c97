//! The variadic-aware list matcher (spec.md §4.4), shared by function
//! parameter-list acceptance and generic-argument-list acceptance: a
//! nondeterministic left-to-right match with backtracking, one expected
//! type per position, where a `Variadic` expected type may consume zero or
//! more provided items.

use crate::composite::CompositeInfo;
use crate::ty::Type;

/// True iff `provided` can be consumed left-to-right against `expected`,
/// where each non-variadic expected type consumes exactly one provided item
/// it accepts, and each variadic expected type consumes a run of zero or
/// more items it all accept.
pub fn match_list(expected: &[Type], provided: &[Type], info: &dyn CompositeInfo) -> bool {
    match_from(expected, provided, 0, 0, info)
}

fn match_from(expected: &[Type], provided: &[Type], i: usize, j: usize, info: &dyn CompositeInfo) -> bool {
    if i == expected.len() {
        return j == provided.len();
    }

    match &expected[i] {
        Type::Variadic(inner) => {
            let is_last = i + 1 == expected.len();
            match inner.as_deref() {
                None => {
                    // Variadic(absent) accepts anything; consume the rest
                    // greedily on the terminal slot, otherwise try every
                    // split point since later expected types still need a
                    // chance at the remainder.
                    if is_last {
                        true
                    } else {
                        (j..=provided.len()).any(|k| match_from(expected, provided, i + 1, k, info))
                    }
                }
                Some(element_ty) => {
                    if is_last {
                        provided[j..].iter().all(|p| element_ty.accepts_a(p, info))
                    } else {
                        let mut k = j;
                        loop {
                            if match_from(expected, provided, i + 1, k, info) {
                                return true;
                            }
                            if k >= provided.len() || !element_ty.accepts_a(&provided[k], info) {
                                return false;
                            }
                            k += 1;
                        }
                    }
                }
            }
        }
        e => {
            if j >= provided.len() {
                return false;
            }
            e.accepts_a(&provided[j], info) && match_from(expected, provided, i + 1, j + 1, info)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::NullCompositeInfo;
    use crate::ty::PrimitiveKind;

    const INFO: NullCompositeInfo = NullCompositeInfo;

    fn int_ty() -> Type {
        Type::Primitive(PrimitiveKind::Integer(None))
    }

    fn string_ty() -> Type {
        Type::Primitive(PrimitiveKind::String(None))
    }

    fn int_val(n: i64) -> Type {
        Type::Primitive(PrimitiveKind::Integer(Some(n)))
    }

    fn string_val(s: &str) -> Type {
        Type::Primitive(PrimitiveKind::String(Some(s.to_string())))
    }

    #[test]
    fn exact_arity_matches_positionally() {
        let expected = vec![int_ty(), string_ty()];
        let provided = vec![int_val(1), string_val("a")];
        assert!(match_list(&expected, &provided, &INFO));
    }

    #[test]
    fn wrong_arity_fails() {
        let expected = vec![int_ty(), string_ty()];
        let provided = vec![int_val(1)];
        assert!(!match_list(&expected, &provided, &INFO));
    }

    #[test]
    fn terminal_variadic_consumes_any_remaining_count() {
        let expected = vec![int_ty(), Type::Variadic(Some(Box::new(int_ty())))];
        assert!(match_list(&expected, &[int_val(1)], &INFO));
        assert!(match_list(&expected, &[int_val(1), int_val(2), int_val(3)], &INFO));
        assert!(!match_list(&expected, &[int_val(1), string_val("oops")], &INFO));
    }

    #[test]
    fn middle_variadic_backtracks_to_satisfy_trailing_expected() {
        let expected = vec![Type::Variadic(Some(Box::new(int_ty()))), string_ty()];
        let provided = vec![int_val(1), int_val(2), string_val("tail")];
        assert!(match_list(&expected, &provided, &INFO));
    }

    #[test]
    fn absent_variadic_accepts_anything_for_remaining_slots() {
        let expected = vec![Type::Variadic(None), string_ty()];
        let provided = vec![int_val(1), int_val(2), string_val("tail")];
        assert!(match_list(&expected, &provided, &INFO));
    }

    #[test]
    fn empty_expected_matches_only_empty_provided() {
        assert!(match_list(&[], &[], &INFO));
        assert!(!match_list(&[], &[int_val(1)], &INFO));
    }
}
