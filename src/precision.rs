/// Precision qualifier attached to variables and expressions.
///
/// Ordered as a lattice: `Undefined < Low < Medium < High`. `Undefined` is
/// the identity of [`higher_precision`], `High` its top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Precision {
    #[default]
    Undefined,
    Low,
    Medium,
    High,
}
impl Precision {
    #[inline(always)]
    pub const fn is_defined(self) -> bool {
        !matches!(self, Self::Undefined)
    }

    pub const fn qualifier(self) -> Option<&'static str> {
        match self {
            Self::Undefined => None,
            Self::Low => Some("lowp"),
            Self::Medium => Some("mediump"),
            Self::High => Some("highp"),
        }
    }

    pub fn from_qualifier(s: &str) -> Option<Self> {
        match s {
            "lowp" => Some(Self::Low),
            "mediump" => Some(Self::Medium),
            "highp" => Some(Self::High),
            _ => None,
        }
    }
}

/// Join of the precision lattice.
#[inline]
pub fn higher_precision(a: Precision, b: Precision) -> Precision {
    a.max(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Precision; 4] = [
        Precision::Undefined,
        Precision::Low,
        Precision::Medium,
        Precision::High,
    ];

    #[test]
    fn join_is_commutative_and_monotonic() {
        for a in ALL {
            for b in ALL {
                let j = higher_precision(a, b);
                assert_eq!(j, higher_precision(b, a));
                assert!(j >= a && j >= b);
            }
        }
    }

    #[test]
    fn join_is_associative() {
        for a in ALL {
            for b in ALL {
                for c in ALL {
                    assert_eq!(
                        higher_precision(higher_precision(a, b), c),
                        higher_precision(a, higher_precision(b, c))
                    );
                }
            }
        }
    }

    #[test]
    fn undefined_is_identity_and_high_is_top() {
        for a in ALL {
            assert_eq!(higher_precision(Precision::Undefined, a), a);
            assert_eq!(higher_precision(Precision::High, a), Precision::High);
        }
    }
}
