mod swizzle;
pub use self::swizzle::*;

#[derive(Debug, Clone)]
pub struct Located<T> {
    pub t: T,
    pub line: usize,
    pub col: usize,
}

pub trait BoolToErrorHelper {
    fn or_err<E>(self, f: impl FnOnce() -> E) -> Result<(), E>;
}
impl BoolToErrorHelper for bool {
    #[inline(always)]
    fn or_err<E>(self, f: impl FnOnce() -> E) -> Result<(), E> {
        if !self {
            Err(f())
        } else {
            Ok(())
        }
    }
}
