pub const fn swizzle_indices(x: &str, src_component_count: u8) -> Option<[Option<usize>; 4]> {
    match x.as_bytes() {
        &[a] => Some([swizzle_index(a, src_component_count), None, None, None]),
        &[a, b] => Some([
            swizzle_index(a, src_component_count),
            swizzle_index(b, src_component_count),
            None,
            None,
        ]),
        &[a, b, c] => Some([
            swizzle_index(a, src_component_count),
            swizzle_index(b, src_component_count),
            swizzle_index(c, src_component_count),
            None,
        ]),
        &[a, b, c, d] => Some([
            swizzle_index(a, src_component_count),
            swizzle_index(b, src_component_count),
            swizzle_index(c, src_component_count),
            swizzle_index(d, src_component_count),
        ]),
        _ => None,
    }
}

pub const fn swizzle_index(x: u8, src_component_count: u8) -> Option<usize> {
    match x {
        b'r' | b'x' | b's' if src_component_count >= 1 => Some(0),
        b'g' | b'y' | b't' if src_component_count >= 2 => Some(1),
        b'b' | b'z' | b'p' if src_component_count >= 3 => Some(2),
        b'a' | b'w' | b'q' if src_component_count >= 4 => Some(3),
        _ => None,
    }
}

/// Canonical `xyzw` spelling of a component index.
pub const fn swizzle_char(index: u8) -> char {
    match index {
        0 => 'x',
        1 => 'y',
        2 => 'z',
        _ => 'w',
    }
}

/// Components written by a writemask, in order.
pub fn writemask_components(mask: u8) -> impl Iterator<Item = u8> {
    (0..4).filter(move |c| mask & (1 << c) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_naming_set() {
        assert_eq!(swizzle_indices("xy", 2), Some([Some(0), Some(1), None, None]));
        assert_eq!(swizzle_indices("ba", 4), Some([Some(2), Some(3), None, None]));
        assert_eq!(swizzle_indices("st", 2), Some([Some(0), Some(1), None, None]));
        assert_eq!(swizzle_indices("z", 2), Some([None, None, None, None]));
        assert_eq!(swizzle_indices("xyzwx", 4), None);
    }

    #[test]
    fn writemask_order() {
        assert_eq!(writemask_components(0b1010).collect::<Vec<_>>(), vec![1, 3]);
    }
}
