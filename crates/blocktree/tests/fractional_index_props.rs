use blocktree::FractionalIndex;
use proptest::prelude::*;

fn small_index() -> impl Strategy<Value = FractionalIndex> {
    (0u8..8).prop_map(|depth| {
        let mut idx = FractionalIndex::default_index();
        for i in 0..depth {
            idx = if i % 2 == 0 { FractionalIndex::after(&idx) } else { FractionalIndex::before(&idx) };
        }
        idx
    })
}

proptest! {
    #[test]
    fn after_is_always_greater(idx in small_index()) {
        prop_assert!(FractionalIndex::after(&idx) > idx);
    }

    #[test]
    fn before_is_always_less(idx in small_index()) {
        prop_assert!(FractionalIndex::before(&idx) < idx);
    }

    #[test]
    fn between_stays_strictly_inside_the_gap(a in small_index(), b in small_index()) {
        let (left, right) = if a < b { (a, b) } else if b < a { (b, a) } else { return Ok(()); };
        let mid = FractionalIndex::between(&left, &right).unwrap();
        prop_assert!(left < mid);
        prop_assert!(mid < right);
    }

    #[test]
    fn every_constructed_key_ends_in_the_terminator(idx in small_index()) {
        prop_assert_eq!(*idx.as_bytes().last().unwrap(), 128u8);
    }
}
