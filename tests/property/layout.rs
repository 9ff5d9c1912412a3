// Property-based tests for class layout, type unification and the data segment.
//
// Run with more cases (default is 256):
//   PROPTEST_CASES=1000 cargo test --test layout_properties

use charon::data::DataSegment;
use charon::types::unify;
use charon::{Codegen, IrType};
use proptest::prelude::*;

fn native_type() -> impl Strategy<Value = IrType> {
    prop_oneof![
        Just(IrType::I32),
        Just(IrType::I64),
        Just(IrType::F32),
        Just(IrType::F64),
    ]
}

fn attribute_type() -> impl Strategy<Value = IrType> {
    prop_oneof![
        4 => native_type(),
        1 => Just(IrType::class("Node")),
    ]
}

proptest! {
    #[test]
    fn offsets_are_running_sums(types in prop::collection::vec(attribute_type(), 0..24)) {
        let mut cg = Codegen::default();
        let class = cg.declare_class("Node").unwrap();

        let mut expected = 0u32;
        for (i, ty) in types.iter().enumerate() {
            let offset = cg.declare_attribute(class, &format!("a{i}"), ty.clone()).unwrap();
            prop_assert_eq!(offset, expected);
            expected += ty.size();
        }
        prop_assert_eq!(cg.class_size("Node").unwrap(), expected);
    }

    #[test]
    fn integer_unification_is_symmetric(a in prop_oneof![Just(IrType::I32), Just(IrType::I64)],
                                        b in prop_oneof![Just(IrType::I32), Just(IrType::I64)]) {
        let ab = unify(&[a.clone(), b.clone()]).unwrap();
        let ba = unify(&[b.clone(), a.clone()]).unwrap();
        prop_assert_eq!(&ab, &ba);
        prop_assert_eq!(ab.size(), a.size().max(b.size()));
    }

    #[test]
    fn a_class_operand_always_wins(ty in native_type(), class_first in any::<bool>()) {
        let class = IrType::class("Point");
        let operands = if class_first { [class.clone(), ty] } else { [ty, class.clone()] };
        prop_assert_eq!(unify(&operands).unwrap(), class);
    }

    #[test]
    fn data_blocks_are_aligned_and_disjoint(sizes in prop::collection::vec(0u32..64, 1..16),
                                            align_log in 0u32..4) {
        let align = 1 << align_log;
        let mut data = DataSegment::new(1024, align);
        for (i, size) in sizes.iter().enumerate() {
            data.reserve(format!("b{i}"), *size).unwrap();
        }
        let blocks = data.blocks();
        for pair in blocks.windows(2) {
            prop_assert!(pair[0].address + pair[0].bytes.len() as u32 <= pair[1].address);
        }
        for block in blocks {
            prop_assert_eq!(block.address % align, 0);
            prop_assert!(block.address >= 1024);
        }
        prop_assert!(data.end() >= u64::from(blocks[blocks.len() - 1].address));
    }
}
