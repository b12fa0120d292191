//! Pass arithmetic shared by clients and servers.
//!
//! Both sides must agree on these numbers exactly: a client that computes
//! fewer passes than the server is rejected, one that computes more wastes
//! tokens.

use std::{collections::BTreeSet, num::NonZeroU64};

use zkap_common::ShareNumber;

use crate::{NoWritesError, ShareWriteShape};

/// The default number of bytes one pass pays for.
pub const BYTES_PER_PASS: NonZeroU64 = match NonZeroU64::new(1024 * 1024) {
    Some(value) => value,
    None => panic!("pass value must be positive"),
};

/// The number of passes needed to pay for `size` bytes.
pub fn required_for_bytes(bytes_per_pass: NonZeroU64, size: u64) -> u64 {
    size.div_ceil(bytes_per_pass.get())
}

/// The number of passes needed to allocate `allocated_size` bytes for each of
/// `sharenums`.
///
/// Only the size is charged; allocating more shares of the same size costs
/// the same.
pub fn required_for_allocation(
    bytes_per_pass: NonZeroU64,
    _sharenums: &BTreeSet<ShareNumber>,
    allocated_size: u64,
) -> u64 {
    required_for_bytes(bytes_per_pass, allocated_size)
}

/// The shares that `shape` writes data to.
pub fn shares_written(shape: &ShareWriteShape) -> BTreeSet<ShareNumber> {
    shape
        .iter()
        .filter(|(_, vectors)| vectors.has_writes())
        .map(|(share, _)| *share)
        .collect()
}

/// The largest end offset of any fragment `shape` writes.
pub fn max_offset_written(shape: &ShareWriteShape) -> Result<u64, NoWritesError> {
    shape
        .values()
        .flat_map(|vectors| vectors.write.iter())
        .map(|fragment| fragment.end())
        .max()
        .ok_or(NoWritesError)
}

/// The number of passes needed for a mutable write with `shape`, charged for
/// its single largest write.
pub fn required_for_mutable_write(
    bytes_per_pass: NonZeroU64,
    shape: &ShareWriteShape,
) -> Result<u64, NoWritesError> {
    Ok(required_for_allocation(
        bytes_per_pass,
        &shares_written(shape),
        max_offset_written(shape)?,
    ))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{TestVector, TestWriteVectors, WriteVector};

    fn pass_value(value: u64) -> NonZeroU64 {
        NonZeroU64::new(value).unwrap()
    }

    fn write(offset: u64, length: usize) -> WriteVector {
        WriteVector {
            offset,
            data: vec![0; length],
        }
    }

    #[test]
    fn it_charges_nothing_for_nothing() {
        assert_eq!(required_for_bytes(BYTES_PER_PASS, 0), 0);
    }

    #[test]
    fn it_rounds_partial_passes_up() {
        let value = pass_value(1_000_000);
        assert_eq!(required_for_bytes(value, 1), 1);
        assert_eq!(required_for_bytes(value, 1_000_000), 1);
        assert_eq!(required_for_bytes(value, 1_000_001), 2);
        assert_eq!(required_for_bytes(value, 2_500_000), 3);
    }

    #[test]
    fn it_handles_sizes_near_the_top_of_the_range() {
        assert_eq!(required_for_bytes(pass_value(1), u64::MAX), u64::MAX);
        assert_eq!(required_for_bytes(pass_value(u64::MAX), u64::MAX), 1);
    }

    #[test]
    fn it_does_not_charge_for_share_fan_out() {
        let value = pass_value(1_000_000);
        let one = BTreeSet::from([0]);
        let ten = (0..10).collect::<BTreeSet<ShareNumber>>();

        assert_eq!(required_for_allocation(value, &one, 2_500_000), 3);
        assert_eq!(required_for_allocation(value, &ten, 2_500_000), 3);
    }

    #[test]
    fn it_finds_the_shares_and_extent_of_a_write() -> anyhow::Result<()> {
        let shape = ShareWriteShape::from([
            (
                0,
                TestWriteVectors {
                    write: vec![write(0, 10), write(100, 50)],
                    ..Default::default()
                },
            ),
            (
                1,
                TestWriteVectors {
                    test: vec![TestVector {
                        offset: 0,
                        specimen: vec![1],
                    }],
                    ..Default::default()
                },
            ),
            (
                2,
                TestWriteVectors {
                    write: vec![write(20, 30)],
                    new_length: Some(5),
                    ..Default::default()
                },
            ),
        ]);

        assert_eq!(shares_written(&shape), BTreeSet::from([0, 2]));
        assert_eq!(max_offset_written(&shape)?, 150);
        assert_eq!(required_for_mutable_write(pass_value(100), &shape)?, 2);
        Ok(())
    }

    #[test]
    fn it_refuses_to_price_a_write_without_writes() {
        let shape = ShareWriteShape::from([(0, TestWriteVectors::default())]);

        assert!(shares_written(&shape).is_empty());
        assert_eq!(max_offset_written(&shape), Err(NoWritesError));
        assert_eq!(
            required_for_mutable_write(BYTES_PER_PASS, &shape),
            Err(NoWritesError)
        );
    }

    proptest! {
        #[test]
        fn it_charges_the_ceiling_of_size_over_pass_value(
            value in 1u64..=u64::MAX,
            size in any::<u64>(),
        ) {
            let required = required_for_bytes(pass_value(value), size);
            let expected = size / value + u64::from(size % value != 0);
            prop_assert_eq!(required, expected);
        }

        #[test]
        fn it_never_charges_less_for_more_bytes(
            value in 1u64..=10_000_000,
            smaller in 0u64..u64::MAX / 2,
            extra in 0u64..u64::MAX / 2,
        ) {
            let value = pass_value(value);
            prop_assert!(
                required_for_bytes(value, smaller) <= required_for_bytes(value, smaller + extra)
            );
        }
    }
}
