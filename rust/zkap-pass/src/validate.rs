use crate::{Pass, SigningKey};

/// Checks a single pass against `message` using the server's signing key.
///
/// A pass that cannot be decoded is not valid; the reason is only logged.
pub fn is_valid(signing_key: &SigningKey, message: &str, pass: &Pass) -> bool {
    let (preimage, signature) = match pass.decode() {
        Ok(parts) => parts,
        Err(error) => {
            tracing::trace!(%error, "malformed pass");
            return false;
        }
    };

    signing_key
        .rederive_unblinded_token(&preimage)
        .derive_verification_key()
        .verify(message.as_bytes(), &signature)
}

/// Returns the passes that are individually valid for `message`, in the
/// order they were given.
pub fn filter_valid<'a>(
    signing_key: &SigningKey,
    message: &str,
    passes: &'a [Pass],
) -> Vec<&'a Pass> {
    passes
        .iter()
        .filter(|pass| is_valid(signing_key, message, pass))
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{make_invalid_passes, make_passes, random_unblinded_tokens, tokens_to_passes};

    const MESSAGE: &str = "allocate_buckets AAAAAAAAAAAAAAAAAAAAAA==";

    #[test_log::test]
    fn it_accepts_passes_made_for_the_message() {
        let key = SigningKey::random();
        let passes = make_passes(&key, MESSAGE, 3);

        assert!(passes.iter().all(|pass| is_valid(&key, MESSAGE, pass)));
    }

    #[test_log::test]
    fn it_rejects_passes_made_for_another_message() {
        let key = SigningKey::random();
        let passes = make_passes(&key, MESSAGE, 2);

        for other in [
            "allocate_buckets AQEBAQEBAQEBAQEBAQEBAQ==",
            "add_lease AAAAAAAAAAAAAAAAAAAAAA==",
            "slot_testv_and_readv_and_writev AAAAAAAAAAAAAAAAAAAAAA==",
        ] {
            assert!(passes.iter().all(|pass| !is_valid(&key, other, pass)));
        }
    }

    #[test_log::test]
    fn it_rejects_passes_from_another_issuer() {
        let passes = make_passes(&SigningKey::random(), MESSAGE, 2);
        let key = SigningKey::random();

        assert!(filter_valid(&key, MESSAGE, &passes).is_empty());
    }

    #[test_log::test]
    fn it_treats_garbage_as_invalid() {
        let key = SigningKey::random();
        let passes = vec![
            Pass::from(""),
            Pass::from(" "),
            Pass::from("not a pass"),
            Pass::from(vec![0xff, 0x20, 0xfe]),
        ];

        assert!(filter_valid(&key, MESSAGE, &passes).is_empty());
    }

    #[test_log::test]
    fn it_keeps_only_the_valid_passes_in_order() {
        let key = SigningKey::random();
        let valid = make_passes(&key, MESSAGE, 3);
        let invalid = make_invalid_passes(MESSAGE, 2);
        let mixed = vec![
            valid[0].clone(),
            invalid[0].clone(),
            valid[1].clone(),
            invalid[1].clone(),
            valid[2].clone(),
        ];

        let filtered = filter_valid(&key, MESSAGE, &mixed);
        assert_eq!(filtered, valid.iter().collect::<Vec<_>>());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn it_filters_to_a_stable_subsequence(validity in prop::collection::vec(any::<bool>(), 0..12)) {
            let key = SigningKey::random();
            let valid_tokens = random_unblinded_tokens(&key, validity.len());
            let invalid_tokens = random_unblinded_tokens(&SigningKey::random(), validity.len());
            let passes = validity
                .iter()
                .enumerate()
                .map(|(index, valid)| {
                    let token = if *valid { &valid_tokens[index] } else { &invalid_tokens[index] };
                    tokens_to_passes(MESSAGE, std::slice::from_ref(token)).remove(0)
                })
                .collect::<Vec<_>>();

            let first = filter_valid(&key, MESSAGE, &passes);
            let second = filter_valid(&key, MESSAGE, &passes);
            prop_assert_eq!(&first, &second);

            let expected = passes
                .iter()
                .zip(&validity)
                .filter(|(_, valid)| **valid)
                .map(|(pass, _)| pass)
                .collect::<Vec<_>>();
            prop_assert_eq!(first, expected);
        }
    }
}
