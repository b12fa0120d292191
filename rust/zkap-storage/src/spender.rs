use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use zkap_pass::{Pass, PublicKey};

use crate::SpenderError;

/// Something that records passes a server has accepted as spent.
///
/// Recording happens after the storage operation has already succeeded, so a
/// failure here never fails the operation; the gate only logs it.
pub trait Spender: Send + Sync {
    /// Record `passes`, issued under `public_key`, as spent.
    fn mark_as_spent(&self, public_key: &PublicKey, passes: &[Pass]) -> Result<(), SpenderError>;
}

/// A [Spender] that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSpender;

impl Spender for NullSpender {
    fn mark_as_spent(&self, _public_key: &PublicKey, _passes: &[Pass]) -> Result<(), SpenderError> {
        Ok(())
    }
}

/// An in-memory [Spender] that exposes what it recorded, keyed by the base64
/// public key. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSpender {
    spent: Arc<Mutex<HashMap<String, Vec<Pass>>>>,
}

impl RecordingSpender {
    /// Everything recorded so far.
    pub fn spent(&self) -> HashMap<String, Vec<Pass>> {
        self.spent.lock().clone()
    }

    /// The passes recorded under `public_key`, in the order they arrived.
    pub fn spent_for(&self, public_key: &PublicKey) -> Vec<Pass> {
        self.spent
            .lock()
            .get(&public_key.encode_base64())
            .cloned()
            .unwrap_or_default()
    }

    /// Forgets everything recorded so far.
    pub fn reset(&self) {
        self.spent.lock().clear();
    }
}

impl Spender for RecordingSpender {
    fn mark_as_spent(&self, public_key: &PublicKey, passes: &[Pass]) -> Result<(), SpenderError> {
        self.spent
            .lock()
            .entry(public_key.encode_base64())
            .or_default()
            .extend_from_slice(passes);
        Ok(())
    }
}

impl<S> Spender for Arc<S>
where
    S: Spender + ?Sized,
{
    fn mark_as_spent(&self, public_key: &PublicKey, passes: &[Pass]) -> Result<(), SpenderError> {
        S::mark_as_spent(self, public_key, passes)
    }
}

#[cfg(test)]
mod tests {
    use zkap_pass::{SigningKey, make_passes};

    use super::*;

    #[test]
    fn it_records_passes_per_public_key() -> anyhow::Result<()> {
        let spender = RecordingSpender::default();
        let one = SigningKey::random();
        let two = SigningKey::random();
        let first = make_passes(&one, "add_lease AAAAAAAAAAAAAAAAAAAAAA==", 2);
        let second = make_passes(&two, "add_lease AAAAAAAAAAAAAAAAAAAAAA==", 1);

        spender.mark_as_spent(&one.public_key(), &first)?;
        spender.mark_as_spent(&two.public_key(), &second)?;

        assert_eq!(spender.spent_for(&one.public_key()), first);
        assert_eq!(spender.spent_for(&two.public_key()), second);
        assert_eq!(spender.spent().len(), 2);

        spender.reset();
        assert!(spender.spent().is_empty());
        Ok(())
    }
}
