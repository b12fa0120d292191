use std::sync::Arc;

use zkap_pass::{Pass, UnblindedToken, tokens_to_passes};

use crate::{PassFactory, PassGroup, SpendingError, TokenInventory};

/// Turns tokens into passes bound to a message, one pass per token in order.
pub type TokensToPasses = Arc<dyn Fn(&str, &[UnblindedToken]) -> Vec<Pass> + Send + Sync>;

/// Hands out [PassGroup]s drawn from a [TokenInventory] and reports their
/// settlement back to it.
///
/// Clones share the same inventory.
#[derive(Clone)]
pub struct SpendingController {
    inventory: Arc<dyn TokenInventory>,
    tokens_to_passes: TokensToPasses,
}

impl SpendingController {
    /// Creates a controller over `inventory` that signs passes with
    /// [tokens_to_passes].
    pub fn new<I>(inventory: I) -> Self
    where
        I: TokenInventory + 'static,
    {
        Self {
            inventory: Arc::new(inventory),
            tokens_to_passes: Arc::new(tokens_to_passes),
        }
    }

    /// Replaces the token to pass conversion.
    pub fn with_tokens_to_passes<F>(mut self, convert: F) -> Self
    where
        F: Fn(&str, &[UnblindedToken]) -> Vec<Pass> + Send + Sync + 'static,
    {
        self.tokens_to_passes = Arc::new(convert);
        self
    }

    /// Draws `num_passes` passes bound to `message`.
    ///
    /// Fails with [SpendingError::InsufficientTokens], having drawn nothing,
    /// if the inventory is short.
    pub fn get(&self, message: &str, num_passes: u64) -> Result<PassGroup, SpendingError> {
        let pairs = self.draw(message, num_passes)?;
        Ok(PassGroup::new(
            message.to_owned(),
            Arc::new(self.clone()),
            pairs,
        ))
    }
}

impl PassFactory for SpendingController {
    fn draw(
        &self,
        message: &str,
        num_passes: u64,
    ) -> Result<Vec<(UnblindedToken, Pass)>, SpendingError> {
        let count = usize::try_from(num_passes).map_err(|_| SpendingError::InsufficientTokens {
            requested: num_passes,
            available: 0,
        })?;
        let tokens = self.inventory.get(count)?;
        let passes = (self.tokens_to_passes)(message, &tokens);
        if passes.len() != tokens.len() {
            let error = SpendingError::MismatchedPasses {
                tokens: tokens.len(),
                passes: passes.len(),
            };
            self.inventory.reset(&tokens)?;
            return Err(error);
        }

        tracing::info!(binding_message = message, count, "get passes");
        Ok(tokens.into_iter().zip(passes).collect())
    }

    fn mark_spent(&self, tokens: &[UnblindedToken]) -> Result<(), SpendingError> {
        tracing::info!(count = tokens.len(), "spent passes");
        Ok(self.inventory.discard(tokens)?)
    }

    fn mark_invalid(&self, reason: &str, tokens: &[UnblindedToken]) -> Result<(), SpendingError> {
        tracing::info!(count = tokens.len(), reason, "invalid passes");
        Ok(self.inventory.invalidate(reason, tokens)?)
    }

    fn reset(&self, tokens: &[UnblindedToken]) -> Result<(), SpendingError> {
        tracing::info!(count = tokens.len(), "reset passes");
        Ok(self.inventory.reset(tokens)?)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use zkap_pass::{SigningKey, filter_valid, random_unblinded_tokens};

    use super::*;
    use crate::MemoryTokenInventory;

    const MESSAGE: &str = "renew_lease AAAAAAAAAAAAAAAAAAAAAA==";

    fn setup(count: usize) -> (SigningKey, MemoryTokenInventory, SpendingController) {
        let key = SigningKey::random();
        let inventory = MemoryTokenInventory::with_tokens(random_unblinded_tokens(&key, count));
        let controller = SpendingController::new(inventory.clone());
        (key, inventory, controller)
    }

    #[test_log::test]
    fn it_draws_passes_the_issuer_accepts() -> Result<()> {
        let (key, _, controller) = setup(3);
        let group = controller.get(MESSAGE, 3)?;

        let passes = group.passes();
        assert_eq!(filter_valid(&key, MESSAGE, &passes).len(), 3);
        group.mark_spent()?;
        Ok(())
    }

    #[test_log::test]
    fn it_draws_nothing_when_the_inventory_is_short() -> Result<()> {
        let (_, inventory, controller) = setup(2);

        let error = controller.get(MESSAGE, 3).unwrap_err();
        assert_eq!(
            error,
            SpendingError::InsufficientTokens {
                requested: 3,
                available: 2
            }
        );
        assert_eq!(inventory.available().len(), 2);
        Ok(())
    }

    #[test_log::test]
    fn it_never_hands_out_spent_or_invalid_tokens_again() -> Result<()> {
        let (_, inventory, controller) = setup(3);

        let spent = controller.get(MESSAGE, 1)?;
        let spent_tokens = spent.unblinded_tokens();
        spent.mark_spent()?;

        let invalid = controller.get(MESSAGE, 1)?;
        let invalid_tokens = invalid.unblinded_tokens();
        invalid.mark_invalid("signature check failed")?;

        let rest = controller.get(MESSAGE, 1)?;
        let rest_tokens = rest.unblinded_tokens();
        rest.reset()?;

        assert!(controller.get(MESSAGE, 2).is_err());
        let again = controller.get(MESSAGE, 1)?;
        assert_eq!(again.unblinded_tokens(), rest_tokens);
        assert!(!again.unblinded_tokens().contains(&spent_tokens[0]));
        assert!(!again.unblinded_tokens().contains(&invalid_tokens[0]));
        again.reset()?;

        assert_eq!(inventory.spent(), spent_tokens);
        assert_eq!(
            inventory.invalid(),
            vec![(invalid_tokens[0].clone(), "signature check failed".to_owned())]
        );
        Ok(())
    }

    #[test_log::test]
    fn it_returns_tokens_when_the_conversion_misbehaves() -> Result<()> {
        let (_, inventory, controller) = setup(2);
        let controller = controller.with_tokens_to_passes(|_, _| Vec::new());

        let error = controller.get(MESSAGE, 2).unwrap_err();
        assert_eq!(
            error,
            SpendingError::MismatchedPasses {
                tokens: 2,
                passes: 0
            }
        );
        assert_eq!(inventory.available().len(), 2);
        Ok(())
    }

    #[test_log::test]
    fn it_uses_the_injected_conversion() -> Result<()> {
        let (_, _, controller) = setup(2);
        let controller = controller.with_tokens_to_passes(|message, tokens| {
            tokens
                .iter()
                .map(|_| Pass::from(message))
                .collect()
        });

        let group = controller.get(MESSAGE, 2)?;
        assert_eq!(group.passes(), vec![Pass::from(MESSAGE); 2]);
        group.reset()?;
        Ok(())
    }
}
