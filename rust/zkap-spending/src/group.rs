use std::{
    collections::BTreeSet,
    fmt::{Debug, Formatter},
    sync::Arc,
};

use zkap_pass::{Pass, UnblindedToken};

use crate::{ExpandError, SettleError, SpendingError};

/// The source of a [PassGroup]'s passes and the place its tokens are
/// reported back to.
pub trait PassFactory: Send + Sync {
    /// Draw `num_passes` tokens and bind each to `message`, or draw nothing.
    fn draw(
        &self,
        message: &str,
        num_passes: u64,
    ) -> Result<Vec<(UnblindedToken, Pass)>, SpendingError>;

    /// The tokens were spent.
    fn mark_spent(&self, tokens: &[UnblindedToken]) -> Result<(), SpendingError>;

    /// The tokens were rejected for `reason` and must not be used again.
    fn mark_invalid(&self, reason: &str, tokens: &[UnblindedToken]) -> Result<(), SpendingError>;

    /// The tokens were not used and may be drawn again.
    fn reset(&self, tokens: &[UnblindedToken]) -> Result<(), SpendingError>;
}

/// A batch of passes drawn for one logical operation, all bound to the same
/// message.
///
/// A group is settled by exactly one of [PassGroup::mark_spent],
/// [PassGroup::mark_invalid] or [PassGroup::reset]. Those, along with
/// [PassGroup::split] and [PassGroup::expand], consume the group, and the
/// group cannot be cloned, so a settled group cannot be used again. A group
/// that still holds tokens when it is dropped leaves them stranded in use; a
/// warning is logged when that happens.
pub struct PassGroup {
    message: String,
    factory: Arc<dyn PassFactory>,
    pairs: Vec<(UnblindedToken, Pass)>,
}

impl PassGroup {
    /// Creates a group of `pairs` bound to `message`, settled through
    /// `factory`.
    pub fn new(
        message: String,
        factory: Arc<dyn PassFactory>,
        pairs: Vec<(UnblindedToken, Pass)>,
    ) -> Self {
        Self {
            message,
            factory,
            pairs,
        }
    }

    /// The message every pass in this group is bound to.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The number of passes in this group.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether this group holds no passes.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The passes, in draw order.
    pub fn passes(&self) -> Vec<Pass> {
        self.pairs.iter().map(|(_, pass)| pass.clone()).collect()
    }

    /// The tokens behind the passes, in draw order.
    pub fn unblinded_tokens(&self) -> Vec<UnblindedToken> {
        self.pairs.iter().map(|(token, _)| token.clone()).collect()
    }

    fn sibling(&self, pairs: Vec<(UnblindedToken, Pass)>) -> Self {
        Self::new(self.message.clone(), self.factory.clone(), pairs)
    }

    /// Partitions the group by position: the pairs at `select` and the rest,
    /// each keeping its relative order. Positions past the end are ignored.
    pub fn split<I>(mut self, select: I) -> (PassGroup, PassGroup)
    where
        I: IntoIterator<Item = usize>,
    {
        let select = select.into_iter().collect::<BTreeSet<_>>();
        let (selected, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pairs)
            .into_iter()
            .enumerate()
            .partition(|(position, _)| select.contains(position));

        let strip = |pairs: Vec<(usize, (UnblindedToken, Pass))>| {
            pairs.into_iter().map(|(_, pair)| pair).collect::<Vec<_>>()
        };
        (self.sibling(strip(selected)), self.sibling(strip(rest)))
    }

    /// Draws `by_amount` more passes for the same message and appends them.
    ///
    /// If they cannot be drawn the group comes back inside the error,
    /// unchanged.
    pub fn expand(mut self, by_amount: u64) -> Result<PassGroup, ExpandError> {
        let drawn = self.factory.draw(&self.message, by_amount);
        match drawn {
            Ok(pairs) => {
                self.pairs.extend(pairs);
                Ok(self)
            }
            Err(source) => Err(ExpandError {
                group: self,
                source,
            }),
        }
    }

    /// Hands every token to `report`. The group is emptied only if the
    /// report was accepted.
    fn settle<F>(mut self, report: F) -> Result<(), SettleError>
    where
        F: FnOnce(&dyn PassFactory, &[UnblindedToken]) -> Result<(), SpendingError>,
    {
        let tokens = self.unblinded_tokens();
        let reported = report(self.factory.as_ref(), &tokens);
        match reported {
            Ok(()) => {
                self.pairs.clear();
                Ok(())
            }
            Err(source) => Err(SettleError {
                group: self,
                source,
            }),
        }
    }

    /// Settles the group: every token was spent.
    ///
    /// If the report fails the group comes back inside the error.
    pub fn mark_spent(self) -> Result<(), SettleError> {
        self.settle(|factory, tokens| factory.mark_spent(tokens))
    }

    /// Settles the group: every token was rejected for `reason`.
    ///
    /// If the report fails the group comes back inside the error.
    pub fn mark_invalid(self, reason: &str) -> Result<(), SettleError> {
        self.settle(|factory, tokens| factory.mark_invalid(reason, tokens))
    }

    /// Settles the group: no token was used.
    ///
    /// If the report fails the group comes back inside the error.
    pub fn reset(self) -> Result<(), SettleError> {
        self.settle(|factory, tokens| factory.reset(tokens))
    }
}

impl Drop for PassGroup {
    fn drop(&mut self) {
        if !self.pairs.is_empty() {
            tracing::warn!(
                binding_message = %self.message,
                count = self.pairs.len(),
                "pass group dropped without being settled"
            );
        }
    }
}

impl Debug for PassGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassGroup")
            .field("message", &self.message)
            .field("len", &self.pairs.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicBool, Ordering},
    };

    use anyhow::Result;
    use proptest::prelude::*;
    use zkap_pass::{SigningKey, random_unblinded_tokens};

    use super::*;
    use crate::{InventoryError, MemoryTokenInventory, SpendingController, TokenInventory};

    const MESSAGE: &str = "add_lease AAAAAAAAAAAAAAAAAAAAAA==";

    fn controller(count: usize) -> (SpendingController, MemoryTokenInventory) {
        let inventory =
            MemoryTokenInventory::with_tokens(random_unblinded_tokens(&SigningKey::random(), count));
        (SpendingController::new(inventory.clone()), inventory)
    }

    #[test_log::test]
    fn it_projects_passes_and_tokens_in_draw_order() -> Result<()> {
        let (controller, inventory) = controller(3);
        let expected = inventory.available();
        let group = controller.get(MESSAGE, 3)?;

        assert_eq!(group.message(), MESSAGE);
        assert_eq!(group.unblinded_tokens(), expected);
        assert_eq!(
            group.passes(),
            zkap_pass::tokens_to_passes(MESSAGE, &expected)
        );
        group.reset()?;
        Ok(())
    }

    #[test_log::test]
    fn it_splits_by_position() -> Result<()> {
        let (controller, _) = controller(5);
        let group = controller.get(MESSAGE, 5)?;
        let tokens = group.unblinded_tokens();

        let (selected, rest) = group.split([4, 1, 9]);
        assert_eq!(
            selected.unblinded_tokens(),
            vec![tokens[1].clone(), tokens[4].clone()]
        );
        assert_eq!(
            rest.unblinded_tokens(),
            vec![tokens[0].clone(), tokens[2].clone(), tokens[3].clone()]
        );
        assert_eq!(selected.message(), rest.message());

        selected.mark_spent()?;
        rest.reset()?;
        Ok(())
    }

    #[test_log::test]
    fn it_expands_with_fresh_passes() -> Result<()> {
        let (controller, inventory) = controller(4);
        let group = controller.get(MESSAGE, 1)?;
        let first = group.unblinded_tokens();

        let group = group.expand(2)?;
        assert_eq!(group.len(), 3);
        assert_eq!(group.unblinded_tokens()[0], first[0]);
        assert_eq!(inventory.in_use().len(), 3);

        group.reset()?;
        assert_eq!(inventory.available().len(), 4);
        Ok(())
    }

    #[test_log::test]
    fn it_hands_the_group_back_when_expansion_fails() -> Result<()> {
        let (controller, inventory) = controller(2);
        let group = controller.get(MESSAGE, 1)?;

        let (group, error) = group.expand(5).unwrap_err().into_parts();
        assert_eq!(
            error,
            SpendingError::InsufficientTokens {
                requested: 5,
                available: 1
            }
        );
        assert_eq!(group.len(), 1);

        group.reset()?;
        assert_eq!(inventory.available().len(), 2);
        Ok(())
    }

    #[test_log::test]
    fn it_does_not_return_an_empty_group_to_the_inventory() -> Result<()> {
        let (controller, inventory) = controller(2);
        let group = controller.get(MESSAGE, 0)?;

        assert!(group.is_empty());
        group.mark_spent()?;
        assert_eq!(inventory.available().len(), 2);
        Ok(())
    }

    /// Refuses the next settlement, then behaves like the wrapped inventory.
    struct RefusingInventory {
        inner: MemoryTokenInventory,
        refuse: AtomicBool,
    }

    impl RefusingInventory {
        fn check(&self) -> Result<(), InventoryError> {
            if self.refuse.swap(false, Ordering::SeqCst) {
                return Err(InventoryError::Backend("store unavailable".into()));
            }
            Ok(())
        }
    }

    impl TokenInventory for RefusingInventory {
        fn get(&self, count: usize) -> Result<Vec<UnblindedToken>, InventoryError> {
            self.inner.get(count)
        }

        fn discard(&self, tokens: &[UnblindedToken]) -> Result<(), InventoryError> {
            self.check()?;
            self.inner.discard(tokens)
        }

        fn invalidate(&self, reason: &str, tokens: &[UnblindedToken]) -> Result<(), InventoryError> {
            self.check()?;
            self.inner.invalidate(reason, tokens)
        }

        fn reset(&self, tokens: &[UnblindedToken]) -> Result<(), InventoryError> {
            self.check()?;
            self.inner.reset(tokens)
        }
    }

    #[test_log::test]
    fn it_hands_the_group_back_when_settlement_fails() -> Result<()> {
        let inventory =
            MemoryTokenInventory::with_tokens(random_unblinded_tokens(&SigningKey::random(), 2));
        let refusing = Arc::new(RefusingInventory {
            inner: inventory.clone(),
            refuse: AtomicBool::new(true),
        });
        let controller = SpendingController::new(refusing.clone());
        let group = controller.get(MESSAGE, 2)?;
        let tokens = group.unblinded_tokens();

        let (group, error) = group.reset().unwrap_err().into_parts();
        assert_eq!(
            error,
            SpendingError::Inventory(InventoryError::Backend("store unavailable".into()))
        );
        assert_eq!(group.unblinded_tokens(), tokens);
        assert_eq!(inventory.in_use(), tokens);

        group.reset()?;
        assert_eq!(inventory.available(), tokens);
        assert!(inventory.in_use().is_empty());

        let group = controller.get(MESSAGE, 1)?;
        refusing.refuse.store(true, Ordering::SeqCst);
        let (group, _) = group.mark_spent().unwrap_err().into_parts();
        group.mark_spent()?;
        assert_eq!(inventory.spent(), vec![tokens[0].clone()]);
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn it_preserves_every_pair_across_a_split(
            size in 0usize..12,
            select in prop::collection::vec(0usize..16, 0..16),
        ) {
            let (controller, _) = controller(size);
            let group = controller.get(MESSAGE, size as u64).unwrap();
            let before = group
                .unblinded_tokens()
                .into_iter()
                .zip(group.passes())
                .collect::<Vec<_>>();

            let (selected, rest) = group.split(select.clone());
            prop_assert_eq!(selected.message(), rest.message());

            let mut counts = HashMap::new();
            for pair in selected
                .unblinded_tokens()
                .into_iter()
                .zip(selected.passes())
                .chain(rest.unblinded_tokens().into_iter().zip(rest.passes()))
            {
                *counts.entry(pair).or_insert(0usize) += 1;
            }
            prop_assert_eq!(counts.len(), before.len());
            prop_assert!(before.iter().all(|pair| counts.get(pair) == Some(&1)));

            let expected_selected = (0..size).filter(|position| select.contains(position)).count();
            prop_assert_eq!(selected.len(), expected_selected);

            selected.reset().unwrap();
            rest.reset().unwrap();
        }
    }
}
