//! Wallet service: the only code path that mutates account balances.
//!
//! Every mutation is a read-modify-write under the store's version CAS,
//! so two concurrent reservations against one account can never both pass
//! the balance check. Credits and refunds are idempotent per
//! `(reference_id, reason)`.

use std::sync::Arc;

use shared::{Amount, MAX_BALANCE_RETRIES};
use uuid::Uuid;

use crate::domain::{LedgerEntry, LedgerReason};
use crate::errors::WalletError;
use crate::store::{NewLedgerEntry, Store, StoreTx};

pub struct WalletService {
    store: Arc<dyn Store>,
}

impl WalletService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Atomically check funds, debit the balance and append a
    /// `reason=bet` ledger entry, all inside the caller's transaction.
    ///
    /// A `VersionConflict` means a concurrent mutation won the CAS; the
    /// caller retries in a fresh transaction.
    pub async fn reserve(
        &self,
        tx: &mut dyn StoreTx,
        account_id: i64,
        amount: Amount,
        reference_id: Uuid,
    ) -> Result<LedgerEntry, WalletError> {
        let account = tx
            .account(account_id)
            .await?
            .ok_or(WalletError::AccountNotFound(account_id))?;

        if account.balance < amount {
            return Err(WalletError::InsufficientFunds {
                balance: account.balance,
                requested: amount,
            });
        }

        let new_balance = account.balance.checked_sub(amount)?;
        if !tx
            .update_balance(account_id, new_balance, account.version)
            .await?
        {
            return Err(WalletError::VersionConflict(account_id));
        }

        let entry = tx
            .append_ledger(NewLedgerEntry {
                account_id,
                delta: -amount.as_minor(),
                reason: LedgerReason::Bet,
                reference_id,
            })
            .await?;

        tracing::debug!(
            account_id,
            amount = %amount,
            %reference_id,
            "Funds reserved"
        );
        Ok(entry)
    }

    /// Credit a payout inside the caller's transaction. Idempotent: if a
    /// payout entry with this `reference_id` already exists, it is
    /// returned unchanged and the balance is not touched again.
    pub async fn credit(
        &self,
        tx: &mut dyn StoreTx,
        account_id: i64,
        amount: Amount,
        reference_id: Uuid,
    ) -> Result<LedgerEntry, WalletError> {
        self.credit_with_reason(tx, account_id, amount, reference_id, LedgerReason::Payout)
            .await
    }

    /// Return a stake inside the caller's transaction, idempotent per
    /// reference like [`credit`](Self::credit)
    pub async fn refund(
        &self,
        tx: &mut dyn StoreTx,
        account_id: i64,
        amount: Amount,
        reference_id: Uuid,
    ) -> Result<LedgerEntry, WalletError> {
        self.credit_with_reason(tx, account_id, amount, reference_id, LedgerReason::Refund)
            .await
    }

    /// Self-transactional deposit with a bounded conflict-retry loop
    pub async fn deposit(
        &self,
        account_id: i64,
        amount: Amount,
        reference_id: Uuid,
    ) -> Result<LedgerEntry, WalletError> {
        let mut last_conflict = WalletError::VersionConflict(account_id);
        for _ in 0..MAX_BALANCE_RETRIES {
            let mut tx = self.store.begin().await?;
            match self
                .credit_with_reason(&mut *tx, account_id, amount, reference_id, LedgerReason::Deposit)
                .await
            {
                Ok(entry) => {
                    tx.commit().await?;
                    return Ok(entry);
                }
                Err(e @ WalletError::VersionConflict(_)) => {
                    tx.rollback().await?;
                    last_conflict = e;
                }
                Err(e) => {
                    tx.rollback().await?;
                    return Err(e);
                }
            }
        }
        Err(last_conflict)
    }

    /// Self-transactional withdrawal; fails with `InsufficientFunds`
    /// rather than ever letting the balance go negative
    pub async fn withdraw(
        &self,
        account_id: i64,
        amount: Amount,
        reference_id: Uuid,
    ) -> Result<LedgerEntry, WalletError> {
        let mut last_conflict = WalletError::VersionConflict(account_id);
        for _ in 0..MAX_BALANCE_RETRIES {
            let mut tx = self.store.begin().await?;
            match self.debit(&mut *tx, account_id, amount, reference_id).await {
                Ok(entry) => {
                    tx.commit().await?;
                    return Ok(entry);
                }
                Err(e @ WalletError::VersionConflict(_)) => {
                    tx.rollback().await?;
                    last_conflict = e;
                }
                Err(e) => {
                    tx.rollback().await?;
                    return Err(e);
                }
            }
        }
        Err(last_conflict)
    }

    async fn debit(
        &self,
        tx: &mut dyn StoreTx,
        account_id: i64,
        amount: Amount,
        reference_id: Uuid,
    ) -> Result<LedgerEntry, WalletError> {
        if let Some(existing) = tx
            .find_ledger_entry(reference_id, LedgerReason::Withdrawal)
            .await?
        {
            return Ok(existing);
        }

        let account = tx
            .account(account_id)
            .await?
            .ok_or(WalletError::AccountNotFound(account_id))?;

        if account.balance < amount {
            return Err(WalletError::InsufficientFunds {
                balance: account.balance,
                requested: amount,
            });
        }

        let new_balance = account.balance.checked_sub(amount)?;
        if !tx
            .update_balance(account_id, new_balance, account.version)
            .await?
        {
            return Err(WalletError::VersionConflict(account_id));
        }

        Ok(tx
            .append_ledger(NewLedgerEntry {
                account_id,
                delta: -amount.as_minor(),
                reason: LedgerReason::Withdrawal,
                reference_id,
            })
            .await?)
    }

    async fn credit_with_reason(
        &self,
        tx: &mut dyn StoreTx,
        account_id: i64,
        amount: Amount,
        reference_id: Uuid,
        reason: LedgerReason,
    ) -> Result<LedgerEntry, WalletError> {
        if let Some(existing) = tx.find_ledger_entry(reference_id, reason).await? {
            tracing::debug!(
                account_id,
                %reference_id,
                reason = reason.as_str(),
                "Duplicate credit suppressed"
            );
            return Ok(existing);
        }

        let account = tx
            .account(account_id)
            .await?
            .ok_or(WalletError::AccountNotFound(account_id))?;

        let new_balance = account.balance.checked_add(amount)?;
        if !tx
            .update_balance(account_id, new_balance, account.version)
            .await?
        {
            return Err(WalletError::VersionConflict(account_id));
        }

        Ok(tx
            .append_ledger(NewLedgerEntry {
                account_id,
                delta: amount.as_minor(),
                reason,
                reference_id,
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn setup() -> (Arc<dyn Store>, WalletService, i64) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let wallet = WalletService::new(store.clone());
        let account = store.create_account().await.unwrap();
        (store, wallet, account.account_id)
    }

    #[tokio::test]
    async fn reserve_fails_on_insufficient_funds() {
        let (store, wallet, account_id) = setup().await;
        wallet
            .deposit(account_id, Amount::new_unchecked(100), Uuid::new_v4())
            .await
            .unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = wallet
            .reserve(
                &mut *tx,
                account_id,
                Amount::new_unchecked(101),
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        tx.rollback().await.unwrap();

        let account = store.account(account_id).await.unwrap().unwrap();
        assert_eq!(account.balance.as_minor(), 100);
    }

    #[tokio::test]
    async fn credit_is_idempotent_per_reference() {
        let (store, wallet, account_id) = setup().await;
        let reference = Uuid::new_v4();

        for _ in 0..2 {
            let mut tx = store.begin().await.unwrap();
            wallet
                .credit(&mut *tx, account_id, Amount::new_unchecked(500), reference)
                .await
                .unwrap();
            tx.commit().await.unwrap();
        }

        let account = store.account(account_id).await.unwrap().unwrap();
        assert_eq!(account.balance.as_minor(), 500);
        assert_eq!(store.ledger_entries(account_id, 10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn withdraw_never_goes_negative() {
        let (store, wallet, account_id) = setup().await;
        wallet
            .deposit(account_id, Amount::new_unchecked(300), Uuid::new_v4())
            .await
            .unwrap();

        let err = wallet
            .withdraw(account_id, Amount::new_unchecked(301), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));

        let account = store.account(account_id).await.unwrap().unwrap();
        assert_eq!(account.balance.as_minor(), 300);
    }
}
