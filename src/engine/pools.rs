// 8.3 engine/pools.rs: LP contributions, vested withdrawals, withdrawal queue.

use super::core::{Engine, Tx};
use super::results::{ContributionResult, EngineError, QueueProcessResult, WithdrawalResult};
use crate::events::EventPayload;
use crate::ledger::EntryReason;
use crate::pool::{LpShare, QueuedWithdrawal, WithdrawalStatus};
use crate::types::{AssetId, PoolId, Usdc, UserId};
use crate::vesting::UnlockSchedule;
use rust_decimal::Decimal;
use tracing::{debug, info};

impl Engine {
    /// Contribute USDC to an asset's pool, minting LP shares at NAV. The
    /// contributor's vesting schedule is anchored at their first
    /// contribution; later ones join it. Crossing the soft cap flips the
    /// asset from Funding to Active, exactly once.
    pub fn contribute(
        &mut self,
        user_id: UserId,
        asset_id: AssetId,
        amount: Usdc,
    ) -> Result<ContributionResult, EngineError> {
        if amount.value() <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "contribution amount {amount} must be positive"
            )));
        }

        let asset = self
            .assets
            .get(&asset_id)
            .ok_or(EngineError::AssetNotFound(asset_id))?;
        if !asset.accepts_contributions() {
            return Err(EngineError::StateConflict(format!(
                "asset {} does not accept contributions while {:?}",
                asset_id.0, asset.status
            )));
        }
        let soft_cap = asset.config.soft_cap;
        let hard_cap = asset.config.hard_cap;

        let pool_id = *self
            .pool_by_asset
            .get(&asset_id)
            .ok_or(EngineError::AssetNotFound(asset_id))?;
        let pool = self.pools.get(&pool_id).ok_or(EngineError::PoolNotFound(pool_id))?;
        if pool.total_usdc.value() + amount.value() > hard_cap {
            return Err(EngineError::Validation(format!(
                "contribution {amount} would push pool past its hard cap {hard_cap}"
            )));
        }

        let account = self
            .accounts
            .get_mut(&user_id)
            .ok_or(EngineError::AccountNotFound(user_id))?;
        if amount > account.hot_balance {
            return Err(EngineError::InsufficientFunds {
                requested: amount,
                available: account.hot_balance,
            });
        }
        account.debit(amount)?;

        let pool = self.pools.get_mut(&pool_id).ok_or(EngineError::PoolNotFound(pool_id))?;
        let minted = pool.mint(amount);
        let pool_total = pool.total_usdc;

        let share = self
            .lp_shares
            .entry((pool_id, user_id))
            .or_insert_with(|| LpShare::new(pool_id, user_id));
        share.lp_shares += minted;
        share.contributed_usdc = share.contributed_usdc.add(amount);

        self.schedules.entry((pool_id, user_id)).or_insert_with(|| {
            UnlockSchedule::new(
                user_id,
                pool_id,
                &self.config.vesting_milestones,
                self.current_time,
            )
        });

        let mut tx = Tx::new();
        tx.entry(
            user_id,
            amount.negate(),
            EntryReason::PoolContribution,
            Some(pool_id.0 as u64),
        );
        tx.event(EventPayload::PoolContribution {
            pool_id,
            user_id,
            amount,
            lp_shares_minted: minted,
            timestamp: self.current_time,
        });

        info!(
            pool = pool_id.0,
            user = user_id.0,
            amount = %amount,
            minted = %minted,
            "pool contribution"
        );

        let mut activated = None;
        if pool_total.value() >= soft_cap {
            let asset = self
                .assets
                .get_mut(&asset_id)
                .ok_or(EngineError::AssetNotFound(asset_id))?;
            if asset.activate() {
                info!(asset = asset_id.0, "soft cap reached, asset activated");
                activated = Some(asset_id);
                tx.event(EventPayload::AssetActivated {
                    asset_id,
                    pool_id,
                    timestamp: self.current_time,
                });
            }
        }

        self.commit(tx);
        Ok(ContributionResult {
            pool_id,
            lp_shares_minted: minted,
            pool_total_usdc: pool_total,
            activated_asset: activated,
        })
    }

    /// Withdraw immediately, limited to the instant allowance: the vested
    /// fraction of contributed principal times the instant-withdrawal cap,
    /// minus whatever was already taken out. Shares burn in proportion to
    /// contributed principal and the requested amount pays out in full, so
    /// fee-driven NAV growth stays with the remaining holders.
    pub fn withdraw_instant(
        &mut self,
        user_id: UserId,
        pool_id: PoolId,
        amount: Usdc,
    ) -> Result<WithdrawalResult, EngineError> {
        if amount.value() <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "withdrawal amount {amount} must be positive"
            )));
        }

        let allowance = self.instant_allowance(pool_id, user_id)?;
        if amount > allowance {
            return Err(EngineError::Validation(format!(
                "instant withdrawal {amount} exceeds vested allowance {allowance}"
            )));
        }

        let share = self
            .lp_shares
            .get(&(pool_id, user_id))
            .ok_or_else(|| EngineError::Validation(format!(
                "user {} holds no shares in pool {}",
                user_id.0, pool_id.0
            )))?;
        let shares_needed = amount.value() * share.lp_shares / share.contributed_usdc.value();
        if shares_needed > share.lp_shares {
            return Err(EngineError::InsufficientShares {
                requested: shares_needed,
                available: share.lp_shares,
            });
        }

        let pool = self.pools.get_mut(&pool_id).ok_or(EngineError::PoolNotFound(pool_id))?;
        pool.burn_for_amount(shares_needed, amount)?;

        let share = self
            .lp_shares
            .get_mut(&(pool_id, user_id))
            .ok_or(EngineError::PoolNotFound(pool_id))?;
        share.lp_shares -= shares_needed;
        share.withdrawn_principal = share.withdrawn_principal.add(amount);

        let account = self
            .accounts
            .get_mut(&user_id)
            .ok_or(EngineError::AccountNotFound(user_id))?;
        account.credit(amount);

        let mut tx = Tx::new();
        tx.entry(
            user_id,
            amount,
            EntryReason::PoolWithdrawal,
            Some(pool_id.0 as u64),
        );
        tx.event(EventPayload::PoolWithdrawal {
            pool_id,
            user_id,
            amount,
            lp_shares_burned: shares_needed,
            queued: false,
            timestamp: self.current_time,
        });
        self.commit(tx);

        Ok(WithdrawalResult {
            pool_id,
            amount_paid: amount,
            lp_shares_burned: shares_needed,
            queued_id: None,
        })
    }

    /// Queue a withdrawal for later processing. Nothing moves until the
    /// queue is drained; the request is only checked against the vested
    /// share of contributed principal.
    pub fn queue_withdrawal(
        &mut self,
        user_id: UserId,
        pool_id: PoolId,
        amount: Usdc,
    ) -> Result<WithdrawalResult, EngineError> {
        if amount.value() <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "withdrawal amount {amount} must be positive"
            )));
        }

        if !self.pools.contains_key(&pool_id) {
            return Err(EngineError::PoolNotFound(pool_id));
        }
        let share = self
            .lp_shares
            .get(&(pool_id, user_id))
            .ok_or_else(|| EngineError::Validation(format!(
                "user {} holds no shares in pool {}",
                user_id.0, pool_id.0
            )))?;
        let vested = self
            .schedules
            .get(&(pool_id, user_id))
            .map(|s| s.vested_fraction(self.current_time))
            .unwrap_or(Decimal::ZERO);
        let vested_principal = share.contributed_usdc.mul(vested);
        if amount > vested_principal {
            return Err(EngineError::Validation(format!(
                "queued withdrawal {amount} exceeds vested principal {vested_principal}"
            )));
        }

        let id = self.next_queue_id;
        self.next_queue_id += 1;
        self.queue.push(QueuedWithdrawal {
            id,
            pool_id,
            user_id,
            amount_usdc: amount,
            status: WithdrawalStatus::Pending,
            created_at: self.current_time,
            processed_at: None,
        });

        let mut tx = Tx::new();
        tx.event(EventPayload::PoolWithdrawal {
            pool_id,
            user_id,
            amount,
            lp_shares_burned: Decimal::ZERO,
            queued: true,
            timestamp: self.current_time,
        });
        self.commit(tx);

        Ok(WithdrawalResult {
            pool_id,
            amount_paid: Usdc::zero(),
            lp_shares_burned: Decimal::ZERO,
            queued_id: Some(id),
        })
    }

    /// Drain the pool's withdrawal queue in FIFO order. Stops at the first
    /// row the pool cannot pay in full; a row whose owner no longer holds
    /// enough shares is cancelled instead of blocking the queue. Each row
    /// leaves Pending at most once.
    pub fn process_withdrawal_queue(
        &mut self,
        pool_id: PoolId,
    ) -> Result<QueueProcessResult, EngineError> {
        if !self.pools.contains_key(&pool_id) {
            return Err(EngineError::PoolNotFound(pool_id));
        }

        let mut tx = Tx::new();
        let mut rows_processed = 0usize;
        let mut total_paid = Usdc::zero();

        let row_ids: Vec<u64> = self
            .queue
            .iter()
            .filter(|r| r.pool_id == pool_id && r.status == WithdrawalStatus::Pending)
            .map(|r| r.id)
            .collect();

        for row_id in row_ids {
            let (user_id, amount) = {
                let row = self
                    .queue
                    .iter()
                    .find(|r| r.id == row_id)
                    .ok_or(EngineError::QueueRowNotFound(row_id))?;
                (row.user_id, row.amount_usdc)
            };

            let pool = self.pools.get(&pool_id).ok_or(EngineError::PoolNotFound(pool_id))?;
            if amount > pool.total_usdc {
                debug!(row = row_id, "queue blocked on pool liquidity");
                break;
            }
            let shares_needed = if pool.total_usdc.value().is_zero() {
                Decimal::ZERO
            } else {
                amount.value() * pool.total_lp_shares / pool.total_usdc.value()
            };

            let holder_shares = self
                .lp_shares
                .get(&(pool_id, user_id))
                .map(|s| s.lp_shares)
                .unwrap_or(Decimal::ZERO);
            if shares_needed > holder_shares {
                // owner sold down below the request; drop the row
                if let Some(row) = self.queue.iter_mut().find(|r| r.id == row_id) {
                    row.status = WithdrawalStatus::Cancelled;
                    row.processed_at = Some(self.current_time);
                }
                continue;
            }

            let pool = self.pools.get_mut(&pool_id).ok_or(EngineError::PoolNotFound(pool_id))?;
            let payout = pool.burn(shares_needed)?;
            // queued exits burn shares but do not eat the instant allowance
            if let Some(share) = self.lp_shares.get_mut(&(pool_id, user_id)) {
                share.lp_shares -= shares_needed;
            }
            let account = self
                .accounts
                .get_mut(&user_id)
                .ok_or(EngineError::AccountNotFound(user_id))?;
            account.credit(payout);

            if let Some(row) = self.queue.iter_mut().find(|r| r.id == row_id) {
                row.status = WithdrawalStatus::Processed;
                row.processed_at = Some(self.current_time);
            }

            tx.entry(
                user_id,
                payout,
                EntryReason::PoolWithdrawal,
                Some(row_id),
            );
            tx.event(EventPayload::PoolWithdrawal {
                pool_id,
                user_id,
                amount: payout,
                lp_shares_burned: shares_needed,
                queued: false,
                timestamp: self.current_time,
            });
            rows_processed += 1;
            total_paid = total_paid.add(payout);
        }

        self.commit(tx);
        Ok(QueueProcessResult {
            pool_id,
            rows_processed,
            total_paid,
        })
    }

    /// Cancel a pending queued withdrawal. Processed or cancelled rows are a
    /// state conflict, never silently re-cancelled.
    pub fn cancel_queued_withdrawal(
        &mut self,
        user_id: UserId,
        queue_id: u64,
    ) -> Result<(), EngineError> {
        let row = self
            .queue
            .iter_mut()
            .find(|r| r.id == queue_id)
            .ok_or(EngineError::QueueRowNotFound(queue_id))?;
        if row.user_id != user_id {
            return Err(EngineError::Validation(format!(
                "queue row {} does not belong to user {}",
                queue_id, user_id.0
            )));
        }
        if row.status != WithdrawalStatus::Pending {
            return Err(EngineError::StateConflict(format!(
                "queue row {} is already {:?}",
                queue_id, row.status
            )));
        }
        row.status = WithdrawalStatus::Cancelled;
        row.processed_at = Some(self.current_time);
        Ok(())
    }

    /// USDC the user may withdraw instantly right now.
    pub fn instant_allowance(
        &self,
        pool_id: PoolId,
        user_id: UserId,
    ) -> Result<Usdc, EngineError> {
        let share = self
            .lp_shares
            .get(&(pool_id, user_id))
            .ok_or_else(|| EngineError::Validation(format!(
                "user {} holds no shares in pool {}",
                user_id.0, pool_id.0
            )))?;
        let vested = self
            .schedules
            .get(&(pool_id, user_id))
            .map(|s| s.vested_fraction(self.current_time))
            .unwrap_or(Decimal::ZERO);
        let cap = share
            .contributed_usdc
            .mul(vested)
            .mul(self.config.max_instant_withdrawal_pct);
        let remaining = cap.sub(share.withdrawn_principal);
        Ok(if remaining.is_negative() {
            Usdc::zero()
        } else {
            remaining
        })
    }
}
