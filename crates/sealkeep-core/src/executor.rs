use std::sync::Arc;

use tracing::{debug, info, warn};

use sealkeep_ledger::{Mutation, SubmissionResult, Wallet};
use sealkeep_types::{Address, ObjectRef};

use crate::error::{VaultError, VaultResult};
use crate::events::{EventBus, Operation, Outcome, Phase};
use crate::resolver::VersionResolver;
use crate::retry::RetryPolicy;

/// Submits owner-record mutations through the signing wallet.
///
/// Every attempt re-resolves the record's concurrency token immediately
/// before building the mutation; a token is never reused across attempts.
/// Only version conflicts are retried. A user cancellation ends the call
/// with no further prompt.
#[derive(Clone)]
pub struct TransactionExecutor {
    resolver: VersionResolver,
    wallet: Arc<dyn Wallet>,
    policy: RetryPolicy,
    events: EventBus,
}

impl TransactionExecutor {
    pub fn new(
        resolver: VersionResolver,
        wallet: Arc<dyn Wallet>,
        policy: RetryPolicy,
        events: EventBus,
    ) -> Self {
        Self {
            resolver,
            wallet,
            policy,
            events,
        }
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    /// The identity the wallet signs for.
    pub fn signer(&self) -> VaultResult<Address> {
        if !self.wallet.is_connected() {
            return Err(VaultError::WalletNotConnected);
        }
        self.wallet
            .active_account()
            .ok_or(VaultError::WalletNotConnected)
    }

    /// Build and submit a mutation against the signer's owner record with
    /// the configured attempt budget.
    pub async fn execute<F>(&self, build: F) -> VaultResult<SubmissionResult>
    where
        F: Fn(ObjectRef) -> Mutation + Send + Sync,
    {
        self.execute_with_attempts(self.policy.max_attempts, build)
            .await
    }

    pub async fn execute_with_attempts<F>(
        &self,
        max_attempts: u32,
        build: F,
    ) -> VaultResult<SubmissionResult>
    where
        F: Fn(ObjectRef) -> Mutation + Send + Sync,
    {
        let owner = self.signer()?;
        let policy = self.policy.clone().with_max_attempts(max_attempts);

        let result = policy
            .run(
                |attempt| self.attempt(&owner, attempt, &build),
                |err| matches!(err, VaultError::VersionConflict { .. }),
                |attempt, delay, err| {
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "version conflict, retrying with a fresh token");
                    self.events.emit(
                        Operation::Execute,
                        Phase::Submit,
                        Outcome::Retrying {
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        },
                    );
                },
            )
            .await
            .map_err(|err| match err {
                VaultError::VersionConflict { message, .. } => VaultError::VersionConflict {
                    attempts: policy.max_attempts.max(1),
                    message,
                },
                other => other,
            });
        self.events.finished(Operation::Execute, Phase::Submit, &result);
        result
    }

    async fn attempt<F>(
        &self,
        owner: &Address,
        attempt: u32,
        build: &F,
    ) -> VaultResult<SubmissionResult>
    where
        F: Fn(ObjectRef) -> Mutation + Send + Sync,
    {
        let record = self
            .resolver
            .resolve(owner)
            .await?
            .ok_or(VaultError::NoOwnerRecord(*owner))?;
        let mutation = build(record);
        debug!(attempt, kind = mutation.kind(), record = %record, "submitting");
        let result = self.submit(mutation).await?;
        info!(attempt, tx = %result.digest.short_hex(), "mutation executed");
        Ok(result)
    }

    /// Submit the creation of the signer's owner record.
    ///
    /// There is no record to resolve yet, so this is a single, unbound
    /// submission; failures are classified the same way as in
    /// [`execute`](Self::execute).
    pub async fn create_record(&self) -> VaultResult<SubmissionResult> {
        let owner = self.signer()?;
        debug!(owner = %owner.short(), "submitting owner record creation");
        let result = self.submit(Mutation::CreateRecord).await;
        self.events.finished(Operation::Execute, Phase::Submit, &result);
        result
    }

    async fn submit(&self, mutation: Mutation) -> VaultResult<SubmissionResult> {
        let result = self.wallet.sign_and_submit(mutation).await?;
        if !result.status.is_success() {
            let reason = match &result.status {
                sealkeep_ledger::ExecutionStatus::Failure { error } => error.clone(),
                sealkeep_ledger::ExecutionStatus::Success => String::new(),
            };
            return Err(VaultError::TransactionFailed(format!(
                "transaction {} did not succeed: {reason}",
                result.digest.short_hex()
            )));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for TransactionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionExecutor")
            .field("policy", &self.policy)
            .finish()
    }
}
