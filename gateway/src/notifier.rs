//! Fan-out of transaction and token-transfer events to subscribed clients.
//!
//! The Notifier is invoked from three places: Intake (a detached early
//! notification right after a signed transaction is accepted), the Queue
//! Processor (every status transition a pass makes), and the Block Monitor
//! (confirmations and token-transfer events). It never originates state
//! changes itself — it only renders, looks up subscriptions, dispatches, and
//! kicks a downstream Queue Processor pass for the recipient so that funding
//! chains propagate.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::ports::{NotificationDispatcher, SubscriptionStore};
use crate::types::entities::{Transaction, TokenTransfer};
use crate::types::enums::TransactionStatus;
use crate::types::messages::{NotificationMessage, PaymentMessage, TokenPaymentMessage};
use crate::types::primitives::{EthAddress, TxHash, WeiAmount};
use crate::error::Result;

/// The one capability the Notifier needs from the Queue Processor: a way to
/// (re)trigger a pass for a recipient after dispatching, the mechanism that
/// makes an A-funds-B-funds-C chain self-propagating. Implemented by
/// [`crate::queue::QueueProcessor`].
pub trait QueuePassTrigger: Send + Sync {
    /// Schedule a Queue Processor pass for `address`. Fire-and-forget —
    /// implementations spawn the pass rather than running it inline, since
    /// the Notifier must not block on a potentially unrelated sender's
    /// queue.
    fn trigger_pass(&self, address: EthAddress);
}

/// Renders, dispatches, and triggers downstream passes for transaction and
/// token-transfer lifecycle events.
#[derive(Debug)]
pub struct Notifier<Sub, Disp, Trig> {
    subscriptions: Arc<Sub>,
    dispatcher: Arc<Disp>,
    queue_trigger: Arc<Trig>,
    network_id: u64,
}

impl<Sub, Disp, Trig> Notifier<Sub, Disp, Trig>
where
    Sub: SubscriptionStore,
    Disp: NotificationDispatcher,
    Trig: QueuePassTrigger,
{
    /// Create a new notifier.
    pub fn new(
        subscriptions: Arc<Sub>,
        dispatcher: Arc<Disp>,
        queue_trigger: Arc<Trig>,
        network_id: u64,
    ) -> Self {
        Self {
            subscriptions,
            dispatcher,
            queue_trigger,
            network_id,
        }
    }

    /// Notify interested parties that `tx` transitioned from `previous` to
    /// its current status.
    ///
    /// Coalescing rules: `queued` never dispatches on its own (folded into
    /// the eventual `unconfirmed`/`error` notification); `new -> error`
    /// notifies only the sender, since the counterparty never heard about
    /// the transaction; every other transition notifies both endpoints.
    /// Contract-creation transactions (`to_address = None`) never notify a
    /// recipient side. A Queue Processor pass for `to_address` is always
    /// triggered when a recipient exists, win or lose.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription lookup or dispatch fails.
    #[instrument(skip(self, tx), fields(tx_id = %tx.id, status = %tx.status))]
    pub async fn notify_status_change(
        &self,
        previous: TransactionStatus,
        tx: &Transaction,
    ) -> Result<()> {
        if matches!(tx.status, TransactionStatus::New | TransactionStatus::Queued) {
            debug!("status not yet dispatch-worthy, coalescing");
            return Ok(());
        }

        let Some(hash) = tx.hash else {
            warn!("status change on a row with no hash, skipping dispatch");
            return Ok(());
        };

        let message = NotificationMessage::Payment(PaymentMessage {
            tx_hash: hash,
            from_address: tx.from_address,
            to_address: tx.to_address,
            value: tx.value,
            status: tx.status,
            network_id: self.network_id,
        });

        self.dispatch_to_address(tx.from_address, &message).await?;

        let sender_only =
            tx.status == TransactionStatus::Error && previous == TransactionStatus::New;

        if let Some(to) = tx.to_address {
            if !sender_only {
                self.dispatch_to_address(to, &message).await?;
            }
            self.queue_trigger.trigger_pass(to);
        }

        Ok(())
    }

    /// Notify interested parties of a token transfer tied to `tx_hash`,
    /// rendered at `status` (mirroring the owning transaction's status).
    ///
    /// For the wrapped-ether contract's Deposit/Withdrawal, callers should
    /// additionally call [`Self::notify_ether_leg`] to reflect the
    /// underlying ether balance change.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription lookup or dispatch fails.
    #[instrument(skip(self, transfer), fields(contract = %transfer.contract_address))]
    pub async fn notify_token_transfer(
        &self,
        transfer: &TokenTransfer,
        status: TransactionStatus,
        tx_hash: TxHash,
    ) -> Result<()> {
        let message = NotificationMessage::TokenPayment(TokenPaymentMessage {
            tx_hash,
            from_address: transfer.from_address,
            to_address: Some(transfer.to_address),
            value: transfer.value,
            status,
            network_id: self.network_id,
            contract_address: transfer.contract_address,
        });

        self.dispatch_to_address(transfer.from_address, &message).await?;
        self.dispatch_to_address(transfer.to_address, &message).await?;
        self.queue_trigger.trigger_pass(transfer.to_address);

        Ok(())
    }

    /// Render and dispatch the synthetic Payment that accompanies a
    /// wrapped-ether Deposit/Withdrawal, reflecting the underlying ether
    /// balance change rather than the ERC20 accounting change.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription lookup or dispatch fails.
    #[instrument(skip(self))]
    pub async fn notify_ether_leg(
        &self,
        address: EthAddress,
        value: WeiAmount,
        status: TransactionStatus,
        tx_hash: TxHash,
    ) -> Result<()> {
        let message = NotificationMessage::Payment(PaymentMessage {
            tx_hash,
            from_address: address,
            to_address: Some(address),
            value,
            status,
            network_id: self.network_id,
        });
        self.dispatch_to_address(address, &message).await
    }

    /// Look up every active subscription for `address` and dispatch
    /// `message` to each registration's transport, logging (rather than
    /// failing the caller) when an individual delivery errors — a single
    /// dead device should not block notifying the rest.
    async fn dispatch_to_address(
        &self,
        address: EthAddress,
        message: &NotificationMessage,
    ) -> Result<()> {
        let subs = self.subscriptions.list_for_address(&address).await?;
        for sub in subs {
            if let Err(err) = self
                .dispatcher
                .dispatch(sub.service, &sub.token_id, message)
                .await
            {
                warn!(%address, transport = %sub.service, error = %err, "notification dispatch failed");
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OBJECT-SAFE FACADE
// ═══════════════════════════════════════════════════════════════════════════════

/// Object-safe view of [`Notifier`]'s three entry points, so the Queue
/// Processor, Block Monitor, and Intake can depend on `Arc<dyn NotifierPort>`
/// instead of threading `Notifier`'s three generic parameters through their
/// own signatures.
#[async_trait::async_trait]
pub trait NotifierPort: Send + Sync {
    /// See [`Notifier::notify_status_change`].
    async fn notify_status_change(
        &self,
        previous: TransactionStatus,
        tx: &Transaction,
    ) -> Result<()>;

    /// See [`Notifier::notify_token_transfer`].
    async fn notify_token_transfer(
        &self,
        transfer: &TokenTransfer,
        status: TransactionStatus,
        tx_hash: TxHash,
    ) -> Result<()>;

    /// See [`Notifier::notify_ether_leg`].
    async fn notify_ether_leg(
        &self,
        address: EthAddress,
        value: WeiAmount,
        status: TransactionStatus,
        tx_hash: TxHash,
    ) -> Result<()>;
}

#[async_trait::async_trait]
impl<Sub, Disp, Trig> NotifierPort for Notifier<Sub, Disp, Trig>
where
    Sub: SubscriptionStore + 'static,
    Disp: NotificationDispatcher + 'static,
    Trig: QueuePassTrigger + 'static,
{
    async fn notify_status_change(
        &self,
        previous: TransactionStatus,
        tx: &Transaction,
    ) -> Result<()> {
        Self::notify_status_change(self, previous, tx).await
    }

    async fn notify_token_transfer(
        &self,
        transfer: &TokenTransfer,
        status: TransactionStatus,
        tx_hash: TxHash,
    ) -> Result<()> {
        Self::notify_token_transfer(self, transfer, status, tx_hash).await
    }

    async fn notify_ether_leg(
        &self,
        address: EthAddress,
        value: WeiAmount,
        status: TransactionStatus,
        tx_hash: TxHash,
    ) -> Result<()> {
        Self::notify_ether_leg(self, address, value, status, tx_hash).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::ports::RecordingDispatcher;
    use crate::types::entities::Subscription;
    use crate::types::enums::Transport;

    #[derive(Debug, Default)]
    struct MockSubscriptionStore {
        subs: Vec<Subscription>,
    }

    #[async_trait::async_trait]
    impl SubscriptionStore for MockSubscriptionStore {
        async fn upsert(&self, _subscription: &Subscription) -> Result<()> {
            Ok(())
        }

        async fn list_for_address(&self, address: &EthAddress) -> Result<Vec<Subscription>> {
            Ok(self
                .subs
                .iter()
                .filter(|s| &s.eth_address == address)
                .cloned()
                .collect())
        }

        async fn list_subscribed_addresses(&self, token_id: &str) -> Result<Vec<EthAddress>> {
            Ok(self
                .subs
                .iter()
                .filter(|s| s.token_id == token_id)
                .map(|s| s.eth_address)
                .collect())
        }

        async fn delete(
            &self,
            _token_id: &str,
            _address: &EthAddress,
            _service: Transport,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct RecordingTrigger {
        triggered: Mutex<Vec<EthAddress>>,
    }

    impl QueuePassTrigger for RecordingTrigger {
        fn trigger_pass(&self, address: EthAddress) {
            self.triggered.lock().expect("lock poisoned").push(address);
        }
    }

    fn addr(byte: u8) -> EthAddress {
        EthAddress::from_slice(&[byte; 20]).expect("20 bytes")
    }

    fn sample_sub(address: EthAddress) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            token_id: "device-1".to_string(),
            eth_address: address,
            service: Transport::Ws,
            created_at: Utc::now(),
        }
    }

    fn sample_tx(status: TransactionStatus) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            hash: Some(crate::types::primitives::TxHash::new([7u8; 32])),
            from_address: addr(1),
            to_address: Some(addr(2)),
            nonce: 0,
            value: WeiAmount::from(1_000_u64),
            gas: 21_000,
            gas_price: WeiAmount::from(1_u64),
            data: Vec::new(),
            sig_v: None,
            sig_r: None,
            sig_s: None,
            status,
            blocknumber: None,
            sender_token_id: None,
            created: Utc::now(),
            updated: Utc::now(),
        }
    }

    fn build_notifier(
        subs: Vec<Subscription>,
    ) -> (
        Notifier<MockSubscriptionStore, RecordingDispatcher, RecordingTrigger>,
        Arc<RecordingDispatcher>,
        Arc<RecordingTrigger>,
    ) {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let trigger = Arc::new(RecordingTrigger::default());
        let notifier = Notifier::new(
            Arc::new(MockSubscriptionStore { subs }),
            dispatcher.clone(),
            trigger.clone(),
            1,
        );
        (notifier, dispatcher, trigger)
    }

    #[tokio::test]
    async fn queued_never_dispatches() {
        let (notifier, dispatcher, trigger) = build_notifier(vec![]);
        notifier
            .notify_status_change(TransactionStatus::New, &sample_tx(TransactionStatus::Queued))
            .await
            .unwrap();
        assert!(dispatcher.sent.lock().unwrap().is_empty());
        assert!(trigger.triggered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_to_error_notifies_sender_only() {
        let from = addr(1);
        let to = addr(2);
        let (notifier, dispatcher, trigger) =
            build_notifier(vec![sample_sub(from), sample_sub(to)]);

        notifier
            .notify_status_change(TransactionStatus::New, &sample_tx(TransactionStatus::Error))
            .await
            .unwrap();

        let sent = dispatcher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "device-1");
        // to_address still gets a trigger even though it wasn't notified.
        assert_eq!(*trigger.triggered.lock().unwrap(), vec![to]);
    }

    #[tokio::test]
    async fn unconfirmed_notifies_both_endpoints() {
        let from = addr(1);
        let to = addr(2);
        let (notifier, dispatcher, trigger) =
            build_notifier(vec![sample_sub(from), sample_sub(to)]);

        notifier
            .notify_status_change(
                TransactionStatus::Queued,
                &sample_tx(TransactionStatus::Unconfirmed),
            )
            .await
            .unwrap();

        assert_eq!(dispatcher.sent.lock().unwrap().len(), 2);
        assert_eq!(*trigger.triggered.lock().unwrap(), vec![to]);
    }

    #[tokio::test]
    async fn contract_creation_never_notifies_recipient() {
        let from = addr(1);
        let (notifier, dispatcher, trigger) = build_notifier(vec![sample_sub(from)]);

        let mut tx = sample_tx(TransactionStatus::Confirmed);
        tx.to_address = None;

        notifier
            .notify_status_change(TransactionStatus::Unconfirmed, &tx)
            .await
            .unwrap();

        assert_eq!(dispatcher.sent.lock().unwrap().len(), 1);
        assert!(trigger.triggered.lock().unwrap().is_empty());
    }
}
