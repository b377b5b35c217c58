//! Bus wiring for the payment participant.

use std::sync::Arc;

use bus::{MessageBus, Subscription};
use messages::{topics, Command, Naming};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::handler::PaymentHandler;
use crate::store::PaymentStore;

/// Subscription-name prefix for this participant.
pub const SERVICE_NAME: &str = "payment";

const COMMAND_TOPICS: &[&str] = &[
    topics::CMD_PAYMENT_GENERATE_CODE,
    topics::CMD_PAYMENT_PROCESS,
    topics::CMD_PAYMENT_REFUND,
];

const EVENT_TOPICS: &[&str] = &[
    topics::EVT_PAYMENT_CODE_GENERATED,
    topics::EVT_PAYMENT_CODE_GENERATION_FAILED,
    topics::EVT_PAYMENT_PROCESSED,
    topics::EVT_PAYMENT_FAILED,
    topics::EVT_PAYMENT_REFUNDED,
    topics::EVT_PAYMENT_REFUND_FAILED,
];

/// Idempotently creates every topic this participant publishes to and every
/// subscription it consumes from.
pub async fn ensure_wiring(bus: &dyn MessageBus, naming: &Naming) -> Result<()> {
    for topic in EVENT_TOPICS {
        bus.ensure_topic(&naming.topic(topic)).await?;
    }
    for topic in COMMAND_TOPICS {
        let full = naming.topic(topic);
        bus.ensure_topic(&full).await?;
        bus.ensure_subscription(&naming.subscription(SERVICE_NAME, topic), &full)
            .await?;
    }
    Ok(())
}

/// Subscribes to the three command topics and spawns a handler loop per
/// subscription. [`ensure_wiring`] must have run first.
pub async fn start<S: PaymentStore + 'static>(
    handler: Arc<PaymentHandler<S>>,
    bus: Arc<dyn MessageBus>,
    naming: &Naming,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();
    for topic in COMMAND_TOPICS {
        let subscription = bus
            .subscribe(&naming.subscription(SERVICE_NAME, topic))
            .await?;
        let handler = handler.clone();
        handles.push(tokio::spawn(run(handler, subscription)));
    }
    Ok(handles)
}

/// Consumes one subscription until the bus shuts down, acking every delivery.
pub async fn run<S: PaymentStore>(
    handler: Arc<PaymentHandler<S>>,
    mut subscription: Box<dyn Subscription>,
) {
    while let Some(delivery) = subscription.recv().await {
        match delivery.message().decode::<Command>() {
            Ok(command) => {
                if let Err(err) = handler.handle(&command).await {
                    tracing::error!(
                        command = command.command_type(),
                        transaction_id = %command.transaction_id(),
                        error = %err,
                        "payment command handling failed"
                    );
                }
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    payload = %delivery.message().data_lossy(),
                    "discarding undecodable payment command"
                );
            }
        }
        delivery.ack();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryPaymentStore;
    use bus::{BusMessage, InMemoryBus};
    use common::{CustomerId, Money, PaymentType, TransactionId, VehicleId};
    use messages::{Event, GeneratePaymentCodeData};

    #[tokio::test]
    async fn end_to_end_generate_over_the_bus() {
        let bus = InMemoryBus::new();
        let naming = Naming::new("test-project");
        ensure_wiring(&bus, &naming).await.unwrap();

        let observed = naming.subscription("observer", topics::EVT_PAYMENT_CODE_GENERATED);
        bus.ensure_subscription(&observed, &naming.topic(topics::EVT_PAYMENT_CODE_GENERATED))
            .await
            .unwrap();

        let shared_bus: Arc<dyn MessageBus> = Arc::new(bus.clone());
        let handler = Arc::new(PaymentHandler::new(
            InMemoryPaymentStore::new(),
            shared_bus.clone(),
            naming.clone(),
        ));
        let handles = start(handler, shared_bus, &naming).await.unwrap();

        let txn = TransactionId::new();
        let command = Command::GeneratePaymentCode(GeneratePaymentCodeData {
            transaction_id: txn,
            customer_id: CustomerId::new(),
            vehicle_id: VehicleId::new(),
            amount: Money::from_cents(4_500_000),
            payment_type: PaymentType::Cash,
        });
        bus.publish(
            &naming.topic(topics::CMD_PAYMENT_GENERATE_CODE),
            BusMessage::encode(&command, txn).unwrap(),
        )
        .await
        .unwrap();

        let mut sub = bus.subscribe(&observed).await.unwrap();
        let delivery = sub.recv().await.unwrap();
        let event: Event = delivery.message().decode().unwrap();
        delivery.ack();
        let Event::PaymentCodeGenerated(data) = event else {
            panic!("expected PaymentCodeGenerated");
        };
        assert_eq!(data.transaction_id, txn);
        assert!(!data.payment_code.is_empty());

        bus.close();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
