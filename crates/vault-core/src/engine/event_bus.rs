//! Broadcast channel for committed vault events.

use tokio::sync::broadcast;
use vault_types::Receipt;

/// Fan-out of receipts to any number of subscribers.
///
/// Publishing never blocks and never fails the operation that produced the
/// receipt; slow subscribers observe `Lagged` instead.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<Receipt>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Receipt> {
		self.sender.subscribe()
	}

	/// Publishes `receipt`, returning how many subscribers received it.
	pub fn publish(&self, receipt: Receipt) -> usize {
		// Err only means nobody is listening.
		self.sender.send(receipt).unwrap_or(0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use vault_types::{Address, VaultEvent};

	#[tokio::test]
	async fn test_subscribers_receive_published_receipts() {
		let bus = EventBus::new(8);
		assert_eq!(
			bus.publish(Receipt {
				id: "dropped".into(),
				event: VaultEvent::PaymentSuccess {
					sender: Address::ZERO,
					recipient: Address::ZERO
				},
				timestamp: 0,
			}),
			0
		);

		let mut rx = bus.subscribe();
		let receipt = Receipt {
			id: "r1".into(),
			event: VaultEvent::PaymentSuccess {
				sender: Address::repeat_byte(1),
				recipient: Address::repeat_byte(2),
			},
			timestamp: 7,
		};
		assert_eq!(bus.publish(receipt.clone()), 1);
		assert_eq!(rx.recv().await.unwrap(), receipt);
	}
}
