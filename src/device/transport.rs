use std::pin::Pin;
use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use crate::device::types::Notification;
use crate::error::TransportError;

pub type NotificationStream = Pin<Box<dyn Stream<Item = Notification> + Send>>;

/// The wireless link the connection state machine drives.
///
/// All notifications of a peripheral arrive on a single stream (see [`Transport::notifications`]);
/// [`Transport::subscribe`] only enables delivery for one characteristic.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Peripheral: Clone + Send + Sync + 'static;

    async fn find_device_by_name(&self, name: &str) -> Result<Option<Self::Peripheral>, TransportError>;

    async fn connect(&self, peripheral: &Self::Peripheral) -> Result<(), TransportError>;

    async fn notifications(&self, peripheral: &Self::Peripheral) -> Result<NotificationStream, TransportError>;

    async fn subscribe(&self, peripheral: &Self::Peripheral, characteristic: Uuid) -> Result<(), TransportError>;

    async fn unsubscribe(&self, peripheral: &Self::Peripheral, characteristic: Uuid) -> Result<(), TransportError>;

    async fn disconnect(&self, peripheral: &Self::Peripheral) -> Result<(), TransportError>;

    async fn is_connected(&self, peripheral: &Self::Peripheral) -> Result<bool, TransportError>;
}
