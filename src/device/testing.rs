use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::future::pending;
use tokio::time::Instant;
use uuid::Uuid;

use crate::device::transport::{NotificationStream, Transport};
use crate::device::types::Notification;
use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find,
    Connect,
    Notifications,
    Subscribe(Uuid),
    Unsubscribe(Uuid),
    Disconnect,
    IsConnected,
}

#[derive(Default)]
struct Script {
    hidden_finds: usize,
    failing_connects: usize,
    failing_subscriptions: HashSet<Uuid>,
    failing_streams: usize,
    hung_liveness: bool,
    connected: bool,
    notifications: Option<UnboundedSender<Notification>>,
    calls: Vec<(Instant, Call)>,
}

/// In-memory transport whose behaviour is scripted by the test.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` searches do not find the peripheral.
    pub fn hide_device(&self, count: usize) {
        self.script.lock().unwrap().hidden_finds = count;
    }

    /// The next `count` connection attempts fail.
    pub fn fail_connects(&self, count: usize) {
        self.script.lock().unwrap().failing_connects = count;
    }

    pub fn fail_subscription(&self, characteristic: Uuid) {
        self.script.lock().unwrap().failing_subscriptions.insert(characteristic);
    }

    /// The next `count` attempts to open the notification stream fail.
    pub fn fail_notification_streams(&self, count: usize) {
        self.script.lock().unwrap().failing_streams = count;
    }

    /// Connection status checks never answer from now on.
    pub fn hang_liveness_checks(&self) {
        self.script.lock().unwrap().hung_liveness = true;
    }

    /// Closes the notification stream while the link stays up.
    pub fn end_notifications(&self) {
        self.script.lock().unwrap().notifications = None;
    }

    pub fn drop_link(&self) {
        self.script.lock().unwrap().connected = false;
    }

    pub fn notify(&self, characteristic: Uuid, value: &[u8]) {
        let script = self.script.lock().unwrap();
        let sender = script.notifications.as_ref().expect("no notification stream was opened");
        sender.unbounded_send(Notification { uuid: characteristic, value: value.to_vec() }).unwrap();
    }

    pub fn calls(&self) -> Vec<(Instant, Call)> {
        self.script.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) -> std::sync::MutexGuard<'_, Script> {
        let mut script = self.script.lock().unwrap();
        script.calls.push((Instant::now(), call));
        script
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Peripheral = u32;

    async fn find_device_by_name(&self, _name: &str) -> Result<Option<u32>, TransportError> {
        let mut script = self.record(Call::Find);
        if script.hidden_finds > 0 {
            script.hidden_finds -= 1;
            return Ok(None);
        }
        Ok(Some(1))
    }

    async fn connect(&self, _peripheral: &u32) -> Result<(), TransportError> {
        let mut script = self.record(Call::Connect);
        if script.failing_connects > 0 {
            script.failing_connects -= 1;
            return Err(TransportError::NotConnected);
        }
        script.connected = true;
        Ok(())
    }

    async fn notifications(&self, _peripheral: &u32) -> Result<NotificationStream, TransportError> {
        let mut script = self.record(Call::Notifications);
        if script.failing_streams > 0 {
            script.failing_streams -= 1;
            return Err(TransportError::NotConnected);
        }
        let (sender, receiver) = unbounded();
        script.notifications = Some(sender);
        Ok(Box::pin(receiver))
    }

    async fn subscribe(&self, _peripheral: &u32, characteristic: Uuid) -> Result<(), TransportError> {
        let script = self.record(Call::Subscribe(characteristic));
        if script.failing_subscriptions.contains(&characteristic) {
            return Err(TransportError::MissingCharacteristic(characteristic));
        }
        Ok(())
    }

    async fn unsubscribe(&self, _peripheral: &u32, characteristic: Uuid) -> Result<(), TransportError> {
        let script = self.record(Call::Unsubscribe(characteristic));
        if !script.connected {
            return Err(TransportError::NotConnected);
        }
        Ok(())
    }

    async fn disconnect(&self, _peripheral: &u32) -> Result<(), TransportError> {
        self.record(Call::Disconnect).connected = false;
        Ok(())
    }

    async fn is_connected(&self, _peripheral: &u32) -> Result<bool, TransportError> {
        let (hung, connected) = {
            let script = self.record(Call::IsConnected);
            (script.hung_liveness, script.connected)
        };
        if hung {
            pending::<()>().await;
        }
        Ok(connected)
    }
}
