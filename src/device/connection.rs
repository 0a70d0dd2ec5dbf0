use std::future::Future;
use futures::channel::mpsc::Sender;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::spawn;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::types::{CharacteristicsConfig, Config};
use crate::controller::types::{ControllerCommand, LinkStatus};
use crate::device::codec::decode;
use crate::device::constants::{IS_CONNECTED_DEADLINE, POLL_DELAY, SUBSCRIBE_DELAY, TEARDOWN_DEADLINE};
use crate::device::transport::{NotificationStream, Transport};
use crate::device::types::{Characteristic, ConnectionPhase};
use crate::error::TransportError;

/// One live connection: the characteristics that were subscribed and the task that forwards
/// their notifications to the controller.
struct ConnectionSession<P> {
    peripheral: P,
    subscriptions: Vec<(Characteristic, Uuid)>,
    reader_cancel: CancellationToken,
    reader: JoinHandle<()>,
}

enum ConnectionState<P> {
    Idle,
    Scanning {
        // wait RECONNECT_DELAY before searching
        retry: bool,
    },
    Connecting {
        peripheral: P,
    },
    Subscribing {
        peripheral: P,
    },
    Monitoring {
        session: ConnectionSession<P>,
    },
    Disconnected,
}

impl<P> ConnectionState<P> {
    fn phase(&self) -> ConnectionPhase {
        match self {
            ConnectionState::Idle => ConnectionPhase::Idle,
            ConnectionState::Scanning { .. } => ConnectionPhase::Scanning,
            ConnectionState::Connecting { .. } => ConnectionPhase::Connecting,
            ConnectionState::Subscribing { .. } => ConnectionPhase::Subscribing,
            ConnectionState::Monitoring { .. } => ConnectionPhase::Monitoring,
            ConnectionState::Disconnected => ConnectionPhase::Disconnected,
        }
    }
}

/// Returns false if `cancel` fired before the delay elapsed.
async fn wait(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => true,
    }
}

async fn within<F, O>(millis: u64, operation: &'static str, future: F) -> Result<O, TransportError>
where
    F: Future<Output = Result<O, TransportError>>,
{
    timeout(Duration::from_millis(millis), future)
        .await
        .map_err(|_| TransportError::Timeout(operation))?
}

fn read_notifications_task(
    cancel: CancellationToken,
    mut notifications: NotificationStream,
    characteristics: CharacteristicsConfig,
    subscribed: Vec<Characteristic>,
    mut events: Sender<ControllerCommand>,
) -> JoinHandle<()> {
    spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                notification = notifications.next() => {
                    let Some(notification) = notification else {
                        debug!("Notification stream ended");
                        break 'mainloop;
                    };

                    let characteristic = Characteristic::from_uuid(&notification.uuid, &characteristics)
                        .filter(|characteristic| subscribed.contains(characteristic));

                    let Some(characteristic) = characteristic else {
                        debug!("Ignoring notification from {}", notification.uuid);
                        continue;
                    };

                    match decode(characteristic, &notification.value) {
                        Ok(Some(event)) => {
                            if events.send(ControllerCommand::Event(event)).await.is_err() {
                                warn!("Device controller is gone, no longer reading notifications");
                                break 'mainloop;
                            }
                        },
                        Ok(None) => {},
                        Err(err) => warn!("Dropping {} notification: {}", characteristic, err),
                    }
                },
            }
        }
    })
}

/// Drives the scan → connect → subscribe → monitor → disconnect lifecycle of one peripheral.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    device_name: String,
    characteristics: CharacteristicsConfig,
    reconnect_delay: Duration,
    events: Sender<ControllerCommand>,
    phase: watch::Sender<ConnectionPhase>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, config: &Config, events: Sender<ControllerCommand>) -> Self {
        let (phase, _) = watch::channel(ConnectionPhase::Idle);

        ConnectionManager {
            transport,
            device_name: config.device_name.clone(),
            characteristics: config.characteristics.clone(),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            events,
            phase,
        }
    }

    pub fn phase(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.subscribe()
    }

    /// Runs until `cancel` fires, then releases whatever the current state holds.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut state = ConnectionState::Idle;

        while !cancel.is_cancelled() {
            state = self.advance_state(state, &cancel).await;
            if !cancel.is_cancelled() {
                self.report_phase(state.phase()).await;
            }
        }

        info!("Shutting down connection to {}", self.device_name);
        self.shutdown(state).await;
    }

    async fn advance_state(&self, state: ConnectionState<T::Peripheral>, cancel: &CancellationToken) -> ConnectionState<T::Peripheral> {
        match state {
            ConnectionState::Idle => ConnectionState::Scanning { retry: false },
            ConnectionState::Scanning { retry } => {
                if retry && !wait(cancel, self.reconnect_delay).await {
                    return ConnectionState::Scanning { retry };
                }

                let result = tokio::select! {
                    _ = cancel.cancelled() => return ConnectionState::Scanning { retry: false },
                    result = self.transport.find_device_by_name(&self.device_name) => result,
                };

                match result {
                    Ok(Some(peripheral)) => ConnectionState::Connecting { peripheral },
                    Ok(None) => {
                        info!("Could not find {}; retrying in {:?}", self.device_name, self.reconnect_delay);
                        ConnectionState::Scanning { retry: true }
                    },
                    Err(err) => {
                        warn!("Scanning failed: {}", err);
                        ConnectionState::Scanning { retry: true }
                    },
                }
            },
            ConnectionState::Connecting { peripheral } => {
                let result = tokio::select! {
                    _ = cancel.cancelled() => return ConnectionState::Connecting { peripheral },
                    result = self.transport.connect(&peripheral) => result,
                };

                match result {
                    Ok(()) => ConnectionState::Subscribing { peripheral },
                    Err(err) => {
                        warn!("Connecting to {} failed: {}", self.device_name, err);
                        ConnectionState::Scanning { retry: true }
                    },
                }
            },
            ConnectionState::Subscribing { peripheral } => {
                match self.subscribe_all(peripheral, cancel).await {
                    Some(session) => ConnectionState::Monitoring { session },
                    None => ConnectionState::Disconnected,
                }
            },
            ConnectionState::Monitoring { session } => {
                if !wait(cancel, Duration::from_millis(POLL_DELAY)).await {
                    return ConnectionState::Monitoring { session };
                }

                let live = match within(IS_CONNECTED_DEADLINE, "connection status check", self.transport.is_connected(&session.peripheral)).await {
                    Err(err) => {
                        warn!("Error checking for connection state: {}", err);
                        false
                    },
                    Ok(false) => {
                        warn!("Connection to {} lost", self.device_name);
                        false
                    },
                    Ok(true) => true,
                };

                if live && session.reader.is_finished() {
                    warn!("Notifications from {} stopped", self.device_name);
                } else if live {
                    return ConnectionState::Monitoring { session };
                }

                self.teardown(session).await;
                ConnectionState::Disconnected
            },
            ConnectionState::Disconnected => {
                if !wait(cancel, self.reconnect_delay).await {
                    return ConnectionState::Disconnected;
                }
                ConnectionState::Scanning { retry: false }
            },
        }
    }

    async fn subscribe_all(&self, peripheral: T::Peripheral, cancel: &CancellationToken) -> Option<ConnectionSession<T::Peripheral>> {
        let notifications = match self.transport.notifications(&peripheral).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Failed to open the notification stream: {}", err);
                self.disconnect(&peripheral).await;
                return None;
            },
        };

        let mut subscriptions = Vec::new();

        for (i, characteristic) in Characteristic::ALL.into_iter().enumerate() {
            if i > 0 && !wait(cancel, Duration::from_millis(SUBSCRIBE_DELAY)).await {
                break;
            }

            let uuid = characteristic.uuid(&self.characteristics);
            info!("Subscribing to {} characteristic {}", characteristic, uuid);

            match self.transport.subscribe(&peripheral, uuid).await {
                Ok(()) => subscriptions.push((characteristic, uuid)),
                Err(err) => warn!("Subscribing to {} characteristic failed, skipping it: {}", characteristic, err),
            }
        }

        if subscriptions.is_empty() {
            warn!("No characteristic could be subscribed; {} will not send any events", self.device_name);
        }

        let reader_cancel = CancellationToken::new();
        let reader = read_notifications_task(
            reader_cancel.clone(),
            notifications,
            self.characteristics.clone(),
            subscriptions.iter().map(|(characteristic, _)| *characteristic).collect(),
            self.events.clone(),
        );

        info!("Listening for notifications from {}", self.device_name);
        Some(ConnectionSession { peripheral, subscriptions, reader_cancel, reader })
    }

    async fn teardown(&self, session: ConnectionSession<T::Peripheral>) {
        session.reader_cancel.cancel();
        if let Err(err) = session.reader.await {
            warn!("Read notifications task failed: {}", err);
        }

        for (characteristic, uuid) in &session.subscriptions {
            match within(TEARDOWN_DEADLINE, "unsubscribe", self.transport.unsubscribe(&session.peripheral, *uuid)).await {
                Err(err) => warn!("Unsubscribing from {} characteristic failed: {}", characteristic, err),
                Ok(()) => debug!("Unsubscribed from {} characteristic", characteristic),
            }
        }

        self.disconnect(&session.peripheral).await;
    }

    async fn disconnect(&self, peripheral: &T::Peripheral) {
        match within(TEARDOWN_DEADLINE, "disconnect", self.transport.disconnect(peripheral)).await {
            Err(err) => warn!("Disconnecting failed: {}", err),
            Ok(()) => info!("Disconnected from {}", self.device_name),
        }
    }

    async fn shutdown(&self, state: ConnectionState<T::Peripheral>) {
        match state {
            ConnectionState::Monitoring { session } => self.teardown(session).await,
            ConnectionState::Connecting { peripheral } | ConnectionState::Subscribing { peripheral } => {
                self.disconnect(&peripheral).await
            },
            ConnectionState::Idle | ConnectionState::Scanning { .. } | ConnectionState::Disconnected => {},
        }
        self.phase.send_replace(ConnectionPhase::Idle);
    }

    async fn report_phase(&mut self, phase: ConnectionPhase) {
        let previous = *self.phase.borrow();
        if previous == phase {
            return;
        }

        info!("Connection state: {:?}", phase);

        let link = match (previous, phase) {
            (_, ConnectionPhase::Monitoring) => Some(LinkStatus::Connected),
            (ConnectionPhase::Monitoring, _) => Some(LinkStatus::Disconnected),
            _ => None,
        };

        if let Some(link) = link {
            if self.events.send(ControllerCommand::Link(link)).await.is_err() {
                warn!("Device controller is gone, dropping link status {:?}", link);
            }
        }

        self.phase.send_replace(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc::{channel, Receiver};
    use tokio::time::Instant;

    use crate::device::testing::{Call, ScriptedTransport};
    use crate::device::types::DomainEvent;

    fn test_config() -> Config {
        Config {
            reconnect_delay_secs: 15,
            ..Config::default()
        }
    }

    fn start(transport: ScriptedTransport) -> (CancellationToken, watch::Receiver<ConnectionPhase>, Receiver<ControllerCommand>, JoinHandle<()>) {
        let (events, events_rx) = channel(64);
        let manager = ConnectionManager::new(transport, &test_config(), events);
        let phase = manager.phase();
        let cancel = CancellationToken::new();
        let handle = spawn(manager.run(cancel.clone()));
        (cancel, phase, events_rx, handle)
    }

    fn call_times(transport: &ScriptedTransport, wanted: &Call) -> Vec<Instant> {
        transport.calls().into_iter().filter(|(_, call)| call == wanted).map(|(at, _)| at).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn connect_error_rescans_after_one_reconnect_delay() {
        let transport = ScriptedTransport::new();
        transport.fail_connects(3);

        let (cancel, mut phase, _events, handle) = start(transport.clone());
        phase.wait_for(|phase| *phase == ConnectionPhase::Monitoring).await.unwrap();
        cancel.cancel();
        handle.await.unwrap();

        let finds = call_times(&transport, &Call::Find);
        let connects = call_times(&transport, &Call::Connect);
        assert_eq!(finds.len(), 4);
        assert_eq!(connects.len(), 4);

        for i in 0..3 {
            assert_eq!(finds[i + 1] - connects[i], Duration::from_secs(15));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_retries_at_fixed_interval() {
        let transport = ScriptedTransport::new();
        transport.hide_device(3);

        let (cancel, mut phase, _events, handle) = start(transport.clone());
        phase.wait_for(|phase| *phase == ConnectionPhase::Monitoring).await.unwrap();
        cancel.cancel();
        handle.await.unwrap();

        let finds = call_times(&transport, &Call::Find);
        assert_eq!(finds.len(), 4);
        for pair in finds.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(15));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn partial_subscription_still_delivers_events() {
        let config = test_config();
        let encoder_button = config.characteristics.encoder_button;
        let encoder_position = config.characteristics.encoder_position;

        let transport = ScriptedTransport::new();
        transport.fail_subscription(encoder_button);

        let (cancel, mut phase, mut events, handle) = start(transport.clone());
        phase.wait_for(|phase| *phase == ConnectionPhase::Monitoring).await.unwrap();

        transport.notify(encoder_button, b"single click");
        transport.notify(encoder_position, b"3 80");

        assert_eq!(events.next().await, Some(ControllerCommand::Link(LinkStatus::Connected)));
        assert_eq!(
            events.next().await,
            Some(ControllerCommand::Event(DomainEvent::EncoderPosition { position: 3, battery: Some(80) })),
        );

        cancel.cancel();
        handle.await.unwrap();

        let calls: Vec<Call> = transport.calls().into_iter().map(|(_, call)| call).collect();
        assert!(!calls.contains(&Call::Unsubscribe(encoder_button)));
        assert!(calls.contains(&Call::Unsubscribe(encoder_position)));
        assert_eq!(calls.last(), Some(&Call::Disconnect));
    }

    #[tokio::test(start_paused = true)]
    async fn link_loss_tears_down_and_reconnects() {
        let transport = ScriptedTransport::new();

        let (cancel, mut phase, mut events, handle) = start(transport.clone());
        phase.wait_for(|phase| *phase == ConnectionPhase::Monitoring).await.unwrap();
        assert_eq!(events.next().await, Some(ControllerCommand::Link(LinkStatus::Connected)));

        transport.drop_link();
        assert_eq!(events.next().await, Some(ControllerCommand::Link(LinkStatus::Disconnected)));
        let lost_at = Instant::now();

        assert_eq!(events.next().await, Some(ControllerCommand::Link(LinkStatus::Connected)));

        cancel.cancel();
        handle.await.unwrap();

        let disconnects = call_times(&transport, &Call::Disconnect);
        assert_eq!(disconnects.len(), 2);
        assert_eq!(disconnects[0], lost_at);

        let finds = call_times(&transport, &Call::Find);
        assert_eq!(finds.len(), 2);
        assert_eq!(finds[1] - lost_at, Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_while_scanning_returns_promptly() {
        let transport = ScriptedTransport::new();
        transport.hide_device(usize::MAX);

        let (cancel, mut phase, _events, handle) = start(transport.clone());
        phase.wait_for(|phase| *phase == ConnectionPhase::Scanning).await.unwrap();

        let started = Instant::now();
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(Instant::now(), started);
        assert!(call_times(&transport, &Call::Disconnect).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_liveness_check_counts_as_link_loss() {
        let transport = ScriptedTransport::new();

        let (cancel, mut phase, mut events, handle) = start(transport.clone());
        phase.wait_for(|phase| *phase == ConnectionPhase::Monitoring).await.unwrap();
        assert_eq!(events.next().await, Some(ControllerCommand::Link(LinkStatus::Connected)));

        transport.hang_liveness_checks();
        assert_eq!(events.next().await, Some(ControllerCommand::Link(LinkStatus::Disconnected)));

        let checks = call_times(&transport, &Call::IsConnected);
        let disconnects = call_times(&transport, &Call::Disconnect);
        assert_eq!(disconnects.len(), 1);
        assert_eq!(disconnects[0] - *checks.last().unwrap(), Duration::from_millis(IS_CONNECTED_DEADLINE));

        // cancelled while waiting to reconnect
        let started = Instant::now();
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(Instant::now(), started);
        assert_eq!(call_times(&transport, &Call::Find).len(), 1);
        assert_eq!(*phase.borrow(), ConnectionPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_notification_stream_counts_as_link_loss() {
        let transport = ScriptedTransport::new();

        let (cancel, mut phase, mut events, handle) = start(transport.clone());
        phase.wait_for(|phase| *phase == ConnectionPhase::Monitoring).await.unwrap();
        assert_eq!(events.next().await, Some(ControllerCommand::Link(LinkStatus::Connected)));

        let ended_at = Instant::now();
        transport.end_notifications();
        assert_eq!(events.next().await, Some(ControllerCommand::Link(LinkStatus::Disconnected)));

        let disconnects = call_times(&transport, &Call::Disconnect);
        assert_eq!(disconnects.len(), 1);
        assert_eq!(disconnects[0] - ended_at, Duration::from_millis(POLL_DELAY));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn notification_stream_failure_disconnects_and_retries() {
        let transport = ScriptedTransport::new();
        transport.fail_notification_streams(1);

        let (cancel, mut phase, mut events, handle) = start(transport.clone());
        phase.wait_for(|phase| *phase == ConnectionPhase::Monitoring).await.unwrap();
        // the failed session never reached monitoring
        assert_eq!(events.next().await, Some(ControllerCommand::Link(LinkStatus::Connected)));

        cancel.cancel();
        handle.await.unwrap();

        let calls: Vec<Call> = transport.calls().into_iter().map(|(_, call)| call).collect();
        assert_eq!(&calls[..4], &[Call::Find, Call::Connect, Call::Notifications, Call::Disconnect]);

        let disconnects = call_times(&transport, &Call::Disconnect);
        let finds = call_times(&transport, &Call::Find);
        assert_eq!(finds.len(), 2);
        assert_eq!(finds[1] - disconnects[0], Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_between_subscriptions_releases_the_partial_session() {
        let transport = ScriptedTransport::new();

        let (cancel, mut phase, mut events, handle) = start(transport.clone());
        phase.wait_for(|phase| *phase == ConnectionPhase::Subscribing).await.unwrap();
        tokio::time::sleep(Duration::from_millis(SUBSCRIBE_DELAY / 2)).await;

        let started = Instant::now();
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(Instant::now(), started);
        let calls: Vec<Call> = transport.calls().into_iter().map(|(_, call)| call).collect();
        let encoder_position = test_config().characteristics.encoder_position;
        assert_eq!(&calls[3..], &[
            Call::Subscribe(encoder_position),
            Call::Unsubscribe(encoder_position),
            Call::Disconnect,
        ]);
        // a session released by shutdown is never announced
        assert!(matches!(events.try_next(), Ok(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_while_monitoring_returns_promptly() {
        let transport = ScriptedTransport::new();

        let (cancel, mut phase, _events, handle) = start(transport.clone());
        phase.wait_for(|phase| *phase == ConnectionPhase::Monitoring).await.unwrap();
        tokio::time::sleep(Duration::from_millis(POLL_DELAY / 2)).await;

        let started = Instant::now();
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(Instant::now(), started);
        assert!(call_times(&transport, &Call::IsConnected).is_empty());
        assert_eq!(call_times(&transport, &Call::Disconnect).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_transport_calls_report_a_timeout() {
        let result = within(TEARDOWN_DEADLINE, "disconnect", futures::future::pending::<Result<(), TransportError>>()).await;
        assert!(matches!(result, Err(TransportError::Timeout("disconnect"))));
    }

    #[tokio::test]
    async fn long_reconnect_delay_is_accepted() {
        let (events, _events_rx) = channel(1);
        let config = Config {
            reconnect_delay_secs: u64::MAX / 10,
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let manager = ConnectionManager::new(ScriptedTransport::new(), &config, events);
        assert_eq!(manager.reconnect_delay, Duration::from_secs(u64::MAX / 10));
    }
}
