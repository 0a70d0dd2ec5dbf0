use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::device::transport::{NotificationStream, Transport};
use crate::device::types::Notification;
use crate::error::TransportError;

/// [`Transport`] backed by the platform bluetooth stack.
pub struct BtleTransport {
    manager: Manager,
    // adapters that are currently scanning; None until the first scan or after a scan failure
    adapters: Mutex<Option<Vec<Adapter>>>,
}

impl BtleTransport {
    pub async fn new() -> Result<Self, TransportError> {
        Ok(BtleTransport {
            manager: Manager::new().await?,
            adapters: Mutex::new(None),
        })
    }

    async fn start_scanning(&self) -> Result<Vec<Adapter>, TransportError> {
        let adapters = self.manager.adapters().await?;

        for adapter in &adapters {
            info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
            // the device is matched by name, which is not part of a scan filter
            adapter.start_scan(ScanFilter::default()).await?;
        }

        Ok(adapters)
    }

    async fn find_in_adapters(adapters: &[Adapter], name: &str) -> Result<Option<Peripheral>, TransportError> {
        for adapter in adapters {
            let peripherals = match adapter.peripherals().await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to query BLE adapter for peripherals: {}", err);
                    continue;
                },
            };

            for peripheral in peripherals {
                match peripheral.properties().await {
                    Err(err) => warn!("Could not query peripheral for properties: {:?}", err),
                    Ok(None) => debug!("Peripheral has no properties"),
                    Ok(Some(properties)) => {
                        if properties.local_name.as_deref() == Some(name) {
                            info!("Found {} ({} {:?})", name, properties.address, properties.address_type);
                            return Ok(Some(peripheral));
                        }
                    },
                }
            }
        }

        Ok(None)
    }

    fn find_characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic, TransportError> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|characteristic| characteristic.uuid == uuid)
            .ok_or(TransportError::MissingCharacteristic(uuid))
    }
}

#[async_trait]
impl Transport for BtleTransport {
    type Peripheral = Peripheral;

    async fn find_device_by_name(&self, name: &str) -> Result<Option<Peripheral>, TransportError> {
        let mut adapters = self.adapters.lock().await;

        if adapters.is_none() {
            *adapters = Some(self.start_scanning().await?);
        }

        let result = match adapters.as_deref() {
            Some(scanning) => Self::find_in_adapters(scanning, name).await,
            None => Ok(None),
        };

        if result.is_err() {
            // start over with fresh adapters on the next attempt
            *adapters = None;
        }
        result
    }

    async fn connect(&self, peripheral: &Peripheral) -> Result<(), TransportError> {
        info!("Connecting to peripheral...");
        peripheral.connect().await?;

        info!("Connected; Discovering services...");
        peripheral.discover_services().await?;

        for service in peripheral.services() {
            debug!("Service {:?}", service.uuid);
            for characteristic in &service.characteristics {
                debug!("  Characteristic {:?} {:?}", characteristic.uuid, characteristic.properties);
            }
        }

        Ok(())
    }

    async fn notifications(&self, peripheral: &Peripheral) -> Result<NotificationStream, TransportError> {
        let stream = peripheral.notifications().await?;

        Ok(Box::pin(stream.map(|data| Notification { uuid: data.uuid, value: data.value })))
    }

    async fn subscribe(&self, peripheral: &Peripheral, characteristic: Uuid) -> Result<(), TransportError> {
        let characteristic = Self::find_characteristic(peripheral, characteristic)?;
        peripheral.subscribe(&characteristic).await?;
        Ok(())
    }

    async fn unsubscribe(&self, peripheral: &Peripheral, characteristic: Uuid) -> Result<(), TransportError> {
        let characteristic = Self::find_characteristic(peripheral, characteristic)?;
        peripheral.unsubscribe(&characteristic).await?;
        Ok(())
    }

    async fn disconnect(&self, peripheral: &Peripheral) -> Result<(), TransportError> {
        peripheral.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self, peripheral: &Peripheral) -> Result<bool, TransportError> {
        Ok(peripheral.is_connected().await?)
    }
}
