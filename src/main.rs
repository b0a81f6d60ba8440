//! VeloTrain - Virtual Indoor Cycling Trainer
//!
//! Main entry point: runs the emulator against an in-process demo transport
//! that accepts everything and logs the GATT traffic, so the simulation and
//! protocol paths can be exercised without a Bluetooth adapter. Swap the
//! transport for a host-stack binding to go on air.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use velotrain::ble::transport::{AdvertisingData, ServiceDef};
use velotrain::ble::uuids::{
    CYCLING_POWER_MEASUREMENT_UUID, INDOOR_BIKE_DATA_UUID, RSC_MEASUREMENT_UUID,
};
use velotrain::{
    EmulatorConfig, EmulatorUpdate, PeripheralCoordinator, Transport, TransportEvent,
};
use velotrain::ble::TransportState;

/// Transport stand-in that acknowledges every request and logs traffic.
struct DemoTransport {
    events: Sender<TransportEvent>,
}

impl Transport for DemoTransport {
    fn add_service(&mut self, service: ServiceDef) {
        tracing::debug!(
            "registering service {} ({} characteristics)",
            service.uuid,
            service.characteristics.len()
        );
        let _ = self.events.send(TransportEvent::ServiceAdded {
            uuid: service.uuid,
            ok: true,
        });
    }

    fn start_advertising(&mut self, data: AdvertisingData) {
        tracing::info!(
            "advertising \"{}\" with {} service(s)",
            data.local_name,
            data.service_uuids.len()
        );
        let _ = self
            .events
            .send(TransportEvent::AdvertisingStarted { ok: true });
    }

    fn stop_advertising(&mut self) {
        tracing::info!("advertising stopped");
    }

    fn update_value(&mut self, characteristic: uuid::Uuid, data: &[u8]) -> bool {
        tracing::debug!("notify {}: {:02x?}", characteristic, data);
        true
    }

    fn respond_to_read(&mut self, characteristic: uuid::Uuid, value: Option<Vec<u8>>) {
        tracing::debug!("read {} -> {:02x?}", characteristic, value);
    }

    fn respond_to_write(&mut self, characteristic: uuid::Uuid, ok: bool) {
        tracing::debug!("write ack {} (ok={})", characteristic, ok);
    }
}

fn drain_events(
    coordinator: &mut PeripheralCoordinator<DemoTransport>,
    rx: &Receiver<TransportEvent>,
) {
    loop {
        match rx.try_recv() {
            Ok(event) => coordinator.handle_event(event, Instant::now()),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting VeloTrain v{}", env!("CARGO_PKG_VERSION"));

    let config = match EmulatorConfig::default_path() {
        Ok(path) => EmulatorConfig::load(&path)?,
        Err(_) => EmulatorConfig::default(),
    };

    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1);

    let (event_tx, event_rx) = unbounded();
    let mut coordinator =
        PeripheralCoordinator::new(DemoTransport { events: event_tx.clone() }, config, seed);
    let updates = coordinator.update_receiver();

    // The demo adapter is ready immediately, and one consumer subscribes to
    // all three measurement streams.
    event_tx.send(TransportEvent::StateChanged(TransportState::Ready))?;
    coordinator.start_broadcast();
    for characteristic in [
        INDOOR_BIKE_DATA_UUID,
        CYCLING_POWER_MEASUREMENT_UUID,
        RSC_MEASUREMENT_UUID,
    ] {
        event_tx.send(TransportEvent::Subscribed(characteristic))?;
    }

    loop {
        drain_events(&mut coordinator, &event_rx);
        coordinator.poll(Instant::now());

        while let Ok(update) = updates.try_recv() {
            match update {
                EmulatorUpdate::Stats(stats) => {
                    tracing::info!("stats {}", serde_json::to_string(&stats)?);
                }
                EmulatorUpdate::StateChanged(state) => {
                    tracing::info!("broadcast state: {}", state);
                }
                EmulatorUpdate::Event(_) => {}
            }
        }

        let sleep_for = coordinator
            .next_wakeup()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_millis(100))
            .min(Duration::from_millis(250));

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    coordinator.stop_broadcast();
    tracing::info!(
        "session {}",
        serde_json::to_string(&coordinator.session_metrics())?
    );
    tracing::info!("VeloTrain shut down");
    Ok(())
}
