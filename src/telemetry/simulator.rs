use rumqttc::{Event, Outgoing, QoS};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, Instant, MissedTickBehavior};

use super::error::TelemetryError;
use super::ingest::encode_value;
use super::snapshot::{Field, PoseFix};
use super::transport::open;
use crate::config::TelemetryConfig;

const CENTER_LAT: f64 = 45.0;
const CENTER_LON: f64 = 2.0;
const CRUISE_ALT_M: f64 = 5000.0;
const ORBIT_RADIUS_M: f64 = 8000.0;
const ORBIT_PERIOD_S: f64 = 600.0;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Synthetic pose of an aircraft flying a slow clockwise circle.
pub fn synthetic_pose(t: f64) -> PoseFix {
    let angle = std::f64::consts::TAU * t / ORBIT_PERIOD_S;
    let north = ORBIT_RADIUS_M * angle.cos();
    let east = ORBIT_RADIUS_M * angle.sin();
    PoseFix {
        roll: 12.0 + 1.5 * (t / 7.0).sin(),
        pitch: 3.0 + 0.5 * (t / 11.0).sin(),
        heading: (angle.to_degrees() + 90.0).rem_euclid(360.0),
        altitude: CRUISE_ALT_M + 50.0 * (t / 60.0).sin(),
        latitude: CENTER_LAT + (north / EARTH_RADIUS_M).to_degrees(),
        longitude: CENTER_LON
            + (east / (EARTH_RADIUS_M * CENTER_LAT.to_radians().cos())).to_degrees(),
    }
}

fn pose_value(pose: &PoseFix, field: Field) -> f64 {
    match field {
        Field::Roll => pose.roll,
        Field::Pitch => pose.pitch,
        Field::Heading => pose.heading,
        Field::Altitude => pose.altitude,
        Field::Longitude => pose.longitude,
        Field::Latitude => pose.latitude,
    }
}

/// Tick period for `rate_hz` messages per second on each topic.
pub fn publish_period(rate_hz: f64) -> Result<Duration, TelemetryError> {
    if !(rate_hz.is_finite() && rate_hz > 0.0) {
        return Err(TelemetryError::InvalidRate(rate_hz));
    }
    Duration::try_from_secs_f64(1.0 / rate_hz)
        .ok()
        .filter(|period| !period.is_zero())
        .ok_or(TelemetryError::InvalidRate(rate_hz))
}

/// Publishes the synthetic flight on the configured topics at `rate_hz` until stopped.
pub async fn run_simulator(
    config: &TelemetryConfig,
    rate_hz: f64,
    mut stop_rx: oneshot::Receiver<()>,
) -> Result<(), TelemetryError> {
    let period = publish_period(rate_hz)?;
    let client_id = format!("{}_simulator", config.client_id);
    let (client, mut eventloop) = open(config, &client_id);

    let poller = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("simulator connection error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });

    let routes: Vec<(String, Field)> = config
        .topics
        .iter()
        .filter_map(|t| Field::from_topic(t).map(|f| (t.clone(), f)))
        .collect();
    log::info!(
        "simulating {} channels at {} Hz on {}:{}",
        routes.len(),
        rate_hz,
        config.host,
        config.port
    );

    let start = Instant::now();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut stop_rx => break,
        }
        let pose = synthetic_pose(start.elapsed().as_secs_f64());
        for (topic, field) in &routes {
            let payload = encode_value(pose_value(&pose, *field) as f32, config.byte_order);
            client
                .publish(topic.as_str(), QoS::AtMostOnce, false, payload.to_vec())
                .await?;
        }
    }

    log::info!("stopping simulator");
    client.disconnect().await?;
    let _ = tokio::time::timeout(Duration::from_secs(1), poller).await;
    Ok(())
}
