//! Reachability-probing link driver.
//!
//! On Linux hosts, 802.11 association is owned by the platform supplicant;
//! what the bridge needs is to know when the broker host is actually
//! reachable. This driver probes the broker endpoint with TCP connects on
//! a fixed interval and synthesizes link events from edge changes.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, info};
use url::Url;

use super::state::LinkEvent;
use super::{LinkDriver, LinkError};
use crate::config::{MqttSection, WifiSection};

pub struct ProbeLinkDriver {
    target: String,
    ssid: String,
    interval: Duration,
    timeout: Duration,
    link_up: bool,
    pending: VecDeque<LinkEvent>,
}

impl ProbeLinkDriver {
    /// Derive the probe target from the broker URL.
    pub fn from_config(wifi: &WifiSection, mqtt: &MqttSection) -> Result<Self, LinkError> {
        let url = Url::parse(&mqtt.broker_url)
            .map_err(|_| LinkError::InvalidProbeTarget(mqtt.broker_url.clone()))?;
        let host = url
            .host_str()
            .ok_or_else(|| LinkError::InvalidProbeTarget(mqtt.broker_url.clone()))?;
        let port = url
            .port()
            .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

        Ok(Self::new(
            format!("{host}:{port}"),
            wifi.ssid.clone(),
            Duration::from_millis(wifi.probe_interval_ms),
            Duration::from_millis(wifi.probe_timeout_ms),
        ))
    }

    pub fn new(target: String, ssid: String, interval: Duration, timeout: Duration) -> Self {
        Self {
            target,
            ssid,
            interval,
            timeout,
            link_up: false,
            pending: VecDeque::new(),
        }
    }

    async fn probe(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl LinkDriver for ProbeLinkDriver {
    async fn associate(&mut self) -> Result<(), LinkError> {
        info!(ssid = %self.ssid, target = %self.target, "Watching link reachability");
        self.link_up = false;
        self.pending.push_back(LinkEvent::AssociationStarted);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<LinkEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }

            tokio::time::sleep(self.interval).await;
            let reachable = self.probe().await;
            match (self.link_up, reachable) {
                (false, true) => {
                    debug!(target = %self.target, "Probe target reachable");
                    self.link_up = true;
                    self.pending.push_back(LinkEvent::Associated);
                    self.pending.push_back(LinkEvent::IpAcquired);
                }
                (true, false) => {
                    debug!(target = %self.target, "Probe target unreachable");
                    self.link_up = false;
                    self.pending.push_back(LinkEvent::AssociationLost);
                }
                _ => {}
            }
        }
    }
}
