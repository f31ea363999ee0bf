//! OSC-over-UDP sink implementation.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rosc::{OscMessage, OscPacket, OscType};
use tokio::net::UdpSocket;

use crate::sink::BeatSink;
use crate::{BeatEvent, Destination, SendError};

/// Encodes a beat as an OSC message: `channel` with a single float32 tempo.
///
/// # Example
///
/// ```
/// use beat_osc::encode_beat;
///
/// let packet = encode_beat("/beat", 120.0)?;
/// // OSC address strings are null-terminated and padded to 4 bytes
/// assert_eq!(&packet[..8], b"/beat\0\0\0");
/// # Ok::<(), beat_osc::SendError>(())
/// ```
pub fn encode_beat(channel: &str, tempo_bpm: f32) -> Result<Vec<u8>, SendError> {
    let packet = OscPacket::Message(OscMessage {
        addr: channel.to_string(),
        args: vec![OscType::Float(tempo_bpm)],
    });
    rosc::encoder::encode(&packet).map_err(|e| SendError::Encode {
        reason: format!("{e:?}"),
    })
}

/// Sends every beat as one OSC datagram to a single [`Destination`].
///
/// The host is resolved and a socket bound in [`on_start`](BeatSink::on_start).
/// Sends use `try_send_to` and never wait on the network; a datagram the OS
/// will not take right now is a send failure for that beat only.
pub struct OscSink {
    destination: Destination,
    name: String,
    target: Mutex<Option<(Arc<UdpSocket>, SocketAddr)>>,
}

impl OscSink {
    /// Creates a sink for `destination`. Nothing is resolved until started.
    pub fn new(destination: Destination) -> Self {
        Self {
            name: destination.to_string(),
            destination,
            target: Mutex::new(None),
        }
    }

    /// The destination this sink sends to.
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// The resolved socket address, once started.
    pub fn resolved_addr(&self) -> Option<SocketAddr> {
        self.target.lock().as_ref().map(|(_, addr)| *addr)
    }

    async fn resolve(&self) -> Result<SocketAddr, SendError> {
        let host = self.destination.host();
        let unresolved = |reason: String| SendError::Unresolved {
            host: host.to_string(),
            reason,
        };

        let mut addrs = tokio::net::lookup_host((host, self.destination.port()))
            .await
            .map_err(|e| unresolved(e.to_string()))?;

        addrs
            .next()
            .ok_or_else(|| unresolved("no addresses found".to_string()))
    }
}

#[async_trait]
impl BeatSink for OscSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_start(&self) -> Result<(), SendError> {
        let addr = self.resolve().await?;
        let bind: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|e| SendError::io(self.name.clone(), e))?;

        tracing::debug!(destination = %self.name, %addr, "OSC destination ready");
        *self.target.lock() = Some((Arc::new(socket), addr));
        Ok(())
    }

    async fn send(&self, beat: &BeatEvent) -> Result<(), SendError> {
        let (socket, addr) = self
            .target
            .lock()
            .as_ref()
            .map(|(socket, addr)| (Arc::clone(socket), *addr))
            .ok_or(SendError::NotStarted)?;

        let packet = encode_beat(self.destination.channel(), beat.tempo_bpm)?;
        socket
            .try_send_to(&packet, addr)
            .map_err(|e| SendError::io(self.name.clone(), e))?;
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), SendError> {
        self.target.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::decoder::decode_udp;

    fn decode(packet: &[u8]) -> OscMessage {
        match decode_udp(packet).unwrap().1 {
            OscPacket::Message(msg) => msg,
            OscPacket::Bundle(_) => panic!("expected a message"),
        }
    }

    #[test]
    fn test_encode_beat() {
        let msg = decode(&encode_beat("/lights/beat", 98.5).unwrap());
        assert_eq!(msg.addr, "/lights/beat");
        assert_eq!(msg.args, vec![OscType::Float(98.5)]);
    }

    #[test]
    fn test_name_is_destination() {
        let sink = OscSink::new(Destination::new("127.0.0.1", 9000, "/beat").unwrap());
        assert_eq!(sink.name(), "/beat@127.0.0.1:9000");
        assert!(sink.resolved_addr().is_none());
    }

    #[tokio::test]
    async fn test_send_before_start() {
        let sink = OscSink::new(Destination::new("127.0.0.1", 9000, "/beat").unwrap());
        let result = sink.send(&BeatEvent::new(120.0, 0)).await;
        assert!(matches!(result, Err(SendError::NotStarted)));
    }

    #[tokio::test]
    async fn test_send_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let sink = OscSink::new(Destination::new("127.0.0.1", port, "/tempo").unwrap());
        sink.on_start().await.unwrap();
        sink.send(&BeatEvent::new(127.0, 1)).await.unwrap();

        let mut buf = [0u8; 512];
        let len = receiver.recv(&mut buf).await.unwrap();
        let msg = decode(&buf[..len]);
        assert_eq!(msg.addr, "/tempo");
        assert_eq!(msg.args, vec![OscType::Float(127.0)]);

        sink.on_stop().await.unwrap();
        assert!(sink.resolved_addr().is_none());
    }

    #[tokio::test]
    async fn test_unresolvable_host() {
        let sink = OscSink::new(Destination::new("no-such-host.invalid", 9000, "/beat").unwrap());
        let result = sink.on_start().await;
        assert!(matches!(result, Err(SendError::Unresolved { .. })));
    }
}
