//! `rosbridge_server` WebSocket client.
//!
//! [`RosbridgeTransport`] opens one WebSocket per subscribed topic, sends a
//! rosbridge v2 `subscribe` op and decodes every `publish` frame that comes
//! back into a [`Message`]:
//!
//! ```text
//! → {"op":"subscribe","topic":"/scan","type":"sensor_msgs/LaserScan"}
//! ← {"op":"publish","topic":"/scan","msg":{ ... }}
//! ```
//!
//! Frames with any other `op` (status, service responses) are skipped.
//! The socket is closed when the subscription that opened it ends; there is
//! no reconnection.

use botpanel_stream::Flow;
use botpanel_types::{ImageMsg, LaserScan, Message, MessageKind, PanelError, TfMessage};
use futures_util::SinkExt;
use futures_util::stream::{self, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::transport::{TopicSpec, Transport};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reads topics from a `rosbridge_server` endpoint.
#[derive(Debug, Clone)]
pub struct RosbridgeTransport {
    /// `ws://host:port` of the rosbridge endpoint.
    url: String,
}

impl RosbridgeTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for RosbridgeTransport {
    fn name(&self) -> &str {
        "rosbridge"
    }

    fn open(&self, topic: &TopicSpec) -> Flow<Message> {
        let url = self.url.clone();
        let topic = topic.clone();
        stream::once(connect(url, topic.clone()))
            .flat_map(move |connected| match connected {
                Ok(socket) => frames(socket, topic.clone()).boxed(),
                Err(error) => stream::once(async move { Err(error) }).boxed(),
            })
            .boxed()
    }
}

/// Build the rosbridge `subscribe` op for `topic`.
pub fn subscribe_frame(topic: &TopicSpec) -> String {
    json!({
        "op": "subscribe",
        "topic": topic.name,
        "type": topic.kind.ros_type(),
    })
    .to_string()
}

/// Decode one text frame received for a topic of `kind`.
///
/// Returns `Ok(None)` for frames that carry no topic data.
pub fn decode_frame(kind: MessageKind, text: &str) -> Result<Option<Message>, PanelError> {
    let frame: Value =
        serde_json::from_str(text).map_err(|e| PanelError::Serialization(e.to_string()))?;

    if frame.get("op").and_then(Value::as_str) != Some("publish") {
        return Ok(None);
    }
    let Some(msg) = frame.get("msg").cloned() else {
        return Err(PanelError::Serialization(
            "publish frame without a msg field".to_string(),
        ));
    };

    let decoded = match kind {
        MessageKind::LaserScan => serde_json::from_value::<LaserScan>(msg).map(Message::LaserScan),
        MessageKind::Image => serde_json::from_value::<ImageMsg>(msg).map(Message::Image),
        MessageKind::Tf => serde_json::from_value::<TfMessage>(msg).map(Message::Tf),
    };
    decoded
        .map(Some)
        .map_err(|e| PanelError::Serialization(format!("{kind} payload: {e}")))
}

fn transport_error(topic: &TopicSpec, details: impl std::fmt::Display) -> PanelError {
    PanelError::Transport {
        topic: topic.name.clone(),
        details: details.to_string(),
    }
}

async fn connect(url: String, topic: TopicSpec) -> Result<Socket, PanelError> {
    let (mut socket, _) = connect_async(url.as_str())
        .await
        .map_err(|e| transport_error(&topic, format!("connect to {url}: {e}")))?;

    socket
        .send(WsMessage::Text(subscribe_frame(&topic).into()))
        .await
        .map_err(|e| transport_error(&topic, format!("subscribe: {e}")))?;

    info!(url = %url, topic = %topic.name, "subscribed via rosbridge");
    Ok(socket)
}

fn frames(socket: Socket, topic: TopicSpec) -> impl futures_util::Stream<Item = Result<Message, PanelError>> {
    stream::unfold(Some(socket), move |socket| {
        let topic = topic.clone();
        async move {
            let mut socket = socket?;
            loop {
                match socket.next().await {
                    Some(Ok(WsMessage::Text(text))) => match decode_frame(topic.kind, text.as_str()) {
                        Ok(Some(message)) => return Some((Ok(message), Some(socket))),
                        Ok(None) => debug!(topic = %topic.name, "skipping non-publish frame"),
                        Err(error) => return Some((Err(error), None)),
                    },
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!(topic = %topic.name, "rosbridge closed the connection");
                        return None;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(topic = %topic.name, error = %e, "rosbridge socket error");
                        return Some((Err(transport_error(&topic, e)), None));
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_frame_names_topic_and_type() -> Result<(), Box<dyn std::error::Error>> {
        let frame: Value = serde_json::from_str(&subscribe_frame(&TopicSpec::new(
            "/tf",
            MessageKind::Tf,
        )))?;
        assert_eq!(frame["op"], "subscribe");
        assert_eq!(frame["topic"], "/tf");
        assert_eq!(frame["type"], "tf2_msgs/TFMessage");
        Ok(())
    }

    #[test]
    fn decodes_scan_publish_frame() -> Result<(), Box<dyn std::error::Error>> {
        let text = r#"{"op":"publish","topic":"/scan","msg":{
            "header":{"seq":7,"stamp":{"secs":1,"nsecs":0},"frame_id":"base_laser"},
            "angle_min":-0.5,"angle_max":0.5,"angle_increment":0.25,
            "range_min":0.1,"range_max":8.0,"ranges":[1.0,null,2.5]}}"#;

        let Some(Message::LaserScan(scan)) = decode_frame(MessageKind::LaserScan, text)? else {
            panic!("expected a laser scan");
        };
        assert_eq!(scan.header.frame_id, "base_laser");
        assert_eq!(scan.ranges.len(), 3);
        assert!(scan.ranges[1].is_nan());
        Ok(())
    }

    #[test]
    fn decodes_base64_image_publish_frame() -> Result<(), Box<dyn std::error::Error>> {
        // "AAEC" is base64 for [0, 1, 2].
        let text = r#"{"op":"publish","topic":"/camera/rgb/image_color","msg":{
            "height":1,"width":1,"encoding":"rgb8","step":3,"data":"AAEC"}}"#;

        let Some(Message::Image(image)) = decode_frame(MessageKind::Image, text)? else {
            panic!("expected an image");
        };
        assert_eq!(image.data, vec![0, 1, 2]);
        Ok(())
    }

    #[test]
    fn decodes_tf_publish_frame() -> Result<(), Box<dyn std::error::Error>> {
        let text = r#"{"op":"publish","topic":"/tf","msg":{"transforms":[
            {"header":{"frame_id":"odom"},"child_frame_id":"base_link"}]}}"#;

        let Some(Message::Tf(tf)) = decode_frame(MessageKind::Tf, text)? else {
            panic!("expected a tf message");
        };
        assert_eq!(tf.relations().collect::<Vec<_>>(), vec![("odom", "base_link")]);
        Ok(())
    }

    #[test]
    fn non_publish_ops_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let status = r#"{"op":"status","level":"info","msg":"subscribed"}"#;
        assert_eq!(decode_frame(MessageKind::LaserScan, status)?, None);
        Ok(())
    }

    #[test]
    fn malformed_frames_are_serialization_errors() {
        assert!(matches!(
            decode_frame(MessageKind::LaserScan, "not json"),
            Err(PanelError::Serialization(_))
        ));
        assert!(matches!(
            decode_frame(MessageKind::LaserScan, r#"{"op":"publish","msg":{"ranges":"oops"}}"#),
            Err(PanelError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        // Port 1 on loopback is never a rosbridge server.
        let transport = RosbridgeTransport::new("ws://127.0.0.1:1");
        let mut flow = transport.open(&TopicSpec::new("/scan", MessageKind::LaserScan));

        match flow.next().await {
            Some(Err(PanelError::Transport { topic, .. })) => assert_eq!(topic, "/scan"),
            other => panic!("expected a transport error, got {other:?}"),
        }
    }
}
