//! Bidirectional live session over WebSocket.
//!
//! `connect` performs the setup handshake, then runs split reader/writer
//! tasks. The writer drains a bounded in-order queue — the session hands the
//! sender half to the capture pump *before* connecting, so frames captured
//! during the handshake queue up and flush in arrival order once the session
//! is ready. No reconnect, no backoff, no timeouts: transport failures are
//! reported on the event stream and the session stays formally alive until
//! the owner stops it.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::codec::envelope::MediaEnvelope;
use crate::error::{Result, VibeError};
use crate::events::Speaker;
use crate::gemini::wire::{
    Content, GenerationConfig, RealtimeInputMessage, ServerMessage, SetupMessage, Setup,
    SpeechConfig,
};
use crate::gemini::GeminiConfig;

/// Buffered server events before the session task consumes them.
const EVENT_CHANNEL_CAP: usize = 256;

/// Domain-level events decoded from server frames, in delivery order.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// One chunk of synthesized speech (still envelope-encoded).
    Audio(MediaEnvelope),
    /// Transcription fragment, tagged with who spoke.
    Transcription { text: String, speaker: Speaker },
    /// The model stopped generating mid-utterance; stop playback now.
    Interrupted,
    /// The model finished its conversational turn.
    TurnComplete,
    /// The remote peer closed the stream.
    Closed,
    /// Transport-level failure (report-only; the owner decides what to do).
    TransportError(String),
}

/// Open the live session and return its server-event stream.
///
/// `outbound` is the pending-send queue: envelopes already buffered in it are
/// flushed, in order, as soon as the handshake completes. `closer` makes the
/// writer send a clean WebSocket close frame.
///
/// # Errors
/// `VibeError::Connect` when the dial or the setup handshake fails.
pub async fn connect(
    config: &GeminiConfig,
    outbound: mpsc::Receiver<MediaEnvelope>,
    closer: Arc<Notify>,
) -> Result<mpsc::Receiver<ServerEvent>> {
    let url = format!("{}?key={}", config.ws_endpoint, config.api_key);

    let (ws, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| VibeError::Connect(e.to_string()))?;

    info!("live session connected");

    let (mut ws_tx, mut ws_rx) = ws.split();

    let setup = SetupMessage {
        setup: Setup {
            model: config.live_model.clone(),
            generation_config: GenerationConfig {
                response_modalities: Some(vec!["AUDIO".into()]),
                speech_config: Some(SpeechConfig::prebuilt(&config.voice_name)),
                ..Default::default()
            },
            system_instruction: Some(Content::text(&config.persona)),
            input_audio_transcription: Some(serde_json::json!({})),
            output_audio_transcription: Some(serde_json::json!({})),
        },
    };

    let frame = serde_json::to_string(&setup)
        .map_err(|e| VibeError::Connect(format!("encode setup: {e}")))?;
    ws_tx
        .send(Message::Text(frame))
        .await
        .map_err(|e| VibeError::Connect(format!("send setup: {e}")))?;

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAP);

    // Wait for setup acknowledgement; anything content-bearing that arrives
    // first is forwarded rather than dropped.
    loop {
        match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMessage>(&text) {
                Ok(msg) if msg.setup_complete.is_some() => break,
                Ok(msg) => route_message(msg, &event_tx).await,
                Err(e) => warn!("unparseable frame during handshake: {e}"),
            },
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(VibeError::Connect(e.to_string())),
            None => {
                return Err(VibeError::Connect(
                    "stream closed before setup completed".into(),
                ))
            }
        }
    }

    debug!("live session setup complete");

    // Writer: drain the pending-send queue in order until closed.
    let mut outbound = outbound;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                item = outbound.recv() => match item {
                    Some(envelope) => {
                        let msg = RealtimeInputMessage::single(envelope);
                        let frame = match serde_json::to_string(&msg) {
                            Ok(f) => f,
                            Err(e) => {
                                warn!("encode realtime input failed: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = ws_tx.send(Message::Text(frame)).await {
                            warn!("live send failed: {e}");
                            break;
                        }
                    }
                    None => break,
                },
                _ = closer.notified() => break,
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        debug!("live writer finished");
    });

    // Reader: decode server frames into events until the stream ends.
    let reader_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Some(item) = ws_rx.next().await {
            match item {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(msg) => route_message(msg, &reader_tx).await,
                    // A malformed frame is dropped, not fatal.
                    Err(e) => warn!("unparseable server frame: {e}"),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    let _ = reader_tx
                        .send(ServerEvent::TransportError(e.to_string()))
                        .await;
                    break;
                }
            }
        }
        let _ = reader_tx.send(ServerEvent::Closed).await;
        debug!("live reader finished");
    });

    Ok(event_rx)
}

/// Fan one server frame out into domain events, preserving the field order
/// the protocol implies: transcriptions, audio, interruption, turn end.
async fn route_message(msg: ServerMessage, tx: &mpsc::Sender<ServerEvent>) {
    let Some(content) = msg.server_content else {
        return;
    };

    if let Some(t) = content.output_transcription {
        let _ = tx
            .send(ServerEvent::Transcription {
                text: t.text,
                speaker: Speaker::Model,
            })
            .await;
    }
    if let Some(t) = content.input_transcription {
        let _ = tx
            .send(ServerEvent::Transcription {
                text: t.text,
                speaker: Speaker::User,
            })
            .await;
    }

    if let Some(turn) = content.model_turn {
        for part in turn.parts {
            if let Some(envelope) = part.inline_data {
                let _ = tx.send(ServerEvent::Audio(envelope)).await;
            }
        }
    }

    if content.interrupted == Some(true) {
        let _ = tx.send(ServerEvent::Interrupted).await;
    }
    if content.turn_complete == Some(true) {
        let _ = tx.send(ServerEvent::TurnComplete).await;
    }
}
