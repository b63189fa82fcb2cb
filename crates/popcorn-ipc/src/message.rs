//! Envelope exchanged with the backend and the typed payload contract.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IpcError, IpcResult};

/// A typed message that can travel inside an [`FxMessage`].
pub trait IpcMessage: Serialize + DeserializeOwned + Send + 'static {
    /// Unique type name written in the envelope.
    const TYPE: &'static str;
}

/// Envelope of every frame on the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxMessage {
    /// Type of the payload.
    pub message_type: String,
    /// Sequence id assigned by the sender.
    pub sequence_id: u32,
    /// Sequence id of the request this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<u32>,
    /// JSON encoded payload.
    #[serde(default)]
    pub payload: Value,
}

impl FxMessage {
    /// Wrap a typed message in an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Codec`] when the payload cannot be encoded.
    pub fn encode<M: IpcMessage>(
        message: &M,
        sequence_id: u32,
        reply_to: Option<u32>,
    ) -> IpcResult<Self> {
        let payload = serde_json::to_value(message).map_err(|source| IpcError::Codec {
            message_type: M::TYPE.to_string(),
            source,
        })?;
        Ok(Self {
            message_type: M::TYPE.to_string(),
            sequence_id,
            reply_to,
            payload,
        })
    }

    /// Whether the envelope carries a message of type `M`.
    #[must_use]
    pub fn is<M: IpcMessage>(&self) -> bool {
        self.message_type == M::TYPE
    }

    /// Decode the payload as `M`.
    ///
    /// # Errors
    ///
    /// Fails when the type does not match or the payload cannot be decoded.
    pub fn decode<M: IpcMessage>(&self) -> IpcResult<M> {
        if !self.is::<M>() {
            return Err(IpcError::UnexpectedType {
                expected: M::TYPE,
                actual: self.message_type.clone(),
            });
        }
        serde_json::from_value(self.payload.clone()).map_err(|source| IpcError::Codec {
            message_type: self.message_type.clone(),
            source,
        })
    }
}
