//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Envelopes are JSON text frames; the hit confirmation itself also has a
//! flat bincode form (`ConfirmTargetData::to_bytes`).

use serde::{Serialize, Deserialize};
use crate::protocol::messages::{ConfirmTargetData, SubmitTargetData};
use crate::weapon::equipment::WeaponId;
use crate::weapon::motion::MotionSnapshot;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Equip a weapon preset under the given id.
    Equip { weapon_id: WeaponId, preset: String },

    /// Put the held weapon away.
    Unequip,

    /// Latest movement state of the controlled pawn.
    Motion(MotionSnapshot),

    /// Hits from one trigger pull, for validation.
    SubmitTargetData(SubmitTargetData),

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection accepted.
    Welcome(WelcomeInfo),

    /// Weapon equipped on the authority.
    Equipped { weapon_id: WeaponId },

    /// Verdict for a submitted batch.
    ConfirmTargetData(ConfirmTargetData),

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Sent once after the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeInfo {
    /// Controller id assigned by the server.
    pub controller_id: String,
    /// Pawn the connection drives.
    pub pawn: u32,
    /// Server version.
    pub server_version: String,
    /// Authority tick rate (Hz).
    pub tick_rate: u32,
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Error with a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message could not be parsed.
    InvalidInput,
    /// Weapon preset unknown or its config rejected.
    UnknownWeapon,
    /// Connection idle for too long.
    Timeout,
    /// Server overloaded.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec3::Vec3;
    use crate::targeting::hit::HitResult;

    #[test]
    fn test_submit_json_roundtrip() {
        let msg = ClientMessage::SubmitTargetData(SubmitTargetData {
            unique_id: 5,
            cartridge_id: 12,
            weapon_id: WeaponId(1),
            hits: vec![HitResult::miss(Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0))],
        });

        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"submit_target_data\""));

        match ClientMessage::from_json(&json).unwrap() {
            ClientMessage::SubmitTargetData(data) => {
                assert_eq!(data.unique_id, 5);
                assert_eq!(data.cartridge_id, 12);
                assert_eq!(data.hits.len(), 1);
                assert!(data.hits[0].is_miss());
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_equip_and_motion_parse() {
        let equip = ClientMessage::from_json(
            r#"{"type":"equip","weapon_id":3,"preset":"rifle"}"#,
        ).unwrap();
        assert!(matches!(equip, ClientMessage::Equip { weapon_id: WeaponId(3), ref preset } if preset == "rifle"));

        let motion = ClientMessage::Motion(MotionSnapshot::moving(Vec3::new(300.0, 0.0, 0.0)));
        let parsed = ClientMessage::from_json(&motion.to_json().unwrap()).unwrap();
        match parsed {
            ClientMessage::Motion(snapshot) => assert_eq!(snapshot.velocity.x, 300.0),
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_confirm_json_roundtrip() {
        let msg = ServerMessage::ConfirmTargetData(ConfirmTargetData::confirm(9, vec![0, 2]));
        let json = msg.to_json().unwrap();

        match ServerMessage::from_json(&json).unwrap() {
            ServerMessage::ConfirmTargetData(reply) => {
                assert_eq!(reply.unique_id, 9);
                assert!(reply.success);
                assert_eq!(reply.invalidated_indices, vec![0, 2]);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_error_codes() {
        let msg = ServerMessage::Error(ServerError::new(ErrorCode::UnknownWeapon, "railgun"));
        let json = msg.to_json().unwrap();
        assert!(json.contains("unknown_weapon"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(ClientMessage::from_json(r#"{"type":"matchmaking"}"#).is_err());
    }
}
