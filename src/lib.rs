//! # Ranged Fire Server
//!
//! Hitscan firing pipeline for networked shooters: a weapon accuracy model,
//! local hit detection on the firing client, and client/authority
//! reconciliation of the resulting hits.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RANGED FIRE SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── vec3.rs     - 3D vector                                 │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  ├── curve.rs    - Piecewise-linear float curves             │
//! │  └── hash.rs     - Payload digests                           │
//! │                                                              │
//! │  weapon/         - Weapon state                              │
//! │  ├── config.rs   - Weapon configuration and presets          │
//! │  ├── spread.rs   - Spread/heat accuracy model                │
//! │  └── damage.rs   - Distance and material attenuation         │
//! │                                                              │
//! │  targeting/      - Local hit detection                       │
//! │  ├── aim.rs      - Targeting transform                       │
//! │  ├── trace.rs    - Two-pass bullet trace                     │
//! │  └── cartridge.rs- Multi-pellet firing                       │
//! │                                                              │
//! │  protocol/       - Prediction and reconciliation             │
//! │  ├── client.rs   - Firing controller                         │
//! │  ├── authority.rs- Hit validation and damage                 │
//! │  └── ledger.rs   - Hit-marker ledger                         │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server                          │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! Everything below `network/` is a pure function of its inputs, the time
//! values passed in and an explicitly seeded `DeterministicRng`:
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - Cone sampling draws from the caller's random source only
//!
//! Given the same seed, scene and trigger pulls, a client produces the
//! same pellet directions and the same submissions.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod weapon;
pub mod targeting;
pub mod protocol;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use core::vec3::Vec3;
pub use weapon::{SpreadHeatModel, WeaponConfig, WeaponId};
pub use targeting::{HitResult, LocalTargetingEngine, Scene};
pub use protocol::{ConfirmTargetData, ControllerAuthority, FiringController, HitMarkerLedger, SubmitTargetData};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default authority tick rate (Hz)
pub const TICK_RATE: u32 = 60;
