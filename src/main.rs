//! Ranged Fire Server
//!
//! Without arguments, runs a seeded demo: one firing client and its
//! authority trade submissions and confirmations over a lossy link.
//! `serve` runs the WebSocket authority server instead.

use std::sync::Arc;
use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ranged_fire::{
    VERSION, TICK_RATE,
    core::{rng::DeterministicRng, vec2::Vec2, vec3::Vec3},
    network::{GameServer, ServerConfig},
    protocol::{
        authority::{AuthorityConfig, ControllerAuthority},
        client::{FireOutcome, FireRateGate, FiringController, HostilePawns, PinholeProjector},
        ledger::LedgerConfig,
        link::{LinkConfig, LossyLink},
        messages::{ConfirmTargetData, SubmitTargetData},
        reconcile::ReconcileOutcome,
    },
    targeting::{
        aim::{targeting_transform, AimContext, TargetingSource, ViewPoint},
        hit::ActorId,
        scene::{Scene, SceneObject},
    },
    weapon::{config::WeaponConfig, equipment::WeaponId, motion::MotionSnapshot},
};

/// Demo length in ticks (5 seconds).
const DEMO_TICKS: u64 = 300;

/// Ticks between trigger pulls.
const FIRE_EVERY: u64 = 9;

const SHOOTER: ActorId = ActorId(1);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Ranged Fire Server v{}", VERSION);

    match std::env::args().nth(1).as_deref() {
        Some("serve") => serve(),
        _ => demo_exchange(),
    }
}

/// Shooting range used by the demo and the server.
fn demo_scene() -> Scene {
    let mut scene = Scene::new();
    scene.insert(SceneObject::pawn(SHOOTER, Vec3::ZERO, 40.0));
    scene.insert(
        SceneObject::pawn(ActorId(2), Vec3::new(1000.0, 0.0, 0.0), 40.0)
            .with_tag("Gameplay.Zone.WeakSpot"),
    );
    scene.insert(SceneObject::pawn(ActorId(3), Vec3::new(1200.0, 250.0, 0.0), 40.0));
    scene.insert(SceneObject::wall(
        ActorId(9),
        Vec3::new(600.0, 120.0, -200.0),
        Vec3::new(640.0, 400.0, 200.0),
    ));
    scene
}

fn serve() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    info!("Tick Rate: {} Hz, bind {}", config.tick_rate, config.bind_addr);

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(async move {
        let server = Arc::new(GameServer::new(config, demo_scene()));

        let signal_server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal_server.shutdown();
            }
        });

        server.run().await.context("server failed")
    })
}

/// Seeded client/authority exchange over a lossy link.
fn demo_exchange() -> anyhow::Result<()> {
    info!("=== Starting Demo Exchange ===");

    let seed = 12345u64;
    let scene = demo_scene();
    let ledger_config = LedgerConfig::default();
    let weapon = Arc::new(WeaponConfig::pistol());

    let controller_id = Uuid::from_u128(1);
    let rng = DeterministicRng::for_controller(seed, controller_id.as_bytes());

    let mut client = FiringController::new(SHOOTER, rng, &ledger_config);
    let mut authority = ControllerAuthority::new(
        controller_id,
        SHOOTER,
        Box::new(FireRateGate::new(0.1)),
        AuthorityConfig::default(),
        &ledger_config,
    );
    client.equip(WeaponId(1), weapon.clone())?;
    authority.equip(WeaponId(1), weapon)?;

    let lossy = LinkConfig {
        drop_probability: 0.1,
        duplicate_probability: 0.1,
        min_delay_ticks: 2,
        max_delay_ticks: 6,
    };
    let mut uplink: LossyLink<SubmitTargetData> = LossyLink::new(lossy.clone(), seed ^ 0x5eed);
    let mut downlink: LossyLink<Vec<u8>> = LossyLink::new(lossy, seed ^ 0xfeed);

    let mut gate = FireRateGate::new(0.1);
    let policy = HostilePawns::default();

    let mut submitted = 0usize;
    let mut damage_total = 0.0f32;
    let mut confirmed = 0usize;
    let mut denied = 0usize;
    let mut unknown = 0usize;

    for tick in 0..DEMO_TICKS {
        let now = tick as f64 / f64::from(TICK_RATE);
        let dt = 1.0 / TICK_RATE as f32;

        // Stand still for the first half, strafe for the second
        let motion = if tick < DEMO_TICKS / 2 {
            MotionSnapshot::still()
        } else {
            MotionSnapshot::moving(Vec3::new(0.0, 300.0, 0.0))
        };
        client.tick(dt, now, &motion);
        authority.tick(dt, now, &motion);

        if tick % FIRE_EVERY == 0 {
            // Sweep the aim back and forth across both targets
            let sway = ((tick as f32) * 0.05).sin() * 200.0;
            let camera_location = Vec3::new(-150.0, 0.0, 60.0);
            let camera_direction = (Vec3::new(1000.0, 100.0 + sway, 0.0) - camera_location).normalize();
            let ctx = AimContext {
                pawn_location: Vec3::ZERO,
                pawn_forward: Vec3::FORWARD,
                weapon_location: Vec3::new(45.0, 10.0, 40.0),
                weapon_forward: Vec3::FORWARD,
                view: ViewPoint::Player { camera_location, camera_direction },
            };
            let aim = targeting_transform(TargetingSource::CameraTowardsFocus, &ctx);
            let projector = PinholeProjector {
                location: camera_location,
                forward: camera_direction,
                fov_degrees: 90.0,
                viewport: Vec2::new(1920.0, 1080.0),
            };

            match client.fire(aim, &scene, &mut gate, &projector, &policy, now) {
                Ok(FireOutcome::Submitted { submission, cartridge }) => {
                    submitted += 1;
                    info!(
                        tick,
                        unique_id = submission.unique_id,
                        pellets = cartridge.pellets.len(),
                        pawn_hits = submission.hits.iter().filter(|h| h.is_pawn_like()).count(),
                        "fired"
                    );
                    uplink.send(submission, tick);
                }
                Ok(FireOutcome::NotCommitted) => {}
                Err(e) => warn!(tick, "fire failed: {}", e),
            }
        }

        for submission in uplink.poll(tick) {
            let result = authority.handle_submission(&submission, &scene, now);
            damage_total += result.damage.iter().map(|d| d.amount).sum::<f32>();
            downlink.send(result.reply.to_bytes()?, tick);
        }

        for bytes in downlink.poll(tick) {
            let reply = ConfirmTargetData::from_bytes(&bytes)?;
            match client.receive_confirmation(&reply, now) {
                ReconcileOutcome::Confirmed { promoted } => {
                    confirmed += 1;
                    if promoted > 0 {
                        info!(tick, unique_id = reply.unique_id, promoted, "hits confirmed");
                    }
                }
                ReconcileOutcome::Denied | ReconcileOutcome::AllInvalidated => denied += 1,
                ReconcileOutcome::Unknown => unknown += 1,
            }
        }
    }

    let end = DEMO_TICKS as f64 / f64::from(TICK_RATE);
    let (up_sent, up_dropped) = uplink.stats();
    let (down_sent, down_dropped) = downlink.stats();

    info!("=== Exchange Results ===");
    info!("Submitted: {}, confirmed: {}, denied: {}, stale replies: {}", submitted, confirmed, denied, unknown);
    info!("Uplink: {} sent, {} dropped; downlink: {} sent, {} dropped", up_sent, up_dropped, down_sent, down_dropped);
    info!("Still unconfirmed: {}", client.protocol().unconfirmed().len());
    info!("Damage applied: {:.1}", damage_total);
    info!("Confirmed hits on screen: {}", client.ledger().recent_confirmed_hits().len());
    match client.ledger().time_since_last_confirmation(end) {
        Some(since) => info!("Last confirmation {:?} ago", since),
        None => info!("No confirmation received"),
    }

    Ok(())
}
