//! PicoBLE peripheral service binary.
//!
//! Loads configuration and identity files, wires the BlueZ broker, the
//! HCI tuner and the authentication engine together, and runs the service
//! loop until `q` is pressed.

use anyhow::Result;
use picoble_identity::{Commitment, KeyMaterial, Users};
use picoble_peripheral::bluez::BluezBroker;
use picoble_peripheral::config::ServiceConfig;
use picoble_peripheral::fsm::LoggingFsm;
use picoble_peripheral::hci::{HciTuner, LinuxHciTuner, NoopHciTuner};
use picoble_peripheral::service::{PeripheralService, ServiceHandle};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServiceConfig::load()?;

    let keys = match KeyMaterial::load(
        &config.identity.public_key_path,
        &config.identity.private_key_path,
    ) {
        Ok(keys) => Some(keys),
        Err(error) => {
            warn!(%error, "continuing without key material");
            None
        }
    };
    let users = match Users::load(&config.identity.users_path) {
        Ok(users) => users,
        Err(error) => {
            warn!(%error, "continuing with an empty user list");
            Users::default()
        }
    };

    let commitment = keys
        .as_ref()
        .map(KeyMaterial::commitment)
        .unwrap_or_else(|| Commitment::digest(&[]));
    info!(%commitment, "derived public key commitment");

    let tuner: Box<dyn HciTuner> = if config.advertising.tune_interval {
        Box::new(LinuxHciTuner::default_device())
    } else {
        Box::new(NoopHciTuner)
    };

    let mut service = PeripheralService::new(
        Box::new(BluezBroker::new()),
        tuner,
        Box::new(LoggingFsm::default()),
        commitment,
        config,
    )?;

    let handle = service.handle();
    handle.initialise();
    service.start_authentication(keys, users, Vec::new());

    tokio::spawn(keyboard_control(handle));

    service.run().await?;
    Ok(())
}

/// Keyboard control surface. Explicitly not a stable interface:
/// `s` start, `c` start non-continuous, `d` stop, `f` stop and finalise,
/// `q` quit.
async fn keyboard_control(handle: ServiceHandle) {
    let mut stdin = tokio::io::stdin();
    let mut buffer = [0u8; 32];

    loop {
        let read = match stdin.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };

        for &byte in &buffer[..read] {
            match byte {
                b's' => handle.start(true),
                b'c' => handle.start(false),
                b'd' => handle.stop(false),
                b'f' => handle.stop(true),
                b'q' => {
                    handle.quit();
                    return;
                }
                b'\n' | b'\r' | b' ' | b'\t' => {}
                other => debug!(key = %(other as char), "unmapped key"),
            }
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,picoble=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
