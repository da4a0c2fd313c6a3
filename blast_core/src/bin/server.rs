use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use bevy::ecs::event::Events;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};

use blast_core::{
    build_headless_app, describe_outcome, run_command_line, run_update, CommandIssuer,
    ExplosionCatalogHandle, ExplosionCatalogMetadata, ExplosionConfigHandle, ExplosionEffect,
};

/// One console line plus the channel its reply goes back on.
#[derive(Debug)]
struct ConsoleLine {
    line: String,
    reply: Sender<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut app = build_headless_app();
    let config = app.world.resource::<ExplosionConfigHandle>().get();
    let catalog = app.world.resource::<ExplosionCatalogHandle>().get();
    let catalog_source = app
        .world
        .get_resource::<ExplosionCatalogMetadata>()
        .map(ToString::to_string)
        .unwrap_or_else(|| "builtin".to_string());

    let command_rx = spawn_command_listener(config.command_bind)?;

    info!(
        command_bind = %config.command_bind,
        explosion_types = catalog.len(),
        catalog = %catalog_source,
        "Explosion preview server ready"
    );

    let tick = config.tick_interval();
    let mut next_update = Instant::now() + tick;
    loop {
        let wait = next_update.saturating_duration_since(Instant::now());
        match command_rx.recv_timeout(wait) {
            Ok(ConsoleLine { line, reply }) => {
                let issuer = CommandIssuer::console();
                let response = match run_command_line(&mut app.world, &issuer, &line) {
                    Ok(outcome) => describe_outcome(&outcome),
                    Err(err) => err.to_string(),
                };
                let _ = reply.send(response);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if Instant::now() >= next_update {
            run_update(&mut app);
            report_effects(&mut app);
            next_update = Instant::now() + tick;
        }
    }

    Ok(())
}

fn report_effects(app: &mut bevy::prelude::App) {
    let mut events = app.world.resource_mut::<Events<ExplosionEffect>>();
    for effect in events.drain() {
        info!(
            target: "blast::server",
            type_id = %effect.type_id,
            epicenter = %effect.epicenter,
            sound = %effect.presentation.sound,
            broken_tiles = effect.broken_tiles,
            space_tiles = effect.space_tiles,
            "effect.played"
        );
    }
}

fn spawn_command_listener(bind_addr: SocketAddr) -> anyhow::Result<Receiver<ConsoleLine>> {
    let listener = TcpListener::bind(bind_addr)
        .with_context(|| format!("command listener bind failed on {bind_addr}"))?;
    listener
        .set_nonblocking(true)
        .context("set_nonblocking failed")?;

    let (sender, receiver) = unbounded::<ConsoleLine>();
    thread::spawn(move || loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                info!("Command client connected: {}", addr);
                let sender = sender.clone();
                thread::spawn(move || handle_client(stream, sender));
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                warn!("Error accepting command client: {}", err);
                thread::sleep(Duration::from_millis(200));
            }
        }
    });

    Ok(receiver)
}

fn handle_client(stream: TcpStream, sender: Sender<ConsoleLine>) {
    if let Err(err) = stream.set_nonblocking(false) {
        warn!("Command client setup failed: {}", err);
        return;
    }
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(err) => {
            warn!("Command client setup failed: {}", err);
            return;
        }
    };
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let (reply_tx, reply_rx) = bounded(1);
                let command = ConsoleLine {
                    line: trimmed.to_string(),
                    reply: reply_tx,
                };
                if sender.send(command).is_err() {
                    break;
                }
                let Ok(reply) = reply_rx.recv() else {
                    break;
                };
                if let Err(err) = writeln!(writer, "{reply}") {
                    warn!("Command reply failed: {}", err);
                    break;
                }
            }
            Err(err) => {
                warn!("Command read error: {}", err);
                break;
            }
        }
    }
}
