use std::process::{ExitCode, ExitStatus};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tether_lock::{
    EventBus, LeaseStore, LockError, LockEvent, LockOptions, Locker, RedisConfig, RedisStore,
    ReleaseMode, renew_interval,
};
use tokio::sync::Barrier;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// `EX_TEMPFAIL`: the lock is held elsewhere, try again later.
const LOCKED: u8 = 75;

pub async fn contend(
    config: &RedisConfig,
    name: &str,
    contenders: u16,
    lease: Duration,
) -> Result<ExitCode> {
    let store: Arc<dyn LeaseStore> = Arc::new(RedisStore::connect(config).await?);
    let options = LockOptions::new()
        .with_lease(lease)
        .with_store(store)
        .with_release_mode(ReleaseMode::OwnerChecked);
    let barrier = Arc::new(Barrier::new(usize::from(contenders)));

    let mut tasks = JoinSet::new();
    for id in 0..contenders {
        let mut lock = Locker::new(name, options.clone())?;
        let barrier = Arc::clone(&barrier);
        tasks.spawn(async move {
            barrier.wait().await;
            let won = lock.lock().await?;
            Ok::<_, LockError>((id, won, lock))
        });
    }

    let mut winners = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (id, won, lock) = joined??;
        println!("contender {id}: {}", if won { "acquired" } else { "contended" });
        if won {
            winners.push(lock);
        }
    }
    println!("{} of {contenders} acquired {name}", winners.len());

    for mut lock in winners {
        lock.unlock().await?;
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn hold(
    config: &RedisConfig,
    name: &str,
    lease: Duration,
    hold: Duration,
) -> Result<ExitCode> {
    tether_lock::init_default_from_config(config).await?;

    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    let mut lock = Locker::new(
        name,
        LockOptions::new()
            .with_lease(lease)
            .with_events(Arc::clone(&bus)),
    )?;

    if !lock.lock().await? {
        println!("{name} is held elsewhere");
        return Ok(ExitCode::from(LOCKED));
    }
    println!(
        "acquired {name} for {}, renewing every {}",
        humantime_serde::re::humantime::format_duration(hold),
        humantime_serde::re::humantime::format_duration(renew_interval(lease)),
    );

    let deadline = tokio::time::sleep(hold);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => break,
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                println!("interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(missed)) => warn!(missed, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    lock.unlock().await?;
    let stats = lock.renewal_stats();
    println!(
        "released {name}: {} renewals, {} rejected, {} failed",
        stats.extended, stats.rejected, stats.failed
    );
    Ok(ExitCode::SUCCESS)
}

fn print_event(event: &LockEvent) {
    match event {
        LockEvent::Renewed { name } => println!("renewed {name}"),
        LockEvent::RenewalRejected { name } => println!("lost {name}: key is gone or owned by another holder"),
        LockEvent::RenewalFailed {
            name,
            error,
            consecutive_failures,
        } => println!("renewal of {name} failed ({consecutive_failures} in a row): {error}"),
        LockEvent::Acquired { .. } | LockEvent::Contended { .. } | LockEvent::Released { .. } => {}
    }
}

pub async fn run(
    config: &RedisConfig,
    name: &str,
    lease: Duration,
    owner_checked: bool,
    command: &[String],
) -> Result<ExitCode> {
    let (program, args) = command.split_first().context("no command given")?;
    let mode = if owner_checked {
        ReleaseMode::OwnerChecked
    } else {
        ReleaseMode::Unconditional
    };

    let store = Arc::new(RedisStore::connect(config).await?);
    let mut lock = Locker::new(
        name,
        LockOptions::new()
            .with_lease(lease)
            .with_store(store)
            .with_release_mode(mode),
    )?;

    if !lock.lock().await? {
        eprintln!("{name} is held elsewhere");
        return Ok(ExitCode::from(LOCKED));
    }

    info!(lock = %name, program = %program, "running command under lock");
    let status = tokio::process::Command::new(program).args(args).status().await;
    lock.unlock().await?;

    let status = status.with_context(|| format!("failed to run {program}"))?;
    info!(lock = %name, status = %status, "command finished");
    Ok(exit_code(status))
}

fn exit_code(status: ExitStatus) -> ExitCode {
    status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .map_or(ExitCode::FAILURE, ExitCode::from)
}

pub async fn release(config: &RedisConfig, name: &str) -> Result<ExitCode> {
    let store = RedisStore::connect(config).await?;
    if store.delete(name).await? {
        println!("released {name}");
    } else {
        println!("{name} was not held");
    }
    Ok(ExitCode::SUCCESS)
}
