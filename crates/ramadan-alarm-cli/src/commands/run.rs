//! Foreground scheduler daemon.

use std::sync::Arc;

use clap::Args;
use ramadan_alarm_core::{
    Config, DeliveryError, Notification, NotificationSink, ResumeWatch, SchedulerPolicy,
    SchedulerService, SystemClock, TracingSink,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use super::{coordinates, format_local, Context};

#[derive(Args)]
pub struct RunArgs {
    /// Also print every scheduling event as a JSON line
    #[arg(long)]
    events: bool,
}

/// Prints each alert to stdout.
struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn show(&mut self, n: &Notification) -> Result<(), DeliveryError> {
        println!(
            "[{}] {}: {} (sound: {})",
            format_local(n.at),
            n.title,
            n.body,
            n.sound_file
        );
        Ok(())
    }
}

pub fn run(ctx: &Context, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(ctx, &config, args))
}

async fn serve(
    ctx: &Context,
    config: &Config,
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let sink: Box<dyn NotificationSink> = if config.notifications.enabled {
        Box::new(StdoutSink)
    } else {
        Box::new(TracingSink)
    };
    let clock = Arc::new(SystemClock);

    let handle = SchedulerService {
        store: ctx.store()?,
        provider: ctx.provider()?,
        sink,
        coordinates: coordinates(config)?,
        policy: SchedulerPolicy::from(config),
        clock: clock.clone(),
    }
    .spawn();

    let print_events = args.events;
    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if print_events {
                        if let Ok(line) = serde_json::to_string(&event) {
                            println!("{line}");
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => info!(skipped = n, "event printer lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let watch = ResumeWatch::from_config(config).spawn(handle.clone(), clock);

    for (id, slot) in handle.slots().await? {
        match slot.occurrence() {
            Some(o) => info!(alarm_id = %id, next = %format_local(o.at), "armed"),
            None => info!(alarm_id = %id, ?slot, "not armed"),
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    watch.abort();
    handle.shutdown().await?;
    drop(handle);
    printer.abort();
    Ok(())
}
