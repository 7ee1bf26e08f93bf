//! Demo firmware on the host.
//!
//! ```text
//! cargo run -p svc-posix -- --config ports/posix/config.json --log-level debug
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::info;
use svc_registry::Application;
use svc_posix::app::MAGIC_ACTION_TOPIC;
use svc_posix::{configure, AppMessage, Cli, PortLogger, SimBroker, SimWifi, STATUS_PERIOD};

const LINK_DELAY: Duration = Duration::from_millis(200);
const CONNECT_DELAY: Duration = Duration::from_millis(100);
const FRAGMENT_SIZE: usize = 8;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    PortLogger::init(cli.log_level.into()).context("installing the logger")?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("installing the ctrl-c handler")?;
    }

    let wifi = Arc::new(SimWifi::new(LINK_DELAY));
    let broker = Arc::new(SimBroker::new(CONNECT_DELAY));

    let mut app =
        Application::<AppMessage>::new(cli.app_config()).context("starting the message bus")?;
    app.setup(|registry| configure(registry, wifi.clone(), broker.clone(), STATUS_PERIOD));

    if let Some(interval) = cli.magic_interval() {
        let broker = Arc::clone(&broker);
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("sim-operator".into())
            .spawn(move || {
                let mut action: u8 = 0;
                while running.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    action = action.wrapping_add(1);
                    let payload = format!("{{ \"action-id\": {action} }}");
                    broker.inject(MAGIC_ACTION_TOPIC, payload.as_bytes(), FRAGMENT_SIZE);
                }
            })
            .context("spawning the simulated operator")?;
    }

    if let Some(secs) = cli.run_for {
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("run-for".into())
            .spawn(move || {
                thread::sleep(Duration::from_secs(secs));
                running.store(false, Ordering::SeqCst);
            })
            .context("spawning the run timer")?;
    }

    info!(target: "app", "running, ctrl-c to stop");
    app.run(&running);
    info!(target: "app", "stopped");
    Ok(())
}
