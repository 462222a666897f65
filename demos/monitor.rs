use std::env;
use std::sync::Arc;

use econext::{
    active_circuits, CircuitController, Controller, Event, GatewayClient, ParameterStore,
    Variant, DEFAULT_REFRESH_INTERVAL,
};

#[tokio::main]
async fn main() -> econext::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let host = args
        .get(1)
        .expect("usage: monitor <host> [--port <n>] [--work-state-only]");
    let port: Option<u16> = args
        .iter()
        .position(|a| a == "--port")
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok());
    let variant = if args.iter().any(|a| a == "--work-state-only") {
        Variant::WorkStateOnly
    } else {
        Variant::Decoupled
    };

    let mut builder = GatewayClient::builder(host);
    if let Some(port) = port {
        builder = builder.port(port);
    }
    let client = builder.build()?;

    println!("Connecting to {}...", client.base_url());
    let info = client.test_connection().await?;
    println!("{} ({}), {} parameters", info.name, info.uid, info.param_count);

    let store = Arc::new(ParameterStore::new(client).on_event(|event| {
        if let Event::ParameterChanged { id, name, old: Some(old), new } = event {
            println!("  {name} [{id}]: {old} -> {new:?}");
        }
    }));
    store.refresh().await?;

    let mut controllers: Vec<Controller<GatewayClient>> = active_circuits(&*store)
        .into_iter()
        .map(|c| Controller::new(variant, c, store.clone()))
        .collect();

    loop {
        for ctl in &mut controllers {
            let circuit = ctl.circuit();
            let preset = ctl.current_preset();
            println!(
                "[{}] {:?} / {:?} | {:?} | room {:?} target {:?}",
                circuit.display_name(&*store),
                ctl.current_mode(),
                preset,
                ctl.current_action(),
                ctl.current_temperature(),
                ctl.target_temperature(),
            );
        }
        for alarm in store.active_alarms() {
            println!("Active alarm {} since {:?}", alarm.code, alarm.from_date);
        }

        tokio::time::sleep(DEFAULT_REFRESH_INTERVAL).await;
        if let Err(e) = store.refresh().await {
            eprintln!("Refresh error: {e}");
        }
    }
}
