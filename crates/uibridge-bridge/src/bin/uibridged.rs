use uibridge_bridge::config::BridgeConfig;
use uibridge_bridge::server::start_bridge;
use uibridge_bridge::telemetry;

fn main() {
    telemetry::init_tracing("info");

    let config = BridgeConfig::from_env();
    if let Err(err) = start_bridge(config) {
        // No listening endpoint means no useful work; bail out loudly.
        eprintln!("uibridged: {}", err);
        std::process::exit(1);
    }
}
