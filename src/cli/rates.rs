use super::ui;
use crate::core::registry::{UnitDef, UnitRegistry};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

const POLL_EVERY: Duration = Duration::from_millis(100);

/// Waits until every code in `codes` is registered, or until any rate has
/// arrived when `codes` is empty. Returns whether the condition was met.
pub async fn wait_for_rates(registry: &UnitRegistry, codes: &[String], timeout: Duration) -> bool {
    let ready = || {
        if codes.is_empty() {
            registry.currencies().len() > 1
        } else {
            codes.iter().all(|code| registry.contains(code))
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        if ready() {
            return true;
        }
        if Instant::now() >= deadline {
            debug!("Gave up waiting for rates after {timeout:?}");
            return false;
        }
        sleep(POLL_EVERY).await;
    }
}

/// Currency rates for `codes`, or for every registered currency when empty.
pub fn collect_rates(registry: &UnitRegistry, codes: &[String]) -> Vec<(String, UnitDef)> {
    let wanted: Vec<String> = if codes.is_empty() {
        registry.currencies()
    } else {
        codes.to_vec()
    };
    wanted
        .into_iter()
        .filter_map(|code| registry.lookup(&code).map(|def| (code, def)))
        .collect()
}

pub async fn run(registry: &UnitRegistry, codes: &[String], wait: Duration) {
    let spinner = ui::new_spinner("Waiting for rates...");
    let complete = wait_for_rates(registry, codes, wait).await;
    spinner.finish_and_clear();

    let rates = collect_rates(registry, codes);
    println!("{}", ui::rates_table(&rates, registry.base()));
    if !complete {
        let missing: Vec<&str> = codes
            .iter()
            .filter(|code| !registry.contains(code))
            .map(String::as_str)
            .collect();
        let message = if missing.is_empty() {
            "No rates received yet".to_string()
        } else {
            format!("No rate received for {}", missing.join(", "))
        };
        println!("{}", ui::style_text(&message, ui::StyleType::Subtle));
    }
}
