//! Providers command - list execution providers.

use console::style;

use visinfer_core::ExecutionProvider;

use super::create_engine;

pub async fn run() -> anyhow::Result<()> {
    let engine = create_engine();
    let available = engine.available_providers();

    println!("{}", style("Execution Providers").bold());
    println!("Engine: {}", engine.name());
    println!();

    for provider in ExecutionProvider::ALL {
        let (marker, note) = if available.contains(&provider) {
            (style("✓").green(), "")
        } else {
            (style("✗").red(), " (not compiled in)")
        };
        println!(
            "  {} {:<10} {}{}",
            marker,
            provider.as_str(),
            style(provider.description()).dim(),
            note
        );
    }

    println!();
    println!("Providers are bound when a session is created; a provider the");
    println!("hardware cannot serve shows up as an error in 'visinfer benchmark'.");

    Ok(())
}
