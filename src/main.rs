mod error;
mod extractor;
mod fetcher;
mod loader;
mod pipeline;
mod record;
mod settings;
mod sink;
mod snapshot;
mod table;

#[cfg(test)]
mod testing;

use std::time::Instant;

use tracing::info;

use fetcher::Fetcher;
use settings::Settings;
use sink::{SinkFormat, SinkWriter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let settings = Settings::load()?;
    info!(
        urls = settings.urls.len(),
        concurrency = settings.fetch.concurrency,
        output = ?settings.output.dir,
        "Starting quotes crawl"
    );

    let fetcher = Fetcher::new(&settings.fetch)?;

    // One crawl run per sink encoding
    for format in SinkFormat::ALL {
        let path = settings.sink_path(format);
        let t_crawl = Instant::now();
        println!("Crawling {} pages into {:?}...", settings.urls.len(), path);

        let writer = SinkWriter::create(format, &path)?;
        let stats = pipeline::crawl(&fetcher, &settings.urls, settings.fetch.concurrency, writer).await?;
        println!(
            "Fetched {} pages ({} ok, {} errors), wrote {} records ({} dropped) in {:.1}s",
            stats.documents,
            stats.fetched,
            stats.failed,
            stats.records,
            stats.dropped,
            t_crawl.elapsed().as_secs_f64()
        );
    }

    // Load each finished sink independently and snapshot it
    for format in SinkFormat::ALL {
        let path = settings.sink_path(format);
        let table = loader::load(&path, format)?;

        let snap = settings.snapshot_path(format);
        let bytes = snapshot::save(&table, &snap)?;
        println!("\n{:?} -> {:?} ({} bytes)", path, snap, bytes);

        let restored = snapshot::load(&snap)?;
        if restored.is_empty() {
            println!("(no records)");
        } else {
            println!("{}", restored.render(5));
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
