// main.rs - Command line entry point
use clap::Parser;
use h264_testgen::cli::Cli;
use h264_testgen::output::{write_stream, write_unit_dumps};
use h264_testgen::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let output = cli.output.clone();
    let dump_dir = cli.dump_dir.clone();

    let config = cli.into_stream_config()?;
    let generator = H264Generator::new(config)?;
    let stream = generator.generate()?;

    write_stream(&output, &stream.data)?;

    match dump_dir {
        Some(dir) => {
            let files = write_unit_dumps(&dir, &stream)?;
            info!(dir = %dir.display(), files = files.len(), "wrote unit dumps");
        }
        None => info!("no dump directory given, skipping per-unit dumps"),
    }

    println!("{}", version_info());
    println!(
        "H.264 bitstream generation completed: {} units, {} bytes, {} emulation prevention bytes",
        stream.stats.units_written, stream.stats.total_bytes, stream.stats.escape_bytes
    );

    Ok(())
}
