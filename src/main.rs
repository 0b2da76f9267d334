use std::{
    env,
    io::{self, BufRead},
    net::IpAddr,
    path::PathBuf,
};

use anyhow::{Context, Result};
use query_cache::{
    proxy,
    report::{report_file_name, ReportBuilder, StdoutReporter},
    HttpTransport,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "query-cache", about = "Shared request cache for build processes")]
enum Command {
    /// Run the proxy shared by all build processes.
    Serve {
        #[structopt(long, default_value = "127.0.0.1")]
        host: IpAddr,
        /// 0 picks a free port.
        #[structopt(long, default_value = "0")]
        port: u16,
        /// Print a line for every server cache hit.
        #[structopt(long)]
        report: bool,
    },
    /// Aggregate cache hit lines read from stdin into a CSV report.
    Report {
        #[structopt(long, parse(from_os_str))]
        out_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    essentials::install();
    match Command::from_args() {
        Command::Serve { host, port, report } => serve(host, port, report).await,
        Command::Report { out_dir } => report(out_dir),
    }
}

async fn serve(host: IpAddr, port: u16, report: bool) -> Result<()> {
    let builder = proxy::builder(HttpTransport::new()?)
        .with_host(host)
        .with_port(port);
    let builder = if report {
        builder.with_reporter(StdoutReporter)
    } else {
        builder
    };
    let server = builder.build().await?;
    println!("[query-cache] Up on port {}.", server.port());
    server.run().await
}

fn report(out_dir: Option<PathBuf>) -> Result<()> {
    let mut builder = ReportBuilder::new()?;
    for line in io::stdin().lock().lines() {
        builder.add_line(&line.context("Failed to read stdin")?);
    }
    let out_dir = match out_dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    let path = out_dir.join(report_file_name(chrono::Utc::now()));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    builder.write_csv(io::BufWriter::new(file))?;
    println!("{}", builder.summary(&path));
    Ok(())
}
