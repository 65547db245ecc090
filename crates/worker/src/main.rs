use clap::Parser;
use finsynth_core::orchestrator::{OrchestrationInput, Orchestrator};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod render;

#[derive(Debug, Parser)]
#[command(name = "finsynth_worker")]
struct Args {
    /// Stock ticker, e.g. AAPL.
    #[arg(long)]
    ticker: String,

    /// Start date (YYYY-MM-DD or YYYYMMDD).
    #[arg(long)]
    start_date: Option<String>,

    /// End date (YYYY-MM-DD or YYYYMMDD).
    #[arg(long)]
    end_date: Option<String>,

    /// Reporting period: annual, quarterly, monthly or ttm.
    #[arg(long)]
    period: Option<String>,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = finsynth_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let input = OrchestrationInput::parse(
        &args.ticker,
        args.start_date.as_deref(),
        args.end_date.as_deref(),
        args.period.as_deref(),
    )?;

    let orchestrator = Orchestrator::from_settings(&settings)?;

    match orchestrator.run(&input).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render::report_text(&report));
            }
            tracing::info!(
                run_id = %report.run_id,
                ticker = %report.ticker,
                unavailable = report.unavailable_domains().len(),
                "analysis run complete"
            );
            Ok(())
        }
        Err(failure) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&failure.report())?);
            } else {
                print!("{}", render::failure_text(&failure));
            }
            let err = anyhow::Error::new(failure);
            sentry_anyhow::capture_anyhow(&err);
            Err(err)
        }
    }
}

fn init_sentry(settings: &finsynth_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
